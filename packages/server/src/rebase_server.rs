//! Synchronous multi-document server.
//!
//! Holds one [`DocumentState`] per document name, created on first use.
//! Callers are responsible for serializing access per document; the async
//! [`DocumentHub`](crate::DocumentHub) does that with one worker per
//! document.

use crate::errors::ServerResult;
use crate::state::{AuthorState, DocumentState};
use std::collections::HashMap;
use verso_ot::{AuthorId, Change};

#[derive(Debug, Default)]
pub struct RebaseServer {
    documents: HashMap<String, DocumentState>,
}

impl RebaseServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a submission to `doc`; see [`DocumentState::apply_change`]
    pub fn apply_change(
        &mut self,
        doc: &str,
        author: AuthorId,
        backtrack: usize,
        change: &Change,
    ) -> ServerResult<Change> {
        self.doc_state_mut(doc).apply_change(author, backtrack, change)
    }

    pub fn doc_state(&self, doc: &str) -> Option<&DocumentState> {
        self.documents.get(doc)
    }

    /// State of `doc`, created empty if missing
    pub fn doc_state_mut(&mut self, doc: &str) -> &mut DocumentState {
        self.documents.entry(doc.to_string()).or_default()
    }

    pub fn clear_doc_state(&mut self, doc: &str) -> Option<DocumentState> {
        self.documents.remove(doc)
    }

    pub fn remove_author(&mut self, doc: &str, author: AuthorId) -> Option<AuthorState> {
        self.documents.get_mut(doc)?.remove_author(author)
    }

    pub fn set_author_name(&mut self, doc: &str, author: AuthorId, name: impl Into<String>) {
        self.doc_state_mut(doc).set_author_name(author, name);
    }

    pub fn documents(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }
}
