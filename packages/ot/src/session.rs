//! # Edit Session
//!
//! One client's view of a shared document.
//!
//! Local transactions are applied to the document immediately and kept as
//! pending until the server broadcasts them back. Changes from other
//! authors are applied underneath the pending transactions by rebasing the
//! pending change over them, exactly as the server does.
//!
//! ```text
//! server history:  [0 ........ commit_length)
//! pending:                      [commit_length ...... end)
//!                               [ sent ...... )[ unsent )
//! ```
//!
//! When a foreign change conflicts with pending work, the conflicting tail
//! is dropped. The part of it that was already sent is reported back to
//! the server as `backtrack` with the next submission.

use crate::change::Change;
use crate::document::LinearDocument;
use crate::errors::ChangeError;
use crate::rebase::rebase_uncommitted_change;
use crate::selection::Selection;
use crate::transaction::{AuthorId, Transaction};
use tracing::{debug, info};

pub struct EditSession {
    author: AuthorId,

    /// Server history plus pending transactions, applied
    document: LinearDocument,

    /// Number of server history transactions applied to `document`
    commit_length: usize,

    /// Local transactions the server has not broadcast back yet
    pending: Change,

    /// How many of the pending transactions have been submitted
    sent_length: usize,

    /// Submitted transactions dropped locally and not yet reported
    backtrack: usize,

    selection: Selection,
}

/// A change ready to send, with the backtrack count to send alongside it
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub backtrack: usize,
    pub change: Change,
}

impl EditSession {
    /// Session on a document that already reflects `commit_length` server
    /// transactions
    pub fn new(author: AuthorId, document: LinearDocument, commit_length: usize) -> Self {
        Self {
            author,
            document,
            commit_length,
            pending: Change::empty(commit_length),
            sent_length: 0,
            backtrack: 0,
            selection: Selection::Null,
        }
    }

    /// Session starting from the full server history, as received on connect
    pub fn resume(author: AuthorId, history: &Change) -> Result<Self, ChangeError> {
        let mut document = LinearDocument::new();
        document.apply_change(history)?;
        Ok(Self::new(author, document, history.end()))
    }

    pub fn author(&self) -> AuthorId {
        self.author
    }

    pub fn document(&self) -> &LinearDocument {
        &self.document
    }

    pub fn commit_length(&self) -> usize {
        self.commit_length
    }

    pub fn pending(&self) -> &Change {
        &self.pending
    }

    pub fn sent_length(&self) -> usize {
        self.sent_length
    }

    pub fn backtrack(&self) -> usize {
        self.backtrack
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
    }

    /// Whether `take_submission` has anything to send
    pub fn has_unsent(&self) -> bool {
        self.sent_length < self.pending.len() || self.backtrack > 0
    }

    /// Apply a local edit optimistically. The transaction is attributed to
    /// this session's author.
    pub fn apply_local(&mut self, mut tx: Transaction) -> Result<(), ChangeError> {
        tx.author = Some(self.author);
        self.document.commit(&mut tx)?;
        self.pending.push(Change::from_transactions(self.pending.end(), vec![tx]))?;
        Ok(())
    }

    /// Unsent pending transactions, marked as sent
    pub fn take_submission(&mut self) -> Option<Submission> {
        if !self.has_unsent() {
            return None;
        }

        let mut change = self.pending.most_recent(self.commit_length + self.sent_length);
        change.set_selection(self.author, self.selection.clone());

        let submission = Submission {
            backtrack: self.backtrack,
            change,
        };
        self.sent_length = self.pending.len();
        self.backtrack = 0;
        Some(submission)
    }

    /// Apply a change broadcast by the server.
    ///
    /// Changes must arrive in history order.
    pub fn accept_change(&mut self, change: &Change) -> Result<(), ChangeError> {
        if change.start() != self.commit_length {
            return Err(ChangeError::OutOfOrder {
                expected: self.commit_length,
                actual: change.start(),
            });
        }
        if change.is_empty() {
            return Ok(());
        }

        if change.first_author() == Some(self.author) {
            self.acknowledge(change.len())
        } else {
            self.rebase_pending(change)
        }
    }

    /// Our own first `count` pending transactions made it into history
    fn acknowledge(&mut self, count: usize) -> Result<(), ChangeError> {
        if count > self.sent_length {
            return Err(ChangeError::UnsentBacklog);
        }

        self.commit_length += count;
        self.sent_length -= count;
        self.pending = self.pending.most_recent(self.commit_length);

        debug!(author = self.author, count, "Pending transactions committed");
        Ok(())
    }

    fn rebase_pending(&mut self, change: &Change) -> Result<(), ChangeError> {
        let result = rebase_uncommitted_change(change, &self.pending)?;

        let mut document = self.document.clone();
        document.unapply_change(&self.pending)?;
        document.apply_change(change)?;
        document.apply_change(&result.rebased)?;
        self.document = document;

        let mut selection = self.selection.clone();
        if let Some(rejected) = &result.rejected {
            // Back out of the dropped tail before following the foreign change
            selection = selection.translate_by_change(&rejected.reversed(), Some(self.author));

            let accepted = result.rebased.len();
            let dropped_sent = self.sent_length.saturating_sub(accepted);
            self.backtrack += dropped_sent;
            self.sent_length = self.sent_length.min(accepted);

            info!(
                author = self.author,
                dropped = rejected.len(),
                backtrack = self.backtrack,
                "Dropped local transactions that conflict with {}",
                change
            );
        }

        self.selection = selection.translate_by_change(&result.transposed_history, Some(self.author));
        self.commit_length = change.end();
        self.pending = result.rebased;
        Ok(())
    }
}
