//! # Document state
//!
//! Per-document server state: the canonical history plus bookkeeping for
//! every author who has submitted to it.
//!
//! ```text
//! submission (author, backtrack, change)
//!      │
//!      ├─ rejections > backtrack ──▶ reject all, return empty change
//!      ├─ rejections < backtrack ──▶ protocol error
//!      ├─ start past history end ──▶ protocol error
//!      └─ rejections = backtrack ──▶ rebase over unseen history
//!                                    append accepted part to history
//! ```
//!
//! `apply_change` either succeeds or leaves the state untouched.

use crate::errors::{ServerError, ServerResult};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use verso_ot::{rebase_uncommitted_change, AuthorId, Change};

/// What the server remembers about one author of one document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorState {
    /// Own transactions discarded on conflict and not yet acknowledged
    pub rejections: usize,

    /// History the author has not seen, expressed after their last
    /// accepted submission
    #[serde(skip)]
    pub continue_base: Option<Change>,

    /// Secret the author presents to reclaim this id on reconnect
    #[serde(skip)]
    pub token: String,

    pub display_name: Option<String>,
    pub color: Option<String>,
    pub active: bool,
}

impl AuthorState {
    pub fn new() -> Self {
        Self {
            rejections: 0,
            continue_base: None,
            token: Uuid::new_v4().to_string(),
            display_name: None,
            color: None,
            active: true,
        }
    }
}

impl Default for AuthorState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct DocumentState {
    history: Change,
    authors: BTreeMap<AuthorId, AuthorState>,
    next_author_id: AuthorId,
}

impl Default for DocumentState {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentState {
    pub fn new() -> Self {
        Self {
            history: Change::empty(0),
            authors: BTreeMap::new(),
            next_author_id: 1,
        }
    }

    pub fn history(&self) -> &Change {
        &self.history
    }

    pub fn author(&self, author: AuthorId) -> Option<&AuthorState> {
        self.authors.get(&author)
    }

    pub fn authors(&self) -> &BTreeMap<AuthorId, AuthorState> {
        &self.authors
    }

    /// Authors currently connected
    pub fn active_authors(&self) -> Vec<AuthorId> {
        self.authors
            .iter()
            .filter(|(_, state)| state.active)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Look up or lazily create an author's state
    fn author_entry(&mut self, author: AuthorId) -> &mut AuthorState {
        if author >= self.next_author_id {
            self.next_author_id = author.saturating_add(1);
        }
        self.authors.entry(author).or_insert_with(AuthorState::new)
    }

    /// Reclaim an author id with its token, or allocate a fresh one.
    ///
    /// Returns the id and the token the author should keep for next time.
    pub fn register_author(&mut self, credentials: Option<(AuthorId, &str)>) -> (AuthorId, String) {
        if let Some((author, token)) = credentials {
            if let Some(state) = self.authors.get_mut(&author) {
                if state.token == token {
                    state.active = true;
                    info!(author, "Author reconnected");
                    return (author, state.token.clone());
                }
            }
        }

        let author = self.next_author_id;
        let token = self.author_entry(author).token.clone();
        info!(author, "Author registered");
        (author, token)
    }

    pub fn set_author_name(&mut self, author: AuthorId, name: impl Into<String>) {
        self.author_entry(author).display_name = Some(name.into());
    }

    pub fn set_author_color(&mut self, author: AuthorId, color: impl Into<String>) {
        self.author_entry(author).color = Some(color.into());
    }

    pub fn set_author_active(&mut self, author: AuthorId, active: bool) {
        if let Some(state) = self.authors.get_mut(&author) {
            state.active = active;
        }
    }

    /// Forget an author. A later submission under the same id starts from
    /// fresh state.
    pub fn remove_author(&mut self, author: AuthorId) -> Option<AuthorState> {
        self.authors.remove(&author)
    }

    pub fn history_summary(&self) -> String {
        format!(
            "{} ({} authors, {} active)",
            self.history.summary(),
            self.authors.len(),
            self.active_authors().len()
        )
    }

    /// Accept as much of an author's submission as possible.
    ///
    /// Returns the accepted part, rebased onto the end of history and
    /// already appended to it. An empty change means nothing was accepted.
    #[instrument(skip(self, change), fields(start = change.start(), length = change.len()))]
    pub fn apply_change(&mut self, author: AuthorId, backtrack: usize, change: &Change) -> ServerResult<Change> {
        let (rejections, continue_base) = match self.authors.get(&author) {
            Some(state) => (state.rejections, state.continue_base.clone()),
            None => (0, None),
        };

        if rejections > backtrack {
            // Built on rejected work the author has not acknowledged yet
            let state = self.author_entry(author);
            state.rejections = rejections - backtrack + change.len();
            state.continue_base = None;
            warn!(
                rejections = state.rejections,
                "Submission does not acknowledge earlier rejections, rejecting it"
            );
            return Ok(self.history.truncate(0));
        }
        if rejections < backtrack {
            return Err(ServerError::BacktrackExceedsRejections { backtrack, rejections });
        }

        // Only checked once rejections are settled: unacknowledged work
        // legitimately starts past the end of history
        let history_end = self.history.end();
        if change.start() > history_end {
            return Err(ServerError::AheadOfHistory {
                start: change.start(),
                history_end,
            });
        }

        let mut base = continue_base.unwrap_or_else(|| change.truncate(0));
        if change.start() > base.start() {
            base = base.most_recent(change.start());
        } else if change.start() < base.start() {
            warn!(
                base_start = base.start(),
                "Submission is relative to older history, rebasing over everything since"
            );
            base = self.history.most_recent(change.start());
        }
        let base = base.concat(&self.history.most_recent(base.end()))?;

        let result = rebase_uncommitted_change(&base, change)?;
        self.history.push(result.rebased.clone())?;

        let state = self.author_entry(author);
        state.rejections = result.rejected.as_ref().map_or(0, Change::len);
        state.continue_base = Some(result.transposed_history);

        if state.rejections > 0 {
            warn!(rejected = state.rejections, "Part of the submission conflicts with history");
        }
        info!(
            accepted = result.rebased.len(),
            history = self.history.len(),
            "Submission applied"
        );

        Ok(result.rebased)
    }
}
