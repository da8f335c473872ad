//! Error types for the rebase server

use thiserror::Error;
use verso_ot::ChangeError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServerError {
    #[error("Backtrack {backtrack} exceeds the {rejections} rejected transactions")]
    BacktrackExceedsRejections { backtrack: usize, rejections: usize },

    #[error("Change starts at {start} but history ends at {history_end}")]
    AheadOfHistory { start: usize, history_end: usize },

    #[error("Change error: {0}")]
    Change(#[from] ChangeError),

    #[error("Document worker closed: {0}")]
    DocumentClosed(String),
}

pub type ServerResult<T> = Result<T, ServerError>;
