//! Error types for transactions and changes

use crate::transaction::RetainPlace;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransactionError {
    #[error("Negative retain length {length} at {place} of transaction")]
    NegativeRetain { place: RetainPlace, length: isize },

    #[error("Removed data does not match document at offset {offset}")]
    RemoveMismatch { offset: usize },

    #[error("Offset {offset} is past the end of a document of length {length}")]
    OutOfBounds { offset: usize, length: usize },

    #[error("Attribute change at offset {offset} does not target an element")]
    NotAnElement { offset: usize },

    #[error("Transaction covers {actual} items but the document has {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Transaction has already been applied")]
    AlreadyApplied,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChangeError {
    #[error("Changes are not consecutive: expected start {expected}, got {actual}")]
    NotConsecutive { expected: usize, actual: usize },

    #[error("Different starts: history {history} and uncommitted {uncommitted}")]
    StartMismatch { history: usize, uncommitted: usize },

    #[error("Change has {transactions} transactions but {stores} stores")]
    StoreCountMismatch { transactions: usize, stores: usize },

    #[error("Change arrived out of order: expected start {expected}, got {actual}")]
    OutOfOrder { expected: usize, actual: usize },

    #[error("Acknowledged more of our own transactions than were sent")]
    UnsentBacklog,

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
}
