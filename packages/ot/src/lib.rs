//! # Verso OT
//!
//! Operational-transformation engine for collaborative editing of linear
//! documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ transaction: one atomic edit                │
//! │  - retain / replace / attribute / annotate  │
//! │  - offset and range translation             │
//! │  - active range, retain adjustment          │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ change: consecutive transactions + stores   │
//! │  - concat, reversed, most_recent, truncate  │
//! │  - author selections                        │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ rebase: concurrent changes → one history    │
//! │  - conflicting suffixes are rejected        │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ session: client mirror of the server side   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use verso_ot::{rebase_uncommitted_change, Change, LinearDocument, Transaction};
//!
//! let mut doc = LinearDocument::from_text("hello");
//! let history = Change::from_transactions(0, vec![Transaction::insertion(5, 0, vec!["¡".into()], Some(1))]);
//! let mine = Change::from_transactions(0, vec![Transaction::insertion(5, 5, vec!["!".into()], Some(2))]);
//!
//! let result = rebase_uncommitted_change(&history, &mine)?;
//! doc.apply_change(&history)?;
//! doc.apply_change(&result.rebased)?;
//! assert_eq!(doc.text(), "¡hello!");
//! ```

mod builder;
mod change;
mod document;
mod errors;
mod operation;
mod range;
mod rebase;
mod selection;
mod session;
mod store;
mod transaction;

pub use builder::TransactionBuilder;
pub use change::Change;
pub use document::LinearDocument;
pub use errors::{ChangeError, TransactionError};
pub use operation::{AnnotationBias, AnnotationMethod, Item, Operation};
pub use range::Range;
pub use rebase::{author_precedes, rebase_transactions, rebase_uncommitted_change, RebaseResult};
pub use selection::Selection;
pub use session::{EditSession, Submission};
pub use store::{hash_value, HashValueStore};
pub use transaction::{ActiveRange, AuthorId, RetainPlace, Transaction};
