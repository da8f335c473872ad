//! Cursor and range selections, as far as rebasing needs them.
//!
//! Selections travel inside a [`Change`] as the latest cursor of each author,
//! and are projected through every transaction the author has not seen.

use crate::change::Change;
use crate::range::Range;
use crate::transaction::{AuthorId, Transaction};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Selection {
    /// Nothing selected (e.g. the surface is blurred)
    Null,

    Linear { range: Range },
}

impl Selection {
    pub fn linear(range: Range) -> Self {
        Selection::Linear { range }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Selection::Null)
    }

    pub fn is_collapsed(&self) -> bool {
        match self {
            Selection::Null => true,
            Selection::Linear { range } => range.is_collapsed(),
        }
    }

    pub fn range(&self) -> Option<Range> {
        match self {
            Selection::Null => None,
            Selection::Linear { range } => Some(*range),
        }
    }

    pub fn translate_by_transaction(&self, tx: &Transaction, exclude_insertion: bool) -> Selection {
        match self {
            Selection::Null => Selection::Null,
            Selection::Linear { range } => Selection::linear(tx.translate_range(range, exclude_insertion)),
        }
    }

    pub fn translate_by_transaction_with_author(&self, tx: &Transaction, author: Option<AuthorId>) -> Selection {
        match self {
            Selection::Null => Selection::Null,
            Selection::Linear { range } => Selection::linear(tx.translate_range_with_author(range, author)),
        }
    }

    /// Translate through every transaction of `change` in order
    pub fn translate_by_change<V>(&self, change: &Change<V>, author: Option<AuthorId>) -> Selection {
        change
            .transactions()
            .iter()
            .fold(self.clone(), |selection, tx| {
                selection.translate_by_transaction_with_author(tx, author)
            })
    }
}
