//! # Linear document
//!
//! Minimal document model the rebase engine edits: a flat array of items
//! plus the store of values the items' annotations refer to.
//!
//! Items are characters (`"a"`, or `["a", [hash, ...]]` when annotated) or
//! element objects (`{"type": ..., "attributes": {...}}`). Elements carry no
//! text.
//!
//! ```text
//! commit(tx) ──▶ data' = tx(data)          version + 1
//! apply_change(c) ──▶ data' = c.tn(...c.t0(data))   store ∪ c.stores
//! ```

use crate::change::Change;
use crate::errors::TransactionError;
use crate::operation::Item;
use crate::store::HashValueStore;
use crate::transaction::Transaction;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearDocument {
    pub data: Vec<Item>,
    pub store: HashValueStore,

    /// Increments on every committed transaction
    pub version: u64,
}

impl LinearDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(data: Vec<Item>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// Document of plain characters
    pub fn from_text(text: &str) -> Self {
        Self::from_items(text.chars().map(|c| Value::String(c.to_string())).collect())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Apply a local transaction and flag it applied.
    ///
    /// Committing the same transaction twice is an error.
    pub fn commit(&mut self, tx: &mut Transaction) -> Result<(), TransactionError> {
        if tx.is_applied() {
            return Err(TransactionError::AlreadyApplied);
        }
        tx.apply_to(&mut self.data)?;
        tx.mark_applied()?;
        self.version += 1;
        Ok(())
    }

    /// Apply every transaction of `change` in order. All or nothing.
    pub fn apply_change(&mut self, change: &Change) -> Result<(), TransactionError> {
        let mut data = self.data.clone();
        for tx in change.transactions() {
            tx.apply_to(&mut data)?;
        }

        self.data = data;
        for store in change.stores() {
            self.store.merge(store);
        }
        self.version += change.len() as u64;
        Ok(())
    }

    /// Undo `change`, which must be the most recent thing applied
    pub fn unapply_change(&mut self, change: &Change) -> Result<(), TransactionError> {
        self.apply_change(&change.reversed())
    }

    /// Plain text of all character items; elements are skipped
    pub fn text(&self) -> String {
        self.data
            .iter()
            .filter_map(|item| match item {
                Value::String(c) => Some(c.as_str()),
                Value::Array(parts) => parts.first().and_then(Value::as_str),
                _ => None,
            })
            .collect()
    }
}

impl Change {
    pub fn apply_to(&self, doc: &mut LinearDocument) -> Result<(), TransactionError> {
        doc.apply_change(self)
    }

    pub fn unapply_to(&self, doc: &mut LinearDocument) -> Result<(), TransactionError> {
        doc.unapply_change(self)
    }
}
