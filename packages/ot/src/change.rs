//! # Changes
//!
//! A change is a run of consecutive transactions anchored at a position in
//! a document's history:
//!
//! ```text
//! history position:  start   start+1   start+2        start+n
//!                      │  t0    │   t1    │  ...   t(n-1) │
//! ```
//!
//! Alongside the transactions it carries, per transaction, the store values
//! that transaction introduced, and the latest selection of each author as
//! of the end of the change.
//!
//! Changes are immutable values: composition, inversion and slicing all
//! return new changes. The rebase algorithms live in [`crate::rebase`].

use crate::errors::ChangeError;
use crate::selection::Selection;
use crate::store::HashValueStore;
use crate::transaction::{AuthorId, Transaction};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "SerializedChange<V>",
    bound(serialize = "V: Serialize", deserialize = "V: DeserializeOwned")
)]
pub struct Change<V = Value> {
    start: usize,
    transactions: Vec<Transaction>,
    stores: Vec<HashValueStore<V>>,
    selections: BTreeMap<AuthorId, Selection>,
}

/// Wire form of a change, validated on the way in
#[derive(Deserialize)]
struct SerializedChange<V> {
    start: usize,
    transactions: Vec<Transaction>,
    #[serde(default = "Vec::new")]
    stores: Vec<HashValueStore<V>>,
    #[serde(default)]
    selections: BTreeMap<AuthorId, Selection>,
}

impl<V> TryFrom<SerializedChange<V>> for Change<V> {
    type Error = ChangeError;

    fn try_from(serialized: SerializedChange<V>) -> Result<Self, Self::Error> {
        let mut stores = serialized.stores;
        if stores.is_empty() {
            stores = serialized.transactions.iter().map(|_| HashValueStore::new()).collect();
        }
        Change::new(serialized.start, serialized.transactions, stores, serialized.selections)
    }
}

impl<V> Change<V> {
    pub fn new(
        start: usize,
        transactions: Vec<Transaction>,
        stores: Vec<HashValueStore<V>>,
        selections: BTreeMap<AuthorId, Selection>,
    ) -> Result<Self, ChangeError> {
        if stores.len() != transactions.len() {
            return Err(ChangeError::StoreCountMismatch {
                transactions: transactions.len(),
                stores: stores.len(),
            });
        }

        Ok(Self {
            start,
            transactions,
            stores,
            selections,
        })
    }

    /// Change with no transactions at history position `start`
    pub fn empty(start: usize) -> Self {
        Self {
            start,
            transactions: Vec::new(),
            stores: Vec::new(),
            selections: BTreeMap::new(),
        }
    }

    /// Change whose transactions introduce no store values
    pub fn from_transactions(start: usize, transactions: Vec<Transaction>) -> Self {
        let stores = transactions.iter().map(|_| HashValueStore::new()).collect();
        Self {
            start,
            transactions,
            stores,
            selections: BTreeMap::new(),
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// Number of transactions
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// History position right after the last transaction
    pub fn end(&self) -> usize {
        self.start + self.transactions.len()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn stores(&self) -> &[HashValueStore<V>] {
        &self.stores
    }

    pub fn selections(&self) -> &BTreeMap<AuthorId, Selection> {
        &self.selections
    }

    pub fn set_selection(&mut self, author: AuthorId, selection: Selection) {
        self.selections.insert(author, selection);
    }

    /// Author of the first transaction, which identifies who submitted it
    pub fn first_author(&self) -> Option<AuthorId> {
        self.transactions.first().and_then(|tx| tx.author)
    }

    /// Undo of this change.
    ///
    /// Starts where this change ends; transactions run backwards, each one
    /// reversed. Undo introduces no store values and carries no selections.
    pub fn reversed(&self) -> Change<V> {
        Change {
            start: self.end(),
            transactions: self.transactions.iter().rev().map(Transaction::reversed).collect(),
            stores: self.transactions.iter().map(|_| HashValueStore::new()).collect(),
            selections: BTreeMap::new(),
        }
    }

    /// Detach the last transaction as a one-transaction change
    pub fn pop(&mut self) -> Option<Change<V>> {
        let tx = self.transactions.pop()?;
        let store = self.stores.pop().unwrap_or_default();
        self.selections.clear();
        Some(Change {
            start: self.end(),
            transactions: vec![tx],
            stores: vec![store],
            selections: BTreeMap::new(),
        })
    }

    /// Append a consecutive change in place; `other`'s selections replace ours
    pub fn push(&mut self, other: Change<V>) -> Result<(), ChangeError> {
        if other.start != self.end() {
            return Err(ChangeError::NotConsecutive {
                expected: self.end(),
                actual: other.start,
            });
        }
        self.transactions.extend(other.transactions);
        self.stores.extend(other.stores);
        self.selections = other.selections;
        Ok(())
    }

    /// One-line description for logs
    pub fn summary(&self) -> String {
        let mut authors: Vec<AuthorId> = self.transactions.iter().filter_map(|tx| tx.author).collect();
        authors.dedup();
        format!(
            "change {}..{} ({} transactions, authors {:?})",
            self.start,
            self.end(),
            self.transactions.len(),
            authors
        )
    }
}

impl<V: Clone> Change<V> {
    /// Compose with a consecutive change
    pub fn concat(&self, other: &Change<V>) -> Result<Change<V>, ChangeError> {
        let mut change = Change {
            start: self.start,
            transactions: self.transactions.clone(),
            stores: self.stores.clone(),
            selections: BTreeMap::new(),
        };
        change.push(other.clone())?;
        Ok(change)
    }

    /// Suffix of this change from history position `new_start`, keeping
    /// selections
    pub fn most_recent(&self, new_start: usize) -> Change<V> {
        let new_start = new_start.max(self.start);
        let offset = (new_start - self.start).min(self.transactions.len());
        Change {
            start: new_start,
            transactions: self.transactions[offset..].to_vec(),
            stores: self.stores[offset..].to_vec(),
            selections: self.selections.clone(),
        }
    }

    /// First `length` transactions. A truncated change is "committed so
    /// far" and has no live selections.
    pub fn truncate(&self, length: usize) -> Change<V> {
        let length = length.min(self.transactions.len());
        Change {
            start: self.start,
            transactions: self.transactions[..length].to_vec(),
            stores: self.stores[..length].to_vec(),
            selections: BTreeMap::new(),
        }
    }
}

impl<V> fmt::Display for Change<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}
