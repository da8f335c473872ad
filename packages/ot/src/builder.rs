//! Incremental construction of transactions.
//!
//! Adjacent retains coalesce, and so do plain replacements, so the built
//! operation list is in the same canonical shape the rebase code expects.

use crate::operation::{AnnotationBias, AnnotationMethod, Item, Operation};
use crate::transaction::{AuthorId, Transaction};

#[derive(Debug, Default)]
pub struct TransactionBuilder {
    operations: Vec<Operation>,
    author: Option<AuthorId>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn author(mut self, author: Option<AuthorId>) -> Self {
        self.author = author;
        self
    }

    pub fn retain(mut self, length: usize) -> Self {
        if length == 0 {
            return self;
        }
        if let Some(Operation::Retain { length: last }) = self.operations.last_mut() {
            *last += length;
        } else {
            self.operations.push(Operation::retain(length));
        }
        self
    }

    pub fn retain_metadata(mut self, length: usize) -> Self {
        if length == 0 {
            return self;
        }
        if let Some(Operation::RetainMetadata { length: last }) = self.operations.last_mut() {
            *last += length;
        } else {
            self.operations.push(Operation::RetainMetadata { length });
        }
        self
    }

    pub fn replace(mut self, remove: Vec<Item>, insert: Vec<Item>) -> Self {
        if remove.is_empty() && insert.is_empty() {
            return self;
        }
        if let Some(Operation::Replace {
            remove: last_remove,
            insert: last_insert,
            remove_metadata: None,
            insert_metadata: None,
            inserted_data_offset: None,
            inserted_data_length: None,
        }) = self.operations.last_mut()
        {
            last_remove.extend(remove);
            last_insert.extend(insert);
        } else {
            self.operations.push(Operation::replace(remove, insert));
        }
        self
    }

    pub fn insert(self, items: Vec<Item>) -> Self {
        self.replace(Vec::new(), items)
    }

    pub fn remove(self, items: Vec<Item>) -> Self {
        self.replace(items, Vec::new())
    }

    pub fn replace_metadata(mut self, remove: Vec<Item>, insert: Vec<Item>) -> Self {
        self.operations.push(Operation::ReplaceMetadata { remove, insert });
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, from: Item, to: Item) -> Self {
        self.operations.push(Operation::Attribute {
            key: key.into(),
            from,
            to,
        });
        self
    }

    pub fn annotate(mut self, method: AnnotationMethod, bias: AnnotationBias, index: impl Into<String>) -> Self {
        self.operations.push(Operation::Annotate {
            method,
            bias,
            index: index.into(),
        });
        self
    }

    /// Append an operation as-is
    pub fn push(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn build(self) -> Transaction {
        Transaction::new(self.operations, self.author)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_retains_coalesce() {
        let tx = TransactionBuilder::new().retain(2).retain(0).retain(3).build();
        assert_eq!(tx.operations, vec![Operation::retain(5)]);
    }

    #[test]
    fn test_replacements_coalesce() {
        let tx = TransactionBuilder::new()
            .retain(1)
            .remove(vec![json!("a")])
            .insert(vec![json!("b")])
            .retain(1)
            .build();

        assert_eq!(
            tx.operations,
            vec![
                Operation::retain(1),
                Operation::replace(vec![json!("a")], vec![json!("b")]),
                Operation::retain(1),
            ]
        );
    }

    #[test]
    fn test_empty_replacement_dropped() {
        let tx = TransactionBuilder::new().author(Some(2)).retain(4).insert(vec![]).build();

        assert!(tx.is_no_op());
        assert_eq!(tx.author, Some(2));
    }

    #[test]
    fn test_annotation_span() {
        let tx = TransactionBuilder::new()
            .annotate(AnnotationMethod::Set, AnnotationBias::Start, "h1")
            .retain(2)
            .annotate(AnnotationMethod::Set, AnnotationBias::Stop, "h1")
            .build();

        assert_eq!(tx.operations.len(), 3);
        assert_eq!(tx.active_range_and_length_diff().start, Some(0));
    }
}
