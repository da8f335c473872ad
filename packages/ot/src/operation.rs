//! # Operations
//!
//! The closed vocabulary a [`Transaction`](crate::Transaction) is written in.
//!
//! Every operation is addressed by a cursor walking the linear data of the
//! document. Only `retain` and `replace` move that cursor over content;
//! the others have zero content length.
//!
//! | Operation         | Content length | Effect                                  |
//! |-------------------|----------------|-----------------------------------------|
//! | `retain`          | `length`       | skip unchanged                          |
//! | `retainMetadata`  | 0              | skip metadata unchanged                 |
//! | `replace`         | `remove.len()` | swap `remove` for `insert`              |
//! | `replaceMetadata` | 0              | swap metadata, touches one position     |
//! | `attribute`       | 0              | change one element attribute            |
//! | `annotate`        | 0              | open/close an annotation span           |

use serde::{Deserialize, Serialize};

/// One item of linear data: a character, an element open/close marker, or
/// an annotated character. Opaque to the transform laws.
pub type Item = serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnnotationMethod {
    Set,
    Clear,
}

impl AnnotationMethod {
    pub fn reversed(self) -> Self {
        match self {
            AnnotationMethod::Set => AnnotationMethod::Clear,
            AnnotationMethod::Clear => AnnotationMethod::Set,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnnotationBias {
    Start,
    Stop,
}

/// A single typed operation, serialized with a `type` tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Operation {
    Retain {
        length: usize,
    },

    RetainMetadata {
        length: usize,
    },

    #[serde(rename_all = "camelCase")]
    Replace {
        remove: Vec<Item>,
        insert: Vec<Item>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remove_metadata: Option<Vec<Item>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        insert_metadata: Option<Vec<Item>>,
        /// Start of the user's intended insertion within `insert`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inserted_data_offset: Option<usize>,
        /// Length of the user's intended insertion within `insert`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inserted_data_length: Option<usize>,
    },

    ReplaceMetadata {
        remove: Vec<Item>,
        insert: Vec<Item>,
    },

    Attribute {
        key: String,
        from: Item,
        to: Item,
    },

    Annotate {
        method: AnnotationMethod,
        bias: AnnotationBias,
        /// Store hash of the annotation being opened or closed
        index: String,
    },
}

impl Operation {
    pub fn retain(length: usize) -> Self {
        Operation::Retain { length }
    }

    /// Plain replacement with no metadata or insertion hints
    pub fn replace(remove: Vec<Item>, insert: Vec<Item>) -> Self {
        Operation::Replace {
            remove,
            insert,
            remove_metadata: None,
            insert_metadata: None,
            inserted_data_offset: None,
            inserted_data_length: None,
        }
    }

    pub fn is_retain(&self) -> bool {
        matches!(self, Operation::Retain { .. } | Operation::RetainMetadata { .. })
    }

    /// Number of content items this operation consumes from the old document
    pub fn content_length(&self) -> usize {
        match self {
            Operation::Retain { length } => *length,
            Operation::Replace { remove, .. } => remove.len(),
            _ => 0,
        }
    }

    /// Apply the swap table that inverts this operation.
    pub fn reversed(&self) -> Operation {
        match self {
            Operation::Retain { .. } | Operation::RetainMetadata { .. } => self.clone(),
            Operation::Replace {
                remove,
                insert,
                remove_metadata,
                insert_metadata,
                inserted_data_offset,
                inserted_data_length,
            } => Operation::Replace {
                remove: insert.clone(),
                insert: remove.clone(),
                remove_metadata: insert_metadata.clone(),
                insert_metadata: remove_metadata.clone(),
                inserted_data_offset: *inserted_data_offset,
                inserted_data_length: *inserted_data_length,
            },
            Operation::ReplaceMetadata { remove, insert } => Operation::ReplaceMetadata {
                remove: insert.clone(),
                insert: remove.clone(),
            },
            Operation::Attribute { key, from, to } => Operation::Attribute {
                key: key.clone(),
                from: to.clone(),
                to: from.clone(),
            },
            Operation::Annotate { method, bias, index } => Operation::Annotate {
                method: method.reversed(),
                bias: *bias,
                index: index.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_tagged_camel_case() {
        let op = Operation::Replace {
            remove: vec![],
            insert: vec![json!("a")],
            remove_metadata: None,
            insert_metadata: None,
            inserted_data_offset: Some(0),
            inserted_data_length: Some(1),
        };

        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "replace",
                "remove": [],
                "insert": ["a"],
                "insertedDataOffset": 0,
                "insertedDataLength": 1
            })
        );
    }

    #[test]
    fn test_deserialize_retain_metadata() {
        let op: Operation = serde_json::from_value(json!({"type": "retainMetadata", "length": 2})).unwrap();
        assert_eq!(op, Operation::RetainMetadata { length: 2 });
    }

    #[test]
    fn test_annotate_reversal_swaps_method_only() {
        let op = Operation::Annotate {
            method: AnnotationMethod::Set,
            bias: AnnotationBias::Start,
            index: "h1".to_string(),
        };

        assert_eq!(
            op.reversed(),
            Operation::Annotate {
                method: AnnotationMethod::Clear,
                bias: AnnotationBias::Start,
                index: "h1".to_string(),
            }
        );
    }

    #[test]
    fn test_replace_reversal_swaps_metadata() {
        let op = Operation::Replace {
            remove: vec![json!("x")],
            insert: vec![],
            remove_metadata: Some(vec![json!({"type": "comment"})]),
            insert_metadata: None,
            inserted_data_offset: None,
            inserted_data_length: None,
        };

        match op.reversed() {
            Operation::Replace { remove, insert, remove_metadata, insert_metadata, .. } => {
                assert!(remove.is_empty());
                assert_eq!(insert, vec![json!("x")]);
                assert_eq!(remove_metadata, None);
                assert_eq!(insert_metadata, Some(vec![json!({"type": "comment"})]));
            }
            _ => panic!("Expected replace"),
        }
    }
}
