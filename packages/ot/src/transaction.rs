//! # Transactions
//!
//! A transaction is one atomic edit: an ordered list of [`Operation`]s that
//! maps one document state to the next, plus the id of the author who made
//! it.
//!
//! Transactions are value objects. Variants (reversed, rebased) are built by
//! cloning; the only field ever flipped in place is the local `applied`
//! guard, which is not part of the serialized form.
//!
//! ## Offset translation
//!
//! ```text
//! before:  a b c | d e
//! tx:      retain 3, insert [x y], retain 2
//! after:   a b c x y | d e      (offset 3 → 5, or 3 with exclude_insertion)
//! ```

use crate::errors::TransactionError;
use crate::operation::{AnnotationBias, AnnotationMethod, Item, Operation};
use crate::range::Range;
use crate::TransactionBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Author identifier
pub type AuthorId = u32;

/// Which end of an operation list a retain adjustment applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetainPlace {
    Start,
    End,
}

impl fmt::Display for RetainPlace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetainPlace::Start => write!(f, "start"),
            RetainPlace::End => write!(f, "end"),
        }
    }
}

/// Span of the pre-transaction document outside which a transaction changes
/// nothing, plus its net length change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveRange {
    /// `None` for a transaction that only retains
    pub start: Option<usize>,
    pub end: Option<usize>,
    pub diff: isize,
}

/// One atomic document edit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub operations: Vec<Operation>,

    #[serde(default)]
    pub author: Option<AuthorId>,

    #[serde(skip)]
    applied: bool,
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.operations == other.operations && self.author == other.author
    }
}

impl Transaction {
    pub fn new(operations: Vec<Operation>, author: Option<AuthorId>) -> Self {
        Self {
            operations,
            author,
            applied: false,
        }
    }

    /// Insert `items` at `offset` in a document of `doc_length` items
    pub fn insertion(doc_length: usize, offset: usize, items: Vec<Item>, author: Option<AuthorId>) -> Self {
        let offset = offset.min(doc_length);
        TransactionBuilder::new()
            .author(author)
            .retain(offset)
            .insert(items)
            .retain(doc_length - offset)
            .build()
    }

    /// Remove `range` from `data`
    pub fn removal(data: &[Item], range: Range, author: Option<AuthorId>) -> Self {
        let end = range.end().min(data.len());
        let start = range.start().min(end);
        TransactionBuilder::new()
            .author(author)
            .retain(start)
            .remove(data[start..end].to_vec())
            .retain(data.len() - end)
            .build()
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    /// Flag this transaction as committed to a document
    pub fn mark_applied(&mut self) -> Result<(), TransactionError> {
        if self.applied {
            return Err(TransactionError::AlreadyApplied);
        }
        self.applied = true;
        Ok(())
    }

    /// Inverse transaction: each operation reversed, same author
    pub fn reversed(&self) -> Transaction {
        Transaction::new(
            self.operations.iter().map(Operation::reversed).collect(),
            self.author,
        )
    }

    /// True for an empty list, a single retain, or a retain followed by a
    /// metadata retain
    pub fn is_no_op(&self) -> bool {
        match self.operations.as_slice() {
            [] => true,
            [Operation::Retain { .. }] => true,
            [Operation::Retain { .. }, Operation::RetainMetadata { .. }] => true,
            _ => false,
        }
    }

    /// Net change in content length
    pub fn length_difference(&self) -> isize {
        self.operations
            .iter()
            .map(|op| match op {
                Operation::Replace { remove, insert, .. } => insert.len() as isize - remove.len() as isize,
                _ => 0,
            })
            .sum()
    }

    /// Translate an offset in the pre-transaction document to the
    /// post-transaction document.
    ///
    /// An offset at an insertion point lands after the inserted content,
    /// unless `exclude_insertion` is set and the replacement grows the
    /// document, in which case it lands before.
    pub fn translate_offset(&self, offset: usize, exclude_insertion: bool) -> usize {
        let mut cursor = 0usize;
        let mut adjustment = 0isize;

        for op in &self.operations {
            match op {
                Operation::Replace { remove, insert, .. } => {
                    let insert_length = insert.len();
                    let remove_length = remove.len();
                    let prev_adjustment = adjustment;
                    adjustment += insert_length as isize - remove_length as isize;

                    if offset == cursor + remove_length {
                        // Right after the removal, right before the insertion
                        if exclude_insertion && insert_length > remove_length {
                            return shift(offset, prev_adjustment);
                        }
                        return shift(offset, adjustment);
                    } else if offset == cursor {
                        // Right before the removal
                        if insert_length == 0 {
                            return shift(cursor + remove_length, adjustment);
                        }
                        return shift(offset, prev_adjustment);
                    } else if offset > cursor && offset < cursor + remove_length {
                        // Inside the removal
                        return shift(cursor + remove_length, adjustment);
                    }
                    cursor += remove_length;
                }
                Operation::Retain { length } => {
                    if offset >= cursor && offset < cursor + length {
                        return shift(offset, adjustment);
                    }
                    cursor += length;
                }
                _ => {}
            }
        }

        shift(offset, adjustment)
    }

    /// Translate both ends of a range. A forward range grows to take in
    /// insertions at either edge; `exclude_insertion` flips that per edge.
    pub fn translate_range(&self, range: &Range, exclude_insertion: bool) -> Range {
        let start = self.translate_offset(range.start(), !exclude_insertion);
        let end = self.translate_offset(range.end(), exclude_insertion);
        Range::with_direction_of(range, start, end)
    }

    /// Translate a range belonging to `author` past this transaction.
    ///
    /// When cursors of two authors meet at an insertion point, the author
    /// with the lower id stays left of the new content.
    pub fn translate_range_with_author(&self, range: &Range, author: Option<AuthorId>) -> Range {
        let backward = match (self.author, author) {
            (Some(mine), Some(theirs)) => theirs < mine,
            _ => true,
        };
        let start = self.translate_offset(range.start(), backward);
        let end = self.translate_offset(range.end(), backward);
        Range::with_direction_of(range, start, end)
    }

    /// Range of the post-transaction document touched by this transaction.
    ///
    /// Retains that would run past `doc_end_offset` end the scan, so content
    /// after that boundary (an internal list tail) is never reported.
    pub fn get_modified_range(&self, doc_end_offset: usize) -> Option<Range> {
        let mut old_offset = 0usize;
        let mut offset = 0usize;
        let mut start: Option<usize> = None;
        let mut end: Option<usize> = None;

        for op in &self.operations {
            match op {
                Operation::RetainMetadata { .. } => continue,
                Operation::Retain { length } => {
                    if old_offset + length > doc_end_offset {
                        break;
                    }
                    offset += length;
                    old_offset += length;
                }
                Operation::Attribute { .. } | Operation::ReplaceMetadata { .. } => {
                    // Modifies the element to the right without moving the cursor
                    start.get_or_insert(offset);
                    end = Some(offset + 1);
                }
                _ => {
                    let (inserted_offset, inserted_length) = match op {
                        Operation::Replace {
                            inserted_data_offset,
                            inserted_data_length,
                            ..
                        } => (inserted_data_offset.unwrap_or(0), *inserted_data_length),
                        _ => (0, None),
                    };
                    let range_start = *start.get_or_insert(offset + inserted_offset);

                    if let Operation::Replace { remove, insert, .. } = op {
                        offset += insert.len();
                        old_offset += remove.len();
                    }

                    end = Some(match inserted_length {
                        Some(length) if length > 0 => range_start + length,
                        _ => offset,
                    });
                }
            }
        }

        match (start, end) {
            (Some(start), Some(end)) => Some(Range::new(start, end)),
            _ => None,
        }
    }

    /// Active range and length difference, computed in one scan.
    ///
    /// Positions inside an open annotation span count as active even when
    /// retained.
    pub fn active_range_and_length_diff(&self) -> ActiveRange {
        let mut offset = 0usize;
        let mut annotations = 0isize;
        let mut diff = 0isize;
        let mut start: Option<usize> = None;
        let mut end: Option<usize> = None;

        for op in &self.operations {
            if let Operation::Annotate { bias, .. } = op {
                annotations += match bias {
                    AnnotationBias::Start => 1,
                    AnnotationBias::Stop => -1,
                };
                continue;
            }

            let active = annotations > 0 || !op.is_retain();
            if active && start.is_none() {
                start = Some(offset);
            }

            match op {
                Operation::Retain { length } => offset += length,
                Operation::Replace { remove, insert, .. } => {
                    offset += remove.len();
                    diff += insert.len() as isize - remove.len() as isize;
                }
                _ => {}
            }

            if matches!(op, Operation::Attribute { .. } | Operation::ReplaceMetadata { .. }) {
                // Zero length, but effectively modifies one position
                end = Some(offset + 1);
            } else if active {
                end = Some(offset);
            }
        }

        ActiveRange { start, end, diff }
    }

    /// Grow or shrink the boundary retain at `place` by `diff`.
    ///
    /// A retain that reaches zero is dropped; if there is no boundary retain
    /// a new one is inserted. Going negative means the caller mismatched
    /// transactions and is an error.
    pub fn adjust_retain(&mut self, place: RetainPlace, diff: isize) -> Result<(), TransactionError> {
        if diff == 0 {
            return Ok(());
        }

        let ops = &mut self.operations;
        let index = match place {
            RetainPlace::Start => Some(0),
            RetainPlace::End => match ops.last() {
                Some(Operation::RetainMetadata { .. }) => ops.len().checked_sub(2),
                _ => ops.len().checked_sub(1),
            },
        };

        let existing = index.and_then(|i| match ops.get(i) {
            Some(Operation::Retain { length }) => Some((i, *length)),
            _ => None,
        });

        if let Some((i, length)) = existing {
            let adjusted = length as isize + diff;
            if adjusted < 0 {
                return Err(TransactionError::NegativeRetain { place, length: adjusted });
            } else if adjusted == 0 {
                ops.remove(i);
            } else {
                ops[i] = Operation::retain(adjusted as usize);
            }
            return Ok(());
        }

        if diff < 0 {
            return Err(TransactionError::NegativeRetain { place, length: diff });
        }

        let retain = Operation::retain(diff as usize);
        match place {
            RetainPlace::Start => ops.insert(0, retain),
            RetainPlace::End => ops.push(retain),
        }
        Ok(())
    }

    /// Apply this transaction to a flat array of items.
    ///
    /// The operations must cover `data` exactly. On error `data` is left
    /// untouched.
    pub fn apply_to(&self, data: &mut Vec<Item>) -> Result<(), TransactionError> {
        let mut source = data.clone();
        let mut result = Vec::with_capacity(source.len());
        let mut cursor = 0usize;
        let mut spans: Vec<(AnnotationMethod, String)> = Vec::new();

        for op in &self.operations {
            match op {
                Operation::Retain { length } => {
                    let end = cursor + length;
                    if end > source.len() {
                        return Err(TransactionError::OutOfBounds { offset: end, length: source.len() });
                    }
                    result.extend(source[cursor..end].iter().map(|item| annotate_item(item, &spans)));
                    cursor = end;
                }
                Operation::Replace { remove, insert, .. } => {
                    let end = cursor + remove.len();
                    if end > source.len() {
                        return Err(TransactionError::OutOfBounds { offset: end, length: source.len() });
                    }
                    if source[cursor..end] != remove[..] {
                        return Err(TransactionError::RemoveMismatch { offset: cursor });
                    }
                    result.extend(insert.iter().cloned());
                    cursor = end;
                }
                Operation::Attribute { key, to, .. } => {
                    let element = source
                        .get_mut(cursor)
                        .and_then(Value::as_object_mut)
                        .ok_or(TransactionError::NotAnElement { offset: cursor })?;
                    let attributes = element
                        .entry("attributes")
                        .or_insert_with(|| Value::Object(Default::default()));
                    if let Some(attributes) = attributes.as_object_mut() {
                        if to.is_null() {
                            attributes.remove(key);
                        } else {
                            attributes.insert(key.clone(), to.clone());
                        }
                    }
                }
                Operation::Annotate { method, bias, index } => match bias {
                    AnnotationBias::Start => spans.push((*method, index.clone())),
                    AnnotationBias::Stop => spans.retain(|(m, i)| !(m == method && i == index)),
                },
                Operation::RetainMetadata { .. } | Operation::ReplaceMetadata { .. } => {}
            }
        }

        if cursor != source.len() {
            return Err(TransactionError::LengthMismatch {
                expected: source.len(),
                actual: cursor,
            });
        }

        *data = result;
        Ok(())
    }
}

fn shift(offset: usize, adjustment: isize) -> usize {
    (offset as isize + adjustment).max(0) as usize
}

/// Add or remove annotation hashes on a character item.
///
/// Characters are either a bare string or `[char, [hash, ...]]`; element
/// objects are left as they are.
fn annotate_item(item: &Item, spans: &[(AnnotationMethod, String)]) -> Item {
    if spans.is_empty() {
        return item.clone();
    }

    let (base, mut hashes) = match item {
        Value::String(_) => (item.clone(), Vec::new()),
        Value::Array(parts) if parts.len() == 2 && parts[0].is_string() => {
            let hashes = parts[1]
                .as_array()
                .map(|list| list.iter().filter_map(|h| h.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            (parts[0].clone(), hashes)
        }
        _ => return item.clone(),
    };

    for (method, index) in spans {
        match method {
            AnnotationMethod::Set => {
                if !hashes.contains(index) {
                    hashes.push(index.clone());
                }
            }
            AnnotationMethod::Clear => hashes.retain(|h| h != index),
        }
    }

    if hashes.is_empty() {
        base
    } else {
        Value::Array(vec![base, Value::Array(hashes.into_iter().map(Value::String).collect())])
    }
}
