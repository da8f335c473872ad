//! # Rebase
//!
//! Transforms concurrent edits so they can be applied one after the other.
//!
//! ```text
//!              history (A)
//!        ●────────────────────▶●
//!        │                     │
//!   uncommitted (B)       rebased (B')
//!        │                     │
//!        ▼                     ▼
//!        ●────────────────────▶●
//!         transposed history (A')
//! ```
//!
//! Both paths reach the same document. Two edits whose active ranges
//! overlap conflict and cannot be rebased; everything else commutes by
//! widening the boundary retains of each side by the other's length
//! difference.
//!
//! When both edits touch the same position (two insertions at one offset),
//! the one by the lower author id is ordered first. A transaction with an
//! author precedes one without.

use crate::change::Change;
use crate::errors::{ChangeError, TransactionError};
use crate::transaction::{AuthorId, RetainPlace, Transaction};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

/// Whether an edit by `a` is ordered before a concurrent edit by `b`
pub fn author_precedes(a: Option<AuthorId>, b: Option<AuthorId>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a < b,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Rebase two concurrent transactions over each other.
///
/// On success returns `(a', b')` such that applying `a` then `b'` gives the
/// same document as `b` then `a'`. Where both touch the same position `a`
/// goes first. Returns `Ok(None)` on conflict.
pub fn rebase_transactions(
    a: &Transaction,
    b: &Transaction,
) -> Result<Option<(Transaction, Transaction)>, TransactionError> {
    let mut a_rebased = Transaction::new(a.operations.clone(), a.author);
    let mut b_rebased = Transaction::new(b.operations.clone(), b.author);

    let info_a = a.active_range_and_length_diff();
    let info_b = b.active_range_and_length_diff();

    match (info_a.start, info_b.start) {
        (Some(start_a), Some(start_b)) => {
            let end_a = info_a.end.unwrap_or(start_a);
            let end_b = info_b.end.unwrap_or(start_b);

            if end_a <= start_b {
                // A is wholly before B
                b_rebased.adjust_retain(RetainPlace::Start, info_a.diff)?;
                a_rebased.adjust_retain(RetainPlace::End, info_b.diff)?;
            } else if end_b <= start_a {
                a_rebased.adjust_retain(RetainPlace::Start, info_b.diff)?;
                b_rebased.adjust_retain(RetainPlace::End, info_a.diff)?;
            } else {
                debug!(start_a, end_a, start_b, end_b, "Transactions conflict");
                return Ok(None);
            }
        }
        _ => {
            // At least one side only retains
            a_rebased.adjust_retain(RetainPlace::Start, info_b.diff)?;
            b_rebased.adjust_retain(RetainPlace::Start, info_a.diff)?;
        }
    }

    Ok(Some((a_rebased, b_rebased)))
}

/// Outcome of rebasing an uncommitted change over history
#[derive(Debug, Clone, PartialEq)]
pub struct RebaseResult<V = Value> {
    /// The accepted prefix of the uncommitted change, rebased to start after
    /// the history
    pub rebased: Change<V>,

    /// The history, rebased to start after the accepted prefix
    pub transposed_history: Change<V>,

    /// The uncommitted suffix from the first conflicting transaction on, in
    /// its original, unrebased form
    pub rejected: Option<Change<V>>,
}

/// Rebase `uncommitted` over `history`, both starting at the same position.
///
/// Each uncommitted transaction is rebased over every history transaction
/// in turn. The first conflict ends the rebase: that transaction and all
/// following it are rejected, and uncommitted selections are dropped.
#[instrument(
    skip_all,
    fields(start = history.start(), history = history.len(), uncommitted = uncommitted.len())
)]
pub fn rebase_uncommitted_change<V: Clone>(
    history: &Change<V>,
    uncommitted: &Change<V>,
) -> Result<RebaseResult<V>, ChangeError> {
    if history.start() != uncommitted.start() {
        return Err(ChangeError::StartMismatch {
            history: history.start(),
            uncommitted: uncommitted.start(),
        });
    }

    let mut transactions_a = history.transactions().to_vec();
    let mut stores_a = history.stores().to_vec();
    let mut transactions_b = uncommitted.transactions().to_vec();
    let mut stores_b = uncommitted.stores().to_vec();
    let mut selections_b = uncommitted.selections().clone();
    let mut rejected = None;

    'uncommitted: for i in 0..transactions_b.len() {
        let mut b = transactions_b[i].clone();
        let mut store_b = stores_b[i].clone();
        let mut next_a = Vec::with_capacity(transactions_a.len());
        let mut next_stores_a = Vec::with_capacity(stores_a.len());

        for (a, store_a) in transactions_a.iter().zip(&stores_a) {
            let rebases = if author_precedes(b.author, a.author) {
                rebase_transactions(&b, a)?.map(|(b, a)| (a, b))
            } else {
                rebase_transactions(a, &b)?
            };

            let Some((a_rebased, b_rebased)) = rebases else {
                warn!(
                    position = uncommitted.start() + i,
                    author = ?b.author,
                    "Uncommitted transaction conflicts with history, rejecting the rest"
                );
                rejected = Some(uncommitted.most_recent(uncommitted.start() + i));
                transactions_b.truncate(i);
                stores_b.truncate(i);
                selections_b.clear();
                break 'uncommitted;
            };

            next_a.push(a_rebased);
            next_stores_a.push(store_a.difference(&store_b));
            store_b = store_b.difference(store_a);
            b = b_rebased;
        }

        transactions_a = next_a;
        stores_a = next_stores_a;
        transactions_b[i] = b;
        stores_b[i] = store_b;
    }

    let rebased_start = uncommitted.start() + transactions_a.len();
    let transposed_start = history.start() + transactions_b.len();
    let mut rebased = Change::new(rebased_start, transactions_b, stores_b, BTreeMap::new())?;
    let mut transposed_history = Change::new(transposed_start, transactions_a, stores_a, BTreeMap::new())?;

    for (author, selection) in &selections_b {
        rebased.set_selection(*author, selection.translate_by_change(&transposed_history, Some(*author)));
    }
    for (author, selection) in history.selections() {
        transposed_history.set_selection(*author, selection.translate_by_change(&rebased, Some(*author)));
    }

    debug!(
        rebased = rebased.len(),
        rejected = rejected.as_ref().map_or(0, Change::len),
        "Rebased uncommitted change"
    );

    Ok(RebaseResult {
        rebased,
        transposed_history,
        rejected,
    })
}

impl<V: Clone> Change<V> {
    /// This change rebased over `other`, or `None` if any part conflicts
    pub fn rebased_onto(&self, other: &Change<V>) -> Result<Option<Change<V>>, ChangeError> {
        let result = rebase_uncommitted_change(other, self)?;
        Ok(match result.rejected {
            Some(_) => None,
            None => Some(result.rebased),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Range;
    use crate::selection::Selection;
    use crate::store::HashValueStore;
    use serde_json::json;

    fn chars(text: &str) -> Vec<Value> {
        text.chars().map(|c| json!(c.to_string())).collect()
    }

    fn apply(data: &[Value], txs: &[Transaction]) -> Vec<Value> {
        let mut data = data.to_vec();
        for tx in txs {
            tx.apply_to(&mut data).unwrap();
        }
        data
    }

    #[test]
    fn test_author_precedes() {
        assert!(author_precedes(Some(1), Some(2)));
        assert!(!author_precedes(Some(2), Some(1)));
        assert!(!author_precedes(Some(2), Some(2)));
        assert!(author_precedes(Some(0), None));
        assert!(!author_precedes(None, Some(0)));
        assert!(!author_precedes(None, None));
    }

    #[test]
    fn test_rebase_disjoint_transactions() {
        let doc = chars("abcdef");
        let a = Transaction::insertion(6, 1, chars("XY"), Some(1));
        let b = Transaction::removal(&doc, Range::new(4, 5), Some(2));

        let (a2, b2) = rebase_transactions(&a, &b).unwrap().unwrap();

        let left = apply(&doc, &[a.clone(), b2]);
        let right = apply(&doc, &[b.clone(), a2]);
        assert_eq!(left, right);
        assert_eq!(left, chars("aXYbcdf"));
    }

    #[test]
    fn test_rebase_b_before_a() {
        let doc = chars("abcdef");
        let a = Transaction::removal(&doc, Range::new(4, 6), Some(1));
        let b = Transaction::insertion(6, 0, chars("Z"), Some(2));

        let (a2, b2) = rebase_transactions(&a, &b).unwrap().unwrap();

        assert_eq!(apply(&doc, &[a, b2]), apply(&doc, &[b, a2]));
    }

    #[test]
    fn test_rebase_same_offset_puts_a_first() {
        let doc = chars("ab");
        let a = Transaction::insertion(2, 1, chars("X"), Some(5));
        let b = Transaction::insertion(2, 1, chars("Y"), Some(3));

        let (a2, b2) = rebase_transactions(&a, &b).unwrap().unwrap();

        assert_eq!(apply(&doc, &[a, b2]), chars("aXYb"));
        assert_eq!(apply(&doc, &[b, a2]), chars("aXYb"));
    }

    #[test]
    fn test_rebase_overlap_conflicts() {
        let doc = chars("abcdef");
        let a = Transaction::removal(&doc, Range::new(1, 4), Some(1));
        let b = Transaction::removal(&doc, Range::new(2, 5), Some(2));

        assert_eq!(rebase_transactions(&a, &b).unwrap(), None);
    }

    #[test]
    fn test_rebase_no_op_only_shifts() {
        let a = Transaction::new(vec![crate::operation::Operation::retain(4)], Some(1));
        let b = Transaction::insertion(4, 2, chars("XY"), Some(2));

        let (a2, b2) = rebase_transactions(&a, &b).unwrap().unwrap();

        assert_eq!(a2.operations, vec![crate::operation::Operation::retain(6)]);
        assert_eq!(b2, b);
    }

    #[test]
    fn test_rebased_transactions_are_not_applied() {
        let mut a = Transaction::insertion(2, 0, chars("X"), Some(1));
        a.mark_applied().unwrap();
        let b = Transaction::insertion(2, 2, chars("Y"), Some(2));

        let (a2, _) = rebase_transactions(&a, &b).unwrap().unwrap();
        assert!(!a2.is_applied());
    }

    #[test]
    fn test_uncommitted_start_mismatch() {
        let history = Change::<Value>::empty(1);
        let uncommitted = Change::<Value>::empty(2);

        assert_eq!(
            rebase_uncommitted_change(&history, &uncommitted),
            Err(ChangeError::StartMismatch { history: 1, uncommitted: 2 })
        );
    }

    #[test]
    fn test_uncommitted_lower_author_goes_first() {
        let doc = chars("helloworld");
        let history = Change::<Value>::from_transactions(0, vec![Transaction::insertion(10, 5, chars("Y"), Some(7))]);
        let uncommitted = Change::from_transactions(0, vec![Transaction::insertion(10, 5, chars("X"), Some(2))]);

        let result = rebase_uncommitted_change(&history, &uncommitted).unwrap();

        assert!(result.rejected.is_none());
        assert_eq!(result.rebased.start(), 1);
        assert_eq!(result.transposed_history.start(), 1);

        let via_history = apply(&doc, &[history.transactions(), result.rebased.transactions()].concat());
        let via_uncommitted =
            apply(&doc, &[uncommitted.transactions(), result.transposed_history.transactions()].concat());
        assert_eq!(via_history, chars("helloXYworld"));
        assert_eq!(via_uncommitted, via_history);
    }

    #[test]
    fn test_uncommitted_conflict_rejects_suffix() {
        let doc = chars("abcdef");
        let history = Change::<Value>::from_transactions(0, vec![Transaction::removal(&doc, Range::new(1, 3), Some(1))]);

        let first = Transaction::insertion(6, 6, chars("!"), Some(2));
        let after_first = apply(&doc, &[first.clone()]);
        let second = Transaction::removal(&after_first, Range::new(2, 4), Some(2));
        let mut uncommitted = Change::from_transactions(0, vec![first.clone(), second.clone()]);
        uncommitted.set_selection(2, Selection::linear(Range::collapsed(2)));

        let result = rebase_uncommitted_change(&history, &uncommitted).unwrap();

        assert_eq!(result.rebased.len(), 1);
        assert!(result.rebased.selections().is_empty());

        let rejected = result.rejected.unwrap();
        assert_eq!(rejected.start(), 1);
        assert_eq!(rejected.transactions(), &[second]);

        assert_eq!(result.transposed_history.start(), 1);
        let via_history = apply(&doc, &[history.transactions(), result.rebased.transactions()].concat());
        let via_uncommitted = apply(&doc, &[&[first][..], result.transposed_history.transactions()].concat());
        assert_eq!(via_history, chars("adef!"));
        assert_eq!(via_uncommitted, via_history);
    }

    #[test]
    fn test_selections_are_translated() {
        let history = Change::<Value>::from_transactions(0, vec![Transaction::insertion(4, 0, chars("XX"), Some(1))]);
        let mut uncommitted = Change::from_transactions(0, vec![Transaction::insertion(4, 4, chars("!"), Some(2))]);
        uncommitted.set_selection(2, Selection::linear(Range::collapsed(5)));

        let mut history_with_selection = history.clone();
        history_with_selection.set_selection(1, Selection::linear(Range::collapsed(2)));

        let result = rebase_uncommitted_change(&history_with_selection, &uncommitted).unwrap();

        assert_eq!(result.rebased.selections()[&2], Selection::linear(Range::collapsed(7)));
        assert_eq!(result.transposed_history.selections()[&1], Selection::linear(Range::collapsed(2)));
    }

    #[test]
    fn test_store_difference_is_tracked() {
        let mut shared = HashValueStore::new();
        shared.insert(json!("bold")).unwrap();
        let mut only_b = shared.clone();
        only_b.insert(json!("italic")).unwrap();

        let history = Change::new(
            0,
            vec![Transaction::insertion(2, 0, chars("a"), Some(1))],
            vec![shared.clone()],
            BTreeMap::new(),
        )
        .unwrap();
        let uncommitted = Change::new(
            0,
            vec![Transaction::insertion(2, 2, chars("b"), Some(2))],
            vec![only_b],
            BTreeMap::new(),
        )
        .unwrap();

        let result = rebase_uncommitted_change(&history, &uncommitted).unwrap();

        assert!(result.transposed_history.stores()[0].is_empty());
        assert_eq!(result.rebased.stores()[0].len(), 1);
    }

    #[test]
    fn test_rebased_onto() {
        let doc = chars("abcdef");
        let history = Change::<Value>::from_transactions(0, vec![Transaction::removal(&doc, Range::new(1, 3), Some(1))]);
        let clean = Change::from_transactions(0, vec![Transaction::insertion(6, 6, chars("!"), Some(2))]);
        let conflicting = Change::from_transactions(0, vec![Transaction::removal(&doc, Range::new(2, 4), Some(2))]);

        let rebased = clean.rebased_onto(&history).unwrap().unwrap();
        assert_eq!(rebased.start(), 1);
        assert_eq!(conflicting.rebased_onto(&history).unwrap(), None);
    }
}
