//! Integration tests for transactions, changes and rebasing

use serde_json::{json, Value};
use verso_ot::{
    rebase_uncommitted_change, Change, ChangeError, LinearDocument, Operation, Range, Selection, Transaction,
    TransactionBuilder,
};

fn chars(text: &str) -> Vec<Value> {
    text.chars().map(|c| json!(c.to_string())).collect()
}

fn converge(doc: &LinearDocument, history: &Change, uncommitted: &Change) -> (String, String) {
    let result = rebase_uncommitted_change(history, uncommitted).unwrap();
    let accepted = uncommitted.truncate(result.rebased.len());

    let mut via_history = doc.clone();
    via_history.apply_change(history).unwrap();
    via_history.apply_change(&result.rebased).unwrap();

    let mut via_uncommitted = doc.clone();
    via_uncommitted.apply_change(&accepted).unwrap();
    via_uncommitted.apply_change(&result.transposed_history).unwrap();

    (via_history.text(), via_uncommitted.text())
}

#[test]
fn test_insertion_point_translation() {
    let tx = Transaction::new(
        vec![Operation::retain(3), Operation::replace(vec![], vec![json!("a"), json!("b")])],
        None,
    );

    assert_eq!(tx.translate_offset(3, true), 3);
    assert_eq!(tx.translate_offset(3, false), 5);
}

#[test]
fn test_lower_author_inserts_first_from_uncommitted_side() {
    let doc = LinearDocument::from_text("helloworld");
    let history = Change::from_transactions(0, vec![Transaction::insertion(10, 5, chars("7"), Some(7))]);
    let uncommitted = Change::from_transactions(0, vec![Transaction::insertion(10, 5, chars("2"), Some(2))]);

    let (via_history, via_uncommitted) = converge(&doc, &history, &uncommitted);

    assert_eq!(via_history, "hello27world");
    assert_eq!(via_uncommitted, via_history);
}

#[test]
fn test_lower_author_inserts_first_from_history_side() {
    let doc = LinearDocument::from_text("helloworld");
    let history = Change::from_transactions(0, vec![Transaction::insertion(10, 5, chars("2"), Some(2))]);
    let uncommitted = Change::from_transactions(0, vec![Transaction::insertion(10, 5, chars("7"), Some(7))]);

    let (via_history, via_uncommitted) = converge(&doc, &history, &uncommitted);

    assert_eq!(via_history, "hello27world");
    assert_eq!(via_uncommitted, via_history);
}

#[test]
fn test_replacement_reversal() {
    let tx = Transaction::new(vec![Operation::replace(vec![json!("x")], vec![json!("y")])], None);

    assert_eq!(
        tx.reversed(),
        Transaction::new(vec![Operation::replace(vec![json!("y")], vec![json!("x")])], None)
    );
}

#[test]
fn test_stacked_changes_converge() {
    let doc = LinearDocument::from_text("the quick fox");

    // Author 1 capitalizes "the" then appends a period
    let mut data = doc.data.clone();
    let h1 = TransactionBuilder::new()
        .author(Some(1))
        .replace(vec![json!("t")], vec![json!("T")])
        .retain(12)
        .build();
    h1.apply_to(&mut data).unwrap();
    let h2 = Transaction::insertion(13, 13, chars("."), Some(1));
    let history = Change::from_transactions(0, vec![h1, h2]);

    // Author 2 inserts "brown " before "fox"
    let u1 = Transaction::insertion(13, 10, chars("brown "), Some(2));
    let uncommitted = Change::from_transactions(0, vec![u1]);

    let (via_history, via_uncommitted) = converge(&doc, &history, &uncommitted);

    assert_eq!(via_history, "The quick brown fox.");
    assert_eq!(via_uncommitted, via_history);
}

#[test]
fn test_conflict_rejects_from_first_conflict() {
    let doc = LinearDocument::from_text("abcdefgh");
    let history = Change::from_transactions(0, vec![Transaction::removal(&doc.data, Range::new(3, 5), Some(1))]);

    let mut data = doc.data.clone();
    let u1 = Transaction::insertion(8, 0, chars(">"), Some(2));
    u1.apply_to(&mut data).unwrap();
    let u2 = Transaction::removal(&data, Range::new(4, 6), Some(2));
    u2.apply_to(&mut data).unwrap();
    let u3 = Transaction::insertion(data.len(), data.len(), chars("<"), Some(2));
    let mut uncommitted = Change::from_transactions(0, vec![u1, u2.clone(), u3.clone()]);
    uncommitted.set_selection(2, Selection::linear(Range::collapsed(1)));

    let result = rebase_uncommitted_change(&history, &uncommitted).unwrap();

    assert_eq!(result.rebased.len(), 1);
    assert!(result.rebased.selections().is_empty());

    let rejected = result.rejected.unwrap();
    assert_eq!(rejected.start(), 1);
    assert_eq!(rejected.transactions(), &[u2, u3]);

    let (via_history, via_uncommitted) = converge(&doc, &history, &uncommitted);
    assert_eq!(via_history, ">abcfgh");
    assert_eq!(via_uncommitted, via_history);
}

#[test]
fn test_empty_history_passes_change_through() {
    let uncommitted = Change::<Value>::from_transactions(0, vec![Transaction::insertion(0, 0, chars("hi"), Some(1))]);
    let result = rebase_uncommitted_change(&Change::empty(0), &uncommitted).unwrap();

    assert_eq!(result.rebased, uncommitted);
    assert!(result.transposed_history.is_empty());
    assert_eq!(result.transposed_history.start(), 1);
    assert!(result.rejected.is_none());
}

#[test]
fn test_concat_rejects_gap() {
    let first = Change::<Value>::from_transactions(0, vec![Transaction::insertion(0, 0, chars("a"), Some(1))]);
    let gap = Change::from_transactions(2, vec![Transaction::insertion(1, 1, chars("b"), Some(1))]);

    assert_eq!(
        first.concat(&gap),
        Err(ChangeError::NotConsecutive { expected: 1, actual: 2 })
    );
}

#[test]
fn test_change_json_shape() {
    let change = Change::<Value>::from_transactions(4, vec![Transaction::insertion(1, 1, chars("b"), Some(3))]);
    let value = serde_json::to_value(&change).unwrap();

    assert_eq!(value["start"], json!(4));
    assert_eq!(value["transactions"][0]["author"], json!(3));
    assert_eq!(value["transactions"][0]["operations"][0], json!({"type": "retain", "length": 1}));
    assert_eq!(value["stores"][0], json!({"hashes": [], "hashStore": {}}));
    assert_eq!(value["selections"], json!({}));
}
