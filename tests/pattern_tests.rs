//! Tests for pattern counting.

use gradekit::pattern::{CountPredicate, MatchSpec, count, count_satisfies};

#[test]
fn counts_single_characters() {
    assert_eq!(count("aaa", "a").expect("count"), 3);
    assert_eq!(count("", "a").expect("count"), 0);
}

#[test]
fn counting_is_repeatable() {
    let text = "print(1)\nprint(2)\n# print(3)\n";
    let first = count(text, r"print\(").expect("count");
    for _ in 0..5 {
        assert_eq!(count(text, r"print\(").expect("count"), first);
    }
    assert_eq!(first, 3);
}

#[test]
fn matches_never_overlap() {
    assert_eq!(count("aaaa", "aa").expect("count"), 2);
    assert_eq!(count("abababa", "aba").expect("count"), 2);
}

#[test]
fn predicates_compare_counts() {
    assert!(count_satisfies("x x x", "x", CountPredicate::Exactly(3)).expect("count"));
    assert!(count_satisfies("x x x", "x", CountPredicate::AtLeast(2)).expect("count"));
    assert!(!count_satisfies("x x x", "x", CountPredicate::AtMost(2)).expect("count"));
    assert!(count_satisfies("x x x", "x", CountPredicate::Between(1, 3)).expect("count"));
}

#[test]
fn specs_report_count_and_verdict() {
    let spec = MatchSpec::new(r"\bif\b", CountPredicate::AtMost(1)).expect("compile");
    assert_eq!(spec.check("if a:\n    pass\nif b:\n    pass\n"), (2, false));
    assert_eq!(spec.check("iffy = 1\n"), (0, true));
}
