//! Tests for switch statements

use super::helpers::*;
use crate::errors::DefinitionError;
use crate::expr::Expr;
use crate::stmt::{Case, Flow, Stmt};
use crate::types::Val;
use maplit::hashmap;

fn x_is(n: u64) -> crate::frame::Frame {
    frame(hashmap! {"x".to_string() => Val::Count(n)})
}

#[test]
fn test_switch_fallthrough_stops_at_next_case() {
    // switch (x) { case 1: print "a"; fallthrough; case 2: print "b"; case 3: print "c"; }
    let json = r#"{
        "t": "Switch",
        "index": {"t": "Name", "name": "x"},
        "cases": [
            {"labels": [{"t": "Const", "v": {"t": "Count", "v": 1}}],
             "body": {"t": "List", "stmts": [
                 {"t": "Print", "exprs": [{"t": "Const", "v": {"t": "Str", "v": "a"}}]},
                 {"t": "Fallthrough"}
             ]}},
            {"labels": [{"t": "Const", "v": {"t": "Count", "v": 2}}],
             "body": {"t": "Print", "exprs": [{"t": "Const", "v": {"t": "Str", "v": "b"}}]}},
            {"labels": [{"t": "Const", "v": {"t": "Count", "v": 3}}],
             "body": {"t": "Print", "exprs": [{"t": "Const", "v": {"t": "Str", "v": "c"}}]}}
        ]
    }"#;
    let stmt = parse_stmt(json);
    let mut f = x_is(1);

    let outcome = run(&stmt, &mut f);

    assert_eq!(outcome.flow, Flow::Normal);
    assert_eq!(printed(&f), vec!["a", "b"]);
}

#[test]
fn test_switch_fallthrough_chain_runs_all_bodies() {
    let stmt = Stmt::switch(
        var("x"),
        vec![
            Case::new(vec![count(1)], Stmt::list(vec![print("one"), Stmt::fallthrough()])),
            Case::new(vec![count(2)], Stmt::list(vec![print("two"), Stmt::fallthrough()])),
            Case::new(vec![count(3)], print("three")),
        ],
    )
    .unwrap();
    let mut f = x_is(1);

    run(&stmt, &mut f);

    assert_eq!(printed(&f), vec!["one", "two", "three"]);
}

#[test]
fn test_switch_dispatches_every_label() {
    let stmt = Stmt::switch(
        var("x"),
        vec![
            Case::new(vec![count(1), count(2)], print("low")),
            Case::new(vec![count(3)], print("three")),
            Case::new(vec![count(10), count(20), count(30)], print("tens")),
        ],
    )
    .unwrap();

    for (x, expected) in [(1, "low"), (2, "low"), (3, "three"), (10, "tens"), (30, "tens")] {
        let mut f = x_is(x);
        run(&stmt, &mut f);
        assert_eq!(printed(&f), vec![expected], "x = {}", x);
    }
}

#[test]
fn test_switch_no_match_without_default_is_noop() {
    let stmt = Stmt::switch(var("x"), vec![Case::new(vec![count(1)], print("one"))]).unwrap();
    let mut f = x_is(7);

    let outcome = run(&stmt, &mut f);

    assert_eq!(outcome.flow, Flow::Normal);
    assert!(f.outbox.printed.is_empty());
}

#[test]
fn test_switch_default_case_and_its_fallthrough() {
    // default sits in the middle; falling through from it continues in list order
    let stmt = Stmt::switch(
        var("x"),
        vec![
            Case::new(vec![count(1)], print("one")),
            Case::default_case(Stmt::list(vec![print("default"), Stmt::fallthrough()])),
            Case::new(vec![count(2)], print("two")),
        ],
    )
    .unwrap();
    assert_eq!(stmt.as_switch().unwrap().dispatch().default_case(), Some(1));

    let mut f = x_is(9);
    run(&stmt, &mut f);
    assert_eq!(printed(&f), vec!["default", "two"]);

    let mut f = x_is(1);
    run(&stmt, &mut f);
    assert_eq!(printed(&f), vec!["one"]);
}

#[test]
fn test_switch_default_at_index_zero() {
    let stmt = Stmt::switch(
        var("x"),
        vec![
            Case::default_case(print("default")),
            Case::new(vec![count(1)], print("one")),
        ],
    )
    .unwrap();
    let dispatch = stmt.as_switch().unwrap().dispatch();
    assert_eq!(dispatch.default_case(), Some(0));
    assert_eq!(dispatch.len(), 1);

    let mut f = x_is(5);
    run(&stmt, &mut f);
    assert_eq!(printed(&f), vec!["default"]);
}

#[test]
fn test_switch_break_is_consumed() {
    let stmt = Stmt::switch(
        var("x"),
        vec![Case::new(
            vec![count(1)],
            Stmt::list(vec![print("a"), Stmt::break_(), print("never")]),
        )],
    )
    .unwrap();
    let mut f = x_is(1);

    let outcome = run(&stmt, &mut f);

    assert_eq!(outcome.flow, Flow::Normal);
    assert_eq!(printed(&f), vec!["a"]);
}

#[test]
fn test_switch_fallthrough_from_last_case_becomes_normal() {
    let stmt = Stmt::switch(
        var("x"),
        vec![Case::new(vec![count(1)], Stmt::list(vec![print("a"), Stmt::fallthrough()]))],
    )
    .unwrap();
    let mut f = x_is(1);

    assert_eq!(run(&stmt, &mut f).flow, Flow::Normal);
}

#[test]
fn test_switch_propagates_return_and_next() {
    let stmt = Stmt::switch(
        var("x"),
        vec![
            Case::new(vec![count(1)], Stmt::return_(Some(text("done")))),
            Case::new(vec![count(2)], Stmt::next()),
        ],
    )
    .unwrap();

    let mut f = x_is(1);
    let outcome = run(&stmt, &mut f);
    assert_eq!(outcome.flow, Flow::Return);
    assert_eq!(outcome.value, Some(Val::str("done")));

    let mut f = x_is(2);
    assert_eq!(run(&stmt, &mut f).flow, Flow::Next);
}

#[test]
fn test_switch_on_composite_labels() {
    let label = |port: u64, proto: &str| {
        Expr::constant(Val::Tuple(vec![Val::Count(port), Val::str(proto)]))
    };
    let stmt = Stmt::switch(
        var("conn"),
        vec![
            Case::new(vec![label(80, "tcp")], print("http")),
            Case::new(vec![label(53, "udp"), label(53, "tcp")], print("dns")),
        ],
    )
    .unwrap();

    let mut f = frame(hashmap! {
        "conn".to_string() => Val::Tuple(vec![Val::Count(53), Val::str("tcp")]),
    });
    run(&stmt, &mut f);
    assert_eq!(printed(&f), vec!["dns"]);

    let mut f = frame(hashmap! {
        "conn".to_string() => Val::Tuple(vec![Val::Count(80), Val::str("udp")]),
    });
    run(&stmt, &mut f);
    assert!(f.outbox.printed.is_empty());
}

#[test]
fn test_switch_index_evaluated_once() {
    // the index increments x; a second evaluation would change the dispatch
    let stmt = Stmt::switch(
        Expr::assign("x", binary(crate::expr::BinOp::Add, var("x"), count(1))),
        vec![
            Case::new(vec![count(2)], Stmt::list(vec![print("two"), Stmt::fallthrough()])),
            Case::new(vec![count(3)], print("three")),
        ],
    )
    .unwrap();
    let mut f = x_is(1);

    run(&stmt, &mut f);

    assert_eq!(printed(&f), vec!["two", "three"]);
    assert_eq!(f.lookup("x"), Ok(Val::Count(2)));
}

#[test]
fn test_duplicate_label_across_cases_rejected() {
    let result = Stmt::switch(
        var("x"),
        vec![
            Case::new(vec![count(1), count(2)], print("a")),
            Case::new(vec![count(2)], print("b")),
        ],
    );

    assert_eq!(
        result.unwrap_err(),
        DefinitionError::DuplicateLabel {
            label: "2".to_string(),
            first: 0,
            second: 1,
        }
    );
}

#[test]
fn test_switch_matches_numerically_equal_index() {
    // x == 1 holds for an int 1 and a double 1.0, so `case 1` must match both
    let stmt = Stmt::switch(
        var("x"),
        vec![
            Case::new(vec![count(1)], print("one")),
            Case::default_case(print("other")),
        ],
    )
    .unwrap();

    for x in [Val::Count(1), Val::Int(1), Val::Double(1.0)] {
        let mut f = frame(hashmap! {"x".to_string() => x.clone()});
        run(&stmt, &mut f);
        assert_eq!(printed(&f), vec!["one"], "index {:?}", x);
    }

    let mut f = frame(hashmap! {"x".to_string() => Val::Double(1.5)});
    run(&stmt, &mut f);
    assert_eq!(printed(&f), vec!["other"]);
}

#[test]
fn test_numerically_equal_labels_across_cases_rejected() {
    let result = Stmt::switch(
        var("x"),
        vec![
            Case::new(vec![count(1)], print("count")),
            Case::new(vec![Expr::constant(Val::Int(1))], print("int")),
        ],
    );

    assert_eq!(
        result.unwrap_err(),
        DefinitionError::DuplicateLabel {
            label: "1".to_string(),
            first: 0,
            second: 1,
        }
    );
}

#[test]
fn test_repeated_label_within_one_case_allowed() {
    let stmt = Stmt::switch(var("x"), vec![Case::new(vec![count(4), count(4)], print("four"))]);
    assert!(stmt.is_ok());
}

#[test]
fn test_multiple_defaults_rejected() {
    let result = Stmt::switch(
        var("x"),
        vec![
            Case::default_case(print("a")),
            Case::new(vec![count(1)], print("b")),
            Case::default_case(print("c")),
        ],
    );

    assert_eq!(
        result.unwrap_err(),
        DefinitionError::MultipleDefaults { first: 0, second: 2 }
    );
}

#[test]
fn test_non_constant_label_rejected() {
    let result = Stmt::switch(var("x"), vec![Case::new(vec![var("y")], print("a"))]);
    assert!(matches!(
        result,
        Err(DefinitionError::NonConstantLabel { .. })
    ));
}

#[test]
fn test_decoding_conflicting_switch_fails() {
    let json = r#"{
        "t": "Switch",
        "index": {"t": "Name", "name": "x"},
        "cases": [
            {"labels": [{"t": "Const", "v": {"t": "Count", "v": 1}}], "body": {"t": "Null"}},
            {"labels": [{"t": "Const", "v": {"t": "Count", "v": 1}}], "body": {"t": "Null"}}
        ]
    }"#;

    let result: Result<Stmt, _> = serde_json::from_str(json);
    let err = result.unwrap_err().to_string();
    assert!(err.contains("duplicate case label"), "{}", err);
}
