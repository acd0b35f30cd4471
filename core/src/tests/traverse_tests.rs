//! Tests for tree traversal

use super::helpers::*;
use crate::expr::Expr;
use crate::stmt::{Case, Node, Stmt, StmtTag, TraversalCode, Visitor, WhenClause, WhenMode};
use crate::types::Val;

/// Records the visiting order as readable strings
#[derive(Default)]
struct Recorder {
    seen: Vec<String>,
    skip: Option<StmtTag>,
    abort_on: Option<StmtTag>,
}

impl Visitor for Recorder {
    fn pre_stmt(&mut self, stmt: &Stmt) -> TraversalCode {
        self.seen.push(format!("pre {}", stmt.tag()));
        if self.abort_on == Some(stmt.tag()) {
            return TraversalCode::Abort;
        }
        if self.skip == Some(stmt.tag()) {
            return TraversalCode::SkipChildren;
        }
        TraversalCode::Continue
    }

    fn post_stmt(&mut self, stmt: &Stmt) -> TraversalCode {
        self.seen.push(format!("post {}", stmt.tag()));
        TraversalCode::Continue
    }

    fn expr(&mut self, expr: &Expr) -> TraversalCode {
        self.seen.push(format!("expr {}", expr));
        TraversalCode::Continue
    }
}

fn if_tree() -> Stmt {
    Stmt::list(vec![
        Stmt::if_else(var("c"), print("yes"), Some(Stmt::null())),
        Stmt::break_(),
    ])
}

#[test]
fn test_preorder_with_fixed_child_order() {
    let mut recorder = Recorder::default();

    let code = if_tree().traverse(&mut recorder);

    assert_eq!(code, TraversalCode::Continue);
    assert_eq!(
        recorder.seen,
        vec![
            "pre List",
            "pre If",
            "expr c",
            "pre Print",
            "expr \"yes\"",
            "post Print",
            "pre Null",
            "post Null",
            "post If",
            "pre Break",
            "post Break",
            "post List",
        ]
    );
}

#[test]
fn test_skip_children_skips_subtree_only() {
    let mut recorder = Recorder {
        skip: Some(StmtTag::If),
        ..Recorder::default()
    };

    let code = if_tree().traverse(&mut recorder);

    assert_eq!(code, TraversalCode::Continue);
    assert_eq!(
        recorder.seen,
        vec!["pre List", "pre If", "pre Break", "post Break", "post List"]
    );
}

#[test]
fn test_abort_stops_everything() {
    let mut recorder = Recorder {
        abort_on: Some(StmtTag::Print),
        ..Recorder::default()
    };

    let code = if_tree().traverse(&mut recorder);

    assert_eq!(code, TraversalCode::Abort);
    assert_eq!(
        recorder.seen,
        vec!["pre List", "pre If", "expr c", "pre Print"]
    );
}

#[test]
fn test_when_children_order() {
    let stmt = Stmt::when(
        WhenClause::new(var("ready"), print("go"))
            .with_timeout(Expr::constant(Val::Interval(5.0)), Some(print("late"))),
        WhenMode::Inline,
    );

    let order: Vec<String> = stmt
        .children()
        .into_iter()
        .map(|node| match node {
            Node::Stmt(s) => s.to_string(),
            Node::Expr(e) => e.to_string(),
        })
        .collect();

    assert_eq!(order, vec!["ready", "print \"go\";", "5.0 secs", "print \"late\";"]);
}

#[test]
fn test_switch_children_order() {
    let stmt = Stmt::switch(
        var("x"),
        vec![
            Case::new(vec![count(1), count(2)], Stmt::null()),
            Case::default_case(Stmt::break_()),
        ],
    )
    .unwrap();

    let mut recorder = Recorder::default();
    stmt.traverse(&mut recorder);

    assert_eq!(
        recorder.seen,
        vec![
            "pre Switch",
            "expr x",
            "expr 1",
            "expr 2",
            "pre Null",
            "post Null",
            "pre Break",
            "post Break",
            "post Switch",
        ]
    );
}
