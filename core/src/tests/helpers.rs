//! Test helpers for statement engine tests
//!
//! Shorthand constructors for expressions and statements, plus a JSON
//! loader that pushes every program through a checkpoint round trip.

use crate::expr::{BinOp, Expr};
use crate::frame::{Frame, Globals, SharedGlobals};
use crate::stmt::{Outcome, Stmt, TagFilter};
use crate::types::Val;
use std::collections::HashMap;

/// Deserialize a statement tree from JSON, then encode and decode it
/// again so every test also exercises the checkpoint format
pub fn parse_stmt(json: &str) -> Stmt {
    let stmt: Stmt = serde_json::from_str(json).expect("Statement deserialization failed");
    let bytes = stmt.encode().expect("Checkpoint encoding failed");
    Stmt::decode(&bytes, TagFilter::Any).expect("Checkpoint decoding failed")
}

pub fn globals(vars: HashMap<String, Val>) -> SharedGlobals {
    Globals::with_vars(vars).shared()
}

pub fn frame(vars: HashMap<String, Val>) -> Frame {
    Frame::new(globals(vars))
}

/// Execute and unwrap
pub fn run(stmt: &Stmt, frame: &mut Frame) -> Outcome {
    stmt.exec(frame).expect("Execution failed")
}

pub fn count(n: u64) -> Expr {
    Expr::constant(Val::Count(n))
}

pub fn text(s: &str) -> Expr {
    Expr::constant(Val::str(s))
}

pub fn var(name: &str) -> Expr {
    Expr::name(name)
}

pub fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::binary(op, left, right)
}

/// `print "<s>";`
pub fn print(s: &str) -> Stmt {
    Stmt::print(vec![text(s)])
}

/// `<name> = <value>;`
pub fn assign(name: &str, value: Expr) -> Stmt {
    Stmt::expr(Expr::assign(name, value))
}

/// `<name> = <name> + 1;`
pub fn increment(name: &str) -> Stmt {
    assign(name, binary(BinOp::Add, var(name), count(1)))
}

pub fn printed(frame: &Frame) -> Vec<&str> {
    frame.outbox.printed.iter().map(String::as_str).collect()
}
