//! Pre-order traversal over statement trees

use super::{Stmt, StmtKind};
use crate::expr::Expr;

/// Visitor's answer after seeing a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalCode {
    Continue,
    /// Do not descend into this statement (its post hook is skipped too)
    SkipChildren,
    /// Stop the whole traversal
    Abort,
}

/// An owned child of a statement
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Stmt(&'a Stmt),
    Expr(&'a Expr),
}

/// Read-only callbacks invoked during [`Stmt::traverse`]
pub trait Visitor {
    fn pre_stmt(&mut self, _stmt: &Stmt) -> TraversalCode {
        TraversalCode::Continue
    }

    fn post_stmt(&mut self, _stmt: &Stmt) -> TraversalCode {
        TraversalCode::Continue
    }

    /// Called for each expression owned directly by a statement
    fn expr(&mut self, _expr: &Expr) -> TraversalCode {
        TraversalCode::Continue
    }
}

impl Stmt {
    /// Owned children in their fixed visiting order
    pub fn children(&self) -> Vec<Node<'_>> {
        let mut out = Vec::new();
        match &self.kind {
            StmtKind::Print { exprs } => out.extend(exprs.iter().map(Node::Expr)),
            StmtKind::Expr { expr } => out.push(Node::Expr(expr)),
            StmtKind::If {
                test,
                then_branch,
                else_branch,
            } => {
                out.push(Node::Expr(test));
                out.push(Node::Stmt(then_branch));
                if let Some(else_branch) = else_branch {
                    out.push(Node::Stmt(else_branch));
                }
            }
            StmtKind::Switch(switch) => {
                out.push(Node::Expr(switch.index()));
                for case in switch.cases() {
                    out.extend(case.labels().iter().map(Node::Expr));
                    out.push(Node::Stmt(case.body()));
                }
            }
            StmtKind::Add { target } | StmtKind::Delete { target } => {
                out.push(Node::Expr(target))
            }
            StmtKind::Event { args, .. } => out.extend(args.iter().map(Node::Expr)),
            StmtKind::While { test, body } => {
                out.push(Node::Expr(test));
                out.push(Node::Stmt(body));
            }
            StmtKind::For { iterable, body, .. } => {
                out.push(Node::Expr(iterable));
                out.push(Node::Stmt(body));
            }
            StmtKind::Return { value } => out.extend(value.iter().map(Node::Expr)),
            StmtKind::List { stmts } | StmtKind::EventBodyList { stmts } => {
                out.extend(stmts.iter().map(Node::Stmt))
            }
            StmtKind::When { clause, .. } => {
                out.push(Node::Expr(&clause.cond));
                out.push(Node::Stmt(&clause.body));
                if let Some(timeout) = &clause.timeout {
                    out.push(Node::Expr(timeout));
                }
                if let Some(timeout_body) = &clause.timeout_body {
                    out.push(Node::Stmt(timeout_body));
                }
            }
            StmtKind::Next
            | StmtKind::Break
            | StmtKind::Fallthrough
            | StmtKind::Init { .. }
            | StmtKind::Null => {}
        }
        out
    }

    /// Visit this statement and its subtree in pre-order
    ///
    /// Returns `Abort` if the visitor aborted, `Continue` otherwise.
    pub fn traverse<V: Visitor + ?Sized>(&self, visitor: &mut V) -> TraversalCode {
        match visitor.pre_stmt(self) {
            TraversalCode::Abort => return TraversalCode::Abort,
            TraversalCode::SkipChildren => return TraversalCode::Continue,
            TraversalCode::Continue => {}
        }

        for child in self.children() {
            let code = match child {
                Node::Stmt(stmt) => stmt.traverse(visitor),
                Node::Expr(expr) => visitor.expr(expr),
            };
            if code == TraversalCode::Abort {
                return TraversalCode::Abort;
            }
        }

        match visitor.post_stmt(self) {
            TraversalCode::Abort => TraversalCode::Abort,
            _ => TraversalCode::Continue,
        }
    }
}
