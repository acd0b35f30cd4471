//! Rendering statements back to policy source

use std::fmt;

use super::switch::Case;
use super::{InitKind, Stmt, StmtKind, WhenMode};
use crate::expr::Expr;

const INDENT: &str = "    ";

fn pad(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str(INDENT)?;
    }
    Ok(())
}

fn write_exprs(f: &mut fmt::Formatter<'_>, exprs: &[Expr]) -> fmt::Result {
    for (i, expr) in exprs.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", expr)?;
    }
    Ok(())
}

/// Body of a compound statement: blocks stay at the parent's depth
fn write_body(f: &mut fmt::Formatter<'_>, body: &Stmt, depth: usize) -> fmt::Result {
    f.write_str("\n")?;
    if body.is_block() {
        body.describe(f, depth)
    } else {
        body.describe(f, depth + 1)
    }
}

impl Stmt {
    fn is_block(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::List { .. } | StmtKind::EventBodyList { .. }
        )
    }

    fn describe(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        pad(f, depth)?;
        match &self.kind {
            StmtKind::Print { exprs } => {
                f.write_str("print ")?;
                write_exprs(f, exprs)?;
                f.write_str(";")
            }
            StmtKind::Expr { expr } => write!(f, "{};", expr),
            StmtKind::If {
                test,
                then_branch,
                else_branch,
            } => {
                write!(f, "if ( {} )", test)?;
                write_body(f, then_branch, depth)?;
                if let Some(else_branch) = else_branch {
                    f.write_str("\n")?;
                    pad(f, depth)?;
                    f.write_str("else")?;
                    write_body(f, else_branch, depth)?;
                }
                Ok(())
            }
            StmtKind::Switch(switch) => {
                write!(f, "switch ( {} ) {{", switch.index())?;
                for case in switch.cases() {
                    f.write_str("\n")?;
                    case.describe(f, depth)?;
                }
                f.write_str("\n")?;
                pad(f, depth)?;
                f.write_str("}")
            }
            StmtKind::Add { target } => write!(f, "add {};", target),
            StmtKind::Delete { target } => write!(f, "delete {};", target),
            StmtKind::Event { name, args } => {
                write!(f, "event {}(", name)?;
                write_exprs(f, args)?;
                f.write_str(");")
            }
            StmtKind::While { test, body } => {
                write!(f, "while ( {} )", test)?;
                write_body(f, body, depth)
            }
            StmtKind::For {
                vars,
                iterable,
                body,
            } => {
                if let [var] = vars.as_slice() {
                    write!(f, "for ( {} in {} )", var, iterable)?;
                } else {
                    write!(f, "for ( [{}] in {} )", vars.join(", "), iterable)?;
                }
                write_body(f, body, depth)
            }
            StmtKind::Next => f.write_str("next;"),
            StmtKind::Break => f.write_str("break;"),
            StmtKind::Fallthrough => f.write_str("fallthrough;"),
            StmtKind::Return { value: Some(value) } => write!(f, "return {};", value),
            StmtKind::Return { value: None } => f.write_str("return;"),
            StmtKind::List { stmts } | StmtKind::EventBodyList { stmts } => {
                f.write_str("{")?;
                for stmt in stmts {
                    f.write_str("\n")?;
                    stmt.describe(f, depth + 1)?;
                }
                f.write_str("\n")?;
                pad(f, depth)?;
                f.write_str("}")
            }
            StmtKind::Init { decls } => {
                f.write_str("local ")?;
                for (i, decl) in decls.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match decl.kind {
                        InitKind::Set => write!(f, "{}: set", decl.name)?,
                        InitKind::Table => write!(f, "{}: table", decl.name)?,
                        InitKind::Vector => write!(f, "{}: vector", decl.name)?,
                        InitKind::Scalar => f.write_str(&decl.name)?,
                    }
                }
                f.write_str(";")
            }
            StmtKind::Null => f.write_str(";"),
            StmtKind::When { clause, mode } => {
                if *mode == WhenMode::Return {
                    f.write_str("return ")?;
                }
                write!(f, "when ( {} )", clause.cond)?;
                write_body(f, &clause.body, depth)?;
                if let Some(timeout) = &clause.timeout {
                    f.write_str("\n")?;
                    pad(f, depth)?;
                    write!(f, "timeout {}", timeout)?;
                    match &clause.timeout_body {
                        Some(body) => write_body(f, body, depth)?,
                        None => f.write_str(" { }")?,
                    }
                }
                Ok(())
            }
        }
    }
}

impl Case {
    fn describe(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        pad(f, depth)?;
        if self.is_default() {
            f.write_str("default:")?;
        } else {
            f.write_str("case ")?;
            write_exprs(f, self.labels())?;
            f.write_str(":")?;
        }
        f.write_str("\n")?;
        self.body().describe(f, depth + 1)
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.describe(f, 0)
    }
}

impl fmt::Display for Case {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.describe(f, 0)
    }
}
