//! Statement execution
//!
//! `exec` runs one statement against a borrowed frame and reports an
//! [`Outcome`]. Non-normal flows travel upward until the construct that
//! consumes them: loops take `break`/`next`, switches take `break` and
//! trailing `fallthrough`, [`Stmt::invoke`] takes `return`.

use tracing::debug;

use super::flow::{Flow, Outcome};
use super::when::exec_when;
use super::{InitKind, Stmt, StmtKind};
use crate::errors::{AtSpan, ExecError};
use crate::expr::{eval_key, Expr};
use crate::frame::{Frame, QueuedEvent};
use crate::types::{Span, Val};

/// What a loop body's flow means for the loop
enum LoopStep {
    Continue,
    Exit,
    Propagate(Outcome),
}

fn loop_step(outcome: Outcome) -> LoopStep {
    match outcome.flow {
        Flow::Normal | Flow::Next => LoopStep::Continue,
        Flow::Break => LoopStep::Exit,
        Flow::Return | Flow::Fallthrough => LoopStep::Propagate(outcome),
    }
}

impl Stmt {
    pub fn exec(&self, frame: &mut Frame) -> Result<Outcome, ExecError> {
        self.register_access(frame);
        let span = self.span;

        match &self.kind {
            StmtKind::Print { exprs } => {
                let mut rendered = Vec::with_capacity(exprs.len());
                for expr in exprs {
                    rendered.push(expr.eval(frame).at(span)?.to_string());
                }
                frame.outbox.printed.push(rendered.join(", "));
                Ok(Outcome::normal())
            }

            StmtKind::Expr { expr } => Ok(Outcome::value(expr.eval(frame).at(span)?)),

            StmtKind::If {
                test,
                then_branch,
                else_branch,
            } => {
                if eval_test(test, frame, span, "if")? {
                    then_branch.exec(frame)
                } else if let Some(else_branch) = else_branch {
                    else_branch.exec(frame)
                } else {
                    Ok(Outcome::normal())
                }
            }

            StmtKind::Switch(switch) => switch.exec(frame, span),

            StmtKind::Add { target } => {
                let (name, key) = member_target(target, frame, span, "add")?;
                let added = frame
                    .with_binding_mut(&name, |set| {
                        if set.set_insert(key) {
                            Ok(())
                        } else {
                            Err(set.type_name())
                        }
                    })
                    .at(span)?;
                added.map_err(|found| {
                    ExecError::script(span, format!("add requires a set, '{}' is a {}", name, found))
                })?;
                Ok(Outcome::normal())
            }

            StmtKind::Delete { target } => {
                let (name, key) = member_target(target, frame, span, "delete")?;
                let removed = frame
                    .with_binding_mut(&name, |aggregate| {
                        if aggregate.remove_member(&key) {
                            Ok(())
                        } else {
                            Err(aggregate.type_name())
                        }
                    })
                    .at(span)?;
                removed.map_err(|found| {
                    ExecError::script(
                        span,
                        format!("delete requires a set or table, '{}' is a {}", name, found),
                    )
                })?;
                Ok(Outcome::normal())
            }

            StmtKind::Event { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.eval(frame).at(span)?);
                }
                debug!(event = %name, "event queued");
                let queued_at = frame.network_time();
                frame.outbox.events.push(QueuedEvent {
                    name: name.clone(),
                    args: values,
                    queued_at,
                });
                Ok(Outcome::normal())
            }

            StmtKind::While { test, body } => {
                while eval_test(test, frame, span, "while")? {
                    match loop_step(body.exec(frame)?) {
                        LoopStep::Continue => {}
                        LoopStep::Exit => break,
                        LoopStep::Propagate(outcome) => return Ok(outcome),
                    }
                }
                Ok(Outcome::normal())
            }

            StmtKind::For {
                vars,
                iterable,
                body,
            } => {
                let collection = iterable.eval(frame).at(span)?;
                for element in iteration_order(&collection, span)? {
                    bind_loop_vars(vars, element, frame, span)?;
                    match loop_step(body.exec(frame)?) {
                        LoopStep::Continue => {}
                        LoopStep::Exit => break,
                        LoopStep::Propagate(outcome) => return Ok(outcome),
                    }
                }
                Ok(Outcome::normal())
            }

            StmtKind::Next => Ok(Outcome::flow(Flow::Next)),
            StmtKind::Break => Ok(Outcome::flow(Flow::Break)),
            StmtKind::Fallthrough => Ok(Outcome::flow(Flow::Fallthrough)),

            StmtKind::Return { value } => {
                let value = match value {
                    Some(expr) => Some(expr.eval(frame).at(span)?),
                    None => None,
                };
                Ok(Outcome::returned(value))
            }

            StmtKind::List { stmts } | StmtKind::EventBodyList { stmts } => {
                for stmt in stmts {
                    let outcome = stmt.exec(frame)?;
                    if !outcome.is_normal() {
                        return Ok(outcome);
                    }
                }
                Ok(Outcome::normal())
            }

            StmtKind::Init { decls } => {
                for decl in decls {
                    let initial = match decl.kind {
                        InitKind::Set => Some(Val::Set(Vec::new())),
                        InitKind::Table => Some(Val::Table(Vec::new())),
                        InitKind::Vector => Some(Val::Vector(Vec::new())),
                        InitKind::Scalar => None,
                    };
                    frame.declare(decl.name.clone(), initial);
                }
                Ok(Outcome::normal())
            }

            StmtKind::Null => Ok(Outcome::normal()),

            StmtKind::When { clause, mode } => exec_when(clause, *mode, frame, span),
        }
    }

    /// Execute as the body of a function or event handler
    ///
    /// Consumes `return` and yields its value. Any other non-normal flow
    /// escaping the body is a script error.
    pub fn invoke(&self, frame: &mut Frame) -> Result<Option<Val>, ExecError> {
        let outcome = self.exec(frame)?;
        match outcome.flow {
            Flow::Normal => Ok(None),
            Flow::Return => Ok(outcome.value),
            Flow::Break => Err(ExecError::script(self.span, "break outside of loop or switch")),
            Flow::Next => Err(ExecError::script(self.span, "next outside of loop")),
            Flow::Fallthrough => Err(ExecError::script(self.span, "fallthrough outside of switch")),
        }
    }
}

fn eval_test(test: &Expr, frame: &mut Frame, span: Span, what: &str) -> Result<bool, ExecError> {
    let value = test.eval(frame).at(span)?;
    value.as_bool().ok_or_else(|| {
        ExecError::script(
            span,
            format!("{} condition must be bool, got {}", what, value.type_name()),
        )
    })
}

/// Split `name[k]` into the aggregate's name and the evaluated key
fn member_target(
    target: &Expr,
    frame: &mut Frame,
    span: Span,
    what: &str,
) -> Result<(String, Val), ExecError> {
    let Expr::Index { base, indices } = target else {
        return Err(ExecError::script(
            span,
            format!("{} target must be an index expression, got {}", what, target),
        ));
    };
    let Expr::Name { name } = base.as_ref() else {
        return Err(ExecError::script(
            span,
            format!("{} target must name a variable, got {}", what, base),
        ));
    };
    let key = eval_key(indices, frame).at(span)?;
    Ok((name.clone(), key))
}

/// Values a `for` loop binds, in the collection's iteration order
fn iteration_order(collection: &Val, span: Span) -> Result<Vec<Val>, ExecError> {
    match collection {
        Val::Set(members) => Ok(members.clone()),
        Val::Table(entries) => Ok(entries.iter().map(|(key, _)| key.clone()).collect()),
        Val::Vector(items) => Ok((0..items.len() as u64).map(Val::Count).collect()),
        Val::Str(s) => Ok(s.chars().map(|c| Val::Str(c.to_string())).collect()),
        other => Err(ExecError::script(
            span,
            format!("cannot iterate over a {}", other.type_name()),
        )),
    }
}

fn bind_loop_vars(
    vars: &[String],
    element: Val,
    frame: &mut Frame,
    span: Span,
) -> Result<(), ExecError> {
    if let [var] = vars {
        frame.declare(var.clone(), Some(element));
        return Ok(());
    }
    match element {
        Val::Tuple(parts) if parts.len() == vars.len() => {
            for (var, part) in vars.iter().zip(parts) {
                frame.declare(var.clone(), Some(part));
            }
            Ok(())
        }
        other => Err(ExecError::script(
            span,
            format!(
                "{} loop variables cannot be bound from {}",
                vars.len(),
                other
            ),
        )),
    }
}
