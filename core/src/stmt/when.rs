//! `when` statements: wait for a condition, with an optional timeout
//!
//! Executing a `when` evaluates its condition once. If it already holds the
//! body runs inline. Otherwise a [`Continuation`] is created that owns a
//! detached copy of the frame and is handed to the scheduler through the
//! frame's outbox; the scheduler re-evaluates it until the condition holds
//! or the deadline passes.
//!
//! ```text
//! Evaluating ──true──▶ Resolved
//!     │
//!   false
//!     ▼
//!  Waiting ──condition true──▶ Resolved
//!     │
//!  deadline
//!     ▼
//!  TimedOut
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::debug;
use uuid::Uuid;

use super::flow::{Flow, Outcome};
use super::Stmt;
use crate::errors::{AtSpan, ExecError};
use crate::expr::Expr;
use crate::frame::{Frame, Outbox};
use crate::types::{Span, Val};

/// Condition, body and optional timeout of a `when`
#[derive(Debug, Serialize, Deserialize)]
pub struct WhenClause {
    pub cond: Expr,
    pub body: Stmt,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Expr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_body: Option<Stmt>,
}

impl WhenClause {
    pub fn new(cond: Expr, body: Stmt) -> Self {
        Self {
            cond,
            body,
            timeout: None,
            timeout_body: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Expr, timeout_body: Option<Stmt>) -> Self {
        self.timeout = Some(timeout);
        self.timeout_body = timeout_body;
        self
    }

    fn holds(&self, frame: &mut Frame, span: Span) -> Result<bool, ExecError> {
        let value = self.cond.eval(frame).at(span)?;
        value.as_bool().ok_or_else(|| {
            ExecError::script(
                span,
                format!("when condition must be bool, got {}", value.type_name()),
            )
        })
    }

    fn deadline(&self, frame: &mut Frame, span: Span) -> Result<Option<DateTime<Utc>>, ExecError> {
        let Some(timeout) = &self.timeout else {
            return Ok(None);
        };
        let value = timeout.eval(frame).at(span)?;
        let secs = match value.as_seconds() {
            Some(secs) if secs.is_finite() && secs >= 0.0 => secs,
            _ => {
                return Err(ExecError::script(
                    span,
                    format!("invalid when timeout {}", value),
                ))
            }
        };
        let delay = Duration::microseconds((secs * 1_000_000.0) as i64);
        frame
            .network_time()
            .checked_add_signed(delay)
            .map(Some)
            .ok_or_else(|| ExecError::script(span, format!("when timeout {} is out of range", value)))
    }
}

/// Whether a `when` runs as a statement or supplies its function's result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WhenMode {
    #[default]
    Inline,
    /// `return when ...`
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhenState {
    Evaluating,
    Waiting,
    Resolved,
    TimedOut,
}

/// Result of advancing a waiting continuation
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    StillWaiting,
    /// Body ran; carries its returned value in `Return` mode
    Resolved(Option<Val>),
    TimedOut(Option<Val>),
}

/* ===================== Continuation ===================== */

/// A suspended `when`, owning the frame it will resume against
#[derive(Debug)]
pub struct Continuation {
    id: Uuid,
    clause: Rc<WhenClause>,
    mode: WhenMode,
    frame: Frame,
    deadline: Option<DateTime<Utc>>,
    state: WhenState,
    span: Span,
}

impl Continuation {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> WhenState {
        self.state
    }

    pub fn mode(&self) -> WhenMode {
        self.mode
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn clause(&self) -> &WhenClause {
        &self.clause
    }

    /// Re-check the condition, then the deadline
    ///
    /// A condition that holds at the deadline instant resolves.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<Advance, ExecError> {
        if self.state != WhenState::Waiting {
            return Err(ExecError::Internal(format!(
                "continuation {} advanced in state {:?}",
                self.id, self.state
            )));
        }

        self.state = WhenState::Evaluating;
        if self.clause.holds(&mut self.frame, self.span)? {
            self.state = WhenState::Resolved;
            let value = run_branch(&self.clause.body, &mut self.frame)?;
            return Ok(Advance::Resolved(value));
        }

        if self.deadline.is_some_and(|deadline| now >= deadline) {
            self.state = WhenState::TimedOut;
            let value = match &self.clause.timeout_body {
                Some(body) => run_branch(body, &mut self.frame)?,
                None => None,
            };
            return Ok(Advance::TimedOut(value));
        }

        self.state = WhenState::Waiting;
        Ok(Advance::StillWaiting)
    }

    /// Side effects produced by the last [`advance`](Self::advance)
    pub fn take_outbox(&mut self) -> Outbox {
        std::mem::take(&mut self.frame.outbox)
    }
}

fn run_branch(body: &Stmt, frame: &mut Frame) -> Result<Option<Val>, ExecError> {
    let outcome = body.exec(frame)?;
    Ok(match outcome.flow {
        Flow::Return => outcome.value,
        _ => None,
    })
}

/// Execute a `when` against the caller's frame
pub(super) fn exec_when(
    clause: &Rc<WhenClause>,
    mode: WhenMode,
    frame: &mut Frame,
    span: Span,
) -> Result<Outcome, ExecError> {
    if clause.holds(frame, span)? {
        let value = run_branch(&clause.body, frame)?;
        return Ok(match mode {
            WhenMode::Inline => Outcome::normal(),
            WhenMode::Return => Outcome::returned(value),
        });
    }

    let deadline = clause.deadline(frame, span)?;
    let continuation = Continuation {
        id: Uuid::new_v4(),
        clause: Rc::clone(clause),
        mode,
        frame: frame.detach(),
        deadline,
        state: WhenState::Waiting,
        span,
    };
    let id = continuation.id;
    debug!(%id, location = %span, ?deadline, "when suspended");
    frame.outbox.suspensions.push(continuation);

    Ok(match mode {
        WhenMode::Inline => Outcome::normal(),
        WhenMode::Return => Outcome::returned(Some(Val::Pending(id))),
    })
}
