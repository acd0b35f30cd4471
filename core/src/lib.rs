//! # netpolicy-core
//!
//! Statement execution engine for a network-monitoring policy language.
//!
//! A policy body is a tree of [`Stmt`] nodes executed against a [`Frame`].
//! Control flow travels as a [`Flow`] signal, `switch` dispatches through a
//! content-hash index, `when` suspends into a [`Scheduler`] continuation,
//! and whole trees checkpoint to and from JSON.

pub mod cli;
pub mod config;
pub mod errors;
pub mod expr;
pub mod frame;
pub mod scheduler;
pub mod stmt;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export main types
pub use errors::{CheckpointError, DefinitionError, EvalError, ExecError, TagMismatch};
pub use expr::{BinOp, Expr};
pub use frame::{Frame, Globals, Outbox, QueuedEvent};
pub use scheduler::{PollReport, Scheduler, SchedulerConfig};
pub use stmt::{Case, Flow, Outcome, Stmt, StmtKind, StmtTag, TagFilter, WhenClause, WhenMode};
pub use types::{Span, Val};
