//! Per-statement debugging and profiling state
//!
//! Every execution records an access (timestamp and count) on the
//! statement; breakpoint counters are only changed through the explicit
//! increment/decrement calls a debugger makes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use tracing::debug;

use super::traverse::{TraversalCode, Visitor};
use super::{Stmt, StmtTag};
use crate::frame::Frame;
use crate::types::Span;

/// Last execution time and cumulative execution count
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessStats {
    last_access: Cell<Option<DateTime<Utc>>>,
    access_count: Cell<u64>,
}

impl AccessStats {
    pub fn last_access(&self) -> Option<DateTime<Utc>> {
        self.last_access.get()
    }

    pub fn access_count(&self) -> u64 {
        self.access_count.get()
    }

    fn record(&self, now: DateTime<Utc>) {
        self.last_access.set(Some(now));
        self.access_count.set(self.access_count.get().saturating_add(1));
    }
}

impl fmt::Display for AccessStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last_access() {
            Some(at) => write!(
                f,
                "(@{} #{})",
                at.format("%Y-%m-%d-%H:%M:%S"),
                self.access_count()
            ),
            None => write!(f, "(@never #{})", self.access_count()),
        }
    }
}

impl Stmt {
    pub fn access_stats(&self) -> &AccessStats {
        &self.stats
    }

    pub fn access_count(&self) -> u64 {
        self.stats.access_count()
    }

    pub fn bp_count(&self) -> u32 {
        self.breakpoints.get()
    }

    pub fn incr_bp_count(&self) {
        self.breakpoints.set(self.breakpoints.get() + 1);
    }

    /// Panics when the counter is already zero: an unbalanced decrement is a
    /// bug in the debugger driving it, not something to clamp.
    pub fn decr_bp_count(&self) {
        let count = self.breakpoints.get();
        if count == 0 {
            panic!("breakpoint count decremented below 0 at {}", self.span);
        }
        self.breakpoints.set(count - 1);
    }

    /// Bookkeeping done on entry to every execution
    pub(crate) fn register_access(&self, frame: &mut Frame) {
        self.stats.record(frame.network_time());
        if self.bp_count() > 0 {
            debug!(tag = %self.tag(), location = %self.span, "breakpoint hit");
            frame.outbox.breakpoint_hits.push(self.span);
        }
    }
}

/* ===================== Profiling ===================== */

/// One statement's counters as seen by a profiler
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRow {
    pub span: Span,
    pub tag: StmtTag,
    pub access_count: u64,
    pub last_access: Option<DateTime<Utc>>,
}

/// Visitor that gathers access counters for every statement in a tree
#[derive(Debug, Default)]
pub struct ProfileCollector {
    pub rows: Vec<ProfileRow>,
    /// Leave out statements that never ran
    pub executed_only: bool,
}

impl ProfileCollector {
    pub fn collect(root: &Stmt, executed_only: bool) -> Vec<ProfileRow> {
        let mut collector = ProfileCollector {
            rows: Vec::new(),
            executed_only,
        };
        root.traverse(&mut collector);
        collector.rows
    }
}

impl Visitor for ProfileCollector {
    fn pre_stmt(&mut self, stmt: &Stmt) -> TraversalCode {
        let stats = stmt.access_stats();
        if !self.executed_only || stats.access_count() > 0 {
            self.rows.push(ProfileRow {
                span: stmt.span(),
                tag: stmt.tag(),
                access_count: stats.access_count(),
                last_access: stats.last_access(),
            });
        }
        TraversalCode::Continue
    }
}
