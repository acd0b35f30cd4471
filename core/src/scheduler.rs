//! Suspension scheduler
//!
//! Owns the continuations of suspended `when` statements and everything a
//! frame's outbox hands over (queued events, printed lines, breakpoint
//! hits). Pending conditions are re-evaluated on every [`Scheduler::poll`];
//! hosts call it after each state change they make, and [`Scheduler::drive`]
//! calls it on a fixed cadence for hosts that just want to wait.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::ExecError;
use crate::frame::{Frame, Outbox, QueuedEvent};
use crate::stmt::{Advance, Continuation, Stmt, WhenMode};
use crate::types::{Span, Val};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Cadence of [`Scheduler::drive`]
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// What happened during one or more polls
#[derive(Debug, Default)]
pub struct PollReport {
    pub resolved: Vec<Uuid>,
    pub timed_out: Vec<Uuid>,
    /// Continuations dropped because their condition or body failed
    pub failed: Vec<(Uuid, ExecError)>,
}

impl PollReport {
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty() && self.timed_out.is_empty() && self.failed.is_empty()
    }

    fn merge(&mut self, other: PollReport) {
        self.resolved.extend(other.resolved);
        self.timed_out.extend(other.timed_out);
        self.failed.extend(other.failed);
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
    waiting: Vec<Continuation>,
    events: VecDeque<QueuedEvent>,
    printed: Vec<String>,
    breakpoint_hits: Vec<Span>,
    /// Eventual values of `return when` continuations, by id
    results: HashMap<Uuid, Option<Val>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run a function or event body with a frame the scheduler takes over
    ///
    /// The frame's side effects are absorbed even when the body fails.
    pub fn run_body(&mut self, body: &Stmt, mut frame: Frame) -> Result<Option<Val>, ExecError> {
        let result = body.invoke(&mut frame);
        self.absorb(&mut frame.outbox);
        result
    }

    /// Take over everything recorded in an outbox
    pub fn absorb(&mut self, outbox: &mut Outbox) {
        self.printed.append(&mut outbox.printed);
        self.events.extend(outbox.events.drain(..));
        self.breakpoint_hits.append(&mut outbox.breakpoint_hits);
        for continuation in outbox.suspensions.drain(..) {
            self.suspend(continuation);
        }
    }

    pub fn suspend(&mut self, continuation: Continuation) {
        debug!(
            id = %continuation.id(),
            location = %continuation.span(),
            deadline = ?continuation.deadline(),
            "continuation registered"
        );
        self.waiting.push(continuation);
    }

    /// Re-check every waiting continuation against `now`
    ///
    /// Continuations registered by bodies that run during this poll are
    /// first checked on the next one.
    pub fn poll(&mut self, now: DateTime<Utc>) -> PollReport {
        let mut report = PollReport::default();
        let waiting = std::mem::take(&mut self.waiting);
        let mut still_waiting = Vec::with_capacity(waiting.len());

        for mut continuation in waiting {
            let id = continuation.id();
            let advanced = continuation.advance(now);
            self.absorb(&mut continuation.take_outbox());

            match advanced {
                Ok(Advance::StillWaiting) => still_waiting.push(continuation),
                Ok(Advance::Resolved(value)) => {
                    info!(%id, location = %continuation.span(), "when resolved");
                    self.record_result(&continuation, value);
                    report.resolved.push(id);
                }
                Ok(Advance::TimedOut(value)) => {
                    info!(%id, location = %continuation.span(), "when timed out");
                    self.record_result(&continuation, value);
                    report.timed_out.push(id);
                }
                Err(err) => {
                    warn!(%id, error = %err, "dropping continuation after failure");
                    report.failed.push((id, err));
                }
            }
        }

        still_waiting.append(&mut self.waiting);
        self.waiting = still_waiting;
        report
    }

    fn record_result(&mut self, continuation: &Continuation, value: Option<Val>) {
        if continuation.mode() == WhenMode::Return {
            self.results.insert(continuation.id(), value);
        }
    }

    /// Poll at the configured cadence until nothing is waiting or
    /// `max_wait` has passed; `clock` supplies the time each poll sees
    pub async fn drive<C>(&mut self, mut clock: C, max_wait: Duration) -> PollReport
    where
        C: FnMut() -> DateTime<Utc>,
    {
        let mut total = PollReport::default();
        let started = tokio::time::Instant::now();
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while !self.waiting.is_empty() && started.elapsed() < max_wait {
            interval.tick().await;
            total.merge(self.poll(clock()));
        }

        if !self.waiting.is_empty() {
            debug!(pending = self.waiting.len(), "drive stopped with continuations waiting");
        }
        total
    }

    pub fn pending(&self) -> usize {
        self.waiting.len()
    }

    pub fn continuations(&self) -> &[Continuation] {
        &self.waiting
    }

    /// Eventual value of a `return when`; `None` while it is still waiting
    pub fn take_result(&mut self, id: Uuid) -> Option<Option<Val>> {
        self.results.remove(&id)
    }

    /// Take every `return when` value nobody has collected yet
    ///
    /// Uncollected values are kept until taken; hosts that do not track
    /// ids call this after driving.
    pub fn drain_results(&mut self) -> Vec<(Uuid, Option<Val>)> {
        self.results.drain().collect()
    }

    pub fn drain_events(&mut self) -> Vec<QueuedEvent> {
        self.events.drain(..).collect()
    }

    pub fn take_printed(&mut self) -> Vec<String> {
        std::mem::take(&mut self.printed)
    }

    pub fn take_breakpoint_hits(&mut self) -> Vec<Span> {
        std::mem::take(&mut self.breakpoint_hits)
    }
}
