//! Binding context for statement execution
//!
//! A [`Frame`] holds the local bindings of one function/event invocation and
//! a handle to the globals it shares with the host. Side effects that the
//! host must act on (printed lines, queued events, suspended `when`
//! statements, breakpoint hits) are recorded in the frame's [`Outbox`]
//! rather than performed directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::errors::EvalError;
use crate::stmt::Continuation;
use crate::types::{Span, Val};

/// Host function callable from policy expressions
pub type Builtin = Rc<dyn Fn(&mut Globals, &[Val]) -> Result<Val, String>>;

/// Globals shared between the host and every frame
pub type SharedGlobals = Rc<RefCell<Globals>>;

/* ===================== Globals ===================== */

/// Global state visible to all invocations
pub struct Globals {
    vars: HashMap<String, Val>,
    builtins: HashMap<String, Builtin>,
    /// Time as seen by the policy (advanced by the host, not the wall clock)
    network_time: DateTime<Utc>,
}

impl Globals {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
            builtins: HashMap::new(),
            network_time: Utc::now(),
        }
    }

    pub fn with_vars(vars: HashMap<String, Val>) -> Self {
        Self {
            vars,
            ..Self::new()
        }
    }

    pub fn shared(self) -> SharedGlobals {
        Rc::new(RefCell::new(self))
    }

    pub fn get(&self, name: &str) -> Option<&Val> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Val) {
        self.vars.insert(name.into(), value);
    }

    /// Register a host function under `name`
    pub fn register<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&mut Globals, &[Val]) -> Result<Val, String> + 'static,
    {
        self.builtins.insert(name.into(), Rc::new(func));
    }

    pub fn network_time(&self) -> DateTime<Utc> {
        self.network_time
    }

    pub fn set_network_time(&mut self, now: DateTime<Utc>) {
        self.network_time = now;
    }
}

impl Default for Globals {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Globals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builtins: Vec<&String> = self.builtins.keys().collect();
        builtins.sort();
        f.debug_struct("Globals")
            .field("vars", &self.vars)
            .field("builtins", &builtins)
            .field("network_time", &self.network_time)
            .finish()
    }
}

/* ===================== Outbox ===================== */

/// An event scheduled by an `event` statement, awaiting dispatch by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedEvent {
    pub name: String,
    pub args: Vec<Val>,
    pub queued_at: DateTime<Utc>,
}

/// Side effects produced while executing statements
#[derive(Debug, Default)]
pub struct Outbox {
    /// Lines produced by `print`
    pub printed: Vec<String>,
    pub events: Vec<QueuedEvent>,
    /// `when` statements that did not resolve immediately
    pub suspensions: Vec<Continuation>,
    /// Statements executed while carrying a breakpoint
    pub breakpoint_hits: Vec<Span>,
}

impl Outbox {
    pub fn is_empty(&self) -> bool {
        self.printed.is_empty()
            && self.events.is_empty()
            && self.suspensions.is_empty()
            && self.breakpoint_hits.is_empty()
    }
}

/* ===================== Frame ===================== */

/// Binding context of a single invocation
#[derive(Debug)]
pub struct Frame {
    globals: SharedGlobals,
    /// `None` marks a declared but uninitialized local
    locals: HashMap<String, Option<Val>>,
    pub outbox: Outbox,
}

impl Frame {
    pub fn new(globals: SharedGlobals) -> Self {
        Self {
            globals,
            locals: HashMap::new(),
            outbox: Outbox::default(),
        }
    }

    pub fn globals(&self) -> &SharedGlobals {
        &self.globals
    }

    pub fn network_time(&self) -> DateTime<Utc> {
        self.globals.borrow().network_time()
    }

    /// Create (or reset) a local binding
    pub fn declare(&mut self, name: impl Into<String>, value: Option<Val>) {
        self.locals.insert(name.into(), value);
    }

    pub fn local(&self, name: &str) -> Option<&Val> {
        self.locals.get(name).and_then(Option::as_ref)
    }

    /// Resolve a name: locals first, then globals
    pub fn lookup(&self, name: &str) -> Result<Val, EvalError> {
        match self.locals.get(name) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(EvalError::Unset(name.to_string())),
            None => self
                .globals
                .borrow()
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UnknownName(name.to_string())),
        }
    }

    /// Assign to an existing local or global; unknown names become locals
    pub fn assign(&mut self, name: &str, value: Val) {
        if let Some(slot) = self.locals.get_mut(name) {
            *slot = Some(value);
            return;
        }
        let mut globals = self.globals.borrow_mut();
        if globals.vars.contains_key(name) {
            globals.vars.insert(name.to_string(), value);
        } else {
            drop(globals);
            self.locals.insert(name.to_string(), Some(value));
        }
    }

    /// Mutate a binding in place (used by `add` / `delete`)
    pub fn with_binding_mut<R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Val) -> R,
    ) -> Result<R, EvalError> {
        match self.locals.get_mut(name) {
            Some(Some(value)) => Ok(f(value)),
            Some(None) => Err(EvalError::Unset(name.to_string())),
            None => {
                let mut globals = self.globals.borrow_mut();
                match globals.vars.get_mut(name) {
                    Some(value) => Ok(f(value)),
                    None => Err(EvalError::UnknownName(name.to_string())),
                }
            }
        }
    }

    /// Invoke a host function
    pub fn call(&mut self, name: &str, args: &[Val]) -> Result<Val, EvalError> {
        let func = self
            .globals
            .borrow()
            .builtins
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        let mut globals = self.globals.borrow_mut();
        func(&mut globals, args).map_err(|message| EvalError::Builtin {
            function: name.to_string(),
            message,
        })
    }

    /// Copy of this frame for a deferred continuation
    ///
    /// Locals are copied as they are now; globals stay shared with the host
    /// so that later state changes are visible to the deferred condition.
    pub fn detach(&self) -> Frame {
        Frame {
            globals: Rc::clone(&self.globals),
            locals: self.locals.clone(),
            outbox: Outbox::default(),
        }
    }
}
