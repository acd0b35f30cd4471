//! Statement tree
//!
//! A [`Stmt`] is a node of the policy-language statement tree: a
//! [`StmtKind`] payload plus its source location and the per-node
//! instrumentation state (access statistics, breakpoint counter and the
//! memoized may-suspend flag). The structure is immutable once built; only
//! the instrumentation cells change, which makes `Stmt` `!Sync` on purpose.
//!
//! Execution lives in [`exec`], switch dispatch in [`switch`], `when`
//! suspension in [`when`], and the serialized form in [`checkpoint`].

pub mod checkpoint;
mod display;
mod exec;
pub mod flow;
pub mod instrument;
pub mod switch;
pub mod traverse;
pub mod when;

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::errors::{DefinitionError, TagMismatch};
use crate::expr::Expr;
use crate::types::ast::is_default_span;
use crate::types::Span;

pub use checkpoint::{TagFilter, CHECKPOINT_FORMAT};
pub use flow::{Flow, Outcome};
pub use instrument::{AccessStats, ProfileCollector, ProfileRow};
pub use switch::{Case, DispatchIndex, SwitchStmt};
pub use traverse::{Node, TraversalCode, Visitor};
pub use when::{Advance, Continuation, WhenClause, WhenMode, WhenState};

/* ===================== Tags ===================== */

/// Discriminant of a statement kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StmtTag {
    Print,
    Expr,
    If,
    Switch,
    Add,
    Delete,
    Event,
    While,
    For,
    Next,
    Break,
    Fallthrough,
    Return,
    List,
    EventBodyList,
    Init,
    Null,
    When,
}

impl StmtTag {
    /// Name used as the `t` field of the serialized form
    pub fn name(self) -> &'static str {
        match self {
            StmtTag::Print => "Print",
            StmtTag::Expr => "Expr",
            StmtTag::If => "If",
            StmtTag::Switch => "Switch",
            StmtTag::Add => "Add",
            StmtTag::Delete => "Delete",
            StmtTag::Event => "Event",
            StmtTag::While => "While",
            StmtTag::For => "For",
            StmtTag::Next => "Next",
            StmtTag::Break => "Break",
            StmtTag::Fallthrough => "Fallthrough",
            StmtTag::Return => "Return",
            StmtTag::List => "List",
            StmtTag::EventBodyList => "EventBodyList",
            StmtTag::Init => "Init",
            StmtTag::Null => "Null",
            StmtTag::When => "When",
        }
    }
}

impl fmt::Display for StmtTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/* ===================== Declarations ===================== */

/// Type class of an `init` declaration; decides the initial binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitKind {
    Set,
    Table,
    Vector,
    /// Any non-aggregate type; starts unset
    Scalar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitDecl {
    pub name: String,
    pub kind: InitKind,
}

impl InitDecl {
    pub fn new(name: impl Into<String>, kind: InitKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/* ===================== Statement Kinds ===================== */

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum StmtKind {
    Print {
        exprs: Vec<Expr>,
    },
    Expr {
        expr: Expr,
    },
    If {
        test: Expr,
        then_branch: Box<Stmt>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        else_branch: Option<Box<Stmt>>,
    },
    Switch(SwitchStmt),
    /// `add s[k]`
    Add {
        target: Expr,
    },
    /// `delete s[k]`
    Delete {
        target: Expr,
    },
    Event {
        name: String,
        args: Vec<Expr>,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    For {
        vars: Vec<String>,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Next,
    Break,
    Fallthrough,
    Return {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Expr>,
    },
    List {
        stmts: Vec<Stmt>,
    },
    /// Outermost body of a function or event handler
    EventBodyList {
        stmts: Vec<Stmt>,
    },
    Init {
        decls: Vec<InitDecl>,
    },
    Null,
    When {
        clause: Rc<WhenClause>,
        #[serde(default)]
        mode: WhenMode,
    },
}

impl StmtKind {
    pub fn tag(&self) -> StmtTag {
        match self {
            StmtKind::Print { .. } => StmtTag::Print,
            StmtKind::Expr { .. } => StmtTag::Expr,
            StmtKind::If { .. } => StmtTag::If,
            StmtKind::Switch(_) => StmtTag::Switch,
            StmtKind::Add { .. } => StmtTag::Add,
            StmtKind::Delete { .. } => StmtTag::Delete,
            StmtKind::Event { .. } => StmtTag::Event,
            StmtKind::While { .. } => StmtTag::While,
            StmtKind::For { .. } => StmtTag::For,
            StmtKind::Next => StmtTag::Next,
            StmtKind::Break => StmtTag::Break,
            StmtKind::Fallthrough => StmtTag::Fallthrough,
            StmtKind::Return { .. } => StmtTag::Return,
            StmtKind::List { .. } => StmtTag::List,
            StmtKind::EventBodyList { .. } => StmtTag::EventBodyList,
            StmtKind::Init { .. } => StmtTag::Init,
            StmtKind::Null => StmtTag::Null,
            StmtKind::When { .. } => StmtTag::When,
        }
    }
}

/* ===================== Statement Node ===================== */

/// Cached answer to "may this subtree suspend?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum AsyncFlag {
    #[default]
    Unknown,
    /// Computation in progress
    Pending,
    Yes,
    No,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    #[serde(flatten)]
    kind: StmtKind,
    #[serde(default, skip_serializing_if = "is_default_span")]
    span: Span,
    #[serde(default)]
    stats: AccessStats,
    #[serde(skip)]
    breakpoints: Cell<u32>,
    #[serde(skip)]
    may_suspend: Cell<AsyncFlag>,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self {
            kind,
            span: Span::default(),
            stats: AccessStats::default(),
            breakpoints: Cell::new(0),
            may_suspend: Cell::new(AsyncFlag::Unknown),
        }
    }

    /// Attach location info
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn kind(&self) -> &StmtKind {
        &self.kind
    }

    pub fn tag(&self) -> StmtTag {
        self.kind.tag()
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /* ===================== Constructors ===================== */

    pub fn print(exprs: Vec<Expr>) -> Self {
        Self::new(StmtKind::Print { exprs })
    }

    pub fn expr(expr: Expr) -> Self {
        Self::new(StmtKind::Expr { expr })
    }

    pub fn if_else(test: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Self {
        Self::new(StmtKind::If {
            test,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
        })
    }

    /// Build a switch; label conflicts are reported here, before it can run
    pub fn switch(index: Expr, cases: Vec<Case>) -> Result<Self, DefinitionError> {
        Ok(Self::new(StmtKind::Switch(SwitchStmt::new(index, cases)?)))
    }

    pub fn add(target: Expr) -> Self {
        Self::new(StmtKind::Add { target })
    }

    pub fn delete(target: Expr) -> Self {
        Self::new(StmtKind::Delete { target })
    }

    pub fn event(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(StmtKind::Event {
            name: name.into(),
            args,
        })
    }

    pub fn while_loop(test: Expr, body: Stmt) -> Self {
        Self::new(StmtKind::While {
            test,
            body: Box::new(body),
        })
    }

    pub fn for_loop(vars: Vec<String>, iterable: Expr, body: Stmt) -> Self {
        Self::new(StmtKind::For {
            vars,
            iterable,
            body: Box::new(body),
        })
    }

    pub fn next() -> Self {
        Self::new(StmtKind::Next)
    }

    pub fn break_() -> Self {
        Self::new(StmtKind::Break)
    }

    pub fn fallthrough() -> Self {
        Self::new(StmtKind::Fallthrough)
    }

    pub fn return_(value: Option<Expr>) -> Self {
        Self::new(StmtKind::Return { value })
    }

    pub fn list(stmts: Vec<Stmt>) -> Self {
        Self::new(StmtKind::List { stmts })
    }

    pub fn event_body(stmts: Vec<Stmt>) -> Self {
        Self::new(StmtKind::EventBodyList { stmts })
    }

    pub fn init(decls: Vec<InitDecl>) -> Self {
        Self::new(StmtKind::Init { decls })
    }

    pub fn null() -> Self {
        Self::new(StmtKind::Null)
    }

    pub fn when(clause: WhenClause, mode: WhenMode) -> Self {
        Self::new(StmtKind::When {
            clause: Rc::new(clause),
            mode,
        })
    }

    /* ===================== Checked Access ===================== */

    fn mismatch(&self, op: &'static str, expected: StmtTag) -> TagMismatch {
        TagMismatch {
            op,
            expected,
            found: self.tag(),
        }
    }

    pub fn as_list(&self) -> Result<&[Stmt], TagMismatch> {
        match &self.kind {
            StmtKind::List { stmts } => Ok(stmts),
            _ => Err(self.mismatch("as_list", StmtTag::List)),
        }
    }

    pub fn as_event_body(&self) -> Result<&[Stmt], TagMismatch> {
        match &self.kind {
            StmtKind::EventBodyList { stmts } => Ok(stmts),
            _ => Err(self.mismatch("as_event_body", StmtTag::EventBodyList)),
        }
    }

    /// Loop variables, iterated expression and body of a `for`
    pub fn as_for(&self) -> Result<(&[String], &Expr, &Stmt), TagMismatch> {
        match &self.kind {
            StmtKind::For {
                vars,
                iterable,
                body,
            } => Ok((vars, iterable, body)),
            _ => Err(self.mismatch("as_for", StmtTag::For)),
        }
    }

    pub fn as_switch(&self) -> Result<&SwitchStmt, TagMismatch> {
        match &self.kind {
            StmtKind::Switch(switch) => Ok(switch),
            _ => Err(self.mismatch("as_switch", StmtTag::Switch)),
        }
    }

    pub fn as_when(&self) -> Result<(&WhenClause, WhenMode), TagMismatch> {
        match &self.kind {
            StmtKind::When { clause, mode } => Ok((clause, *mode)),
            _ => Err(self.mismatch("as_when", StmtTag::When)),
        }
    }

    /* ===================== Analysis ===================== */

    /// True if executing this statement has no side effects
    pub fn is_pure(&self) -> bool {
        match &self.kind {
            StmtKind::Expr { expr } => expr.is_pure(),
            StmtKind::If {
                test,
                then_branch,
                else_branch,
            } => {
                test.is_pure()
                    && then_branch.is_pure()
                    && else_branch.as_ref().map_or(true, |s| s.is_pure())
            }
            StmtKind::Switch(switch) => switch.is_pure(),
            StmtKind::While { test, body } => test.is_pure() && body.is_pure(),
            StmtKind::For { iterable, body, .. } => iterable.is_pure() && body.is_pure(),
            StmtKind::Next | StmtKind::Break | StmtKind::Fallthrough | StmtKind::Null => true,
            StmtKind::Return { value } => value.as_ref().map_or(true, Expr::is_pure),
            StmtKind::List { stmts } | StmtKind::EventBodyList { stmts } => {
                stmts.iter().all(Stmt::is_pure)
            }
            StmtKind::When { clause, .. } => {
                clause.cond.is_pure()
                    && clause.body.is_pure()
                    && clause.timeout_body.as_ref().map_or(true, Stmt::is_pure)
            }
            StmtKind::Print { .. }
            | StmtKind::Add { .. }
            | StmtKind::Delete { .. }
            | StmtKind::Event { .. }
            | StmtKind::Init { .. } => false,
        }
    }

    /// True if this subtree contains a `when`, i.e. executing it may leave
    /// work suspended in the scheduler. Computed on first query and cached.
    pub fn may_suspend(&self) -> bool {
        match self.may_suspend.get() {
            AsyncFlag::Yes => return true,
            AsyncFlag::No => return false,
            // re-entered while computing this node
            AsyncFlag::Pending => return false,
            AsyncFlag::Unknown => {}
        }

        self.may_suspend.set(AsyncFlag::Pending);
        let result = matches!(self.kind, StmtKind::When { .. })
            || self.child_stmts().into_iter().any(Stmt::may_suspend);
        self.may_suspend
            .set(if result { AsyncFlag::Yes } else { AsyncFlag::No });
        result
    }

    fn child_stmts(&self) -> Vec<&Stmt> {
        self.children()
            .into_iter()
            .filter_map(|node| match node {
                Node::Stmt(stmt) => Some(stmt),
                Node::Expr(_) => None,
            })
            .collect()
    }
}
