//! Error types for the statement engine
//!
//! Script-level failures (bad policy code, bad data) carry the location of
//! the statement that raised them. Internal failures are kept in their own
//! variants so they are never reported as if the script were wrong.

use thiserror::Error;

use crate::stmt::StmtTag;
use crate::types::Span;

/// Failure raised by the expression evaluator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unknown identifier '{0}'")]
    UnknownName(String),

    #[error("'{0}' used before being initialized")]
    Unset(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("{function}(): {message}")]
    Builtin { function: String, message: String },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("no element {index} in {container}")]
    MissingElement { container: String, index: String },
}

/// Failure raised while executing a statement
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecError {
    /// The expression evaluator failed; the error is passed through as-is
    #[error("{span}: {source}")]
    Eval { span: Span, source: EvalError },

    /// The statement itself cannot proceed with the values it was given
    #[error("{span}: {message}")]
    Script { span: Span, message: String },

    /// Engine invariant violated; not the policy author's fault
    #[error("internal error: {0}")]
    Internal(String),
}

impl ExecError {
    pub fn script(span: Span, message: impl Into<String>) -> Self {
        ExecError::Script {
            span,
            message: message.into(),
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, ExecError::Internal(_))
    }

    /// Location of the offending statement, if this is a script error
    pub fn span(&self) -> Option<Span> {
        match self {
            ExecError::Eval { span, .. } | ExecError::Script { span, .. } => Some(*span),
            ExecError::Internal(_) => None,
        }
    }
}

/// Attach a statement location to evaluator failures
pub(crate) trait AtSpan<T> {
    fn at(self, span: Span) -> Result<T, ExecError>;
}

impl<T> AtSpan<T> for Result<T, EvalError> {
    fn at(self, span: Span) -> Result<T, ExecError> {
        self.map_err(|source| ExecError::Eval { span, source })
    }
}

/// Conflicting definition detected while building a statement
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("duplicate case label {label} (cases {first} and {second})")]
    DuplicateLabel {
        label: String,
        first: usize,
        second: usize,
    },

    #[error("multiple default labels (cases {first} and {second})")]
    MultipleDefaults { first: usize, second: usize },

    #[error("case label {label} is not a constant")]
    NonConstantLabel { label: String },
}

/// Failure restoring a statement tree from its serialized form
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("malformed checkpoint: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported checkpoint format {found} (this build reads {expected})")]
    UnsupportedFormat { found: u32, expected: u32 },

    #[error("checkpoint tag mismatch: expected {expected}, found {found}")]
    TagMismatch { expected: StmtTag, found: String },
}

/// Checked downcast against the wrong statement kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{op}: expected {expected} statement, found {found}")]
pub struct TagMismatch {
    pub op: &'static str,
    pub expected: StmtTag,
    pub found: StmtTag,
}
