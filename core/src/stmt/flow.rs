//! Control flow produced by statement execution

use crate::types::Val;

/// Control transfer requested by an executed statement
///
/// Consumed by the immediate structural parent: loops consume `Break` and
/// `Next`, switches consume `Break` and trailing `Fallthrough`, and the
/// invocation boundary consumes `Return`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    #[default]
    Normal,
    /// `next`: end the current loop iteration
    Next,
    Break,
    Fallthrough,
    Return,
}

/// Result of executing one statement: an optional value plus its flow
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Outcome {
    pub value: Option<Val>,
    pub flow: Flow,
}

impl Outcome {
    pub fn normal() -> Self {
        Self::default()
    }

    pub fn value(value: Val) -> Self {
        Self {
            value: Some(value),
            flow: Flow::Normal,
        }
    }

    pub fn flow(flow: Flow) -> Self {
        Self { value: None, flow }
    }

    pub fn returned(value: Option<Val>) -> Self {
        Self {
            value,
            flow: Flow::Return,
        }
    }

    pub fn is_normal(&self) -> bool {
        self.flow == Flow::Normal
    }
}
