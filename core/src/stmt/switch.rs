//! `switch` statements and their content-hash dispatch index

use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::flow::{Flow, Outcome};
use super::Stmt;
use crate::errors::{AtSpan, DefinitionError, ExecError};
use crate::expr::Expr;
use crate::frame::Frame;
use crate::types::{ContentHash, Span, Val};

/// One arm of a switch; no labels means `default`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    labels: Vec<Expr>,
    body: Stmt,
}

impl Case {
    pub fn new(labels: Vec<Expr>, body: Stmt) -> Self {
        Self { labels, body }
    }

    pub fn default_case(body: Stmt) -> Self {
        Self {
            labels: Vec::new(),
            body,
        }
    }

    pub fn labels(&self) -> &[Expr] {
        &self.labels
    }

    pub fn body(&self) -> &Stmt {
        &self.body
    }

    pub fn is_default(&self) -> bool {
        self.labels.is_empty()
    }
}

/* ===================== Dispatch Index ===================== */

/// Map from label content hash to case position, plus the default case
///
/// Numerically equal labels (`1`, `+1`, `1.0`) share a hash, so they
/// collide here just as they compare equal with `==`.
#[derive(Debug, Clone, Default)]
pub struct DispatchIndex {
    labels: HashMap<ContentHash, usize>,
    default_case: Option<usize>,
}

impl DispatchIndex {
    pub fn build(cases: &[Case]) -> Result<Self, DefinitionError> {
        let mut index = DispatchIndex::default();

        for (position, case) in cases.iter().enumerate() {
            if case.is_default() {
                if let Some(first) = index.default_case {
                    return Err(DefinitionError::MultipleDefaults {
                        first,
                        second: position,
                    });
                }
                index.default_case = Some(position);
                continue;
            }

            for label in &case.labels {
                let value = label
                    .as_const()
                    .ok_or_else(|| DefinitionError::NonConstantLabel {
                        label: label.to_string(),
                    })?;
                match index.labels.entry(value.content_hash()) {
                    Entry::Occupied(slot) if *slot.get() != position => {
                        return Err(DefinitionError::DuplicateLabel {
                            label: label.to_string(),
                            first: *slot.get(),
                            second: position,
                        });
                    }
                    // repeated within the same case
                    Entry::Occupied(_) => {}
                    Entry::Vacant(slot) => {
                        slot.insert(position);
                    }
                }
            }
        }

        Ok(index)
    }

    /// Case selected for `value`: its labelled case, else the default
    pub fn find(&self, value: &Val) -> Option<usize> {
        self.labels
            .get(&value.content_hash())
            .copied()
            .or(self.default_case)
    }

    pub fn default_case(&self) -> Option<usize> {
        self.default_case
    }

    /// Number of distinct labels
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/* ===================== Switch ===================== */

#[derive(Deserialize)]
struct SwitchRepr {
    index: Expr,
    cases: Vec<Case>,
}

/// The dispatch index is derived from the cases, so it is rebuilt (and
/// re-validated) on decode instead of being serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SwitchRepr")]
pub struct SwitchStmt {
    index: Expr,
    cases: Vec<Case>,
    #[serde(skip)]
    dispatch: DispatchIndex,
}

impl TryFrom<SwitchRepr> for SwitchStmt {
    type Error = DefinitionError;

    fn try_from(repr: SwitchRepr) -> Result<Self, Self::Error> {
        SwitchStmt::new(repr.index, repr.cases)
    }
}

impl SwitchStmt {
    pub fn new(index: Expr, cases: Vec<Case>) -> Result<Self, DefinitionError> {
        let dispatch = DispatchIndex::build(&cases)?;
        Ok(Self {
            index,
            cases,
            dispatch,
        })
    }

    pub fn index(&self) -> &Expr {
        &self.index
    }

    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    pub fn dispatch(&self) -> &DispatchIndex {
        &self.dispatch
    }

    pub fn is_pure(&self) -> bool {
        self.index.is_pure() && self.cases.iter().all(|case| case.body.is_pure())
    }

    pub(crate) fn exec(&self, frame: &mut Frame, span: Span) -> Result<Outcome, ExecError> {
        let value = self.index.eval(frame).at(span)?;
        let Some(start) = self.dispatch.find(&value) else {
            return Ok(Outcome::normal());
        };

        let mut outcome = Outcome::normal();
        for case in &self.cases[start..] {
            outcome = case.body.exec(frame)?;
            if outcome.flow != Flow::Fallthrough {
                break;
            }
        }

        // break ends the switch; fallthrough out of the last case has nowhere to go
        if matches!(outcome.flow, Flow::Break | Flow::Fallthrough) {
            outcome.flow = Flow::Normal;
        }
        Ok(outcome)
    }
}
