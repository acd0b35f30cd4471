//! Expression evaluation
//!
//! Statements only see expressions through [`Expr::eval`], [`Expr::is_pure`]
//! and [`Expr::as_const`]. The expression language here is the small subset
//! statements need: literals, names, assignment, arithmetic/comparison,
//! host-function calls, indexing and aggregate constructors.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::EvalError;
use crate::frame::Frame;
use crate::types::Val;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    /// Membership in a set or table
    In,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::In => "in",
        }
    }
}

/// Expression AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Expr {
    Const {
        v: Val,
    },
    Name {
        name: String,
    },
    Assign {
        name: String,
        value: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not {
        operand: Box<Expr>,
    },
    Call {
        func: String,
        args: Vec<Expr>,
    },
    /// `base[i]` or `base[i, j]` (the latter indexes with a tuple)
    Index {
        base: Box<Expr>,
        indices: Vec<Expr>,
    },
    Tuple {
        elements: Vec<Expr>,
    },
    SetCtor {
        elements: Vec<Expr>,
    },
    TableCtor {
        entries: Vec<(Expr, Expr)>,
    },
    VectorCtor {
        elements: Vec<Expr>,
    },
}

impl Expr {
    pub fn constant(v: Val) -> Self {
        Expr::Const { v }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Expr::Name { name: name.into() }
    }

    pub fn assign(name: impl Into<String>, value: Expr) -> Self {
        Expr::Assign {
            name: name.into(),
            value: Box::new(value),
        }
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(func: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            func: func.into(),
            args,
        }
    }

    pub fn index(base: Expr, indices: Vec<Expr>) -> Self {
        Expr::Index {
            base: Box::new(base),
            indices,
        }
    }

    /// The literal value, if this is a constant
    pub fn as_const(&self) -> Option<&Val> {
        match self {
            Expr::Const { v } => Some(v),
            _ => None,
        }
    }

    /// True if evaluating this expression has no side effects
    pub fn is_pure(&self) -> bool {
        match self {
            Expr::Const { .. } | Expr::Name { .. } => true,
            Expr::Assign { .. } | Expr::Call { .. } => false,
            Expr::Binary { left, right, .. } => left.is_pure() && right.is_pure(),
            Expr::Not { operand } => operand.is_pure(),
            Expr::Index { base, indices } => base.is_pure() && indices.iter().all(Expr::is_pure),
            Expr::Tuple { elements }
            | Expr::SetCtor { elements }
            | Expr::VectorCtor { elements } => elements.iter().all(Expr::is_pure),
            Expr::TableCtor { entries } => entries.iter().all(|(k, v)| k.is_pure() && v.is_pure()),
        }
    }

    /// Evaluate against a binding context
    pub fn eval(&self, frame: &mut Frame) -> Result<Val, EvalError> {
        match self {
            Expr::Const { v } => Ok(v.clone()),

            Expr::Name { name } => frame.lookup(name),

            Expr::Assign { name, value } => {
                let v = value.eval(frame)?;
                frame.assign(name, v.clone());
                Ok(v)
            }

            Expr::Binary { op, left, right } => eval_binary(*op, left, right, frame),

            Expr::Not { operand } => match operand.eval(frame)? {
                Val::Bool(b) => Ok(Val::Bool(!b)),
                other => Err(EvalError::TypeMismatch(format!(
                    "'!' requires bool, got {}",
                    other.type_name()
                ))),
            },

            Expr::Call { func, args } => {
                let args = eval_all(args, frame)?;
                frame.call(func, &args)
            }

            Expr::Index { base, indices } => {
                let container = base.eval(frame)?;
                let key = eval_key(indices, frame)?;
                index_value(&container, &key)
            }

            Expr::Tuple { elements } => Ok(Val::Tuple(eval_all(elements, frame)?)),

            Expr::SetCtor { elements } => Ok(Val::set(eval_all(elements, frame)?)),

            Expr::VectorCtor { elements } => Ok(Val::Vector(eval_all(elements, frame)?)),

            Expr::TableCtor { entries } => {
                let mut pairs = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    pairs.push((key.eval(frame)?, value.eval(frame)?));
                }
                Ok(Val::table(pairs))
            }
        }
    }
}

/// Evaluate index expressions into a single key (tuple when composite)
pub(crate) fn eval_key(indices: &[Expr], frame: &mut Frame) -> Result<Val, EvalError> {
    let mut values = eval_all(indices, frame)?;
    if values.len() == 1 {
        Ok(values.remove(0))
    } else {
        Ok(Val::Tuple(values))
    }
}

fn eval_all(exprs: &[Expr], frame: &mut Frame) -> Result<Vec<Val>, EvalError> {
    exprs.iter().map(|e| e.eval(frame)).collect()
}

fn index_value(container: &Val, key: &Val) -> Result<Val, EvalError> {
    match container {
        Val::Table(_) => container
            .table_get(key)
            .cloned()
            .ok_or_else(|| EvalError::MissingElement {
                container: "table".to_string(),
                index: key.to_string(),
            }),
        Val::Vector(items) | Val::Tuple(items) => {
            let idx = match key {
                Val::Count(n) => *n as usize,
                Val::Int(n) if *n >= 0 => *n as usize,
                other => {
                    return Err(EvalError::TypeMismatch(format!(
                        "{} index must be a count, got {}",
                        container.type_name(),
                        other.type_name()
                    )))
                }
            };
            items
                .get(idx)
                .cloned()
                .ok_or_else(|| EvalError::MissingElement {
                    container: container.type_name().to_string(),
                    index: idx.to_string(),
                })
        }
        other => Err(EvalError::TypeMismatch(format!(
            "cannot index a {}",
            other.type_name()
        ))),
    }
}

/* ===================== Operators ===================== */

fn eval_binary(op: BinOp, left: &Expr, right: &Expr, frame: &mut Frame) -> Result<Val, EvalError> {
    // Logical operators short-circuit
    if matches!(op, BinOp::And | BinOp::Or) {
        let l = expect_bool(op, left.eval(frame)?)?;
        if (op == BinOp::And && !l) || (op == BinOp::Or && l) {
            return Ok(Val::Bool(l));
        }
        return Ok(Val::Bool(expect_bool(op, right.eval(frame)?)?));
    }

    let l = left.eval(frame)?;
    let r = right.eval(frame)?;

    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul => arith(op, &l, &r),
        BinOp::Eq => Ok(Val::Bool(l.loose_eq(&r))),
        BinOp::Ne => Ok(Val::Bool(!l.loose_eq(&r))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => compare(op, &l, &r),
        BinOp::In => r.contains(&l).map(Val::Bool).ok_or_else(|| {
            EvalError::TypeMismatch(format!("'in' requires a set or table, got {}", r.type_name()))
        }),
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

fn expect_bool(op: BinOp, v: Val) -> Result<bool, EvalError> {
    v.as_bool().ok_or_else(|| {
        EvalError::TypeMismatch(format!("'{}' requires bool, got {}", op.symbol(), v.type_name()))
    })
}

fn as_f64(v: &Val) -> Option<f64> {
    match v {
        Val::Count(n) => Some(*n as f64),
        Val::Int(n) => Some(*n as f64),
        Val::Double(x) => Some(*x),
        _ => None,
    }
}

fn arith(op: BinOp, l: &Val, r: &Val) -> Result<Val, EvalError> {
    let overflow = || EvalError::TypeMismatch(format!("arithmetic overflow in {} {} {}", l, op.symbol(), r));
    match (l, r) {
        (Val::Count(a), Val::Count(b)) => match op {
            BinOp::Add => a.checked_add(*b).map(Val::Count).ok_or_else(overflow),
            BinOp::Sub => a.checked_sub(*b).map(Val::Count).ok_or_else(overflow),
            _ => a.checked_mul(*b).map(Val::Count).ok_or_else(overflow),
        },
        (Val::Count(_) | Val::Int(_), Val::Count(_) | Val::Int(_)) => {
            let a = int_of(l).ok_or_else(overflow)?;
            let b = int_of(r).ok_or_else(overflow)?;
            match op {
                BinOp::Add => a.checked_add(b),
                BinOp::Sub => a.checked_sub(b),
                _ => a.checked_mul(b),
            }
            .map(Val::Int)
            .ok_or_else(overflow)
        }
        (Val::Interval(a), Val::Interval(b)) if op != BinOp::Mul => Ok(Val::Interval(match op {
            BinOp::Add => a + b,
            _ => a - b,
        })),
        (Val::Interval(a), n) | (n, Val::Interval(a)) if op == BinOp::Mul && as_f64(n).is_some() => {
            Ok(Val::Interval(a * as_f64(n).unwrap_or_default()))
        }
        (Val::Str(a), Val::Str(b)) if op == BinOp::Add => Ok(Val::Str(format!("{}{}", a, b))),
        _ => match (as_f64(l), as_f64(r)) {
            (Some(a), Some(b)) => Ok(Val::Double(match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                _ => a * b,
            })),
            _ => Err(EvalError::TypeMismatch(format!(
                "cannot apply '{}' to {} and {}",
                op.symbol(),
                l.type_name(),
                r.type_name()
            ))),
        },
    }
}

fn int_of(v: &Val) -> Option<i64> {
    match v {
        Val::Count(n) => i64::try_from(*n).ok(),
        Val::Int(n) => Some(*n),
        _ => None,
    }
}

fn compare(op: BinOp, l: &Val, r: &Val) -> Result<Val, EvalError> {
    let ordering = match (l, r) {
        (Val::Str(a), Val::Str(b)) => a.partial_cmp(b),
        (Val::Interval(a), Val::Interval(b)) => a.partial_cmp(b),
        (Val::Count(a), Val::Count(b)) => a.partial_cmp(b),
        (Val::Int(a), Val::Int(b)) => a.partial_cmp(b),
        _ => match (as_f64(l), as_f64(r)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => {
                return Err(EvalError::TypeMismatch(format!(
                    "cannot compare {} and {}",
                    l.type_name(),
                    r.type_name()
                )))
            }
        },
    };
    let Some(ordering) = ordering else {
        return Ok(Val::Bool(false));
    };
    Ok(Val::Bool(match op {
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    }))
}

/* ===================== Rendering ===================== */

struct Literal<'a>(&'a Val);

impl fmt::Display for Literal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Val::Str(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, exprs: &[Expr]) -> fmt::Result {
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", e)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const { v } => write!(f, "{}", Literal(v)),
            Expr::Name { name } => write!(f, "{}", name),
            Expr::Assign { name, value } => write!(f, "{} = {}", name, value),
            Expr::Binary { op, left, right } => {
                let wrap = |e: &Expr| matches!(e, Expr::Binary { .. } | Expr::Assign { .. });
                if wrap(left) {
                    write!(f, "({})", left)?;
                } else {
                    write!(f, "{}", left)?;
                }
                write!(f, " {} ", op.symbol())?;
                if wrap(right) {
                    write!(f, "({})", right)
                } else {
                    write!(f, "{}", right)
                }
            }
            Expr::Not { operand } => write!(f, "! {}", operand),
            Expr::Call { func, args } => {
                write!(f, "{}(", func)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expr::Index { base, indices } => {
                write!(f, "{}[", base)?;
                write_list(f, indices)?;
                write!(f, "]")
            }
            Expr::Tuple { elements } => {
                write!(f, "[")?;
                write_list(f, elements)?;
                write!(f, "]")
            }
            Expr::SetCtor { elements } => {
                write!(f, "set(")?;
                write_list(f, elements)?;
                write!(f, ")")
            }
            Expr::VectorCtor { elements } => {
                write!(f, "vector(")?;
                write_list(f, elements)?;
                write!(f, ")")
            }
            Expr::TableCtor { entries } => {
                write!(f, "table(")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "[{}] = {}", k, v)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Globals;

    fn frame() -> Frame {
        Frame::new(Globals::new().shared())
    }

    fn c(v: u64) -> Expr {
        Expr::constant(Val::Count(v))
    }

    #[test]
    fn test_arithmetic_and_comparison() {
        let mut f = frame();
        let sum = Expr::binary(BinOp::Add, c(2), c(3));
        assert_eq!(sum.eval(&mut f), Ok(Val::Count(5)));

        let lt = Expr::binary(BinOp::Lt, c(2), Expr::constant(Val::Double(2.5)));
        assert_eq!(lt.eval(&mut f), Ok(Val::Bool(true)));

        let eq = Expr::binary(BinOp::Eq, c(1), Expr::constant(Val::Int(1)));
        assert_eq!(eq.eval(&mut f), Ok(Val::Bool(true)));
    }

    #[test]
    fn test_count_underflow_is_error() {
        let mut f = frame();
        let diff = Expr::binary(BinOp::Sub, c(1), c(2));
        assert!(matches!(diff.eval(&mut f), Err(EvalError::TypeMismatch(_))));
    }

    #[test]
    fn test_short_circuit_skips_right_side() {
        let mut f = frame();
        // Right side would fail (unknown function) if evaluated
        let e = Expr::binary(
            BinOp::And,
            Expr::constant(Val::Bool(false)),
            Expr::call("missing", vec![]),
        );
        assert_eq!(e.eval(&mut f), Ok(Val::Bool(false)));
    }

    #[test]
    fn test_composite_index() {
        let mut f = frame();
        let table = Val::table([(
            Val::Tuple(vec![Val::str("10.0.0.1"), Val::Count(80)]),
            Val::str("web"),
        )]);
        f.declare("services", Some(table));
        let lookup = Expr::index(
            Expr::name("services"),
            vec![Expr::constant(Val::str("10.0.0.1")), c(80)],
        );
        assert_eq!(lookup.eval(&mut f), Ok(Val::str("web")));
    }

    #[test]
    fn test_purity() {
        assert!(Expr::binary(BinOp::Add, c(1), Expr::name("x")).is_pure());
        assert!(!Expr::assign("x", c(1)).is_pure());
        assert!(!Expr::call("f", vec![]).is_pure());
    }

    #[test]
    fn test_display() {
        let e = Expr::binary(
            BinOp::And,
            Expr::binary(BinOp::In, Expr::name("h"), Expr::name("hosts")),
            Expr::call("ready", vec![Expr::constant(Val::str("x"))]),
        );
        assert_eq!(e.to_string(), "(h in hosts) && ready(\"x\")");
    }
}
