//! Runtime value types

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Runtime value type
///
/// Sets and tables keep their members ordered by content hash, which gives
/// them a stable iteration order and lets the derived equality ignore
/// insertion order. Build them through [`Val::set`] / [`Val::table`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Val {
    Bool(bool),
    Count(u64),
    Int(i64),
    Double(#[serde(with = "float_repr")] f64),
    Str(String),
    /// Duration in seconds
    Interval(#[serde(with = "float_repr")] f64),
    /// Composite value, used for multi-part indices
    Tuple(Vec<Val>),
    Set(Vec<Val>),
    Table(Vec<(Val, Val)>),
    Vector(Vec<Val>),
    /// Eventual result of a `return when` that is still waiting
    Pending(Uuid),
}

/// Numeric value shared by count, int and double
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Whole(i128),
    Fraction(f64),
}

// doubles in [-2^63, 2^64) may equal an int or a count
const WHOLE_MIN: f64 = -9_223_372_036_854_775_808.0;
const WHOLE_END: f64 = 18_446_744_073_709_551_616.0;

impl Number {
    fn of_double(x: f64) -> Self {
        if x.fract() == 0.0 && (WHOLE_MIN..WHOLE_END).contains(&x) {
            Number::Whole(x as i128)
        } else {
            Number::Fraction(x)
        }
    }
}

/// Content hash of a value; equal values hash equal and distinct values
/// are separated by SHA-256 over a type-tagged canonical encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl Val {
    pub fn str(s: impl Into<String>) -> Self {
        Val::Str(s.into())
    }

    /// Build a set, dropping duplicates
    pub fn set(members: impl IntoIterator<Item = Val>) -> Self {
        let mut set = Val::Set(Vec::new());
        for member in members {
            set.set_insert(member);
        }
        set
    }

    /// Build a table; later entries overwrite earlier ones with an equal key
    pub fn table(entries: impl IntoIterator<Item = (Val, Val)>) -> Self {
        let mut table = Val::Table(Vec::new());
        for (key, value) in entries {
            table.table_insert(key, value);
        }
        table
    }

    /// Type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Bool(_) => "bool",
            Val::Count(_) => "count",
            Val::Int(_) => "int",
            Val::Double(_) => "double",
            Val::Str(_) => "string",
            Val::Interval(_) => "interval",
            Val::Tuple(_) => "tuple",
            Val::Set(_) => "set",
            Val::Table(_) => "table",
            Val::Vector(_) => "vector",
            Val::Pending(_) => "pending",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Val::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Interval (or plain number) as seconds
    pub fn as_seconds(&self) -> Option<f64> {
        match self {
            Val::Interval(secs) | Val::Double(secs) => Some(*secs),
            Val::Count(n) => Some(*n as f64),
            Val::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Count, int and double as one comparable number
    ///
    /// Integral doubles within the integer range collapse onto the integer
    /// they equal, so `1`, `+1` and `1.0` compare and hash alike.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Val::Count(n) => Some(Number::Whole(i128::from(*n))),
            Val::Int(n) => Some(Number::Whole(i128::from(*n))),
            Val::Double(x) => Some(Number::of_double(*x)),
            _ => None,
        }
    }

    /// Language-level equality, consistent with [`Val::content_hash`]
    ///
    /// Numbers compare across count, int and double; tuples compare
    /// element-wise under the same rule. Everything else is structural.
    pub fn loose_eq(&self, other: &Val) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a == b;
        }
        match (self, other) {
            (Val::Tuple(a), Val::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            _ => self == other,
        }
    }

    pub fn content_hash(&self) -> ContentHash {
        let mut hasher = Sha256::new();
        self.write_canonical(&mut hasher);
        ContentHash(hasher.finalize().into())
    }

    fn write_canonical(&self, hasher: &mut Sha256) {
        match self {
            Val::Bool(b) => {
                hasher.update([0u8, *b as u8]);
            }
            Val::Count(n) => write_number(hasher, Number::Whole(i128::from(*n))),
            Val::Int(n) => write_number(hasher, Number::Whole(i128::from(*n))),
            Val::Double(x) => write_number(hasher, Number::of_double(*x)),
            Val::Str(s) => {
                hasher.update([4u8]);
                hasher.update((s.len() as u64).to_le_bytes());
                hasher.update(s.as_bytes());
            }
            Val::Interval(x) => {
                hasher.update([5u8]);
                hasher.update(canonical_float(*x).to_le_bytes());
            }
            Val::Tuple(items) => {
                hasher.update([6u8]);
                write_seq(hasher, items);
            }
            Val::Set(items) => {
                hasher.update([7u8]);
                write_seq(hasher, items);
            }
            Val::Table(entries) => {
                hasher.update([8u8]);
                hasher.update((entries.len() as u64).to_le_bytes());
                for (key, value) in entries {
                    key.write_canonical(hasher);
                    value.write_canonical(hasher);
                }
            }
            Val::Vector(items) => {
                hasher.update([9u8]);
                write_seq(hasher, items);
            }
            Val::Pending(id) => {
                hasher.update([10u8]);
                hasher.update(id.as_bytes());
            }
        }
    }

    /* ===================== Aggregate Mutation ===================== */

    /// Insert into a set; returns false when not a set
    pub fn set_insert(&mut self, member: Val) -> bool {
        let Val::Set(members) = self else {
            return false;
        };
        let hash = member.content_hash();
        if let Err(pos) = members.binary_search_by_key(&hash, |m| m.content_hash()) {
            members.insert(pos, member);
        }
        true
    }

    pub fn table_insert(&mut self, key: Val, value: Val) -> bool {
        let Val::Table(entries) = self else {
            return false;
        };
        let hash = key.content_hash();
        match entries.binary_search_by_key(&hash, |(k, _)| k.content_hash()) {
            Ok(pos) => entries[pos].1 = value,
            Err(pos) => entries.insert(pos, (key, value)),
        }
        true
    }

    /// Remove a set member or table key; returns whether the value was
    /// a set/table at all (absent members are not an error)
    pub fn remove_member(&mut self, key: &Val) -> bool {
        let hash = key.content_hash();
        match self {
            Val::Set(members) => {
                members.retain(|m| m.content_hash() != hash);
                true
            }
            Val::Table(entries) => {
                entries.retain(|(k, _)| k.content_hash() != hash);
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, key: &Val) -> Option<bool> {
        let hash = key.content_hash();
        match self {
            Val::Set(members) => Some(members.iter().any(|m| m.content_hash() == hash)),
            Val::Table(entries) => Some(entries.iter().any(|(k, _)| k.content_hash() == hash)),
            _ => None,
        }
    }

    pub fn table_get(&self, key: &Val) -> Option<&Val> {
        let Val::Table(entries) = self else {
            return None;
        };
        let hash = key.content_hash();
        entries
            .iter()
            .find(|(k, _)| k.content_hash() == hash)
            .map(|(_, v)| v)
    }
}

fn write_number(hasher: &mut Sha256, number: Number) {
    match number {
        Number::Whole(n) => {
            hasher.update([1u8]);
            hasher.update(n.to_le_bytes());
        }
        Number::Fraction(x) => {
            hasher.update([3u8]);
            hasher.update(canonical_float(x).to_le_bytes());
        }
    }
}

fn write_seq(hasher: &mut Sha256, items: &[Val]) {
    hasher.update((items.len() as u64).to_le_bytes());
    for item in items {
        item.write_canonical(hasher);
    }
}

// -0.0 == 0.0, so they must hash alike
fn canonical_float(x: f64) -> u64 {
    if x == 0.0 {
        0.0f64.to_bits()
    } else {
        x.to_bits()
    }
}

/// JSON has no NaN or infinity; those travel as `"NaN"`, `"inf"`, `"-inf"`
mod float_repr {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(x: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if x.is_finite() {
            serializer.serialize_f64(*x)
        } else if x.is_nan() {
            serializer.serialize_str("NaN")
        } else if *x > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(FloatVisitor)
    }

    struct FloatVisitor;

    impl<'de> Visitor<'de> for FloatVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number, \"NaN\", \"inf\" or \"-inf\"")
        }

        fn visit_f64<E: de::Error>(self, x: f64) -> Result<f64, E> {
            Ok(x)
        }

        fn visit_u64<E: de::Error>(self, n: u64) -> Result<f64, E> {
            Ok(n as f64)
        }

        fn visit_i64<E: de::Error>(self, n: i64) -> Result<f64, E> {
            Ok(n as f64)
        }

        fn visit_str<E: de::Error>(self, s: &str) -> Result<f64, E> {
            match s {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Bool(true) => write!(f, "T"),
            Val::Bool(false) => write!(f, "F"),
            Val::Count(n) => write!(f, "{}", n),
            Val::Int(n) => write!(f, "{}", n),
            Val::Double(x) => write!(f, "{}", x),
            Val::Str(s) => write!(f, "{}", s),
            Val::Interval(secs) => write!(f, "{:.1} secs", secs),
            Val::Tuple(items) | Val::Vector(items) => {
                write!(f, "[")?;
                write_joined(f, items)?;
                write!(f, "]")
            }
            Val::Set(items) => {
                write!(f, "{{")?;
                write_joined(f, items)?;
                write!(f, "}}")
            }
            Val::Table(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "[{}] = {}", key, value)?;
                }
                write!(f, "}}")
            }
            Val::Pending(id) => write!(f, "<pending {}>", id),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Val]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_separates_types() {
        assert_ne!(Val::Double(5.0).content_hash(), Val::Interval(5.0).content_hash());
        assert_ne!(Val::Count(1).content_hash(), Val::str("1").content_hash());
        assert_eq!(Val::Double(0.0).content_hash(), Val::Double(-0.0).content_hash());
    }

    #[test]
    fn test_numbers_hash_alike_when_equal() {
        let one = [Val::Count(1), Val::Int(1), Val::Double(1.0)];
        for a in &one {
            for b in &one {
                assert!(a.loose_eq(b));
                assert_eq!(a.content_hash(), b.content_hash());
            }
        }

        assert!(!Val::Int(-1).loose_eq(&Val::Count(u64::MAX)));
        assert_ne!(Val::Int(-1).content_hash(), Val::Count(u64::MAX).content_hash());
        assert!(!Val::Double(0.5).loose_eq(&Val::Count(0)));
        assert_ne!(Val::Double(0.5).content_hash(), Val::Count(0).content_hash());

        // 2^53 + 1 has no exact double
        let big = Val::Count((1u64 << 53) + 1);
        assert!(!big.loose_eq(&Val::Double((1u64 << 53) as f64)));
        assert_ne!(big.content_hash(), Val::Double((1u64 << 53) as f64).content_hash());
    }

    #[test]
    fn test_tuples_compare_numbers_loosely() {
        let a = Val::Tuple(vec![Val::Count(80), Val::str("tcp")]);
        let b = Val::Tuple(vec![Val::Int(80), Val::str("tcp")]);
        assert!(a.loose_eq(&b));
        assert_eq!(a.content_hash(), b.content_hash());
        assert!(!Val::Double(f64::NAN).loose_eq(&Val::Double(f64::NAN)));
    }

    #[test]
    fn test_set_merges_equal_numbers() {
        let set = Val::set([Val::Count(7), Val::Int(7), Val::Double(7.0)]);
        match &set {
            Val::Set(members) => assert_eq!(members, &vec![Val::Count(7)]),
            other => panic!("expected set, got {:?}", other),
        }
        assert_eq!(set.contains(&Val::Int(7)), Some(true));
    }

    #[test]
    fn test_content_hash_tuples() {
        let a = Val::Tuple(vec![Val::str("ab"), Val::str("c")]);
        let b = Val::Tuple(vec![Val::str("a"), Val::str("bc")]);
        assert_ne!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash(), a.clone().content_hash());
    }

    #[test]
    fn test_set_ignores_insertion_order() {
        let a = Val::set([Val::Count(1), Val::Count(2), Val::Count(3)]);
        let b = Val::set([Val::Count(3), Val::Count(1), Val::Count(2), Val::Count(1)]);
        assert_eq!(a, b);
        match &a {
            Val::Set(members) => assert_eq!(members.len(), 3),
            other => panic!("expected set, got {:?}", other),
        }
    }

    #[test]
    fn test_table_insert_overwrites() {
        let mut t = Val::table([(Val::str("a"), Val::Count(1))]);
        t.table_insert(Val::str("a"), Val::Count(2));
        assert_eq!(t.table_get(&Val::str("a")), Some(&Val::Count(2)));
        assert!(t.remove_member(&Val::str("a")));
        assert_eq!(t.contains(&Val::str("a")), Some(false));
    }

    #[test]
    fn test_display() {
        assert_eq!(Val::Bool(true).to_string(), "T");
        assert_eq!(Val::Interval(5.0).to_string(), "5.0 secs");
        assert_eq!(
            Val::Tuple(vec![Val::Count(1), Val::str("x")]).to_string(),
            "[1, x]"
        );
    }
}
