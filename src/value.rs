//! `Value`: the closed set of column types a `Record` can carry.
//!
//! Grounded on `pelton::dataflow::Value` (examples/original_source), with
//! `DateTime` added per spec.md's closed set. Unlike the C++ original
//! (a hand-rolled tagged union with manual destructors), this is a plain
//! Rust enum - the compiler handles drop glue for the owned `String`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::schema::DataType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    UInt(u64),
    Int(i64),
    Text(String),
    DateTime(NaiveDateTime),
    Null,
}

impl Value {
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::UInt(_) => Some(DataType::UInt),
            Value::Int(_) => Some(DataType::Int),
            Value::Text(_) => Some(DataType::Text),
            Value::DateTime(_) => Some(DataType::DateTime),
            Value::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_uint(&self) -> u64 {
        match self {
            Value::UInt(v) => *v,
            other => panic!("type mismatch: expected UInt, got {other:?}"),
        }
    }

    pub fn as_int(&self) -> i64 {
        match self {
            Value::Int(v) => *v,
            other => panic!("type mismatch: expected Int, got {other:?}"),
        }
    }

    pub fn as_text(&self) -> &str {
        match self {
            Value::Text(v) => v,
            other => panic!("type mismatch: expected Text, got {other:?}"),
        }
    }

    pub fn as_datetime(&self) -> NaiveDateTime {
        match self {
            Value::DateTime(v) => *v,
            other => panic!("type mismatch: expected DateTime, got {other:?}"),
        }
    }

    /// Integer view used by `Project`'s arithmetic expressions, which are
    /// integer-only per spec.md §4.1.
    pub fn as_i128(&self) -> i128 {
        match self {
            Value::UInt(v) => *v as i128,
            Value::Int(v) => *v as i128,
            other => panic!("arithmetic requires an integer operand, got {other:?}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::UInt(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
            Value::DateTime(v) => write!(f, "{v}"),
            Value::Null => write!(f, "NULL"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::UInt(a), Value::UInt(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Null, Value::Null) => Ordering::Equal,
            // Arbitrary but total and deterministic cross-type ordering,
            // needed only so mixed-type keys can still be sorted in tests.
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl Value {
    fn type_rank(&self) -> u8 {
        match self {
            Value::UInt(_) => 0,
            Value::Int(_) => 1,
            Value::Text(_) => 2,
            Value::DateTime(_) => 3,
            Value::Null => 4,
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::UInt(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Text(v) => v.hash(state),
            Value::DateTime(v) => v.hash(state),
            Value::Null => {}
        }
    }
}

/// Feeds `crc32fast` for deterministic partition hashing (see
/// `partitioning::partition_of`). Must not depend on process/allocator
/// state - only on the logical value.
pub(crate) fn hash_into(value: &Value, hasher: &mut crc32fast::Hasher) {
    match value {
        Value::UInt(v) => hasher.update(&v.to_le_bytes()),
        Value::Int(v) => hasher.update(&v.to_le_bytes()),
        Value::Text(v) => hasher.update(v.as_bytes()),
        Value::DateTime(v) => hasher.update(&v.and_utc().timestamp().to_le_bytes()),
        Value::Null => hasher.update(&[0xFF]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_type_sensitive() {
        assert_ne!(Value::UInt(1), Value::Int(1));
        assert_eq!(Value::Text("a".into()), Value::Text("a".into()));
    }

    #[test]
    fn null_only_equals_null() {
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::UInt(0));
    }

    #[test]
    #[should_panic(expected = "type mismatch")]
    fn as_uint_panics_on_wrong_type() {
        Value::Text("x".into()).as_uint();
    }
}
