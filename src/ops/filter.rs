//! `Filter`: an AND-combined list of column/literal or column/column
//! predicates (spec.md §4.1 Filter), grounded on
//! `pelton::dataflow::ops::filter.{h,cc}` (there: a flat vector of
//! `FilterOperation`s, each comparing a column against either a literal
//! or another column, evaluated in order and short-circuiting on the
//! first failing comparison).

use crate::record::Record;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone)]
pub enum FilterOp {
    ColumnLiteral {
        column: usize,
        op: CompareOp,
        literal: Value,
    },
    ColumnColumn {
        left: usize,
        op: CompareOp,
        right: usize,
    },
    IsNull {
        column: usize,
    },
    IsNotNull {
        column: usize,
    },
    /// Substring match with `%` as a boundary wildcard, pinned per
    /// SPEC_FULL.md §4.1: `%x%` = contains, `x%` = prefix, `%x` = suffix,
    /// `x` (no `%`) = exact equality.
    Like {
        column: usize,
        pattern: String,
    },
}

fn like_matches(haystack: &str, pattern: &str) -> bool {
    match (pattern.starts_with('%'), pattern.ends_with('%')) {
        (true, true) if pattern.len() >= 2 => haystack.contains(&pattern[1..pattern.len() - 1]),
        (true, false) => haystack.ends_with(&pattern[1..]),
        (false, true) => haystack.starts_with(&pattern[..pattern.len() - 1]),
        (true, true) => true, // pattern == "%"
        (false, false) => haystack == pattern,
    }
}

fn compare(op: CompareOp, a: &Value, b: &Value) -> bool {
    assert_eq!(
        a.data_type(),
        b.data_type(),
        "TypeMismatch: filter compared {a:?} against {b:?}"
    );
    match op {
        CompareOp::Eq => a == b,
        CompareOp::Ne => a != b,
        CompareOp::Lt => a < b,
        CompareOp::Le => a <= b,
        CompareOp::Gt => a > b,
        CompareOp::Ge => a >= b,
    }
}

#[derive(Clone, Default)]
pub struct FilterOperator {
    ops: Vec<FilterOp>,
}

impl FilterOperator {
    pub fn new(ops: Vec<FilterOp>) -> Self {
        FilterOperator { ops }
    }

    pub fn clone_fresh(&self) -> Self {
        self.clone()
    }

    fn accept(&self, record: &Record) -> bool {
        self.ops.iter().all(|op| match op {
            FilterOp::ColumnLiteral { column, op, literal } => {
                let value = record.value(*column);
                if value.is_null() || literal.is_null() {
                    false
                } else {
                    compare(*op, value, literal)
                }
            }
            FilterOp::ColumnColumn { left, op, right } => {
                let l = record.value(*left);
                let r = record.value(*right);
                if l.is_null() || r.is_null() {
                    false
                } else {
                    compare(*op, l, r)
                }
            }
            FilterOp::IsNull { column } => record.value(*column).is_null(),
            FilterOp::IsNotNull { column } => !record.value(*column).is_null(),
            FilterOp::Like { column, pattern } => {
                let value = record.value(*column);
                if value.is_null() {
                    false
                } else {
                    like_matches(value.as_text(), pattern)
                }
            }
        })
    }

    pub fn process(&mut self, records: Vec<Record>) -> Vec<Record> {
        records.into_iter().filter(|r| self.accept(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, SchemaRef};

    fn schema() -> SchemaRef {
        SchemaRef::new(
            vec!["id".into(), "name".into()],
            vec![DataType::UInt, DataType::Text],
            vec![0],
        )
    }

    fn rec(id: u64, name: &str) -> Record {
        Record::new(schema(), vec![Value::UInt(id), Value::Text(name.into())], true)
    }

    #[test]
    fn ge_filters_as_documented_in_s2() {
        let mut op = FilterOperator::new(vec![FilterOp::ColumnLiteral {
            column: 0,
            op: CompareOp::Ge,
            literal: Value::UInt(5),
        }]);
        let records: Vec<Record> = (0..10).map(|i| rec(i, "x")).collect();
        let out = op.process(records);
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|r| r.value(0).as_uint() >= 5));
    }

    #[test]
    fn like_prefix_suffix_contains_and_exact() {
        assert!(like_matches("hello world", "%world"));
        assert!(like_matches("hello world", "hello%"));
        assert!(like_matches("hello world", "%lo wo%"));
        assert!(like_matches("hello world", "hello world"));
        assert!(!like_matches("hello world", "world%"));
    }

    #[test]
    fn is_null_only_matches_null() {
        let mut op = FilterOperator::new(vec![FilterOp::IsNull { column: 1 }]);
        let s = SchemaRef::new(
            vec!["id".into(), "name".into()],
            vec![DataType::UInt, DataType::Text],
            vec![0],
        );
        let records = vec![
            Record::new(s.clone(), vec![Value::UInt(1), Value::Null], true),
            Record::new(s, vec![Value::UInt(2), Value::Text("x".into())], true),
        ];
        let out = op.process(records);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value(0).as_uint(), 1);
    }

    #[test]
    #[should_panic(expected = "TypeMismatch")]
    fn comparing_mismatched_types_panics() {
        let mut op = FilterOperator::new(vec![FilterOp::ColumnLiteral {
            column: 0,
            op: CompareOp::Eq,
            literal: Value::Text("nope".into()),
        }]);
        op.process(vec![rec(1, "x")]);
    }
}
