//! `Record`: an ordered tuple of `Value`s bound to a schema, tagged with
//! insert/delete polarity and a timestamp.
//!
//! Grounded on `pelton::dataflow::Record` (examples/original_source/pelton/
//! dataflow/record.h): "No copy constructor... a record fans out to
//! multiple children [so] an explicit Copy is required" (spec.md §3). We
//! honor that by deliberately not implementing `Clone` - call sites that
//! need to fan a record out to several children must call
//! `Record::duplicate` explicitly, the same way the original requires a
//! named `Copy()`.

use crate::key::Key;
use crate::schema::SchemaRef;
use crate::value::Value;

#[derive(Debug)]
pub struct Record {
    schema: SchemaRef,
    values: Vec<Value>,
    positive: bool,
    timestamp: i64,
}

impl Record {
    pub fn new(schema: SchemaRef, values: Vec<Value>, positive: bool) -> Self {
        assert_eq!(
            values.len(),
            schema.size(),
            "record arity does not match schema"
        );
        Record {
            schema,
            values,
            positive,
            timestamp: 0,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn negate(mut self) -> Self {
        self.positive = !self.positive;
        self
    }

    /// Explicit deep copy - the "Copy" spec.md §3 requires at every
    /// fan-out point. Intentionally not named `clone` so call sites read
    /// as a deliberate decision, not an accidental one picked up by
    /// `#[derive(Clone)]` elsewhere in the pipeline.
    pub fn duplicate(&self) -> Self {
        Record {
            schema: self.schema.clone(),
            values: self.values.clone(),
            positive: self.positive,
            timestamp: self.timestamp,
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, index: usize) -> &Value {
        &self.values[index]
    }

    pub fn is_positive(&self) -> bool {
        self.positive
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Project onto `cols`, building a `Key` (used both for matview/join
    /// grouping and for partition hashing).
    pub fn project_key(&self, cols: &[usize]) -> Key {
        Key::new(cols.iter().map(|&i| self.values[i].clone()).collect())
    }

    /// The record's primary key, per the schema's declared key columns -
    /// mirrors `pelton::dataflow::Record::GetKey`, generalized to
    /// composite keys (the original asserts exactly one key column; this
    /// crate's `Schema` allows a composite primary key, so we project all
    /// of them).
    pub fn primary_key(&self) -> Key {
        self.project_key(self.schema.keys())
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.schema.ptr_eq(&other.schema)
            && self.positive == other.positive
            && self.values == other.values
    }
}
impl Eq for Record {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DataType;

    fn schema() -> SchemaRef {
        SchemaRef::new(
            vec!["id".into(), "name".into()],
            vec![DataType::UInt, DataType::Text],
            vec![0],
        )
    }

    #[test]
    fn duplicate_produces_an_independent_equal_copy() {
        let s = schema();
        let r = Record::new(s, vec![Value::UInt(1), Value::Text("a".into())], true);
        let d = r.duplicate();
        assert_eq!(r, d);
    }

    #[test]
    fn negate_flips_polarity_only() {
        let s = schema();
        let r = Record::new(s, vec![Value::UInt(1), Value::Text("a".into())], true).negate();
        assert!(!r.is_positive());
    }

    #[test]
    fn primary_key_projects_declared_key_columns() {
        let s = schema();
        let r = Record::new(s, vec![Value::UInt(7), Value::Text("a".into())], true);
        assert_eq!(r.primary_key(), Key::new(vec![Value::UInt(7)]));
    }

    #[test]
    #[should_panic(expected = "arity")]
    fn rejects_mismatched_arity() {
        Record::new(schema(), vec![Value::UInt(1)], true);
    }
}
