//! `Input`: the graph root bound to one base table.
//!
//! Grounded on `pelton::dataflow::ops::input.{h,cc}`: validates every
//! incoming record's schema against the table's declared schema and
//! otherwise acts as identity (spec.md §4.1 Input).

use crate::record::Record;
use crate::schema::SchemaRef;

#[derive(Clone)]
pub struct InputOperator {
    table_name: String,
    schema: SchemaRef,
}

impl InputOperator {
    pub fn new(table_name: impl Into<String>, schema: SchemaRef) -> Self {
        InputOperator {
            table_name: table_name.into(),
            schema,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn output_schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn clone_fresh(&self) -> Self {
        self.clone()
    }

    /// Fatal per spec.md §7 `SchemaMismatch`: a record reaching an input
    /// whose schema differs from the declared one means the upstream
    /// delta stream is already corrupt, so this aborts rather than
    /// returning a `Result`.
    pub fn process(&mut self, records: Vec<Record>) -> Vec<Record> {
        for record in &records {
            assert!(
                record.schema().ptr_eq(&self.schema),
                "SchemaMismatch: record for input '{}' does not match its declared schema",
                self.table_name
            );
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DataType;
    use crate::value::Value;

    fn schema() -> SchemaRef {
        SchemaRef::new(vec!["id".into()], vec![DataType::UInt], vec![0])
    }

    #[test]
    fn passes_through_matching_records() {
        let s = schema();
        let mut op = InputOperator::new("t", s.clone());
        let records = vec![Record::new(s, vec![Value::UInt(1)], true)];
        let out = op.process(records);
        assert_eq!(out.len(), 1);
    }

    #[test]
    #[should_panic(expected = "SchemaMismatch")]
    fn rejects_records_with_a_different_schema() {
        let s = schema();
        let other = SchemaRef::new(vec!["id".into()], vec![DataType::UInt], vec![0]);
        let mut op = InputOperator::new("t", s);
        let records = vec![Record::new(other, vec![Value::UInt(1)], true)];
        op.process(records);
    }
}
