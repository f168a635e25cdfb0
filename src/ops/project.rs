//! `Project`: reorder/rename/compute columns (spec.md §4.1 Project),
//! grounded on `pelton::dataflow::ops::project.{h,cc}` and its
//! `ProjectionOperationEnum` (`project_enum.h`) distinguishing a plain
//! column copy from an arithmetic expression.

use crate::record::Record;
use crate::schema::{DataType, SchemaRef};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
}

#[derive(Clone)]
pub enum Operand {
    Column(usize),
    Literal(Value),
}

impl Operand {
    fn resolve_i128(&self, record: &Record) -> i128 {
        match self {
            Operand::Column(i) => record.value(*i).as_i128(),
            Operand::Literal(v) => v.as_i128(),
        }
    }

    fn data_type(&self, input_schema: &SchemaRef) -> DataType {
        match self {
            Operand::Column(i) => input_schema.type_of(*i),
            Operand::Literal(v) => v
                .data_type()
                .expect("arithmetic operand literal must not be Null"),
        }
    }
}

/// One output column (spec.md §4.1 Project's three entry kinds).
#[derive(Clone)]
pub enum ProjectEntry {
    Column { name: String, input_col: usize },
    Literal { name: String, value: Value },
    Arithmetic {
        name: String,
        left: Operand,
        op: ArithmeticOp,
        right: Operand,
    },
}

#[derive(Clone)]
pub struct ProjectOperator {
    entries: Vec<ProjectEntry>,
}

impl ProjectOperator {
    pub fn new(entries: Vec<ProjectEntry>) -> Self {
        ProjectOperator { entries }
    }

    pub fn clone_fresh(&self) -> Self {
        self.clone()
    }

    /// Key columns are those output positions that came from an input key
    /// column, reordering preserved (spec.md §4.1: "key columns = those
    /// output positions that came from input key columns").
    pub fn compute_output_schema(&self, input_schema: &SchemaRef) -> SchemaRef {
        let mut names = Vec::with_capacity(self.entries.len());
        let mut types = Vec::with_capacity(self.entries.len());
        let mut keys = Vec::new();

        for (out_index, entry) in self.entries.iter().enumerate() {
            match entry {
                ProjectEntry::Column { name, input_col } => {
                    names.push(name.clone());
                    types.push(input_schema.type_of(*input_col));
                    if input_schema.keys().contains(input_col) {
                        keys.push(out_index);
                    }
                }
                ProjectEntry::Literal { name, value } => {
                    names.push(name.clone());
                    types.push(
                        value
                            .data_type()
                            .expect("projected literal must not be Null"),
                    );
                }
                ProjectEntry::Arithmetic { name, left, right, .. } => {
                    names.push(name.clone());
                    let lt = left.data_type(input_schema);
                    let rt = right.data_type(input_schema);
                    assert_eq!(
                        lt, rt,
                        "TypeMismatch: arithmetic project over {lt:?} and {rt:?}"
                    );
                    // Arithmetic results are always stored as `Value::Int`
                    // (see `process` below), so the declared column type
                    // must be `Int` regardless of the operands' own type.
                    types.push(DataType::Int);
                }
            }
        }
        SchemaRef::new(names, types, keys)
    }

    pub fn process(&mut self, records: Vec<Record>, output_schema: &SchemaRef) -> Vec<Record> {
        records
            .into_iter()
            .map(|record| {
                let values = self
                    .entries
                    .iter()
                    .map(|entry| match entry {
                        ProjectEntry::Column { input_col, .. } => record.value(*input_col).clone(),
                        ProjectEntry::Literal { value, .. } => value.clone(),
                        ProjectEntry::Arithmetic { left, op, right, .. } => {
                            let l = left.resolve_i128(&record);
                            let r = right.resolve_i128(&record);
                            let result = match op {
                                ArithmeticOp::Add => l + r,
                                ArithmeticOp::Sub => l - r,
                            };
                            Value::Int(result as i64)
                        }
                    })
                    .collect();
                Record::new(output_schema.clone(), values, record.is_positive())
                    .with_timestamp(record.timestamp())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DataType;

    fn input_schema() -> SchemaRef {
        SchemaRef::new(
            vec!["id".into(), "qty".into(), "price".into()],
            vec![DataType::UInt, DataType::Int, DataType::Int],
            vec![0],
        )
    }

    #[test]
    fn reordered_key_column_stays_marked_as_key() {
        let op = ProjectOperator::new(vec![
            ProjectEntry::Column {
                name: "qty".into(),
                input_col: 1,
            },
            ProjectEntry::Column {
                name: "id".into(),
                input_col: 0,
            },
        ]);
        let out = op.compute_output_schema(&input_schema());
        assert_eq!(out.keys(), &[1]);
    }

    #[test]
    fn arithmetic_entry_computes_sum_as_int() {
        let mut op = ProjectOperator::new(vec![ProjectEntry::Arithmetic {
            name: "total".into(),
            left: Operand::Column(1),
            op: ArithmeticOp::Add,
            right: Operand::Column(2),
        }]);
        let out_schema = op.compute_output_schema(&input_schema());
        let record = Record::new(
            input_schema(),
            vec![Value::UInt(1), Value::Int(3), Value::Int(4)],
            true,
        );
        let out = op.process(vec![record], &out_schema);
        assert_eq!(out[0].value(0), &Value::Int(7));
    }

    #[test]
    fn arithmetic_over_uint_operands_still_declares_an_int_column() {
        let schema = SchemaRef::new(
            vec!["a".into(), "b".into()],
            vec![DataType::UInt, DataType::UInt],
            vec![],
        );
        let op = ProjectOperator::new(vec![ProjectEntry::Arithmetic {
            name: "total".into(),
            left: Operand::Column(0),
            op: ArithmeticOp::Add,
            right: Operand::Column(1),
        }]);
        let out_schema = op.compute_output_schema(&schema);
        assert_eq!(out_schema.type_of(0), DataType::Int);
    }
}
