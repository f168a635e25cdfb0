//! `EquiJoin`: incrementally-maintained hash join with INNER/LEFT/RIGHT
//! semantics (spec.md §4.1 EquiJoin).
//!
//! The schema-concatenation and key-merging rules are a direct port of
//! `pelton::dataflow::EquiJoinOperator::ComputeJoinedSchema`
//! (examples/original_source/pelton/dataflow/ops/equijoin.cc): output
//! columns are left schema followed by right schema with `right_col`
//! dropped, and a right key column that happens to be `right_col` is
//! replaced by `left_col` in the merged key list (since the dropped
//! column is recoverable from the join condition). The original only
//! ever performs an inner join over positive records; LEFT/RIGHT outer
//! semantics and negative-record retraction are this crate's own
//! incremental extension of that base case (spec.md resolves them
//! explicitly, they are not left to guesswork - see SPEC_FULL.md §4.1).

use std::collections::HashMap;

use crate::key::Key;
use crate::operator::{ColumnId, NodeIndex};
use crate::record::Record;
use crate::schema::SchemaRef;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    Inner,
    Left,
    Right,
}

#[derive(Default)]
struct JoinTable {
    rows: HashMap<Key, Vec<Record>>,
}

impl JoinTable {
    fn get(&self, key: &Key) -> &[Record] {
        self.rows.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    fn insert(&mut self, key: Key, record: Record) {
        self.rows.entry(key).or_default().push(record);
    }

    /// Removes the first stored row whose values equal `record`'s -
    /// `record` here is the incoming negative, so we compare by value
    /// only, ignoring polarity (spec.md §3: a negative "cancels" the
    /// matching positive previously seen).
    fn remove_matching(&mut self, key: &Key, record: &Record) {
        if let Some(rows) = self.rows.get_mut(key) {
            if let Some(pos) = rows.iter().position(|r| r.values() == record.values()) {
                rows.remove(pos);
            }
        }
    }
}

pub struct EquiJoinOperator {
    left_col: ColumnId,
    right_col: ColumnId,
    mode: JoinMode,
    left_table: JoinTable,
    right_table: JoinTable,
    /// Cached once known (either from `compute_output_schema` or the first
    /// left record observed), so a RIGHT-join pad can be sized correctly
    /// even when the left table is still empty (mirrors the original's
    /// lazily-computed `joined_schema_`).
    left_schema_size: Option<usize>,
}

impl EquiJoinOperator {
    pub fn new(left_col: ColumnId, right_col: ColumnId, mode: JoinMode) -> Self {
        EquiJoinOperator {
            left_col,
            right_col,
            mode,
            left_table: JoinTable::default(),
            right_table: JoinTable::default(),
            left_schema_size: None,
        }
    }

    pub fn left_col(&self) -> ColumnId {
        self.left_col
    }

    pub fn right_col(&self) -> ColumnId {
        self.right_col
    }

    /// Resets the join tables but keeps `left_schema_size`: it is set by
    /// `compute_output_schema`, which runs once on the template graph
    /// before partitioning clones it, and never runs again on a clone
    /// (`Node::clone_fresh` carries the already-computed output schema
    /// forward rather than recomputing it). Resetting it to `None` here
    /// would leave every partition clone unable to pad an early RIGHT-mode
    /// record until its own first left record arrived.
    pub fn clone_fresh(&self) -> Self {
        EquiJoinOperator {
            left_col: self.left_col,
            right_col: self.right_col,
            mode: self.mode,
            left_table: JoinTable::default(),
            right_table: JoinTable::default(),
            left_schema_size: self.left_schema_size,
        }
    }

    pub fn compute_output_schema(&mut self, left: &SchemaRef, right: &SchemaRef) -> SchemaRef {
        self.left_schema_size = Some(left.size());
        let mut names = left.column_names().to_vec();
        let mut types = left.column_types().to_vec();
        let mut keys: Vec<usize> = left.keys().to_vec();

        for i in 0..right.size() {
            if i != self.right_col {
                names.push(right.name_of(i).to_string());
                types.push(right.type_of(i));
            }
        }

        for &key_id in right.keys() {
            if key_id == self.right_col {
                if !keys.contains(&self.left_col) {
                    let pos = keys.partition_point(|&k| k < self.left_col);
                    keys.insert(pos, self.left_col);
                }
            } else if key_id < self.right_col {
                keys.push(left.size() + key_id);
            } else {
                keys.push(left.size() + key_id - 1);
            }
        }
        keys.sort_unstable();
        keys.dedup();
        SchemaRef::new(names, types, keys)
    }

    fn emit_join(&self, left: &Record, right: &Record, output_schema: &SchemaRef) -> Record {
        let lschema = left.schema();
        let mut values = Vec::with_capacity(output_schema.size());
        for i in 0..lschema.size() {
            values.push(left.value(i).clone());
        }
        for i in 0..right.schema().size() {
            if i != self.right_col {
                values.push(right.value(i).clone());
            }
        }
        Record::new(output_schema.clone(), values, true)
    }

    /// Pad for an unmatched left record (LEFT join): left columns verbatim,
    /// right columns (minus the dropped `right_col`) all `Null`.
    fn pad_left(&self, left: &Record, output_schema: &SchemaRef) -> Record {
        let mut values: Vec<Value> = (0..left.schema().size())
            .map(|i| left.value(i).clone())
            .collect();
        values.resize(output_schema.size(), Value::Null);
        Record::new(output_schema.clone(), values, true)
    }

    /// Pad for an unmatched right record (RIGHT join): left columns all
    /// `Null`, right columns (minus `right_col`) verbatim.
    fn pad_right(&self, right: &Record, output_schema: &SchemaRef) -> Record {
        let left_size = self
            .left_schema_size
            .expect("left schema must be observed before padding a right record");
        let mut values: Vec<Value> = std::iter::repeat(Value::Null).take(left_size).collect();
        for i in 0..right.schema().size() {
            if i != self.right_col {
                values.push(right.value(i).clone());
            }
        }
        Record::new(output_schema.clone(), values, true)
    }

    fn process_left_record(&mut self, record: Record, output_schema: &SchemaRef, out: &mut Vec<Record>) {
        self.left_schema_size.get_or_insert_with(|| record.schema().size());
        let key = record.project_key(&[self.left_col]);
        let positive = record.is_positive();

        if positive {
            let matches_before_insert = self.left_table.get(&key).is_empty();
            let rights: Vec<Record> = self.right_table.get(&key).iter().map(Record::duplicate).collect();
            if matches_before_insert && self.mode == JoinMode::Right {
                for r in &rights {
                    out.push(self.pad_right(r, output_schema).negate());
                }
            }
            for r in &rights {
                out.push(self.emit_join(&record, r, output_schema));
            }
            if rights.is_empty() && self.mode == JoinMode::Left {
                out.push(self.pad_left(&record, output_schema));
            }
            self.left_table.insert(key, record);
        } else {
            let rights: Vec<Record> = self.right_table.get(&key).iter().map(Record::duplicate).collect();
            for r in &rights {
                out.push(self.emit_join(&record, r, output_schema).negate());
            }
            self.left_table.remove_matching(&key, &record);
            let now_empty = self.left_table.get(&key).is_empty();
            if now_empty && self.mode == JoinMode::Right {
                for r in &rights {
                    out.push(self.pad_right(r, output_schema));
                }
            }
            if rights.is_empty() && self.mode == JoinMode::Left {
                out.push(self.pad_left(&record, output_schema).negate());
            }
        }
    }

    fn process_right_record(&mut self, record: Record, output_schema: &SchemaRef, out: &mut Vec<Record>) {
        let key = record.project_key(&[self.right_col]);
        let positive = record.is_positive();

        if positive {
            let matches_before_insert = self.right_table.get(&key).is_empty();
            let lefts: Vec<Record> = self.left_table.get(&key).iter().map(Record::duplicate).collect();
            if matches_before_insert && self.mode == JoinMode::Left {
                for l in &lefts {
                    out.push(self.pad_left(l, output_schema).negate());
                }
            }
            for l in &lefts {
                out.push(self.emit_join(l, &record, output_schema));
            }
            if lefts.is_empty() && self.mode == JoinMode::Right {
                out.push(self.pad_right(&record, output_schema));
            }
            self.right_table.insert(key, record);
        } else {
            let lefts: Vec<Record> = self.left_table.get(&key).iter().map(Record::duplicate).collect();
            for l in &lefts {
                out.push(self.emit_join(l, &record, output_schema).negate());
            }
            self.right_table.remove_matching(&key, &record);
            let now_empty = self.right_table.get(&key).is_empty();
            if now_empty && self.mode == JoinMode::Left {
                for l in &lefts {
                    out.push(self.pad_left(l, output_schema));
                }
            }
            if lefts.is_empty() && self.mode == JoinMode::Right {
                out.push(self.pad_right(&record, output_schema).negate());
            }
        }
    }

    pub fn process(
        &mut self,
        left_parent: NodeIndex,
        right_parent: NodeIndex,
        source: NodeIndex,
        records: Vec<Record>,
        output_schema: &SchemaRef,
    ) -> Vec<Record> {
        let mut out = Vec::new();
        for record in records {
            if source == left_parent {
                self.process_left_record(record, output_schema, &mut out);
            } else if source == right_parent {
                self.process_right_record(record, output_schema, &mut out);
            } else {
                panic!(
                    "InvalidPlan: equijoin received input from node {source} but has parents {left_parent} and {right_parent}"
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DataType;

    fn left_schema() -> SchemaRef {
        SchemaRef::new(
            vec!["id".into(), "name".into()],
            vec![DataType::UInt, DataType::Text],
            vec![0],
        )
    }

    fn right_schema() -> SchemaRef {
        SchemaRef::new(
            vec!["owner_id".into(), "pet".into()],
            vec![DataType::UInt, DataType::Text],
            vec![0],
        )
    }

    #[test]
    fn inner_join_matches_and_concatenates() {
        let mut op = EquiJoinOperator::new(0, 0, JoinMode::Inner);
        let output_schema = op.compute_output_schema(&left_schema(), &right_schema());
        assert_eq!(output_schema.size(), 3); // id, name, pet (owner_id dropped)

        let left = Record::new(left_schema(), vec![Value::UInt(1), Value::Text("alice".into())], true);
        let out1 = op.process(0, 1, 0, vec![left], &output_schema);
        assert!(out1.is_empty(), "no match yet");

        let right = Record::new(right_schema(), vec![Value::UInt(1), Value::Text("fido".into())], true);
        let out2 = op.process(0, 1, 1, vec![right], &output_schema);
        assert_eq!(out2.len(), 1);
        assert_eq!(out2[0].value(2), &Value::Text("fido".into()));
    }

    #[test]
    fn left_join_pads_unmatched_left_then_retracts_pad_on_match() {
        let mut op = EquiJoinOperator::new(0, 0, JoinMode::Left);
        let output_schema = op.compute_output_schema(&left_schema(), &right_schema());

        let left = Record::new(left_schema(), vec![Value::UInt(1), Value::Text("alice".into())], true);
        let out1 = op.process(0, 1, 0, vec![left], &output_schema);
        assert_eq!(out1.len(), 1);
        assert!(out1[0].is_positive());
        assert_eq!(out1[0].value(2), &Value::Null);

        let right = Record::new(right_schema(), vec![Value::UInt(1), Value::Text("fido".into())], true);
        let out2 = op.process(0, 1, 1, vec![right], &output_schema);
        assert_eq!(out2.len(), 2, "retract the pad, emit the real join");
        assert!(!out2[0].is_positive());
        assert!(out2[1].is_positive());
        assert_eq!(out2[1].value(2), &Value::Text("fido".into()));
    }

    #[test]
    fn right_join_pads_unmatched_right_then_retracts_pad_on_match() {
        let mut op = EquiJoinOperator::new(0, 0, JoinMode::Right);
        let output_schema = op.compute_output_schema(&left_schema(), &right_schema());

        let right = Record::new(right_schema(), vec![Value::UInt(1), Value::Text("fido".into())], true);
        let out1 = op.process(0, 1, 1, vec![right], &output_schema);
        assert_eq!(out1.len(), 1);
        assert!(out1[0].is_positive());
        assert_eq!(out1[0].value(0), &Value::Null);
        assert_eq!(out1[0].value(2), &Value::Text("fido".into()));

        let left = Record::new(left_schema(), vec![Value::UInt(1), Value::Text("alice".into())], true);
        let out2 = op.process(0, 1, 0, vec![left], &output_schema);
        assert_eq!(out2.len(), 2, "retract the pad, emit the real join");
        assert!(!out2[0].is_positive());
        assert!(out2[1].is_positive());
        assert_eq!(out2[1].value(1), &Value::Text("alice".into()));
    }

    #[test]
    fn right_join_pads_correctly_on_a_partition_clone_before_any_left_record() {
        // Mirrors the runtime path: `compute_output_schema` runs once on
        // the template graph; every partition clone's operator is built
        // via `clone_fresh` alone and never calls it again.
        let mut template = EquiJoinOperator::new(0, 0, JoinMode::Right);
        let output_schema = template.compute_output_schema(&left_schema(), &right_schema());
        let mut clone = template.clone_fresh();

        let right = Record::new(right_schema(), vec![Value::UInt(2), Value::Text("rex".into())], true);
        let out = clone.process(0, 1, 1, vec![right], &output_schema);
        assert_eq!(out.len(), 1, "clone must not panic padding a right-only record");
        assert_eq!(out[0].value(0), &Value::Null);
    }
}
