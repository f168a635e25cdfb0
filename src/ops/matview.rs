//! `MatView`: the engine's queryable leaf, keeping a live `Key -> records`
//! index (spec.md §4.1 Materialized View).
//!
//! The per-key collection and its `Insert`-inserts-positive/removes-first-
//! equal-negative behavior are grounded on
//! `pelton::dataflow::GroupedData` (examples/original_source/pelton/
//! dataflow/ops/grouped_data.h), which backs every matview with a single
//! `flat_hash_map<Key, vector<Record>>` regardless of ordering. This
//! crate's three sub-variants (Unordered / KeyOrdered / RecordOrdered)
//! are this crate's own addition - the original never orders by key or
//! maintains a sorted per-key vector - so KeyOrdered/RecordOrdered swap
//! the backing map for a `BTreeMap` instead of leaving `GroupedData`'s
//! hash map as the only option.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::key::Key;
use crate::operator::ColumnId;
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatViewKind {
    Unordered,
    KeyOrdered,
    RecordOrdered,
}

enum Backing {
    Unordered(HashMap<Key, Vec<Record>>),
    Ordered(BTreeMap<Key, Vec<Record>>),
}

impl Backing {
    fn new(kind: MatViewKind) -> Self {
        match kind {
            MatViewKind::Unordered => Backing::Unordered(HashMap::new()),
            MatViewKind::KeyOrdered | MatViewKind::RecordOrdered => {
                Backing::Ordered(BTreeMap::new())
            }
        }
    }

    fn get(&self, key: &Key) -> &[Record] {
        match self {
            Backing::Unordered(m) => m.get(key).map(Vec::as_slice).unwrap_or(&[]),
            Backing::Ordered(m) => m.get(key).map(Vec::as_slice).unwrap_or(&[]),
        }
    }

    fn entry(&mut self, key: Key) -> &mut Vec<Record> {
        match self {
            Backing::Unordered(m) => m.entry(key).or_default(),
            Backing::Ordered(m) => m.entry(key).or_default(),
        }
    }

    fn contains(&self, key: &Key) -> bool {
        match self {
            Backing::Unordered(m) => m.contains_key(key),
            Backing::Ordered(m) => m.contains_key(key),
        }
    }

    fn count(&self) -> usize {
        match self {
            Backing::Unordered(m) => m.values().map(Vec::len).sum(),
            Backing::Ordered(m) => m.values().map(Vec::len).sum(),
        }
    }

    /// Iterates records key-group by key-group; key order is the map's
    /// natural iteration order (sorted for `Ordered`, arbitrary for
    /// `Unordered` - matching spec.md's per-variant contract).
    fn iter_all(&self) -> Box<dyn Iterator<Item = &Record> + '_> {
        match self {
            Backing::Unordered(m) => Box::new(m.values().flatten()),
            Backing::Ordered(m) => Box::new(m.values().flatten()),
        }
    }
}

pub struct MatViewOperator {
    key_cols: Vec<ColumnId>,
    sort_cols: Option<Vec<ColumnId>>,
    limit: Option<usize>,
    offset: usize,
    kind: MatViewKind,
    contents: Backing,
}

impl MatViewOperator {
    pub fn new(
        key_cols: Vec<ColumnId>,
        kind: MatViewKind,
        sort_cols: Option<Vec<ColumnId>>,
        limit: Option<usize>,
        offset: usize,
    ) -> Self {
        MatViewOperator {
            key_cols,
            sort_cols,
            limit,
            offset,
            kind,
            contents: Backing::new(kind),
        }
    }

    pub fn key_cols(&self) -> &[ColumnId] {
        &self.key_cols
    }

    pub fn clone_fresh(&self) -> Self {
        MatViewOperator::new(
            self.key_cols.clone(),
            self.kind,
            self.sort_cols.clone(),
            self.limit,
            self.offset,
        )
    }

    fn sort_key(&self, record: &Record) -> Vec<crate::value::Value> {
        self.sort_cols
            .as_ref()
            .map(|cols| cols.iter().map(|&c| record.value(c).clone()).collect())
            .unwrap_or_default()
    }

    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        self.sort_key(a).cmp(&self.sort_key(b))
    }

    /// Applies positive insert / negative remove-first-equal (spec.md
    /// §4.1: "on positive record, insert into the collection for
    /// `record[key_cols]`; on negative, remove the first equal record").
    pub fn process(&mut self, records: Vec<Record>) {
        for record in records {
            let key = record.project_key(&self.key_cols);
            if record.is_positive() {
                let group = self.contents.entry(key);
                if self.kind == MatViewKind::RecordOrdered {
                    let pos = group
                        .binary_search_by(|existing| self.compare(existing, &record))
                        .unwrap_or_else(|insert_at| insert_at);
                    group.insert(pos, record);
                } else {
                    group.push(record);
                }
            } else {
                let group = self.contents.entry(key);
                if let Some(pos) = group.iter().position(|r| r.values() == record.values()) {
                    group.remove(pos);
                }
            }
        }
    }

    fn apply_window<'a>(&self, records: Vec<&'a Record>) -> Vec<&'a Record> {
        let start = self.offset.min(records.len());
        let end = match self.limit {
            Some(limit) => (start + limit).min(records.len()),
            None => records.len(),
        };
        records[start..end].to_vec()
    }

    pub fn lookup(&self, key: &Key) -> Vec<&Record> {
        self.apply_window(self.contents.get(key).iter().collect())
    }

    pub fn all(&self) -> impl Iterator<Item = &Record> {
        self.contents.iter_all()
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.contents.contains(key)
    }

    pub fn count(&self) -> usize {
        self.contents.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, SchemaRef};
    use crate::value::Value;

    fn schema() -> SchemaRef {
        SchemaRef::new(
            vec!["owner".into(), "ts".into()],
            vec![DataType::Text, DataType::Int],
            vec![0],
        )
    }

    fn rec(owner: &str, ts: i64, positive: bool) -> Record {
        Record::new(schema(), vec![Value::Text(owner.into()), Value::Int(ts)], positive)
    }

    #[test]
    fn insert_then_negative_removes_matching_record() {
        let mut mv = MatViewOperator::new(vec![0], MatViewKind::Unordered, None, None, 0);
        mv.process(vec![rec("a", 1, true)]);
        assert_eq!(mv.count(), 1);
        mv.process(vec![rec("a", 1, false)]);
        assert_eq!(mv.count(), 0);
    }

    #[test]
    fn record_ordered_keeps_sort_cols_order_on_insert() {
        let mut mv = MatViewOperator::new(vec![0], MatViewKind::RecordOrdered, Some(vec![1]), None, 0);
        mv.process(vec![rec("a", 3, true), rec("a", 1, true), rec("a", 2, true)]);
        let key = Key::new(vec![Value::Text("a".into())]);
        let ts: Vec<i64> = mv.lookup(&key).iter().map(|r| r.value(1).as_int()).collect();
        assert_eq!(ts, vec![1, 2, 3]);
    }

    #[test]
    fn limit_and_offset_window_the_lookup() {
        let mut mv = MatViewOperator::new(vec![0], MatViewKind::RecordOrdered, Some(vec![1]), Some(1), 1);
        mv.process(vec![rec("a", 1, true), rec("a", 2, true), rec("a", 3, true)]);
        let key = Key::new(vec![Value::Text("a".into())]);
        let ts: Vec<i64> = mv.lookup(&key).iter().map(|r| r.value(1).as_int()).collect();
        assert_eq!(ts, vec![2]);
    }
}
