//! `Schema` / `SchemaRef`: immutable, shared column-metadata descriptors.
//!
//! Grounded on `pelton::dataflow::{SchemaOwner, SchemaRef}`
//! (examples/original_source/pelton/dataflow/schema.h), which splits an
//! owning descriptor from a cheap, pointer-equal reference to it. Rust's
//! `Arc` gives us that split for free: `SchemaRef` below *is* the owner -
//! cloning it bumps a refcount rather than copying data, and
//! `Arc::ptr_eq` gives the "same underlying descriptor" equality the
//! original implements by comparing raw pointers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    UInt,
    Int,
    Text,
    DateTime,
}

impl DataType {
    /// Stable on-disk code, used by schema persistence (§4.6/§6 of
    /// SPEC_FULL.md) and required to stay stable across versions since it
    /// is written to files callers keep across restarts.
    pub fn code(self) -> u8 {
        match self {
            DataType::UInt => 0,
            DataType::Int => 1,
            DataType::Text => 2,
            DataType::DateTime => 3,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(DataType::UInt),
            1 => Ok(DataType::Int),
            2 => Ok(DataType::Text),
            3 => Ok(DataType::DateTime),
            other => Err(EngineError::CorruptState(format!(
                "unknown column type code {other}"
            ))),
        }
    }
}

#[derive(Debug)]
struct SchemaData {
    column_names: Vec<String>,
    column_types: Vec<DataType>,
    keys: Vec<usize>,
}

/// A shared, immutable handle to column metadata. Two `SchemaRef`s compare
/// equal iff they point at the same underlying descriptor (structural
/// sharing, not deep comparison) - this is what lets operators compare
/// input schemas cheaply on every batch.
#[derive(Debug, Clone)]
pub struct SchemaRef(Arc<SchemaData>);

impl SchemaRef {
    pub fn new(
        column_names: Vec<String>,
        column_types: Vec<DataType>,
        keys: Vec<usize>,
    ) -> Self {
        assert_eq!(
            column_names.len(),
            column_types.len(),
            "inconsistent number of columns in schema"
        );
        let mut sorted_keys = keys.clone();
        sorted_keys.sort_unstable();
        sorted_keys.dedup();
        assert_eq!(sorted_keys, keys, "key indices must be sorted and unique");
        for &k in &keys {
            assert!(k < column_names.len(), "key index {k} out of range");
        }
        SchemaRef(Arc::new(SchemaData {
            column_names,
            column_types,
            keys,
        }))
    }

    pub fn size(&self) -> usize {
        self.0.column_names.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.0.column_names
    }

    pub fn column_types(&self) -> &[DataType] {
        &self.0.column_types
    }

    pub fn keys(&self) -> &[usize] {
        &self.0.keys
    }

    pub fn type_of(&self, index: usize) -> DataType {
        self.0.column_types[index]
    }

    pub fn name_of(&self, index: usize) -> &str {
        &self.0.column_names[index]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.column_names.iter().position(|n| n == name)
    }

    pub fn ptr_eq(&self, other: &SchemaRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for SchemaRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}
impl Eq for SchemaRef {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_pointer_identity() {
        let a = SchemaRef::new(vec!["id".into()], vec![DataType::UInt], vec![0]);
        let b = a.clone();
        let c = SchemaRef::new(vec!["id".into()], vec![DataType::UInt], vec![0]);
        assert_eq!(a, b);
        assert_ne!(a, c, "structurally-identical schemas are distinct refs");
    }

    #[test]
    #[should_panic(expected = "key index")]
    fn rejects_out_of_range_key() {
        SchemaRef::new(vec!["id".into()], vec![DataType::UInt], vec![5]);
    }

    #[test]
    fn data_type_round_trips_through_code() {
        for dt in [DataType::UInt, DataType::Int, DataType::Text, DataType::DateTime] {
            assert_eq!(DataType::from_code(dt.code()).unwrap(), dt);
        }
    }
}
