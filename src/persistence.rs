//! Table-schema persistence (spec.md §6, §4.6): the only thing the engine
//! durably saves - matview state and flow definitions are rebuilt from
//! base tables at startup (spec.md §1 Non-goals).
//!
//! The on-disk format is a direct port of `pelton::dataflow::DataFlowState
//! ::Save`/`Load` (examples/original_source/pelton/dataflow/state.cc):
//! per table, a line with the table name, then (column name, type code)
//! line pairs terminated by a blank line, then a line with the key count
//! followed by the key indices, space-separated. Tables repeat back to
//! back; the file ends with one trailing blank line.

use std::path::Path;

use crate::error::{EngineError, Result};
use crate::schema::{DataType, SchemaRef};

const STATE_FILE_NAME: &str = "schemas.state";

fn corrupt(msg: impl Into<String>) -> EngineError {
    EngineError::CorruptState(msg.into())
}

pub fn state_file_path(dir: &Path) -> std::path::PathBuf {
    dir.join(STATE_FILE_NAME)
}

pub fn save(dir: &Path, tables: &[(String, SchemaRef)]) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut out = String::new();
    for (name, schema) in tables {
        out.push_str(name);
        out.push('\n');
        for i in 0..schema.size() {
            out.push_str(schema.name_of(i));
            out.push('\n');
            out.push_str(&schema.type_of(i).code().to_string());
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&schema.keys().len().to_string());
        for key in schema.keys() {
            out.push(' ');
            out.push_str(&key.to_string());
        }
        out.push('\n');
    }
    out.push('\n');
    std::fs::write(state_file_path(dir), out)?;
    Ok(())
}

pub fn load(dir: &Path) -> Result<Vec<(String, SchemaRef)>> {
    let path = state_file_path(dir);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&path)?;
    let mut lines = content.lines();
    let mut tables = Vec::new();

    loop {
        let table_name = match lines.next() {
            Some(l) if !l.is_empty() => l.to_string(),
            _ => break,
        };

        let mut names = Vec::new();
        let mut types = Vec::new();
        loop {
            let name = lines
                .next()
                .ok_or_else(|| corrupt(format!("truncated schema for table '{table_name}'")))?;
            if name.is_empty() {
                break;
            }
            let code_line = lines
                .next()
                .ok_or_else(|| corrupt(format!("missing type code for column '{name}'")))?;
            let code: u8 = code_line
                .parse()
                .map_err(|_| corrupt(format!("non-numeric type code '{code_line}'")))?;
            names.push(name.to_string());
            types.push(DataType::from_code(code)?);
        }

        let key_line = lines
            .next()
            .ok_or_else(|| corrupt(format!("missing key line for table '{table_name}'")))?;
        let mut parts = key_line.split_whitespace();
        let key_count: usize = parts
            .next()
            .ok_or_else(|| corrupt("empty key line"))?
            .parse()
            .map_err(|_| corrupt("non-numeric key count"))?;
        let keys: Vec<usize> = parts
            .by_ref()
            .take(key_count)
            .map(|s| s.parse::<usize>().map_err(|_| corrupt("non-numeric key index")))
            .collect::<Result<_>>()?;
        if keys.len() != key_count {
            return Err(corrupt(format!("expected {key_count} key indices, found {}", keys.len())));
        }

        tables.push((table_name, SchemaRef::new(names, types, keys)));
    }

    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_schemas_through_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let schema = SchemaRef::new(
            vec!["id".into(), "cat".into(), "name".into()],
            vec![DataType::UInt, DataType::Int, DataType::Text],
            vec![0],
        );
        save(dir.path(), &[("t".to_string(), schema.clone())]).unwrap();

        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, "t");
        assert_eq!(loaded[0].1.column_names(), schema.column_names());
        assert_eq!(loaded[0].1.column_types(), schema.column_types());
        assert_eq!(loaded[0].1.keys(), schema.keys());
    }

    #[test]
    fn missing_state_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn round_trips_multiple_tables_and_composite_keys() {
        let dir = tempfile::tempdir().unwrap();
        let a = SchemaRef::new(vec!["x".into()], vec![DataType::UInt], vec![0]);
        let b = SchemaRef::new(
            vec!["x".into(), "y".into()],
            vec![DataType::Int, DataType::Int],
            vec![0, 1],
        );
        save(dir.path(), &[("a".to_string(), a), ("b".to_string(), b)]).unwrap();

        let loaded = load(dir.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].1.keys(), &[0, 1]);
    }
}
