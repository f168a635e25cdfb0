//! Error taxonomy for the dataflow engine.
//!
//! Mirrors the fatal/recoverable split in the design: data-corruption errors
//! (schema mismatches, type mismatches, partitioning-plan violations)
//! indicate the incremental-maintenance invariants have already been
//! violated upstream, so callers cannot meaningfully recover from them -
//! they panic rather than returning a `Result` (see `operator::expect_schema`
//! and `graph::invalid_plan`). Control-plane errors (naming, lifecycle) are
//! ordinary `Result::Err` values.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("unknown flow: {0}")]
    UnknownFlow(String),

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("flow already registered: {0}")]
    DuplicateFlow(String),

    #[error("table already registered: {0}")]
    DuplicateTable(String),

    #[error("engine is shutting down, records dropped")]
    ShuttingDown,

    #[error("persistence I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed persisted schema state: {0}")]
    CorruptState(String),
}
