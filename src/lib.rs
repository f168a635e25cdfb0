//! Partitioned, incrementally-maintained dataflow engine.
//!
//! This crate is the dataflow subsystem of a privacy-aware relational
//! store: relational operators (§[`operator`]/[`ops`]) wired into a
//! graph, cloned into N key-partitioned copies by the planner
//! ([`graph`]), and driven by one worker thread per partition
//! ([`worker`]) exchanging batches of positive/negative records over
//! [`channel`]s. [`engine::Engine`] is the crate's single public entry
//! point: register table schemas, install flows, feed base-table
//! deltas in, read materialized views back out.
//!
//! SQL parsing, the sharding rewriter, the key-value storage engine,
//! the client proxy, and the Calcite-based query planner all live
//! outside this crate; it accepts an already-planned single-partition
//! operator graph as [`engine::Engine::add_flow`]'s input.

pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod key;
pub mod operator;
pub mod ops;
pub mod partition;
pub mod partitioning;
pub mod persistence;
pub mod record;
pub mod schema;
pub mod value;
pub mod worker;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use key::Key;
pub use record::Record;
pub use schema::{DataType, SchemaRef};
pub use value::Value;
