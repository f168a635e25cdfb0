//! `Engine`: the library's single entry point (spec.md §4.6, §6).
//!
//! Grounded on `pelton::dataflow::DataFlowState` (examples/original_source/
//! pelton/dataflow/state.{h,cc}), which owns every flow's partitions,
//! table schemas, and persistence - and on the teacher's explicit
//! lifecycle objects (`pool::connection::ConnectionManager`,
//! `buffer::manager::BufferPoolManager`): a struct built once via `new`,
//! used through `&self` methods from many threads, torn down once via an
//! explicit `shutdown`. No process-wide singleton (spec.md §9).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;

use parking_lot::{Mutex, RwLock};

use crate::channel::{Batch, Channel, ENGINE_PRODUCER};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::graph::Graph;
use crate::key::Key;
use crate::operator::{ColumnId, NodeIndex, OperatorKind};
use crate::partition::GraphPartition;
use crate::partitioning::{partition_of_key, partition_of_record, PartitionIndex};
use crate::persistence;
use crate::record::Record;
use crate::schema::SchemaRef;
use crate::worker::WorkerHandle;

/// Everything the engine needs to route traffic into, and read results
/// out of, one installed flow.
struct FlowState {
    /// Base-table name -> that flow's `Input` node reading from it.
    inputs: HashMap<String, NodeIndex>,
    /// Partitioning key each input node was pinned to by the planner
    /// (spec.md §4.3) - what `process_records` hashes incoming rows on.
    input_partition_keys: HashMap<NodeIndex, Vec<ColumnId>>,
    /// The flow's single materialized view and its key columns (spec.md
    /// §4.6 `lookup_matview`/`all`/`size` all key off of this one node).
    matview_node: NodeIndex,
    matview_key_cols: Vec<ColumnId>,
    /// Per-partition operator arena and the one channel (spec.md §4.4)
    /// `process_records` and peer `Exchange` operators feed.
    partitions: Vec<Arc<RwLock<GraphPartition>>>,
    channels: Vec<Arc<Channel>>,
}

/// Tunables + lifecycle for one dataflow engine instance.
pub struct Engine {
    config: EngineConfig,
    partition_count: usize,
    tables: RwLock<HashMap<String, SchemaRef>>,
    flows: RwLock<HashMap<String, FlowState>>,
    workers: Mutex<HashMap<PartitionIndex, WorkerHandle>>,
    shutting_down: AtomicBool,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let partition_count = config.partition_count;
        Engine {
            config,
            partition_count,
            tables: RwLock::new(HashMap::new()),
            flows: RwLock::new(HashMap::new()),
            workers: Mutex::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn partition_count(&self) -> usize {
        self.partition_count
    }

    // ---- Schema registration (spec.md §6) ----------------------------

    pub fn add_table_schema(&self, table_name: impl Into<String>, schema: SchemaRef) -> Result<()> {
        let table_name = table_name.into();
        let mut tables = self.tables.write();
        if tables.contains_key(&table_name) {
            return Err(EngineError::DuplicateTable(table_name));
        }
        tables.insert(table_name, schema);
        Ok(())
    }

    pub fn table_schema(&self, table_name: &str) -> Result<SchemaRef> {
        self.tables
            .read()
            .get(table_name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownTable(table_name.to_string()))
    }

    pub fn tables(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    pub fn save_schemas(&self, dir: impl AsRef<std::path::Path>) -> Result<()> {
        let tables: Vec<(String, SchemaRef)> = self
            .tables
            .read()
            .iter()
            .map(|(name, schema)| (name.clone(), schema.clone()))
            .collect();
        persistence::save(dir.as_ref(), &tables)
    }

    pub fn load_schemas(&self, dir: impl AsRef<std::path::Path>) -> Result<()> {
        let loaded = persistence::load(dir.as_ref())?;
        let mut tables = self.tables.write();
        for (name, schema) in loaded {
            tables.insert(name, schema);
        }
        Ok(())
    }

    /// Convenience wrappers around `save_schemas`/`load_schemas` for the
    /// common case of one fixed state directory set at construction
    /// (`EngineConfig::with_state_directory`). No-ops when unset.
    pub fn persist_schemas(&self) -> Result<()> {
        match self.config.state_directory.clone() {
            Some(dir) => self.save_schemas(dir),
            None => Ok(()),
        }
    }

    pub fn restore_schemas(&self) -> Result<()> {
        match self.config.state_directory.clone() {
            Some(dir) => self.load_schemas(dir),
            None => Ok(()),
        }
    }

    // ---- Flow installation (spec.md §4.6, §4.3) ----------------------

    pub fn has_flow(&self, flow_name: &str) -> bool {
        self.flows.read().contains_key(flow_name)
    }

    pub fn has_flows_for(&self, table_name: &str) -> bool {
        self.flows
            .read()
            .values()
            .any(|flow| flow.inputs.contains_key(table_name))
    }

    /// Clones `blueprint` into `partition_count` partitions, runs the
    /// partitioning-key analysis (spec.md §4.3), wires exchange peer
    /// channels, and hands each partition to the worker owning that
    /// partition id - spawning the worker on first use, reusing it for
    /// every later flow (spec.md §4.6: "shared across flows by partition
    /// id").
    pub fn add_flow(&self, flow_name: impl Into<String>, blueprint: GraphPartition) -> Result<()> {
        let flow_name = flow_name.into();
        if self.has_flow(&flow_name) {
            return Err(EngineError::DuplicateFlow(flow_name));
        }

        let matviews: Vec<NodeIndex> = blueprint
            .nodes()
            .iter()
            .enumerate()
            .filter_map(|(i, n)| matches!(n.kind, OperatorKind::MatView(_)).then_some(i))
            .collect();
        assert_eq!(
            matviews.len(),
            1,
            "InvalidPlan: flow '{flow_name}' must have exactly one materialized view, found {}",
            matviews.len()
        );
        let matview_node = matviews[0];

        let mut graph = Graph::build(&blueprint, &matviews, self.partition_count);

        let matview_key_cols = graph.node_partitioned_by(matview_node);
        let input_nodes = graph.input_nodes();
        let inputs: HashMap<String, NodeIndex> = input_nodes.iter().cloned().map(|(i, t)| (t, i)).collect();
        let input_partition_keys: HashMap<NodeIndex, Vec<ColumnId>> = input_nodes
            .iter()
            .map(|(i, _)| (*i, graph.input_partitioning(*i)))
            .collect();

        // One channel per destination partition; every other partition's
        // exchange operators and the engine's own ingestion path are
        // producers on it (spec.md §4.4, SPEC_FULL.md §5). Each channel is
        // bound to the destination worker's own notifier (spawning that
        // worker on first use) so a `send` actually wakes the thread that
        // drains it.
        let channels = self.channels_for_new_flow();

        for &exchange_node in &graph.exchange_nodes() {
            for source_partition in 0..self.partition_count {
                for dest_partition in 0..self.partition_count {
                    if source_partition == dest_partition {
                        continue;
                    }
                    graph.set_exchange_peer(
                        source_partition,
                        exchange_node,
                        dest_partition,
                        channels[dest_partition].clone(),
                    );
                }
            }
        }

        let partitions: Vec<Arc<RwLock<GraphPartition>>> = graph
            .into_partitions()
            .into_iter()
            .map(|p| Arc::new(RwLock::new(p)))
            .collect();

        let mut workers = self.workers.lock();
        for partition_id in 0..self.partition_count {
            let handle = workers
                .entry(partition_id)
                .or_insert_with(|| WorkerHandle::spawn(partition_id));
            handle.register_flow(
                flow_name.clone(),
                partitions[partition_id].clone(),
                channels[partition_id].clone(),
            );
        }
        drop(workers);

        self.flows.write().insert(
            flow_name,
            FlowState {
                inputs,
                input_partition_keys,
                matview_node,
                matview_key_cols,
                partitions,
                channels,
            },
        );
        Ok(())
    }

    /// Builds one channel per destination partition for a new flow,
    /// spawning each destination's worker thread if this is the first
    /// flow ever installed on it (spec.md §4.6: "shared across flows by
    /// partition id").
    fn channels_for_new_flow(&self) -> Vec<Arc<Channel>> {
        // Every peer partition's `Exchange` operator is a producer
        // (keyed by its own partition id), plus `Engine::process_records`
        // itself, which sends directly under `ENGINE_PRODUCER`.
        let mut producers: Vec<usize> = (0..self.partition_count).collect();
        producers.push(ENGINE_PRODUCER);
        let mut workers = self.workers.lock();
        (0..self.partition_count)
            .map(|dest| {
                let handle = workers
                    .entry(dest)
                    .or_insert_with(|| WorkerHandle::spawn(dest));
                Arc::new(Channel::new(producers.clone(), handle.notifier().clone()))
            })
            .collect()
    }

    // ---- Data ingress (spec.md §4.6, §4.7) ----------------------------

    /// Hash-partitions `records` on each reading flow's chosen input
    /// partitioning key and sends each bucket to the corresponding
    /// partition's channel (spec.md §4.6 `process_records`).
    pub fn process_records(&self, table_name: &str, records: Vec<Record>) -> Result<()> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(EngineError::ShuttingDown);
        }
        if !self.tables.read().contains_key(table_name) {
            return Err(EngineError::UnknownTable(table_name.to_string()));
        }

        let flows = self.flows.read();
        for flow in flows.values() {
            let Some(&input_node) = flow.inputs.get(table_name) else {
                continue;
            };
            let cols = flow
                .input_partition_keys
                .get(&input_node)
                .cloned()
                .unwrap_or_default();

            let mut buckets: HashMap<PartitionIndex, Vec<Record>> = HashMap::new();
            for record in &records {
                let dest = partition_of_record(record, &cols, self.partition_count);
                buckets.entry(dest).or_default().push(record.duplicate());
            }
            for (dest, bucket) in buckets {
                if bucket.is_empty() {
                    continue;
                }
                flow.channels[dest].send(
                    ENGINE_PRODUCER,
                    Batch {
                        source: input_node,
                        target: input_node,
                        records: bucket,
                    },
                );
            }
        }
        Ok(())
    }

    // ---- MatView lookup (spec.md §4.6) --------------------------------

    pub fn lookup(&self, flow_name: &str, key: &Key) -> Result<Vec<Record>> {
        let flows = self.flows.read();
        let flow = flows
            .get(flow_name)
            .ok_or_else(|| EngineError::UnknownFlow(flow_name.to_string()))?;
        let dest = partition_of_key(key, self.partition_count);
        let partition = flow.partitions[dest].read();
        Ok(partition
            .matview(flow.matview_node)
            .lookup(key)
            .into_iter()
            .map(Record::duplicate)
            .collect())
    }

    pub fn all(&self, flow_name: &str) -> Result<Vec<Record>> {
        let flows = self.flows.read();
        let flow = flows
            .get(flow_name)
            .ok_or_else(|| EngineError::UnknownFlow(flow_name.to_string()))?;
        let mut out = Vec::new();
        for partition in &flow.partitions {
            let partition = partition.read();
            out.extend(partition.matview(flow.matview_node).all().map(Record::duplicate));
        }
        Ok(out)
    }

    pub fn size(&self, flow_name: &str) -> Result<usize> {
        let flows = self.flows.read();
        let flow = flows
            .get(flow_name)
            .ok_or_else(|| EngineError::UnknownFlow(flow_name.to_string()))?;
        Ok(flow
            .partitions
            .iter()
            .map(|p| p.read().matview(flow.matview_node).count())
            .sum())
    }

    /// The flow's matview key columns - exposed so callers can build a
    /// `Key` for `lookup` in the same column order the planner pinned.
    pub fn matview_key_cols(&self, flow_name: &str) -> Result<Vec<ColumnId>> {
        self.flows
            .read()
            .get(flow_name)
            .map(|f| f.matview_key_cols.clone())
            .ok_or_else(|| EngineError::UnknownFlow(flow_name.to_string()))
    }

    // ---- Shutdown (spec.md §4.6, §5) -----------------------------------

    /// Sends `Stop` to every worker and joins all threads. Sleeps briefly
    /// first so already-enqueued batches (spec.md §5: "the engine sleeps
    /// briefly after its last `process_records` call before sending
    /// `Stop`") have a chance to drain before the stop signal races them.
    pub fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return; // already shut down
        }
        sleep(self.config.shutdown_drain_delay);
        let mut workers = self.workers.lock();
        for (_, handle) in workers.iter_mut() {
            handle.shutdown();
        }
        workers.clear();
        tracing::info!("engine shut down");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
