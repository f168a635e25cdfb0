//! `Worker`: the OS thread that drives one partition (spec.md §4.5).
//!
//! Grounded on the teacher's plain `std::thread::spawn` background-thread
//! pattern (`buffer::manager`'s prefetch/flusher workers,
//! `concurrent::work_stealing`'s pool threads), rather than its async
//! `tokio`-actor machinery in `orchestration::actor` - spec.md §5 asks for
//! "parallel threads, one per partition," blocking on a condvar, which
//! matches the former far more closely than an async mailbox.
//!
//! spec.md §4.6 shares one worker thread per partition id *across every
//! installed flow*: `Engine::add_flow` does not spawn a fresh thread per
//! flow, it registers the new flow's partition and channel with whichever
//! worker already owns that partition id. `WorkerState::flows` is the
//! mutable registry `add_flow` writes into while the thread runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::RwLock;

use crate::channel::{Channel, WorkerNotifier};
use crate::partition::GraphPartition;
use crate::partitioning::PartitionIndex;

/// One flow's share of a worker: its partition at this worker's id, and
/// the single channel (spec.md §4.4) the worker drains batches for that
/// flow from.
struct FlowShare {
    partition: Arc<RwLock<GraphPartition>>,
    channel: Arc<Channel>,
}

/// Registry a running worker thread reads every wakeup and `add_flow`
/// writes into - the "shared across flows by partition id" requirement.
#[derive(Default)]
struct WorkerState {
    flows: RwLock<HashMap<String, FlowShare>>,
}

/// Handle the engine keeps for one partition's worker thread: lets
/// `add_flow` register new flows on an already-running worker and lets
/// `shutdown` signal it to stop (spec.md §5 "`Stop` is the sole
/// cancellation mechanism").
pub struct WorkerHandle {
    partition_id: PartitionIndex,
    notifier: Arc<WorkerNotifier>,
    state: Arc<WorkerState>,
    stop_tx: crossbeam::channel::Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn spawn(partition_id: PartitionIndex) -> Self {
        let notifier = WorkerNotifier::new();
        let state = Arc::new(WorkerState::default());
        let (stop_tx, stop_rx) = crossbeam::channel::bounded(1);

        let worker = Worker {
            partition_id,
            notifier: notifier.clone(),
            state: state.clone(),
            stop_rx,
        };
        let thread = std::thread::Builder::new()
            .name(format!("dataflow-worker-{partition_id}"))
            .spawn(move || worker.run())
            .expect("failed to spawn dataflow worker thread");

        WorkerHandle {
            partition_id,
            notifier,
            state,
            stop_tx,
            thread: Some(thread),
        }
    }

    pub fn partition_id(&self) -> PartitionIndex {
        self.partition_id
    }

    /// Registers `flow_name`'s partition and channel with this worker.
    /// Safe to call while the worker thread is running: the next wakeup
    /// re-reads the flow registry.
    pub fn register_flow(
        &self,
        flow_name: String,
        partition: Arc<RwLock<GraphPartition>>,
        channel: Arc<Channel>,
    ) {
        self.state
            .flows
            .write()
            .insert(flow_name, FlowShare { partition, channel });
        self.notifier.notify();
    }

    pub fn deregister_flow(&self, flow_name: &str) {
        self.state.flows.write().remove(flow_name);
    }

    pub fn notifier(&self) -> &Arc<WorkerNotifier> {
        &self.notifier
    }

    /// Sends `Stop` (spec.md §4.4) and blocks until the thread exits.
    /// Already-enqueued batches are processed first: the worker checks the
    /// stop signal only after draining every flow's channel one final
    /// time (spec.md §4.5 step 3, §5 "each worker processes all remaining
    /// non-stop messages before exiting").
    pub fn shutdown(&mut self) {
        let _ = self.stop_tx.send(());
        self.notifier.notify();
        if let Some(thread) = self.thread.take() {
            thread.join().expect("dataflow worker thread panicked");
        }
    }
}

struct Worker {
    partition_id: PartitionIndex,
    notifier: Arc<WorkerNotifier>,
    state: Arc<WorkerState>,
    stop_rx: crossbeam::channel::Receiver<()>,
}

impl Worker {
    /// Main loop (spec.md §4.5): wait on the notifier, drain every
    /// monitored channel across every registered flow, dispatch each
    /// batch to that flow's partition, then check the stop channel last.
    fn run(&self) {
        loop {
            self.notifier.wait();
            self.drain_once();
            if self.stop_rx.try_recv().is_ok() {
                self.drain_once();
                tracing::debug!(partition = self.partition_id, "worker stopping");
                break;
            }
        }
    }

    fn drain_once(&self) {
        let snapshot: Vec<(Arc<RwLock<GraphPartition>>, Arc<Channel>)> = self
            .state
            .flows
            .read()
            .values()
            .map(|share| (share.partition.clone(), share.channel.clone()))
            .collect();

        for (partition, channel) in snapshot {
            let batches = channel.drain();
            if batches.is_empty() {
                continue;
            }
            let mut partition = partition.write();
            for batch in batches {
                tracing::trace!(
                    partition = self.partition_id,
                    target = batch.target,
                    source = batch.source,
                    count = batch.records.len(),
                    "processing batch"
                );
                partition.process_at(batch.target, batch.source, batch.records);
            }
        }
    }
}
