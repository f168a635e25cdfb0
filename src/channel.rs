//! The inter-worker message channel (spec.md §4.4 Channel).
//!
//! Grounded on `pelton::dataflow::Channel`
//! (examples/original_source/pelton/dataflow/channel.{h,cc}): a queue per
//! producer plus a separate queue for the client/engine producer, guarded
//! by a `shared_mutex` that producers take in shared mode (writing only
//! to their own slot) and the single consumer takes exclusively while
//! draining, plus a `binary_semaphore` that "guarantees notifications
//! will never be lost." We translate the shared-mutex trick into safe
//! Rust as `parking_lot::RwLock` over a map of per-producer
//! `parking_lot::Mutex<VecDeque<_>>` cells: producers only ever touch
//! their own cell (so a read lock on the outer map is enough even while
//! writing), and the consumer also only needs a read lock to drain every
//! cell in turn - the outer write lock is only ever needed if producers
//! were added after construction, which this crate never does.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};

use crate::operator::NodeIndex;
use crate::record::Record;

pub type ProducerId = usize;

/// Sentinel producer id for records injected directly by
/// `Engine::process_records`, as opposed to a peer partition's exchange
/// operator (spec.md §4.4 distinguishes the "engine-input channel" from
/// exchange-pair channels; the original keeps a wholly separate
/// `input_queue_` for the same reason).
pub const ENGINE_PRODUCER: ProducerId = usize::MAX;

/// One unit of work handed to a worker: a delta batch destined for
/// `target`, originating (for provenance/exchange routing) at `source`.
pub struct Batch {
    pub source: NodeIndex,
    pub target: NodeIndex,
    pub records: Vec<Record>,
}

/// Shared, lost-wakeup-free notification for one worker's monitored
/// channels. A `notify` sets a flag and wakes the worker; `wait` blocks
/// until the flag is set and clears it - so a notification that arrives
/// between a worker's last drain and its next wait is never missed, and
/// a burst of notifications while the worker is busy collapses into a
/// single wakeup (which is fine: the worker always drains everything
/// available, not just "one message").
pub struct WorkerNotifier {
    pending: Mutex<bool>,
    condvar: Condvar,
}

impl WorkerNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(WorkerNotifier {
            pending: Mutex::new(false),
            condvar: Condvar::new(),
        })
    }

    pub fn notify(&self) {
        let mut pending = self.pending.lock();
        *pending = true;
        self.condvar.notify_one();
    }

    /// Blocks until notified, then consumes the notification.
    pub fn wait(&self) {
        let mut pending = self.pending.lock();
        while !*pending {
            self.condvar.wait(&mut pending);
        }
        *pending = false;
    }
}

/// A single channel: many producers, one consumer, FIFO per producer
/// (spec.md §4.4).
pub struct Channel {
    producers: RwLock<HashMap<ProducerId, Mutex<VecDeque<Batch>>>>,
    notifier: Arc<WorkerNotifier>,
}

impl Channel {
    pub fn new(producer_ids: impl IntoIterator<Item = ProducerId>, notifier: Arc<WorkerNotifier>) -> Self {
        let producers = producer_ids
            .into_iter()
            .map(|id| (id, Mutex::new(VecDeque::new())))
            .collect();
        Channel {
            producers: RwLock::new(producers),
            notifier,
        }
    }

    /// Never blocks indefinitely (spec.md §4.4): acquires only a shared
    /// read lock on the producer map, then the producer's own cell.
    pub fn send(&self, producer: ProducerId, batch: Batch) {
        let producers = self.producers.read();
        let mut queue = producers
            .get(&producer)
            .unwrap_or_else(|| panic!("UnknownFlow: producer {producer} not registered on this channel"))
            .lock();
        queue.push_back(batch);
        drop(queue);
        drop(producers);
        self.notifier.notify();
    }

    /// Drains every producer's queue. Order across producers is
    /// unspecified; order within one producer's queue is FIFO.
    pub fn drain(&self) -> Vec<Batch> {
        let producers = self.producers.read();
        let mut out = Vec::new();
        for queue in producers.values() {
            let mut queue = queue.lock();
            out.extend(queue.drain(..));
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        let producers = self.producers.read();
        producers.values().all(|q| q.lock().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, SchemaRef};
    use crate::value::Value;

    fn schema() -> SchemaRef {
        SchemaRef::new(vec!["id".into()], vec![DataType::UInt], vec![0])
    }

    #[test]
    fn drain_collects_across_producers_in_fifo_order_per_producer() {
        let notifier = WorkerNotifier::new();
        let channel = Channel::new([0usize, 1usize], notifier);
        for i in 0..3 {
            channel.send(
                0,
                Batch {
                    source: 0,
                    target: 7,
                    records: vec![Record::new(schema(), vec![Value::UInt(i)], true)],
                },
            );
        }
        channel.send(
            1,
            Batch {
                source: 1,
                target: 7,
                records: vec![],
            },
        );
        let drained = channel.drain();
        assert_eq!(drained.len(), 4);
        let from_zero: Vec<u64> = drained
            .iter()
            .filter(|b| b.source == 0)
            .map(|b| b.records[0].value(0).as_uint())
            .collect();
        assert_eq!(from_zero, vec![0, 1, 2]);
        assert!(channel.is_empty());
    }

    #[test]
    fn notifier_wait_unblocks_after_notify() {
        let notifier = WorkerNotifier::new();
        let n2 = notifier.clone();
        let handle = std::thread::spawn(move || n2.notify());
        notifier.wait();
        handle.join().unwrap();
    }
}
