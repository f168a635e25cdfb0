//! `Graph`: N partition clones of a planned flow, annotated with
//! partitioning keys and spliced with `Exchange` operators wherever two
//! adjacent operators disagree about how their data is partitioned
//! (spec.md §4.3).
//!
//! Grounded on `pelton::dataflow::DataFlowGraph::AnnotateBaseGraph`
//! (examples/original_source/pelton/dataflow/graph.cc's partitioning
//! pass, conceptually - the original does this analysis once over a
//! single graph before cloning it for deployment; here the N clones
//! already exist, so the same top-down walk runs once against partition
//! 0's topology as the reference and replays every `Exchange` splice
//! across all N partitions in lockstep, keeping `NodeIndex` assignment
//! identical everywhere, as spec.md §4.3 requires).

use crate::operator::{ColumnId, NodeIndex, OperatorKind};
use crate::ops::exchange::ExchangeOperator;
use crate::partition::GraphPartition;
use crate::partitioning::PartitionIndex;

pub struct Graph {
    partitions: Vec<GraphPartition>,
}

impl Graph {
    /// Clones `template` into `partition_count` partitions and runs the
    /// partitioning-key analysis top-down from every node in `matviews`.
    pub fn build(template: &GraphPartition, matviews: &[NodeIndex], partition_count: usize) -> Graph {
        assert!(partition_count > 0, "partition count must be positive");
        let mut partitions: Vec<GraphPartition> = (0..partition_count)
            .map(|i| template.clone_into(i))
            .collect();

        let mut partitioned_by: Vec<Option<Vec<ColumnId>>> = partitions[0]
            .nodes()
            .iter()
            .map(|n| n.intrinsic_partitioning())
            .collect();

        for &matview in matviews {
            let recent = partitioned_by[matview]
                .clone()
                .expect("MatView must carry an intrinsic partitioning key");
            let parents = partitions[0].node(matview).parents.clone();
            for parent in parents {
                Self::visit(&mut partitions, &mut partitioned_by, parent, matview, recent.clone(), None);
            }
        }

        // `partitioned_by` above is scratch state local to the walk; copy
        // the final annotation back onto every partition's node so
        // `node_partitioned_by`/`input_partitioning` (which read the
        // node's own field) see it. Indices into `partitioned_by` only
        // cover nodes that existed before any `Exchange` splicing, which
        // is exactly the set the walk ever assigns.
        for (node, annotation) in partitioned_by.into_iter().enumerate() {
            if let Some(cols) = annotation {
                for partition in partitions.iter_mut() {
                    partition.node_mut(node).partitioned_by = Some(cols.clone());
                }
            }
        }

        Graph { partitions }
    }

    #[allow(clippy::too_many_arguments)]
    fn visit(
        partitions: &mut [GraphPartition],
        partitioned_by: &mut Vec<Option<Vec<ColumnId>>>,
        node: NodeIndex,
        child: NodeIndex,
        recent_partition: Vec<ColumnId>,
        tracking_union: Option<NodeIndex>,
    ) {
        let parents = partitions[0].node(node).parents.clone();
        let type_name = partitions[0].node(node).kind.type_name();
        let partition_count = partitions.len();

        match type_name {
            "Filter" | "Project" | "MatView" | "Identity" => {
                for parent in parents {
                    Self::visit(partitions, partitioned_by, parent, node, recent_partition.clone(), tracking_union);
                }
            }
            "Union" => {
                let tracked = tracking_union.unwrap_or(node);
                for parent in parents {
                    Self::visit(partitions, partitioned_by, parent, node, recent_partition.clone(), Some(tracked));
                }
            }
            "Input" => {
                let existing = partitioned_by[node].clone();
                match existing {
                    None => {
                        partitioned_by[node] = Some(recent_partition.clone());
                        Self::pin_union(partitioned_by, tracking_union, &recent_partition);
                    }
                    Some(pinned) if pinned != recent_partition => {
                        Self::splice_exchange(partitions, node, child, recent_partition, partition_count);
                    }
                    Some(_) => {}
                }
            }
            "EquiJoin" => {
                Self::pin_union(partitioned_by, tracking_union, &recent_partition);
                let own = partitioned_by[node]
                    .clone()
                    .expect("equijoin carries an intrinsic partitioning key");
                if own != recent_partition {
                    Self::splice_exchange(partitions, node, child, recent_partition, partition_count);
                }
                let (left_col, right_col) = match &partitions[0].node(node).kind {
                    OperatorKind::EquiJoin(op) => (op.left_col(), op.right_col()),
                    _ => unreachable!(),
                };
                if let [left_parent, right_parent] = parents[..] {
                    Self::visit(partitions, partitioned_by, left_parent, node, vec![left_col], tracking_union);
                    Self::visit(partitions, partitioned_by, right_parent, node, vec![right_col], tracking_union);
                }
            }
            "Aggregate" => {
                Self::pin_union(partitioned_by, tracking_union, &recent_partition);
                let own = partitioned_by[node]
                    .clone()
                    .expect("aggregate carries an intrinsic partitioning key");
                if own != recent_partition {
                    Self::splice_exchange(partitions, node, child, recent_partition, partition_count);
                }
                if let Some(&parent) = parents.first() {
                    Self::visit(partitions, partitioned_by, parent, node, own, tracking_union);
                }
            }
            "Exchange" => {
                for parent in parents {
                    Self::visit(partitions, partitioned_by, parent, node, recent_partition.clone(), tracking_union);
                }
            }
            other => panic!("InvalidPlan: unexpected operator kind {other} feeding a materialized view"),
        }
    }

    fn pin_union(
        partitioned_by: &mut [Option<Vec<ColumnId>>],
        tracking_union: Option<NodeIndex>,
        recent_partition: &[ColumnId],
    ) {
        if let Some(u) = tracking_union {
            if partitioned_by[u].is_none() {
                partitioned_by[u] = Some(recent_partition.to_vec());
            }
        }
    }

    /// Inserts an `Exchange` between `parent` and `child` in every
    /// partition, one call per partition so each gets an `Exchange`
    /// carrying its own partition id (spec.md §4.3: "it must be inserted
    /// at the same `NodeIndex` in all N partitions").
    fn splice_exchange(
        partitions: &mut [GraphPartition],
        parent: NodeIndex,
        child: NodeIndex,
        outkey: Vec<ColumnId>,
        partition_count: usize,
    ) {
        for (i, partition) in partitions.iter_mut().enumerate() {
            let exchange = OperatorKind::Exchange(ExchangeOperator::new(outkey.clone(), i, partition_count));
            partition.insert_node(exchange, parent, child);
        }
    }

    pub fn partitions(&self) -> &[GraphPartition] {
        &self.partitions
    }

    pub fn partitions_mut(&mut self) -> &mut [GraphPartition] {
        &mut self.partitions
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Consumes the graph, handing its N partitions to the caller (the
    /// engine wraps each in a lock and hands it to a worker). Must only be
    /// called after every `set_exchange_peer` wiring call.
    pub fn into_partitions(self) -> Vec<GraphPartition> {
        self.partitions
    }

    /// Any node's final `partitioned_by` annotation - for `Input` nodes
    /// this is the key `Engine::process_records` hashes incoming rows on;
    /// for a `MatView` node it's always that view's `key_cols` (the
    /// partitioning-key walk never reassigns a view's own annotation), the
    /// key `Engine::lookup_matview` hashes a lookup key on.
    pub fn node_partitioned_by(&self, node: NodeIndex) -> Vec<ColumnId> {
        self.partitions[0].node(node).partitioned_by.clone().unwrap_or_default()
    }

    /// Every `Exchange` node's index - identical across partitions by
    /// construction, so this reads partition 0 only. Used by the engine
    /// to wire each exchange's peer channels once every partition exists.
    pub fn exchange_nodes(&self) -> Vec<NodeIndex> {
        self.partitions[0]
            .nodes()
            .iter()
            .enumerate()
            .filter_map(|(i, n)| matches!(n.kind, OperatorKind::Exchange(_)).then_some(i))
            .collect()
    }

    pub fn input_nodes(&self) -> Vec<(NodeIndex, String)> {
        self.partitions[0]
            .nodes()
            .iter()
            .enumerate()
            .filter_map(|(i, n)| match &n.kind {
                OperatorKind::Input(op) => Some((i, op.table_name().to_string())),
                _ => None,
            })
            .collect()
    }

    /// The partitioning key each `Input` node ended up pinned to - used
    /// by `Engine::process_records` to hash incoming rows before
    /// dispatch (spec.md §4.6).
    pub fn input_partitioning(&self, node: NodeIndex) -> Vec<ColumnId> {
        self.partitions[0].node(node).partitioned_by.clone().unwrap_or_default()
    }

    pub fn set_exchange_peer(
        &mut self,
        source_partition: PartitionIndex,
        exchange_node: NodeIndex,
        dest_partition: PartitionIndex,
        channel: std::sync::Arc<crate::channel::Channel>,
    ) {
        match &mut self.partitions[source_partition].node_mut(exchange_node).kind {
            OperatorKind::Exchange(op) => op.set_peer(dest_partition, channel),
            _ => panic!("InvalidPlan: node {exchange_node} is not an Exchange"),
        }
    }
}
