//! `GraphPartition`: one partition's private arena of operator nodes
//! (spec.md §4.2).
//!
//! Grounded on `pelton::dataflow::DataFlowGraphPartition`
//! (examples/original_source/pelton/dataflow/graph_partition.h), which
//! likewise owns its operators by `NodeIndex` and exposes `AddInput` /
//! `AddNode` / `Process`. `insert_node` (used to splice exchange
//! operators into an existing edge, spec.md §4.3) has no direct original
//! counterpart - partitioning there is external to the graph - but
//! follows the same "operators live in a flat, index-addressed arena"
//! shape as the rest of this module.

use crate::operator::{Node, NodeIndex, OperatorKind};
use crate::ops::matview::MatViewOperator;
use crate::partitioning::PartitionIndex;
use crate::record::Record;

pub struct GraphPartition {
    partition_id: PartitionIndex,
    nodes: Vec<Node>,
}

impl GraphPartition {
    pub fn new(partition_id: PartitionIndex) -> Self {
        GraphPartition {
            partition_id,
            nodes: Vec::new(),
        }
    }

    pub fn partition_id(&self) -> PartitionIndex {
        self.partition_id
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index]
    }

    pub fn node_mut(&mut self, index: NodeIndex) -> &mut Node {
        &mut self.nodes[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds a root node with no parents (spec.md §4.2 `add_input`).
    pub fn add_input(&mut self, kind: OperatorKind) -> NodeIndex {
        assert!(matches!(kind, OperatorKind::Input(_)), "add_input requires an Input operator");
        self.add_node(kind, vec![])
    }

    /// Adds a node with exactly one parent (spec.md §4.2 `add_output`) -
    /// named separately from `add_node` because every terminal node in a
    /// planned flow (a `MatView`) is built this way, one parent at a time.
    pub fn add_output(&mut self, kind: OperatorKind, parent: NodeIndex) -> NodeIndex {
        self.add_node(kind, vec![parent])
    }

    /// Assigns the next `NodeIndex`, wires parent/child pointers, and
    /// computes the new node's output schema (spec.md §4.2 `add_node`).
    pub fn add_node(&mut self, kind: OperatorKind, parents: Vec<NodeIndex>) -> NodeIndex {
        let index = self.nodes.len();
        let mut node = Node::new(index, parents.clone(), kind);
        for &parent in &parents {
            let schema = self.nodes[parent].output_schema().clone();
            node.attach_input_schema(schema);
            self.nodes[parent].children.push(index);
        }
        node.compute_output_schema();
        self.nodes.push(node);
        index
    }

    /// Splices `kind` into the existing `parent -> child` edge, producing
    /// `parent -> kind -> child` (spec.md §4.3, used to insert `Exchange`
    /// operators post-hoc). The new node is always appended at the end of
    /// the arena - since every partition starts as an identical clone and
    /// the partitioning-key analysis that calls this walks all of them in
    /// lockstep, the assigned index is guaranteed to match across
    /// partitions (spec.md §4.3: "it must be inserted at the same
    /// `NodeIndex` in all N partitions").
    pub fn insert_node(&mut self, kind: OperatorKind, parent: NodeIndex, child: NodeIndex) -> NodeIndex {
        let index = self.nodes.len();
        let parent_schema = self.nodes[parent].output_schema().clone();
        let mut node = Node::new(index, vec![parent], kind);
        node.attach_input_schema(parent_schema);
        node.compute_output_schema();
        node.children.push(child);

        if let Some(pos) = self.nodes[parent].children.iter().position(|&c| c == child) {
            self.nodes[parent].children[pos] = index;
        }
        if let Some(pos) = self.nodes[child].parents.iter().position(|&p| p == parent) {
            self.nodes[child].parents[pos] = index;
        }
        self.nodes.push(node);
        index
    }

    /// Feeds `records` into `input_node` and fans the results out through
    /// the graph (spec.md §4.2 `process`). Used for the ordinary,
    /// non-exchange intra-partition path, i.e. the engine's initial
    /// delivery of a batch to a table's `Input` node.
    pub fn process(&mut self, input_node: NodeIndex, records: Vec<Record>) {
        self.process_at(input_node, input_node, records);
    }

    /// Invokes `target`'s operator with `records` sourced from `source`,
    /// then recursively fans the output to every child - duplicating the
    /// batch (spec.md §3: `Record` has no implicit copy) for every child
    /// but the last, which receives the batch by value.
    pub fn process_at(&mut self, target: NodeIndex, source: NodeIndex, records: Vec<Record>) {
        if records.is_empty() {
            return;
        }
        let output = self.nodes[target].process(source, records);
        if output.is_empty() {
            return;
        }
        let children = self.nodes[target].children.clone();
        match children.split_last() {
            None => {} // leaf: MatView already folded these into its own state
            Some((&last, rest)) => {
                for &child in rest {
                    let duplicate: Vec<Record> = output.iter().map(Record::duplicate).collect();
                    self.process_at(child, target, duplicate);
                }
                self.process_at(last, target, output);
            }
        }
    }

    /// Produces an independent clone with identical topology but fresh,
    /// empty operator state (spec.md §4.2 `clone`). Iterating `self.nodes`
    /// in order and pushing preserves `NodeIndex` assignment 1:1.
    pub fn clone_into(&self, new_partition_id: PartitionIndex) -> GraphPartition {
        GraphPartition {
            partition_id: new_partition_id,
            nodes: self.nodes.iter().map(Node::clone_fresh).collect(),
        }
    }

    pub fn matview(&self, index: NodeIndex) -> &MatViewOperator {
        match &self.nodes[index].kind {
            OperatorKind::MatView(op) => op,
            other => panic!("InvalidPlan: node {index} is a {}, not a MatView", other.type_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::filter::{CompareOp, FilterOp, FilterOperator};
    use crate::ops::input::InputOperator;
    use crate::ops::matview::MatViewKind;
    use crate::schema::{DataType, SchemaRef};
    use crate::value::Value;

    fn schema() -> SchemaRef {
        SchemaRef::new(
            vec!["id".into(), "amount".into()],
            vec![DataType::UInt, DataType::Int],
            vec![0],
        )
    }

    #[test]
    fn process_fans_filtered_records_into_the_matview() {
        let mut partition = GraphPartition::new(0);
        let input = partition.add_input(OperatorKind::Input(InputOperator::new("t", schema())));
        let filter = partition.add_output(
            OperatorKind::Filter(FilterOperator::new(vec![FilterOp::ColumnLiteral {
                column: 1,
                op: CompareOp::Ge,
                literal: Value::Int(10),
            }])),
            input,
        );
        let matview = partition.add_output(
            OperatorKind::MatView(MatViewOperator::new(vec![0], MatViewKind::Unordered, None, None, 0)),
            filter,
        );

        partition.process(
            input,
            vec![
                Record::new(schema(), vec![Value::UInt(1), Value::Int(5)], true),
                Record::new(schema(), vec![Value::UInt(2), Value::Int(20)], true),
            ],
        );

        assert_eq!(partition.matview(matview).count(), 1);
    }

    #[test]
    fn clone_into_preserves_node_indices_with_fresh_state() {
        let mut partition = GraphPartition::new(0);
        let input = partition.add_input(OperatorKind::Input(InputOperator::new("t", schema())));
        let matview = partition.add_output(
            OperatorKind::MatView(MatViewOperator::new(vec![0], MatViewKind::Unordered, None, None, 0)),
            input,
        );
        partition.process(input, vec![Record::new(schema(), vec![Value::UInt(1), Value::Int(5)], true)]);
        assert_eq!(partition.matview(matview).count(), 1);

        let cloned = partition.clone_into(1);
        assert_eq!(cloned.len(), partition.len());
        assert_eq!(cloned.matview(matview).count(), 0, "cloned state starts empty");
    }
}
