//! The operator graph node: common metadata (parentage, schemas,
//! partitioning annotation) plus a tagged-union dispatch to one of the
//! eight operator kinds.
//!
//! Grounded on `pelton::dataflow::Operator` (examples/original_source/
//! pelton/dataflow/operator.h), which separates common per-node state
//! (NodeIndex, parents, children, input/output schemas) from per-variant
//! state held by subclasses. Design note in spec.md §9 asks for "tagged
//! variants... dispatching process/clone through a trait/interface" rather
//! than an inheritance hierarchy - `OperatorKind` below is that enum, each
//! variant owning its state inline, `rusty-db`-style (see
//! `src/event_processing/operators/*.rs` in the teacher, where every
//! operator is a plain struct implementing a shared `StreamOperator`
//! trait).

use crate::ops::aggregate::AggregateOperator;
use crate::ops::equijoin::EquiJoinOperator;
use crate::ops::exchange::ExchangeOperator;
use crate::ops::filter::FilterOperator;
use crate::ops::identity::IdentityOperator;
use crate::ops::input::InputOperator;
use crate::ops::matview::MatViewOperator;
use crate::ops::project::ProjectOperator;
use crate::ops::union::UnionOperator;
use crate::record::Record;
use crate::schema::SchemaRef;

pub type NodeIndex = usize;
pub type ColumnId = usize;

/// One of the eight operator variants named in spec.md §4.1, plus
/// `Exchange`, the re-partitioning operator the planner inserts (spec.md
/// §4.3) - not a "base" operator in the planner's input, but a first-class
/// member of the same dispatch enum once inserted.
pub enum OperatorKind {
    Input(InputOperator),
    Identity(IdentityOperator),
    Filter(FilterOperator),
    Project(ProjectOperator),
    Union(UnionOperator),
    EquiJoin(EquiJoinOperator),
    Aggregate(AggregateOperator),
    MatView(MatViewOperator),
    Exchange(ExchangeOperator),
}

impl OperatorKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            OperatorKind::Input(_) => "Input",
            OperatorKind::Identity(_) => "Identity",
            OperatorKind::Filter(_) => "Filter",
            OperatorKind::Project(_) => "Project",
            OperatorKind::Union(_) => "Union",
            OperatorKind::EquiJoin(_) => "EquiJoin",
            OperatorKind::Aggregate(_) => "Aggregate",
            OperatorKind::MatView(_) => "MatView",
            OperatorKind::Exchange(_) => "Exchange",
        }
    }

    /// Called lazily, once, after every parent has been attached (spec.md
    /// §3 Operator invariants: "idempotent and deterministic"). Takes
    /// `&mut self` so `EquiJoin` can cache each side's schema width up
    /// front, for sizing outer-join null pads before either side's table
    /// has received a single record.
    pub fn compute_output_schema(&mut self, input_schemas: &[SchemaRef]) -> SchemaRef {
        match self {
            OperatorKind::Input(op) => op.output_schema(),
            OperatorKind::Identity(_) => input_schemas[0].clone(),
            OperatorKind::Filter(_) => input_schemas[0].clone(),
            OperatorKind::Project(op) => op.compute_output_schema(&input_schemas[0]),
            OperatorKind::Union(_) => {
                for pair in input_schemas.windows(2) {
                    assert!(
                        pair[0] == pair[1],
                        "union parents must share an identical schema"
                    );
                }
                input_schemas[0].clone()
            }
            OperatorKind::EquiJoin(op) => {
                op.compute_output_schema(&input_schemas[0], &input_schemas[1])
            }
            OperatorKind::Aggregate(op) => op.compute_output_schema(&input_schemas[0]),
            OperatorKind::MatView(_) => input_schemas[0].clone(),
            OperatorKind::Exchange(_) => input_schemas[0].clone(),
        }
    }

    /// Deep copy of parameters with fresh, empty runtime state - used when
    /// a partition is cloned (spec.md §4.2 `clone`).
    pub fn clone_fresh(&self) -> Self {
        match self {
            OperatorKind::Input(op) => OperatorKind::Input(op.clone_fresh()),
            OperatorKind::Identity(op) => OperatorKind::Identity(op.clone_fresh()),
            OperatorKind::Filter(op) => OperatorKind::Filter(op.clone_fresh()),
            OperatorKind::Project(op) => OperatorKind::Project(op.clone_fresh()),
            OperatorKind::Union(op) => OperatorKind::Union(op.clone_fresh()),
            OperatorKind::EquiJoin(op) => OperatorKind::EquiJoin(op.clone_fresh()),
            OperatorKind::Aggregate(op) => OperatorKind::Aggregate(op.clone_fresh()),
            OperatorKind::MatView(op) => OperatorKind::MatView(op.clone_fresh()),
            OperatorKind::Exchange(op) => OperatorKind::Exchange(op.clone_fresh()),
        }
    }
}

/// A graph node: dispatch target plus the common bookkeeping every
/// operator shares (spec.md §3 "Operator (node)").
pub struct Node {
    pub index: NodeIndex,
    pub parents: Vec<NodeIndex>,
    pub children: Vec<NodeIndex>,
    pub input_schemas: Vec<SchemaRef>,
    pub output_schema: Option<SchemaRef>,
    /// `None` until partitioning-key analysis (spec.md §4.3) pins it.
    pub partitioned_by: Option<Vec<ColumnId>>,
    pub kind: OperatorKind,
}

impl Node {
    pub fn new(index: NodeIndex, parents: Vec<NodeIndex>, kind: OperatorKind) -> Self {
        Node {
            index,
            parents,
            children: Vec::new(),
            input_schemas: Vec::new(),
            output_schema: None,
            partitioned_by: None,
            kind,
        }
    }

    /// Statically known partitioning for operators whose output key never
    /// depends on their input (spec.md §4.3 "annotates every node").
    pub fn intrinsic_partitioning(&self) -> Option<Vec<ColumnId>> {
        match &self.kind {
            OperatorKind::MatView(op) => Some(op.key_cols().to_vec()),
            OperatorKind::EquiJoin(op) => Some(vec![op.left_col()]),
            OperatorKind::Aggregate(op) => Some(op.group_cols().to_vec()),
            _ => None,
        }
    }

    pub fn attach_input_schema(&mut self, schema: SchemaRef) {
        self.input_schemas.push(schema);
    }

    pub fn compute_output_schema(&mut self) {
        if self.output_schema.is_none() {
            let schema = self.kind.compute_output_schema(&self.input_schemas);
            self.output_schema = Some(schema);
        }
    }

    pub fn output_schema(&self) -> &SchemaRef {
        self.output_schema
            .as_ref()
            .expect("output schema requested before compute_output_schema ran")
    }

    pub fn process(&mut self, source: NodeIndex, records: Vec<Record>) -> Vec<Record> {
        let output_schema = self.output_schema().clone();
        match &mut self.kind {
            OperatorKind::Input(op) => op.process(records),
            OperatorKind::Identity(op) => op.process(records),
            OperatorKind::Filter(op) => op.process(records),
            OperatorKind::Project(op) => op.process(records, &output_schema),
            OperatorKind::Union(op) => op.process(records),
            OperatorKind::EquiJoin(op) => {
                op.process(self.parents[0], self.parents[1], source, records, &output_schema)
            }
            OperatorKind::Aggregate(op) => op.process(records, &output_schema),
            OperatorKind::MatView(op) => {
                op.process(records);
                Vec::new()
            }
            OperatorKind::Exchange(op) => op.process(self.index, source, records),
        }
    }

    pub fn clone_fresh(&self) -> Node {
        Node {
            index: self.index,
            parents: self.parents.clone(),
            children: self.children.clone(),
            input_schemas: self.input_schemas.clone(),
            output_schema: self.output_schema.clone(),
            partitioned_by: self.partitioned_by.clone(),
            kind: self.kind.clone_fresh(),
        }
    }
}
