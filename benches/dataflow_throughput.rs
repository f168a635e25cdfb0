// Throughput of Engine::process_records for a trivial insert-only flow,
// at a few partition counts, plus the cost of a three-way equi-join.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rustydb_dataflow::engine::Engine;
use rustydb_dataflow::operator::OperatorKind;
use rustydb_dataflow::ops::equijoin::{EquiJoinOperator, JoinMode};
use rustydb_dataflow::ops::input::InputOperator;
use rustydb_dataflow::ops::matview::{MatViewKind, MatViewOperator};
use rustydb_dataflow::partition::GraphPartition;
use rustydb_dataflow::schema::{DataType, SchemaRef};
use rustydb_dataflow::value::Value;
use rustydb_dataflow::{EngineConfig, Record};
use std::thread::sleep;
use std::time::Duration;

fn id_schema() -> SchemaRef {
    SchemaRef::new(
        vec!["id".into(), "v".into()],
        vec![DataType::UInt, DataType::UInt],
        vec![0],
    )
}

fn trivial_blueprint(schema: SchemaRef) -> GraphPartition {
    let mut p = GraphPartition::new(0);
    let input = p.add_input(OperatorKind::Input(InputOperator::new("t", schema)));
    p.add_output(
        OperatorKind::MatView(MatViewOperator::new(vec![0], MatViewKind::Unordered, None, None, 0)),
        input,
    );
    p
}

fn bench_insert_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_throughput");

    for partitions in [1usize, 4, 16] {
        group.bench_with_input(
            BenchmarkId::from_parameter(partitions),
            &partitions,
            |b, &partitions| {
                let engine = Engine::new(EngineConfig::default().with_partition_count(partitions));
                let schema = id_schema();
                engine.add_table_schema("t", schema.clone()).unwrap();
                engine.add_flow("v", trivial_blueprint(schema.clone())).unwrap();

                let batch: Vec<Record> = (0u64..1000)
                    .map(|i| Record::new(schema.clone(), vec![Value::UInt(i), Value::UInt(i % 100)], true))
                    .collect();

                b.iter(|| {
                    let chunk: Vec<Record> = batch
                        .iter()
                        .map(|r| Record::new(r.schema().clone(), r.values().to_vec(), r.is_positive()))
                        .collect();
                    engine.process_records("t", black_box(chunk)).unwrap();
                });

                sleep(Duration::from_millis(200));
                engine.shutdown();
            },
        );
    }

    group.finish();
}

fn left_schema() -> SchemaRef {
    SchemaRef::new(
        vec!["id".into(), "cat".into()],
        vec![DataType::UInt, DataType::UInt],
        vec![0],
    )
}

fn right_schema() -> SchemaRef {
    SchemaRef::new(
        vec!["id".into(), "cat".into(), "cnt".into()],
        vec![DataType::UInt, DataType::UInt, DataType::UInt],
        vec![0],
    )
}

fn join_blueprint() -> GraphPartition {
    let mut p = GraphPartition::new(0);
    let left = p.add_input(OperatorKind::Input(InputOperator::new("l", left_schema())));
    let right = p.add_input(OperatorKind::Input(InputOperator::new("r", right_schema())));
    let join = p.add_node(
        OperatorKind::EquiJoin(EquiJoinOperator::new(1, 1, JoinMode::Inner)),
        vec![left, right],
    );
    p.add_output(
        OperatorKind::MatView(MatViewOperator::new(vec![0], MatViewKind::Unordered, None, None, 0)),
        join,
    );
    p
}

fn bench_equijoin_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("equijoin_throughput");

    for partitions in [1usize, 4] {
        group.bench_with_input(
            BenchmarkId::from_parameter(partitions),
            &partitions,
            |b, &partitions| {
                let engine = Engine::new(EngineConfig::default().with_partition_count(partitions));
                engine.add_table_schema("l", left_schema()).unwrap();
                engine.add_table_schema("r", right_schema()).unwrap();
                engine.add_flow("v", join_blueprint()).unwrap();

                let r_rows: Vec<Record> = (0u64..100)
                    .map(|cat| Record::new(right_schema(), vec![Value::UInt(1000 + cat), Value::UInt(cat), Value::UInt(1)], true))
                    .collect();
                engine.process_records("r", r_rows).unwrap();
                sleep(Duration::from_millis(100));

                let l_rows: Vec<Record> = (0u64..1000)
                    .map(|i| Record::new(left_schema(), vec![Value::UInt(i), Value::UInt(i % 100)], true))
                    .collect();

                b.iter(|| {
                    let chunk: Vec<Record> = l_rows
                        .iter()
                        .map(|r| Record::new(r.schema().clone(), r.values().to_vec(), r.is_positive()))
                        .collect();
                    engine.process_records("l", black_box(chunk)).unwrap();
                });

                sleep(Duration::from_millis(200));
                engine.shutdown();
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_insert_throughput, bench_equijoin_throughput);
criterion_main!(benches);
