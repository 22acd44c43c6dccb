//! Criterion benchmark for statement synthesis: where-clause rendering, the CRUD
//! builders, and a full `find` round trip against the recording mock connection, which
//! isolates the crate's own overhead from any server.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use sql_model::model::sql::{insert_sql, select_sql, update_sql};
use sql_model::test_utils::{CatalogRow, MockConnection, catalog_set, result_set};
use sql_model::{ColumnDescriptor, RowValues, Session, TableSchema, WhereClause};
use std::hint::black_box;
use tokio::runtime::Runtime;

fn wide_schema(columns: usize) -> TableSchema {
    let mut descriptors = vec![ColumnDescriptor {
        table_name: "Wide".into(),
        table_schema: None,
        name: "RecordId".into(),
        data_type: "int".into(),
        max_length: None,
        precision: Some(10),
        scale: Some(0),
        ordinal: 1,
        nullable: false,
        primary_key: true,
    }];
    for i in 0..columns {
        descriptors.push(ColumnDescriptor {
            table_name: "Wide".into(),
            table_schema: None,
            name: format!("Field{i}"),
            data_type: "nvarchar".into(),
            max_length: Some(50),
            precision: None,
            scale: None,
            ordinal: i32::try_from(i + 2).unwrap_or(i32::MAX),
            nullable: true,
            primary_key: false,
        });
    }
    TableSchema::new("Wide", descriptors).expect("valid schema")
}

fn clause(predicates: usize) -> WhereClause {
    (0..predicates).fold(WhereClause::new(), |clause, i| {
        clause.where_eq(format!("Field{i}"), format!("value{i}"))
    })
}

fn bench_builders(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builders");
    for width in [4usize, 16, 64] {
        let schema = wide_schema(width);
        let where_clause = clause(width.min(8));
        group.bench_with_input(BenchmarkId::new("select", width), &width, |b, _| {
            b.iter(|| black_box(select_sql(&schema, &where_clause, 10)));
        });
        group.bench_with_input(BenchmarkId::new("insert", width), &width, |b, _| {
            b.iter(|| black_box(insert_sql(&schema)));
        });
        group.bench_with_input(BenchmarkId::new("update", width), &width, |b, _| {
            b.iter(|| black_box(update_sql(&schema)));
        });
    }
    group.finish();
}

fn bench_find_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let mock = MockConnection::new();
    mock.push_rows(catalog_set(&[
        CatalogRow::new("People", "RecordId", "int").primary_key(),
        CatalogRow::new("People", "FirstName", "varchar").length(20),
        CatalogRow::new("People", "LastName", "varchar").length(20),
    ]));
    let session = Session::new(mock.clone());
    let models = rt
        .block_on(session.discover_model("People", "Person"))
        .expect("discovery");
    let person = models["Person"].clone();
    let rows = result_set(
        &["RecordId", "FirstName", "LastName"],
        (0..10)
            .map(|i| vec![RowValues::Int(i), "Jon".into(), "Watson".into()])
            .collect(),
    );

    c.bench_function("find_10_rows_mock", |b| {
        b.to_async(&rt).iter(|| {
            mock.clear_calls();
            mock.push_rows(rows.clone());
            let person = person.clone();
            async move {
                let found = person
                    .find(WhereClause::new().where_eq("FirstName", "Jon"), None)
                    .await
                    .expect("find");
                black_box(found)
            }
        });
    });
}

criterion_group!(benches, bench_builders, bench_find_round_trip);
criterion_main!(benches);
