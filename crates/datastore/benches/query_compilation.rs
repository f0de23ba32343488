//! Query compilation and merge benchmarks
//!
//! Measures disjunction expansion, k-way merging of sub-query results, and
//! end-to-end fetches against the in-memory store.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use elif_datastore::query::merge::merge_sorted;
use elif_datastore::{Client, Entity, Key, Model, Property, Schema, SchemaBuilder, SortOrder, Value};

fn story_schema(client: &Client) -> Arc<Schema> {
    SchemaBuilder::new("Story")
        .property("rank", Property::integer())
        .property("tags", Property::string_list())
        .build(client.registry())
        .expect("schema")
}

fn bench_compilation(c: &mut Criterion) {
    let client = Client::in_memory();
    let story = story_schema(&client);
    let mut group = c.benchmark_group("query_compilation");

    group.bench_function("conjunctive", |b| {
        b.iter(|| {
            let query = client
                .query(&story)
                .filter("rank >", 3)
                .and_then(|q| q.filter("tags =", "rust"))
                .and_then(|q| q.order("-rank"))
                .expect("query");
            black_box(query.compiled())
        })
    });

    for values in [2usize, 5, 10] {
        group.bench_with_input(BenchmarkId::new("in_times_not_equal", values), &values, |b, &n| {
            let ranks: Vec<i64> = (0..n as i64).collect();
            b.iter(|| {
                let query = client
                    .query(&story)
                    .filter("rank in", ranks.clone())
                    .and_then(|q| q.filter("tags !=", "legacy"))
                    .expect("query");
                black_box(query.compiled())
            })
        });
    }

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_sorted");
    let orders = vec![SortOrder::asc("rank")];

    for streams in [2usize, 8, 30] {
        let results: Vec<Vec<Entity>> = (0..streams)
            .map(|stream| {
                (0..100)
                    .map(|i| {
                        let id = (i * streams + stream + 1) as i64;
                        let mut entity = Entity::new(Key::from_path(None, "Story", id).expect("key"));
                        entity.set("rank", Value::Integer(id % 50));
                        entity
                    })
                    .collect::<Vec<_>>()
            })
            .map(|mut stream| {
                stream.sort_by(|a, b| a.compare_by(b, &orders));
                stream
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(streams), &results, |b, results| {
            b.iter(|| black_box(merge_sorted(results.clone(), &orders)))
        });
    }

    group.finish();
}

fn bench_fetch(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let client = Client::in_memory();
    let story = story_schema(&client);

    runtime.block_on(async {
        for i in 1..=500i64 {
            let mut model = Model::builder(&story)
                .set("rank", i % 20)
                .set("tags", vec![if i % 2 == 0 { "rust" } else { "db" }])
                .build(&client)
                .expect("model");
            model.put(&client).await.expect("put");
        }
    });

    let mut group = c.benchmark_group("memory_fetch");
    group.bench_function("single", |b| {
        b.to_async(&runtime).iter(|| async {
            let mut query = client.query(&story).filter("rank >", 10).expect("query");
            let results: Vec<Model> = query.fetch(&client, 20, 0).await.expect("fetch");
            black_box(results)
        })
    });
    group.bench_function("disjunctive", |b| {
        b.to_async(&runtime).iter(|| async {
            let mut query = client
                .query(&story)
                .filter("rank in", vec![1, 5, 9])
                .and_then(|q| q.order("rank"))
                .expect("query");
            let results: Vec<Model> = query.fetch(&client, 20, 0).await.expect("fetch");
            black_box(results)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_compilation, bench_merge, bench_fetch);
criterion_main!(benches);
