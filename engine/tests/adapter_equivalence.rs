//! The three adapters must be indistinguishable through the table interface.
//!
//! Every test runs the same calls against the in-memory adapter, the file
//! adapter and the HTTP adapter (over a loopback transport) and compares.

use serde_json::{json, Value};
use std::sync::Arc;
use tablesync_engine::{
    Fields, FileAdapter, HttpAdapter, LoopbackTransport, MemoryAdapter, Query, Record,
    SharedInterface, TableInterface, TableSync, UpdateParams,
};
use tempfile::TempDir;

fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

struct Backends {
    _dir: TempDir,
    all: Vec<(&'static str, SharedInterface)>,
}

fn backends() -> Backends {
    let dir = tempfile::tempdir().unwrap();
    let http = HttpAdapter::new(LoopbackTransport::new(MemoryAdapter::new(), "/api"), "/api");
    let all: Vec<(&'static str, SharedInterface)> = vec![
        ("memory", Arc::new(MemoryAdapter::new())),
        ("file", Arc::new(FileAdapter::new(dir.path()))),
        ("http", Arc::new(http)),
    ];
    Backends { _dir: dir, all }
}

async fn run_script(backend: &SharedInterface) -> Vec<Record> {
    for (id, text, completed) in [("1", "b", false), ("2", "a", false), ("3", "c", true)] {
        backend
            .create(
                "todos",
                fields(json!({"id": id, "text": text, "completed": completed})),
            )
            .await
            .unwrap();
    }
    backend
        .update("todos", "1", fields(json!({"completed": true, "tags": ["x"]})))
        .await
        .unwrap();
    backend.remove("todos", "2").await.unwrap();
    backend
        .create("todos", fields(json!({"id": "4", "text": "d", "completed": false})))
        .await
        .unwrap();
    backend.list("todos", &Query::new()).await.unwrap()
}

#[tokio::test]
async fn same_script_same_records() {
    let backends = backends();
    let mut results = Vec::new();
    for (name, backend) in &backends.all {
        results.push((*name, run_script(backend).await));
    }

    let (_, expected) = &results[0];
    let ids: Vec<&str> = expected.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "3", "4"]);
    for (name, records) in &results[1..] {
        assert_eq!(records, expected, "{name} diverged from memory");
    }
}

#[tokio::test]
async fn scenario_b_on_every_adapter() {
    let backends = backends();
    let seed = [
        json!({"id": 1, "text": "b", "completed": false}),
        json!({"id": 2, "text": "a", "completed": false}),
        json!({"id": 3, "text": "c", "completed": true}),
    ];
    let query = Query::from_value(&json!({
        "completed": false,
        "$sort": {"text": 1},
        "$limit": 2
    }))
    .unwrap();

    for (name, backend) in &backends.all {
        for value in &seed {
            let record = Record::from_value(value.clone()).unwrap();
            let mut data = record.fields.clone();
            data.insert("id".into(), json!(record.id));
            backend.create("todos", data).await.unwrap();
        }
        let found = backend.list("todos", &query).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"], "{name}");
    }
}

#[tokio::test]
async fn operators_agree_across_adapters() {
    let backends = backends();
    let query = Query::new()
        .gte("n", 2)
        .not_in("tag", vec![json!("skip")])
        .sort_desc("n")
        .skip(1)
        .select(["n"]);

    let mut results = Vec::new();
    for (name, backend) in &backends.all {
        for n in 0..6 {
            let tag = if n == 4 { "skip" } else { "keep" };
            backend
                .create("items", fields(json!({"id": format!("i{n}"), "n": n, "tag": tag})))
                .await
                .unwrap();
        }
        results.push((*name, backend.list("items", &query).await.unwrap()));
    }

    let (_, expected) = &results[0];
    let ns: Vec<Value> = expected.iter().map(|r| r.fields["n"].clone()).collect();
    assert_eq!(ns, vec![json!(3), json!(2)]);
    assert!(expected.iter().all(|r| !r.fields.contains_key("tag")));
    for (name, records) in &results[1..] {
        assert_eq!(records, expected, "{name} diverged from memory");
    }
}

#[tokio::test]
async fn not_found_everywhere_and_index_unchanged() {
    let backends = backends();
    for (name, backend) in &backends.all {
        let sync = TableSync::new("todos", backend.clone());
        let existing = sync
            .create()
            .trigger(fields(json!({"id": "keep", "text": "x"})))
            .await
            .unwrap();
        let version = sync.index().version();

        let err = sync.find().trigger("nope".into()).await.unwrap_err();
        assert!(err.is_not_found(), "{name} find: {err}");

        let err = sync
            .update()
            .trigger(UpdateParams::new("nope", fields(json!({"text": "y"}))))
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "{name} update: {err}");

        let err = sync.remove().trigger("nope".into()).await.unwrap_err();
        assert!(err.is_not_found(), "{name} remove: {err}");

        assert_eq!(sync.index().version(), version, "{name}");
        assert_eq!(sync.records().as_slice(), &[existing][..], "{name}");
    }
}

#[tokio::test]
async fn duplicate_create_rejected_everywhere() {
    let backends = backends();
    for (name, backend) in &backends.all {
        backend
            .create("todos", fields(json!({"id": "dup", "text": "first"})))
            .await
            .unwrap();
        let err = backend
            .create("todos", fields(json!({"id": "dup", "text": "second"})))
            .await
            .unwrap_err();
        assert!(
            matches!(err, tablesync_engine::Error::AlreadyExists { .. }),
            "{name}: {err}"
        );
        let kept = backend.find("todos", "dup").await.unwrap();
        assert_eq!(kept.fields["text"], json!("first"), "{name}");
    }
}

#[tokio::test]
async fn generated_ids_are_unique_and_findable() {
    let backends = backends();
    for (name, backend) in &backends.all {
        let a = backend
            .create("todos", fields(json!({"text": "buy milk"})))
            .await
            .unwrap();
        let b = backend
            .create("todos", fields(json!({"text": "buy milk"})))
            .await
            .unwrap();
        assert_ne!(a.id, b.id, "{name}");
        assert_eq!(backend.find("todos", &a.id).await.unwrap(), a, "{name}");
    }
}

#[tokio::test]
async fn empty_table_lists_empty() {
    let backends = backends();
    for (name, backend) in &backends.all {
        let found = backend.list("never_written", &Query::new()).await.unwrap();
        assert!(found.is_empty(), "{name}");
    }
}

#[tokio::test]
async fn empty_arrays_agree_across_adapters() {
    let backends = backends();
    let queries = [
        Query::new().is_in("text", vec![]),
        Query::new().not_in("text", vec![]),
        Query::new().select(Vec::<String>::new()),
        Query::new().eq("tags", json!([])),
    ];

    for (name, backend) in &backends.all {
        backend
            .create("todos", fields(json!({"id": "1", "text": "a", "secret": 1, "tags": []})))
            .await
            .unwrap();
        backend
            .create("todos", fields(json!({"id": "2", "text": "b", "tags": ["x"]})))
            .await
            .unwrap();

        let results: Vec<Vec<Record>> = {
            let mut out = Vec::new();
            for query in &queries {
                out.push(backend.list("todos", query).await.unwrap());
            }
            out
        };

        assert!(results[0].is_empty(), "{name}: $in []");
        assert_eq!(results[1].len(), 2, "{name}: $nin []");
        assert_eq!(
            results[2],
            vec![Record::new("1", Fields::new()), Record::new("2", Fields::new())],
            "{name}: $select []"
        );
        let ids: Vec<&str> = results[3].iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1"], "{name}: equals []");
    }
}
