//! Shared notes fixture for integration tests.
#![allow(dead_code)]

use contract_sdk::{
    compile, connect, ensure_schema, from_json_str, BroadcastNotifier, FullConfig, HookRegistry,
    Lifecycle, Provider, Record, StoreConfig,
};
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::broadcast;

pub const NOTES_CONFIG: &str = r#"{
    "database": {
        "name": "notes",
        "version": 1,
        "tables": [
            { "name": "lists", "columns": [
                { "name": "_id", "type": "INTEGER", "primary_key": true, "auto_increment": true },
                { "name": "title", "type": "TEXT", "not_null": true } ] },
            { "name": "notes", "columns": [
                { "name": "_id", "type": "INTEGER", "primary_key": true, "auto_increment": true },
                { "name": "listId", "type": "INTEGER",
                  "references": { "table": "lists", "column": "_id", "on_delete": "CASCADE" } },
                { "name": "note", "type": "TEXT" },
                { "name": "status", "type": "TEXT", "default": "'new'",
                  "check": "status in ('new','completed')" } ] }
        ]
    },
    "provider": {
        "name": "notes",
        "groups": [
            { "name": "lists", "table": "lists",
              "endpoints": [
                { "name": "LISTS", "path": "/lists", "type": "vnd.test.dir/list", "default_sort": "title ASC" },
                { "name": "LIST_ID", "path": "/lists/#", "type": "vnd.test.item/list",
                  "operations": ["query", "update", "delete"],
                  "bindings": [ { "segment": 1, "column": "_id" } ] } ] },
            { "name": "notes", "table": "notes",
              "map_columns": { "list_title": "lists.title" },
              "notify_defaults": { "insert": "group_insert", "update": "group_update" },
              "overrides": [
                { "kind": "notify_insert", "paths": ["/notes"], "hook": "note_and_list" },
                { "kind": "insert_uri", "paths": ["/notes"], "hook": "note_uri" },
                { "kind": "where", "paths": ["/notes/open"], "hook": "open_only" }
              ],
              "notification_uris": [ { "paths": ["/notes/fromList/#"], "uri": "/notes" } ],
              "endpoints": [
                { "name": "NOTES", "path": "/notes", "type": "vnd.test.dir/note",
                  "join": "LEFT JOIN lists ON notes.listId = lists._id",
                  "default_sort": "notes._id ASC" },
                { "name": "NOTE_ID", "path": "/notes/#", "type": "vnd.test.item/note",
                  "operations": ["query", "update", "delete"],
                  "bindings": [ { "segment": 1, "column": "_id" } ] },
                { "name": "FROM_LIST", "path": "/notes/fromList/#", "type": "vnd.test.dir/note",
                  "bindings": [ { "segment": 2, "column": "listId" } ] },
                { "name": "OPEN", "path": "/notes/open", "type": "vnd.test.dir/note",
                  "operations": ["query"] } ] }
        ]
    }
}"#;

pub fn notes_config() -> FullConfig {
    from_json_str(NOTES_CONFIG).unwrap()
}

pub fn notes_hooks() -> HookRegistry {
    HookRegistry::new()
        .with_notify("group_insert", |_| vec!["/group-default".into()])
        .with_notify("group_update", |_| vec!["/group-update".into()])
        .with_notify("note_and_list", |ctx| {
            let mut targets = vec![ctx.locator.as_str().to_string()];
            if let Some(list) = ctx.record.and_then(|r| r.get("listId")).and_then(Value::as_i64) {
                targets.push(format!("/lists/{}", list));
            }
            targets
        })
        .with_insert_uri("note_uri", |ctx| format!("note:{}", ctx.id))
        .with_where("open_only", |_| vec!["status = 'new'".into()])
}

pub async fn memory_pool() -> Result<SqlitePool, Box<dyn std::error::Error>> {
    let pool = connect(&StoreConfig {
        database_url: "sqlite::memory:".into(),
        max_connections: 1,
    })
    .await?;
    Ok(pool)
}

pub struct Fixture {
    pub provider: Provider,
    pub changes: broadcast::Receiver<String>,
}

pub async fn setup() -> Result<Fixture, Box<dyn std::error::Error>> {
    let compiled = compile(&notes_config(), &notes_hooks())?;
    let pool = memory_pool().await?;
    ensure_schema(&pool, &compiled.schema, &Lifecycle::new()).await?;
    let notifier = Arc::new(BroadcastNotifier::new(64));
    let changes = notifier.subscribe();
    Ok(Fixture {
        provider: Provider::new(compiled.provider, pool, notifier),
        changes,
    })
}

/// Everything signalled so far, in order.
pub fn drain(rx: &mut broadcast::Receiver<String>) -> Vec<String> {
    let mut seen = Vec::new();
    while let Ok(locator) = rx.try_recv() {
        seen.push(locator);
    }
    seen
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}
