mod common;

use common::{memory_pool, notes_config, notes_hooks};
use contract_sdk::{compile, connect_with, ensure_schema, AppError, Lifecycle, SchemaStatus, StoreConfig};
use futures::FutureExt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_compiled_statements_follow_table_order() -> Result<(), Box<dyn std::error::Error>> {
    let compiled = compile(&notes_config(), &notes_hooks())?;
    let names: Vec<&str> = compiled.schema.statements.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["lists", "notes"]);

    let notes = compiled.schema.create_statement("notes")?;
    assert!(notes.starts_with("CREATE TABLE notes (_id INTEGER PRIMARY KEY AUTOINCREMENT, "));
    assert!(notes.contains("status TEXT DEFAULT 'new' CHECK ( status in ('new','completed') )"));
    assert!(compiled.schema.create_statement("missing").is_err());
    Ok(())
}

#[tokio::test]
async fn test_create_then_current() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = notes_config();
    config
        .database
        .exec_on_create
        .push("INSERT INTO lists (title) VALUES ('Inbox')".into());
    let compiled = compile(&config, &notes_hooks())?;
    let pool = memory_pool().await?;

    let created = Arc::new(AtomicU32::new(0));
    let counter = created.clone();
    let lifecycle = Lifecycle::new().on_create(move |_pool| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), AppError>(())
        }
        .boxed()
    });

    assert_eq!(ensure_schema(&pool, &compiled.schema, &lifecycle).await?, SchemaStatus::Created);
    assert_eq!(ensure_schema(&pool, &compiled.schema, &lifecycle).await?, SchemaStatus::Current);
    assert_eq!(created.load(Ordering::SeqCst), 1);

    let (version,): (i64,) = sqlx::query_as("PRAGMA user_version").fetch_one(&pool).await?;
    assert_eq!(version, 1);
    let (title,): (String,) = sqlx::query_as("SELECT title FROM lists").fetch_one(&pool).await?;
    assert_eq!(title, "Inbox");
    Ok(())
}

#[tokio::test]
async fn test_upgrade_runs_hook_and_downgrade_fails() -> Result<(), Box<dyn std::error::Error>> {
    let v1 = compile(&notes_config(), &notes_hooks())?;
    let mut config = notes_config();
    config.database.version = 2;
    let v2 = compile(&config, &notes_hooks())?;
    let pool = memory_pool().await?;

    ensure_schema(&pool, &v1.schema, &Lifecycle::new()).await?;

    let upgrade = Lifecycle::new().on_upgrade(|pool, from, to| {
        async move {
            assert_eq!((from, to), (1, 2));
            sqlx::query("ALTER TABLE notes ADD COLUMN due TEXT")
                .execute(&pool)
                .await?;
            Ok::<(), AppError>(())
        }
        .boxed()
    });
    assert_eq!(
        ensure_schema(&pool, &v2.schema, &upgrade).await?,
        SchemaStatus::Upgraded { from: 1, to: 2 }
    );
    sqlx::query("INSERT INTO notes (note, due) VALUES ('x', 'today')")
        .execute(&pool)
        .await?;

    let err = ensure_schema(&pool, &v1.schema, &Lifecycle::new()).await.unwrap_err();
    assert!(matches!(err, AppError::Downgrade { from: 2, to: 1 }));
    Ok(())
}

#[tokio::test]
async fn test_foreign_keys_are_enforced() -> Result<(), Box<dyn std::error::Error>> {
    let compiled = compile(&notes_config(), &notes_hooks())?;
    let pool = memory_pool().await?;
    ensure_schema(&pool, &compiled.schema, &Lifecycle::new()).await?;

    let orphan = sqlx::query("INSERT INTO notes (listId, note) VALUES (77, 'lost')")
        .execute(&pool)
        .await;
    assert!(orphan.is_err());

    let bad_status = sqlx::query("INSERT INTO notes (note, status) VALUES ('x', 'archived')")
        .execute(&pool)
        .await;
    assert!(bad_status.is_err());
    Ok(())
}

#[tokio::test]
async fn test_configure_hook_runs_on_each_connection() -> Result<(), Box<dyn std::error::Error>> {
    let opened = Arc::new(AtomicU32::new(0));
    let counter = opened.clone();
    let lifecycle = Lifecycle::new().on_configure(move |conn| {
        let counter = counter.clone();
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            sqlx::query("PRAGMA foreign_keys = OFF").execute(&mut *conn).await?;
            Ok(())
        })
    });
    let config = StoreConfig {
        database_url: "sqlite::memory:".into(),
        max_connections: 1,
    };
    let pool = connect_with(&config, &lifecycle).await?;
    assert!(opened.load(Ordering::SeqCst) >= 1);

    let compiled = compile(&notes_config(), &notes_hooks())?;
    ensure_schema(&pool, &compiled.schema, &lifecycle).await?;
    let (fk,): (i64,) = sqlx::query_as("PRAGMA foreign_keys").fetch_one(&pool).await?;
    assert_eq!(fk, 0);
    sqlx::query("INSERT INTO notes (listId, note) VALUES (77, 'lost')")
        .execute(&pool)
        .await?;
    Ok(())
}
