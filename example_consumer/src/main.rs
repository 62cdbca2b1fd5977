//! Notes demo: a lists/notes provider served over HTTP.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Or from this directory: `cargo run`
//!
//! Try `curl -X POST localhost:3000/resources/notes -H 'content-type: application/json' -d '{"listId":1,"note":"milk"}'`
//! then `curl 'localhost:3000/resources/notes/fromList/1?projection=_id,note'`.

use contract_sdk::{
    common_routes_with_ready, compile, connect, ensure_schema, init_tracing, load_from_path,
    resource_routes, AppState, BroadcastNotifier, HookRegistry, Lifecycle, Provider, StoreConfig,
};
use std::sync::Arc;
use tokio::net::TcpListener;

fn hooks() -> HookRegistry {
    // A new note also changes the list it belongs to.
    HookRegistry::new().with_notify("notes_and_list", |ctx| {
        let mut targets = vec![ctx.locator.as_str().to_string()];
        if let Some(list) = ctx.record.and_then(|r| r.get("listId")).and_then(|v| v.as_i64()) {
            targets.push(format!("/lists/{}", list));
        }
        targets
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing("contract_sdk=info,example_consumer=info");

    let config_path = std::env::var("CONTRACT_CONFIG")
        .unwrap_or_else(|_| concat!(env!("CARGO_MANIFEST_DIR"), "/notes.json").into());
    let config = load_from_path(&config_path).await?;
    let compiled = compile(&config, &hooks())?;

    let pool = connect(&StoreConfig::from_env()).await?;
    let status = ensure_schema(&pool, &compiled.schema, &Lifecycle::new()).await?;
    tracing::info!(?status, "database ready");

    let notifier = Arc::new(BroadcastNotifier::default());
    let mut changes = notifier.subscribe();
    tokio::spawn(async move {
        while let Ok(locator) = changes.recv().await {
            tracing::info!(%locator, "changed");
        }
    });

    let provider = Provider::new(compiled.provider, pool, notifier);
    let state = AppState::new(provider);
    let app = common_routes_with_ready(state.clone()).merge(resource_routes(state));

    let addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("notes provider listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
