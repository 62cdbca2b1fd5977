//! Common routes: health, readiness, version.

use crate::state::AppState;
use crate::store::user_version;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema_version: Option<u32>,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

/// Ready once the database answers and reports a schema version.
async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyBody>) {
    match user_version(state.pool()).await {
        Ok(v) => (
            StatusCode::OK,
            Json(ReadyBody {
                status: "ok",
                database: "ok",
                schema_version: Some(v),
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyBody {
                    status: "degraded",
                    database: "unavailable",
                    schema_version: None,
                }),
            )
        }
    }
}

fn package_info() -> serde_json::Value {
    serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    })
}

async fn version() -> Json<serde_json::Value> {
    Json(package_info())
}

async fn version_with_provider(State(state): State<AppState>) -> Json<serde_json::Value> {
    let compiled = state.provider.compiled();
    let mut info = package_info();
    info["provider"] = serde_json::json!({
        "name": compiled.name,
        "endpoints": compiled.plans().len(),
    });
    Json(info)
}

/// GET /health and GET /version, no state needed.
pub fn common_routes() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
}

/// GET /health, GET /ready (database check) and GET /version with provider details.
pub fn common_routes_with_ready(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/version", get(version_with_provider))
        .with_state(state)
}
