//! Resource routes: every registered locator is reachable under /resources.

use crate::handlers::resource::{apply_batch, delete, insert, query, resolve_type, update};
use crate::state::AppState;
use axum::{routing::get, routing::post, Router};
use tower_http::limit::RequestBodyLimitLayer;

const BODY_LIMIT: usize = 2 * 1024 * 1024;

pub fn resource_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/resources/*locator",
            get(query).post(insert).patch(update).delete(delete),
        )
        .route("/types/*locator", get(resolve_type))
        .route("/batch", post(apply_batch))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .with_state(state)
}
