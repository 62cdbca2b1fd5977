//! Resource handlers: the locator is the wildcard tail of the request path.

use crate::dispatch::{BatchOperation, Filter, QueryRequest};
use crate::error::AppError;
use crate::response::{success_many, success_one, success_one_ok, success_rows};
use crate::sql::Record;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

/// Query string for resource requests. `projection` and `args` are comma separated.
#[derive(Debug, Default, Deserialize)]
pub struct ResourceParams {
    pub projection: Option<String>,
    pub selection: Option<String>,
    pub args: Option<String>,
    pub sort: Option<String>,
}

fn csv(s: Option<&str>) -> Vec<String> {
    s.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

impl ResourceParams {
    fn filter(&self) -> Filter {
        Filter {
            selection: self.selection.clone().filter(|s| !s.trim().is_empty()),
            selection_args: csv(self.args.as_deref()),
        }
    }
}

fn locator(tail: &str) -> String {
    format!("/{}", tail.trim_start_matches('/'))
}

fn body_to_record(value: Value) -> Result<Record, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

pub async fn query(
    State(state): State<AppState>,
    Path(tail): Path<String>,
    Query(params): Query<ResourceParams>,
) -> Result<impl IntoResponse, AppError> {
    let filter = params.filter();
    let req = QueryRequest {
        projection: csv(params.projection.as_deref()),
        selection: filter.selection,
        selection_args: filter.selection_args,
        sort_order: params.sort.filter(|s| !s.trim().is_empty()),
    };
    let result = state.provider.query(&locator(&tail), req).await?;
    Ok(success_rows(result.rows, result.notification_uri))
}

/// A JSON object inserts one row; a JSON array inserts all of them in one transaction.
pub async fn insert(
    State(state): State<AppState>,
    Path(tail): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let locator = locator(&tail);
    match body {
        Value::Array(items) => {
            let records = items
                .into_iter()
                .map(body_to_record)
                .collect::<Result<Vec<_>, _>>()?;
            let count = state.provider.bulk_insert(&locator, records).await?;
            Ok(success_one(json!({ "count": count })))
        }
        other => {
            let record = body_to_record(other)?;
            let uri = state.provider.insert(&locator, record).await?;
            Ok(success_one(json!({ "locator": uri })))
        }
    }
}

pub async fn update(
    State(state): State<AppState>,
    Path(tail): Path<String>,
    Query(params): Query<ResourceParams>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let record = body_to_record(body)?;
    let count = state
        .provider
        .update(&locator(&tail), record, params.filter())
        .await?;
    Ok(success_one_ok(json!({ "count": count })))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(tail): Path<String>,
    Query(params): Query<ResourceParams>,
) -> Result<impl IntoResponse, AppError> {
    let count = state.provider.delete(&locator(&tail), params.filter()).await?;
    Ok(success_one_ok(json!({ "count": count })))
}

pub async fn resolve_type(
    State(state): State<AppState>,
    Path(tail): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let type_tag = state.provider.resolve_type(&locator(&tail))?;
    Ok(success_one_ok(json!({ "type": type_tag })))
}

pub async fn apply_batch(
    State(state): State<AppState>,
    Json(ops): Json<Vec<BatchOperation>>,
) -> Result<impl IntoResponse, AppError> {
    let results = state.provider.apply_batch(ops).await?;
    Ok(success_many(results))
}
