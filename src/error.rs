//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Schema metadata that cannot be turned into a valid table definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("no such table: {0}")]
    MissingTable(String),
    #[error("empty {kind} name{}", context_suffix(.context))]
    EmptyIdentifier { kind: &'static str, context: Option<String> },
    #[error("invalid {kind} name '{name}'")]
    InvalidIdentifier { kind: &'static str, name: String },
    #[error("duplicate table '{0}'")]
    DuplicateTable(String),
    #[error("duplicate column '{column}' in table '{table}'")]
    DuplicateColumn { table: String, column: String },
    #[error("table '{0}' has no columns")]
    NoColumns(String),
    #[error("table '{table}' declares its primary key more than once; use a column flag or a primary key constraint, not both")]
    ConflictingPrimaryKey { table: String },
    #[error("column '{column}' in table '{table}' is AUTOINCREMENT but the table has a composite primary key")]
    AutoIncrementWithCompositeKey { table: String, column: String },
    #[error("column '{column}' in table '{table}' is AUTOINCREMENT but is not the table's inline primary key")]
    AutoIncrementWithoutPrimaryKey { table: String, column: String },
    #[error("column '{column}' in table '{table}' is AUTOINCREMENT but is not INTEGER")]
    AutoIncrementRequiresInteger { table: String, column: String },
    #[error("table '{table}' has more than one AUTOINCREMENT column")]
    MultipleAutoIncrement { table: String },
    #[error("unknown column '{column}' referenced by a constraint on table '{table}'")]
    UnknownColumn { table: String, column: String },
    #[error("foreign key on table '{table}' references unknown target {target}")]
    UnresolvedForeignKey { table: String, target: String },
    #[error("foreign key on table '{table}' has {columns} columns but references {referenced}")]
    ForeignKeyArity { table: String, columns: usize, referenced: usize },
    #[error("table '{table}' has no column '{column}'")]
    NoSuchColumn { table: String, column: String },
    #[error("database version must be between 1 and 2147483647, got {0}")]
    InvalidVersion(u32),
}

fn context_suffix(context: &Option<String>) -> String {
    context.as_ref().map(|c| format!(" in {}", c)).unwrap_or_default()
}

/// Route table construction and lookup failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("empty path for endpoint '{0}'")]
    EmptyPath(String),
    #[error("duplicate path '{0}'")]
    DuplicatePath(String),
    #[error("no such resource route: {0}")]
    Unknown(String),
    #[error("{kind} override bound to unknown path '{path}'")]
    UnboundOverride { kind: &'static str, path: String },
    #[error("multiple {kind} overrides for path '{path}'")]
    DuplicateOverride { kind: &'static str, path: String },
    #[error("invalid binding on path '{path}': {reason}")]
    InvalidBinding { path: String, reason: String },
}

/// Misuse of the selection composer. Indicates a defect in dispatch code or a hook.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositionError {
    #[error("valid selection required when including arguments")]
    ArgsWithoutSelection,
    #[error("table not specified")]
    TableNotSet,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("missing {kind} hook '{name}'")]
    MissingHook { kind: &'static str, name: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Composition(#[from] CompositionError),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("{operation} not allowed for '{path}'")]
    NotAllowed { operation: &'static str, path: String },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("cannot downgrade database from version {from} to {to}")]
    Downgrade { from: u32, to: u32 },
}

/// Constraint failures are the caller's conflict; any other statement the engine rejects
/// (unknown column in a sort or selection, syntax) is a malformed request.
fn db_status(e: &sqlx::Error) -> (StatusCode, &'static str) {
    use sqlx::error::ErrorKind;
    match e {
        sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, "not_found"),
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => (StatusCode::CONFLICT, "constraint_violation"),
            _ => (StatusCode::BAD_REQUEST, "invalid_query"),
        },
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Route(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
            AppError::Composition(_) => (StatusCode::INTERNAL_SERVER_ERROR, "composition_error"),
            AppError::Db(e) => db_status(e),
            AppError::NotAllowed { .. } => (StatusCode::METHOD_NOT_ALLOWED, "not_allowed"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Downgrade { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "downgrade"),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
