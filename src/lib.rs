//! Contract SDK: metadata-driven data provider over SQLite.
//!
//! A JSON document declares tables and URI endpoints. [`compile`] turns it into CREATE TABLE
//! statements and a route table with per-endpoint dispatch plans; [`Provider`] serves
//! query/insert/update/delete requests addressed by locator and fans out change notifications.

pub mod compiler;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod matcher;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;
pub mod telemetry;

pub use compiler::{compile, Compiled};
pub use config::{from_json_str, load_from_path, FullConfig};
pub use dispatch::{
    BatchOperation, BroadcastNotifier, ChangeNotifier, Filter, HookRegistry, Provider,
    QueryRequest, QueryResult,
};
pub use error::{AppError, CompositionError, ConfigError, RouteError, SchemaError};
pub use matcher::{Locator, MatchCode, RouteTable, RouteTableBuilder};
pub use migration::{synthesize, CompiledSchema};
pub use routes::{common_routes, common_routes_with_ready, resource_routes};
pub use sql::{Record, Selection, ValuesBuilder};
pub use state::AppState;
pub use store::{connect, connect_with, ensure_schema, Lifecycle, SchemaStatus, StoreConfig};
pub use telemetry::init_tracing;
