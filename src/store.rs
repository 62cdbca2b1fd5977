//! SQLite pool setup and the database lifecycle: per-connection configure hook, create on
//! first open, version-change hook when the configured version is newer than
//! `PRAGMA user_version`.

use crate::error::{AppError, ConfigError};
use crate::migration::{apply_migrations, CompiledSchema};
use futures::future::BoxFuture;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_DATABASE_URL: &str = "sqlite://contract.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl StoreConfig {
    /// From env `DATABASE_URL` and `DATABASE_MAX_CONNECTIONS`, after loading `.env` if present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.into());
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        Self {
            database_url,
            max_connections,
        }
    }
}

/// Open the pool. Connections never expire so an in-memory database lives as long as the pool.
pub async fn connect(config: &StoreConfig) -> Result<SqlitePool, AppError> {
    connect_with(config, &Lifecycle::new()).await
}

/// Open the pool, running the lifecycle's configure hook on every new connection before it
/// is handed out.
pub async fn connect_with(config: &StoreConfig, lifecycle: &Lifecycle) -> Result<SqlitePool, AppError> {
    let opts = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?
        .create_if_missing(true)
        .foreign_keys(true);
    let mut options = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .idle_timeout(None)
        .max_lifetime(None);
    if let Some(hook) = lifecycle.on_configure.clone() {
        options = options.after_connect(move |conn, _meta| hook(conn));
    }
    Ok(options.connect_with(opts).await?)
}

pub type ConfigureHook = Arc<
    dyn for<'c> Fn(&'c mut SqliteConnection) -> BoxFuture<'c, Result<(), sqlx::Error>> + Send + Sync,
>;
pub type CreateHook = Arc<dyn Fn(SqlitePool) -> BoxFuture<'static, Result<(), AppError>> + Send + Sync>;
pub type UpgradeHook =
    Arc<dyn Fn(SqlitePool, u32, u32) -> BoxFuture<'static, Result<(), AppError>> + Send + Sync>;

/// Hooks run around schema creation and version changes.
#[derive(Clone, Default)]
pub struct Lifecycle {
    on_configure: Option<ConfigureHook>,
    on_create: Option<CreateHook>,
    on_upgrade: Option<UpgradeHook>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs on each connection as the pool opens it, before any schema work. Used for
    /// connection-scoped pragmas.
    pub fn on_configure<F>(mut self, f: F) -> Self
    where
        F: for<'c> Fn(&'c mut SqliteConnection) -> BoxFuture<'c, Result<(), sqlx::Error>>
            + Send
            + Sync
            + 'static,
    {
        self.on_configure = Some(Arc::new(f));
        self
    }

    /// Runs once, after all tables and `exec_on_create` statements were committed.
    pub fn on_create<F>(mut self, f: F) -> Self
    where
        F: Fn(SqlitePool) -> BoxFuture<'static, Result<(), AppError>> + Send + Sync + 'static,
    {
        self.on_create = Some(Arc::new(f));
        self
    }

    /// Runs with `(pool, stored_version, configured_version)` before the version is bumped.
    pub fn on_upgrade<F>(mut self, f: F) -> Self
    where
        F: Fn(SqlitePool, u32, u32) -> BoxFuture<'static, Result<(), AppError>> + Send + Sync + 'static,
    {
        self.on_upgrade = Some(Arc::new(f));
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaStatus {
    Created,
    Upgraded { from: u32, to: u32 },
    Current,
}

pub async fn user_version(pool: &SqlitePool) -> Result<u32, AppError> {
    let (v,): (i64,) = sqlx::query_as("PRAGMA user_version").fetch_one(pool).await?;
    u32::try_from(v).map_err(|_| {
        AppError::Config(ConfigError::Validation(format!(
            "stored user_version {} is negative",
            v
        )))
    })
}

/// Bring the database to the compiled schema's version.
pub async fn ensure_schema(
    pool: &SqlitePool,
    schema: &CompiledSchema,
    lifecycle: &Lifecycle,
) -> Result<SchemaStatus, AppError> {
    let stored = user_version(pool).await?;
    let target = schema.version;

    if stored == 0 {
        let mut tx = pool.begin().await?;
        apply_migrations(&mut tx, schema).await?;
        sqlx::query(&format!("PRAGMA user_version = {}", target))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        if let Some(hook) = &lifecycle.on_create {
            hook(pool.clone()).await?;
        }
        return Ok(SchemaStatus::Created);
    }
    if stored > target {
        return Err(AppError::Downgrade {
            from: stored,
            to: target,
        });
    }
    if stored < target {
        info!(database = %schema.name, from = stored, to = target, "upgrading database");
        if let Some(hook) = &lifecycle.on_upgrade {
            hook(pool.clone(), stored, target).await?;
        }
        sqlx::query(&format!("PRAGMA user_version = {}", target))
            .execute(pool)
            .await?;
        return Ok(SchemaStatus::Upgraded {
            from: stored,
            to: target,
        });
    }
    Ok(SchemaStatus::Current)
}
