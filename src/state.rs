//! Shared application state for all routes.

use crate::dispatch::Provider;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub provider: Provider,
}

impl AppState {
    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }

    pub fn pool(&self) -> &SqlitePool {
        self.provider.pool()
    }
}
