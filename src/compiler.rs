//! Metadata to compiled artifacts: DDL for every table plus the dispatch plans.

use crate::config::{resolve_schema, FullConfig};
use crate::dispatch::{CompiledProvider, HookRegistry};
use crate::error::ConfigError;
use crate::migration::CompiledSchema;
use std::sync::Arc;
use tracing::info;

pub struct Compiled {
    pub schema: CompiledSchema,
    pub provider: Arc<CompiledProvider>,
}

/// Validate and compile the whole document. Any error aborts; nothing partial is returned.
pub fn compile(config: &FullConfig, hooks: &HookRegistry) -> Result<Compiled, ConfigError> {
    let model = resolve_schema(&config.database)?;
    let schema = CompiledSchema::compile(&model);
    let provider = CompiledProvider::compile(&config.provider, &model, hooks)?;
    info!(
        database = %schema.name,
        version = schema.version,
        tables = schema.statements.len(),
        endpoints = provider.plans().len(),
        "compiled"
    );
    Ok(Compiled {
        schema,
        provider: Arc::new(provider),
    })
}
