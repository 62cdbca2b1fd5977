//! Load metadata from JSON and resolve it into the schema model and route contracts.

use crate::config::resolved::{
    Binding, CheckConstraint, Column, ColumnReference, ContractKind, Endpoint, ForeignKeyConstraint,
    KeyConstraint, Operations, PathSegment, PrimaryKey, SchemaModel, Table,
};
use crate::config::types::*;
use crate::config::validate_schema;
use crate::error::{ConfigError, RouteError, SchemaError};
use std::path::Path;

/// Parse a metadata document.
pub fn from_json_str(json: &str) -> Result<FullConfig, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Read and parse a metadata document from disk.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    from_json_str(&text)
}

/// Build the schema model from database config (validates first).
pub fn resolve_schema(config: &DatabaseConfig) -> Result<SchemaModel, SchemaError> {
    validate_schema(config)?;
    let tables = config.tables.iter().map(resolve_table).collect();
    Ok(SchemaModel {
        name: config.name.clone(),
        version: config.version,
        tables,
        exec_on_create: config.exec_on_create.clone(),
    })
}

fn resolve_table(t: &TableConfig) -> Table {
    let columns: Vec<Column> = t
        .columns
        .iter()
        .map(|c| Column {
            name: c.name.clone(),
            data_type: c.data_type,
            not_null: c.not_null.policy(),
            primary_key: c.primary_key.policy(),
            unique: c.unique.policy(),
            auto_increment: c.auto_increment,
            default: c.default.clone(),
            check: c.check.clone(),
            references: c.references.as_ref().map(|r| ColumnReference {
                table: r.table.clone(),
                column: r.column.clone(),
                on_delete: r.on_delete,
                on_update: r.on_update,
            }),
        })
        .collect();

    let primary_key = match (&t.primary_key, columns.iter().position(|c| c.primary_key.is_some())) {
        (Some(pk), _) => PrimaryKey::Constraint(key_constraint(pk)),
        (None, Some(idx)) => PrimaryKey::Column(idx),
        (None, None) => PrimaryKey::None,
    };

    Table {
        name: t.name.clone(),
        if_not_exists: t.if_not_exists,
        columns,
        primary_key,
        unique: t.unique.iter().map(key_constraint).collect(),
        checks: t
            .check
            .iter()
            .map(|c| CheckConstraint {
                name: non_empty(&c.name),
                expression: c.expression.clone(),
            })
            .collect(),
        foreign_keys: t
            .foreign_keys
            .iter()
            .map(|fk| ForeignKeyConstraint {
                name: non_empty(&fk.name),
                columns: fk.columns.clone(),
                referenced_table: fk.referenced_table.clone(),
                referenced_columns: fk.referenced_columns.clone(),
                on_delete: fk.on_delete,
                on_update: fk.on_update,
            })
            .collect(),
    }
}

fn key_constraint(k: &KeyConstraintConfig) -> KeyConstraint {
    KeyConstraint {
        name: non_empty(&k.name),
        columns: k.columns.clone(),
        on_conflict: k.on_conflict,
    }
}

fn non_empty(s: &Option<String>) -> Option<String> {
    s.as_ref().map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Build route contracts for every endpoint of every group, in declaration order.
/// Path uniqueness is enforced later, when the route table is built.
pub fn resolve_endpoints(
    provider: &ProviderConfig,
    schema: &SchemaModel,
) -> Result<Vec<Endpoint>, ConfigError> {
    let mut out = Vec::new();
    for group in &provider.groups {
        for e in &group.endpoints {
            out.push(resolve_endpoint(group, e, schema)?);
        }
    }
    Ok(out)
}

fn resolve_endpoint(
    group: &EndpointGroupConfig,
    e: &EndpointConfig,
    schema: &SchemaModel,
) -> Result<Endpoint, ConfigError> {
    let path = Endpoint::canonical_path(&e.path);
    if path.is_empty() {
        return Err(RouteError::EmptyPath(format!("{}.{}", group.name, e.name)).into());
    }
    if e.type_tag.trim().is_empty() {
        return Err(ConfigError::Validation(format!("endpoint '{}' has no type", path)));
    }

    let table = e
        .table
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(group.table.as_str())
        .to_string();
    if schema.table(&table).is_none() {
        return Err(SchemaError::MissingTable(table).into());
    }

    let segments: Vec<PathSegment> = path.split('/').map(PathSegment::parse).collect();
    let has_wildcard = segments.iter().any(PathSegment::is_wildcard);
    let kind = if has_wildcard {
        ContractKind::Pattern
    } else {
        ContractKind::Exact
    };

    let mut bindings = Vec::with_capacity(e.bindings.len());
    for b in &e.bindings {
        if b.segment >= segments.len() {
            return Err(RouteError::InvalidBinding {
                path: path.clone(),
                reason: format!("segment {} out of range ({} segments)", b.segment, segments.len()),
            }
            .into());
        }
        if !segments[b.segment].is_wildcard() {
            return Err(RouteError::InvalidBinding {
                path: path.clone(),
                reason: format!("segment {} is not a wildcard", b.segment),
            }
            .into());
        }
        if b.column.trim().is_empty() {
            return Err(RouteError::InvalidBinding {
                path: path.clone(),
                reason: format!("segment {} bound to an empty column", b.segment),
            }
            .into());
        }
        bindings.push(Binding {
            segment: b.segment,
            column: b.column.trim().to_string(),
        });
    }

    Ok(Endpoint {
        name: e.name.clone(),
        group: group.name.clone(),
        path,
        segments,
        kind,
        type_tag: e.type_tag.clone(),
        table,
        operations: e.operations.iter().copied().collect::<Operations>(),
        where_fragments: e
            .where_
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect(),
        join: non_empty(&e.join),
        default_sort: non_empty(&e.default_sort),
        group_by: non_empty(&e.group_by),
        having: non_empty(&e.having),
        limit: non_empty(&e.limit),
        bindings,
    })
}
