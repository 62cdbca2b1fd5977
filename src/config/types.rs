//! Raw config types matching the JSON metadata document (database schema + provider endpoints).

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Declared SQLite column type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Integer,
    Real,
    Text,
    Blob,
}

impl DataType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Real => "REAL",
            DataType::Text => "TEXT",
            DataType::Blob => "BLOB",
        }
    }
}

/// `ON CONFLICT` resolution. `None` means no conflict clause is written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConflictPolicy {
    #[default]
    None,
    Rollback,
    Abort,
    Fail,
    Ignore,
    Replace,
}

impl ConflictPolicy {
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            ConflictPolicy::None => None,
            ConflictPolicy::Rollback => Some("ROLLBACK"),
            ConflictPolicy::Abort => Some("ABORT"),
            ConflictPolicy::Fail => Some("FAIL"),
            ConflictPolicy::Ignore => Some("IGNORE"),
            ConflictPolicy::Replace => Some("REPLACE"),
        }
    }
}

/// Foreign key `ON DELETE` / `ON UPDATE` action. `None` omits the clause.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForeignKeyAction {
    #[default]
    None,
    NoAction,
    Restrict,
    SetNull,
    SetDefault,
    Cascade,
}

impl ForeignKeyAction {
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            ForeignKeyAction::None => None,
            ForeignKeyAction::NoAction => Some("NO ACTION"),
            ForeignKeyAction::Restrict => Some("RESTRICT"),
            ForeignKeyAction::SetNull => Some("SET NULL"),
            ForeignKeyAction::SetDefault => Some("SET DEFAULT"),
            ForeignKeyAction::Cascade => Some("CASCADE"),
        }
    }
}

/// A column flag that may carry a conflict policy: `true`, `false`, or `{ "on_conflict": "..." }`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum FlagConfig {
    #[default]
    Off,
    On(ConflictPolicy),
}

impl FlagConfig {
    pub fn policy(&self) -> Option<ConflictPolicy> {
        match self {
            FlagConfig::Off => None,
            FlagConfig::On(p) => Some(*p),
        }
    }
}

impl<'de> Deserialize<'de> for FlagConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        match v {
            serde_json::Value::Bool(true) => Ok(FlagConfig::On(ConflictPolicy::None)),
            serde_json::Value::Bool(false) | serde_json::Value::Null => Ok(FlagConfig::Off),
            serde_json::Value::Object(mut obj) => {
                let policy = match obj.remove("on_conflict") {
                    Some(p) => serde_json::from_value(p).map_err(serde::de::Error::custom)?,
                    None => ConflictPolicy::None,
                };
                if !obj.is_empty() {
                    return Err(serde::de::Error::custom(format!(
                        "column flag accepts only \"on_conflict\"; got keys: {:?}",
                        obj.keys().collect::<Vec<_>>()
                    )));
                }
                Ok(FlagConfig::On(policy))
            }
            other => Err(serde::de::Error::custom(format!(
                "column flag must be a boolean or {{ \"on_conflict\": \"...\" }}; got {}",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferencesConfig {
    pub table: String,
    pub column: String,
    #[serde(default)]
    pub on_delete: ForeignKeyAction,
    #[serde(default)]
    pub on_update: ForeignKeyAction,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub not_null: FlagConfig,
    #[serde(default)]
    pub primary_key: FlagConfig,
    #[serde(default)]
    pub unique: FlagConfig,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub check: Option<String>,
    #[serde(default)]
    pub references: Option<ReferencesConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyConstraintConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub columns: Vec<String>,
    #[serde(default)]
    pub on_conflict: ConflictPolicy,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckConstraintConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub expression: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForeignKeyConstraintConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    #[serde(default)]
    pub on_delete: ForeignKeyAction,
    #[serde(default)]
    pub on_update: ForeignKeyAction,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,
    #[serde(default)]
    pub if_not_exists: bool,
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub primary_key: Option<KeyConstraintConfig>,
    #[serde(default)]
    pub unique: Vec<KeyConstraintConfig>,
    #[serde(default)]
    pub check: Vec<CheckConstraintConfig>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyConstraintConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,
    pub version: u32,
    pub tables: Vec<TableConfig>,
    /// Statements executed once, after all tables are created.
    #[serde(default)]
    pub exec_on_create: Vec<String>,
}

/// CRUD operation an endpoint may allow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Query,
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Query,
        Operation::Insert,
        Operation::Update,
        Operation::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Query => "query",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

fn all_operations() -> Vec<Operation> {
    Operation::ALL.to_vec()
}

/// Binds the path segment at `segment` to `column` via equality.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BindingConfig {
    pub segment: usize,
    pub column: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    /// Overrides the group table for this endpoint.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default, rename = "where")]
    pub where_: Vec<String>,
    #[serde(default)]
    pub join: Option<String>,
    #[serde(default)]
    pub default_sort: Option<String>,
    #[serde(default)]
    pub group_by: Option<String>,
    #[serde(default)]
    pub having: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default = "all_operations")]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
}

/// Which hook slot an override fills.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKind {
    Where,
    Join,
    InsertUri,
    NotifyInsert,
    NotifyBulkInsert,
    NotifyUpdate,
    NotifyDelete,
}

impl OverrideKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideKind::Where => "where",
            OverrideKind::Join => "join",
            OverrideKind::InsertUri => "insert_uri",
            OverrideKind::NotifyInsert => "notify_insert",
            OverrideKind::NotifyBulkInsert => "notify_bulk_insert",
            OverrideKind::NotifyUpdate => "notify_update",
            OverrideKind::NotifyDelete => "notify_delete",
        }
    }
}

/// Binds a named hook from the registry to one or more endpoint paths.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OverrideConfig {
    pub kind: OverrideKind,
    pub paths: Vec<String>,
    pub hook: String,
}

/// Static locator reported as the notification URI of query results for the given paths.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationUriConfig {
    pub paths: Vec<String>,
    pub uri: String,
}

/// Named notification hooks used when an endpoint has no path-specific one.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NotifyDefaultsConfig {
    #[serde(default)]
    pub insert: Option<String>,
    #[serde(default)]
    pub bulk_insert: Option<String>,
    #[serde(default)]
    pub update: Option<String>,
    #[serde(default)]
    pub delete: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndpointGroupConfig {
    pub name: String,
    pub table: String,
    /// Projection aliases: requested column -> SQL expression.
    #[serde(default)]
    pub map_columns: BTreeMap<String, String>,
    pub endpoints: Vec<EndpointConfig>,
    #[serde(default)]
    pub overrides: Vec<OverrideConfig>,
    #[serde(default)]
    pub notification_uris: Vec<NotificationUriConfig>,
    #[serde(default)]
    pub notify_defaults: NotifyDefaultsConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub groups: Vec<EndpointGroupConfig>,
    /// Provider-wide fallbacks, consulted after the group defaults.
    #[serde(default)]
    pub notify_defaults: NotifyDefaultsConfig,
}

/// The whole metadata document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FullConfig {
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
}
