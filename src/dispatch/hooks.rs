//! Named hook functions that metadata overrides refer to.

use crate::config::Operation;
use crate::error::ConfigError;
use crate::matcher::Locator;
use crate::sql::Record;
use std::collections::HashMap;
use std::sync::Arc;

/// Passed to where and join hooks while a selection is being composed.
pub struct HookContext<'a> {
    pub operation: Operation,
    pub locator: &'a Locator,
}

/// Passed to insert-uri hooks after the row was written.
pub struct InsertContext<'a> {
    pub locator: &'a Locator,
    pub record: &'a Record,
    pub id: i64,
}

/// Mutations that fan out change notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation {
    Insert,
    BulkInsert,
    Update,
    Delete,
}

impl Mutation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mutation::Insert => "insert",
            Mutation::BulkInsert => "bulk_insert",
            Mutation::Update => "update",
            Mutation::Delete => "delete",
        }
    }
}

/// Passed to notification hooks after a mutation succeeded.
/// `record` is the insert/update payload; `records` and `ids` are filled for bulk inserts.
pub struct NotifyContext<'a> {
    pub mutation: Mutation,
    pub locator: &'a Locator,
    pub record: Option<&'a Record>,
    pub records: &'a [Record],
    pub ids: &'a [i64],
    pub count: u64,
    pub selection: &'a str,
    pub selection_args: &'a [String],
}

pub type WhereHook = Arc<dyn Fn(&HookContext<'_>) -> Vec<String> + Send + Sync>;
pub type JoinHook = Arc<dyn Fn(&HookContext<'_>) -> Vec<String> + Send + Sync>;
pub type InsertUriHook = Arc<dyn Fn(&InsertContext<'_>) -> String + Send + Sync>;
pub type NotifyHook = Arc<dyn Fn(&NotifyContext<'_>) -> Vec<String> + Send + Sync>;

#[derive(Clone, Default)]
pub struct HookRegistry {
    wheres: HashMap<String, WhereHook>,
    joins: HashMap<String, JoinHook>,
    insert_uris: HashMap<String, InsertUriHook>,
    notifies: HashMap<String, NotifyHook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_where<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&HookContext<'_>) -> Vec<String> + Send + Sync + 'static,
    {
        self.wheres.insert(name.to_string(), Arc::new(f));
        self
    }

    pub fn with_join<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&HookContext<'_>) -> Vec<String> + Send + Sync + 'static,
    {
        self.joins.insert(name.to_string(), Arc::new(f));
        self
    }

    pub fn with_insert_uri<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&InsertContext<'_>) -> String + Send + Sync + 'static,
    {
        self.insert_uris.insert(name.to_string(), Arc::new(f));
        self
    }

    pub fn with_notify<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&NotifyContext<'_>) -> Vec<String> + Send + Sync + 'static,
    {
        self.notifies.insert(name.to_string(), Arc::new(f));
        self
    }

    pub(crate) fn where_hook(&self, name: &str) -> Result<WhereHook, ConfigError> {
        lookup(&self.wheres, "where", name)
    }

    pub(crate) fn join_hook(&self, name: &str) -> Result<JoinHook, ConfigError> {
        lookup(&self.joins, "join", name)
    }

    pub(crate) fn insert_uri_hook(&self, name: &str) -> Result<InsertUriHook, ConfigError> {
        lookup(&self.insert_uris, "insert_uri", name)
    }

    pub(crate) fn notify_hook(&self, name: &str) -> Result<NotifyHook, ConfigError> {
        lookup(&self.notifies, "notify", name)
    }
}

fn lookup<T: Clone>(
    map: &HashMap<String, T>,
    kind: &'static str,
    name: &str,
) -> Result<T, ConfigError> {
    map.get(name).cloned().ok_or_else(|| ConfigError::MissingHook {
        kind,
        name: name.to_string(),
    })
}
