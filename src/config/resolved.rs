//! Resolved model: metadata validated and flattened into immutable tables and route contracts.

use crate::config::types::{ConflictPolicy, DataType, ForeignKeyAction, Operation};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnReference {
    pub table: String,
    pub column: String,
    pub on_delete: ForeignKeyAction,
    pub on_update: ForeignKeyAction,
}

/// A column flag is `Some(policy)` when set; `ConflictPolicy::None` writes no conflict clause.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub not_null: Option<ConflictPolicy>,
    pub primary_key: Option<ConflictPolicy>,
    pub unique: Option<ConflictPolicy>,
    pub auto_increment: bool,
    pub default: Option<String>,
    pub check: Option<String>,
    pub references: Option<ColumnReference>,
}

/// Table-level PRIMARY KEY or UNIQUE constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyConstraint {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub on_conflict: ConflictPolicy,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckConstraint {
    pub name: Option<String>,
    pub expression: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignKeyConstraint {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_delete: ForeignKeyAction,
    pub on_update: ForeignKeyAction,
}

/// Where the table's primary key is declared. Exactly one style per table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrimaryKey {
    None,
    /// Index into `Table::columns` of the sole flagged column.
    Column(usize),
    Constraint(KeyConstraint),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub if_not_exists: bool,
    pub columns: Vec<Column>,
    pub primary_key: PrimaryKey,
    pub unique: Vec<KeyConstraint>,
    pub checks: Vec<CheckConstraint>,
    pub foreign_keys: Vec<ForeignKeyConstraint>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Validated schema: tables in declaration order plus database metadata.
#[derive(Clone, Debug)]
pub struct SchemaModel {
    pub name: String,
    pub version: u32,
    pub tables: Vec<Table>,
    pub exec_on_create: Vec<String>,
}

impl SchemaModel {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// Allowed-operations bitset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Operations(u8);

impl Operations {
    pub const NONE: Operations = Operations(0);
    pub const ALL: Operations = Operations(0b1111);

    fn bit(op: Operation) -> u8 {
        match op {
            Operation::Query => 0b0001,
            Operation::Insert => 0b0010,
            Operation::Update => 0b0100,
            Operation::Delete => 0b1000,
        }
    }

    pub fn with(self, op: Operation) -> Self {
        Operations(self.0 | Self::bit(op))
    }

    pub fn allows(&self, op: Operation) -> bool {
        self.0 & Self::bit(op) != 0
    }
}

impl FromIterator<Operation> for Operations {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        iter.into_iter().fold(Operations::NONE, Operations::with)
    }
}

/// One segment of a registered path pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    Literal(String),
    /// `#`: a segment made of ASCII digits.
    Number,
    /// `*`: any single segment.
    Text,
}

impl PathSegment {
    pub fn parse(s: &str) -> Self {
        match s {
            "#" => PathSegment::Number,
            "*" => PathSegment::Text,
            lit => PathSegment::Literal(lit.to_string()),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        !matches!(self, PathSegment::Literal(_))
    }

    pub fn accepts(&self, segment: &str) -> bool {
        match self {
            PathSegment::Literal(lit) => lit == segment,
            PathSegment::Number => !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()),
            PathSegment::Text => true,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Literal(s) => f.write_str(s),
            PathSegment::Number => f.write_str("#"),
            PathSegment::Text => f.write_str("*"),
        }
    }
}

/// Split a path or locator into its non-empty segments.
pub fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContractKind {
    Exact,
    Pattern,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub segment: usize,
    pub column: String,
}

/// A route contract: path pattern bound to a table and its query defaults.
#[derive(Clone, Debug)]
pub struct Endpoint {
    pub name: String,
    pub group: String,
    /// Canonical path: segments joined with `/`, no leading or trailing slash.
    pub path: String,
    pub segments: Vec<PathSegment>,
    pub kind: ContractKind,
    pub type_tag: String,
    pub table: String,
    pub operations: Operations,
    pub where_fragments: Vec<String>,
    pub join: Option<String>,
    pub default_sort: Option<String>,
    pub group_by: Option<String>,
    pub having: Option<String>,
    pub limit: Option<String>,
    pub bindings: Vec<Binding>,
}

impl Endpoint {
    /// Canonical form of a configured path, used for duplicate detection and override lookup.
    pub fn canonical_path(path: &str) -> String {
        split_segments(path.trim()).join("/")
    }
}
