//! Record keys checked against table metadata. Keys become column identifiers in INSERT and
//! UPDATE, so only declared columns get through.

use crate::config::Table;
use crate::error::SchemaError;
use crate::sql::Record;
use serde_json::Value;

/// Every key of `record` must name a column of `table`.
pub fn check_record(table: &Table, record: &Record) -> Result<(), SchemaError> {
    match record.keys().find(|k| table.column(k).is_none()) {
        Some(key) => Err(SchemaError::NoSuchColumn {
            table: table.name.clone(),
            column: key.clone(),
        }),
        None => Ok(()),
    }
}

/// Builds a [`Record`] for one table, refusing columns the table does not declare.
///
/// ```ignore
/// let record = ValuesBuilder::new(lists).set("title", "Inbox")?.build();
/// ```
#[derive(Debug, Clone)]
pub struct ValuesBuilder<'a> {
    table: &'a Table,
    record: Record,
}

impl<'a> ValuesBuilder<'a> {
    pub fn new(table: &'a Table) -> Self {
        Self {
            table,
            record: Record::new(),
        }
    }

    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Result<Self, SchemaError> {
        if self.table.column(column).is_none() {
            return Err(SchemaError::NoSuchColumn {
                table: self.table.name.clone(),
                column: column.to_string(),
            });
        }
        self.record.insert(column.to_string(), value.into());
        Ok(self)
    }

    /// Column set to SQL NULL.
    pub fn set_null(self, column: &str) -> Result<Self, SchemaError> {
        self.set(column, Value::Null)
    }

    pub fn build(self) -> Record {
        self.record
    }
}
