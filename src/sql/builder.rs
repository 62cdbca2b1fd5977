//! Per-request selection builder: accumulates WHERE fragments, table and projection aliases,
//! then issues parameterized SELECT, UPDATE or DELETE. Record keys are written as column names
//! verbatim; callers validate them with [`crate::sql::check_record`] first.

use crate::error::{AppError, CompositionError};
use crate::service::crud;
use crate::sql::Record;
use serde_json::Value;
use sqlx::SqliteConnection;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new(sql: String) -> Self {
        QueryBuf {
            sql,
            params: Vec::new(),
        }
    }
}

/// INSERT for one record; an empty record inserts a row of defaults.
pub fn insert(table: &str, record: &Record) -> QueryBuf {
    if record.is_empty() {
        return QueryBuf::new(format!("INSERT INTO {} DEFAULT VALUES", table));
    }
    let cols: Vec<&str> = record.keys().map(String::as_str).collect();
    let placeholders = vec!["?"; cols.len()].join(", ");
    QueryBuf {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            cols.join(", "),
            placeholders
        ),
        params: record.values().cloned().collect(),
    }
}

#[derive(Clone, Debug, Default)]
pub struct Selection {
    table: Option<String>,
    selection: String,
    args: Vec<String>,
    projection_map: HashMap<String, String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) -> &mut Self {
        self.table = None;
        self.selection.clear();
        self.args.clear();
        self.projection_map.clear();
        self
    }

    /// Append `(expr)` to the selection, ANDed with what is already there.
    /// Placeholders in `expr` must line up with `args`; that is not checked.
    pub fn where_<I, S>(&mut self, expr: &str, args: I) -> Result<&mut Self, CompositionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().peekable();
        if expr.trim().is_empty() {
            if args.peek().is_some() {
                return Err(CompositionError::ArgsWithoutSelection);
            }
            return Ok(self);
        }
        if !self.selection.is_empty() {
            self.selection.push_str(" AND ");
        }
        self.selection.push('(');
        self.selection.push_str(expr);
        self.selection.push(')');
        self.args.extend(args.map(Into::<String>::into));
        Ok(self)
    }

    /// Table name, or a table followed by join text. Required before execution.
    pub fn table(&mut self, table: impl Into<String>) -> &mut Self {
        self.table = Some(table.into());
        self
    }

    /// Project `from` as `to AS from`. Last mapping for a column wins.
    pub fn map(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.projection_map.insert(from.into(), to.into());
        self
    }

    /// Project `column` as `table.column`.
    pub fn map_to_table(&mut self, column: &str, table: &str) -> &mut Self {
        self.projection_map
            .insert(column.to_string(), format!("{}.{}", table, column));
        self
    }

    pub fn selection(&self) -> &str {
        &self.selection
    }

    pub fn selection_args(&self) -> &[String] {
        &self.args
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref()
    }

    fn require_table(&self) -> Result<&str, CompositionError> {
        self.table.as_deref().ok_or(CompositionError::TableNotSet)
    }

    fn where_clause(&self) -> String {
        if self.selection.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.selection)
        }
    }

    fn arg_values(&self) -> impl Iterator<Item = Value> + '_ {
        self.args.iter().cloned().map(Value::String)
    }

    fn projection_column(&self, column: &str) -> String {
        match self.projection_map.get(column) {
            Some(to) => format!("{} AS {}", to, column),
            None => column.to_string(),
        }
    }

    pub fn build_query(
        &self,
        projection: &[String],
        group_by: Option<&str>,
        having: Option<&str>,
        order_by: Option<&str>,
        limit: Option<&str>,
    ) -> Result<QueryBuf, CompositionError> {
        let table = self.require_table()?;
        let columns = if projection.is_empty() {
            "*".to_string()
        } else {
            projection
                .iter()
                .map(|c| self.projection_column(c))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut sql = format!("SELECT {} FROM {}{}", columns, table, self.where_clause());
        for (keyword, clause) in [
            ("GROUP BY", group_by),
            ("HAVING", having),
            ("ORDER BY", order_by),
            ("LIMIT", limit),
        ] {
            if let Some(c) = clause.filter(|c| !c.trim().is_empty()) {
                sql.push_str(&format!(" {} {}", keyword, c));
            }
        }
        let mut q = QueryBuf::new(sql);
        q.params.extend(self.arg_values());
        Ok(q)
    }

    /// Record values bind first, then the selection args.
    pub fn build_update(&self, record: &Record) -> Result<QueryBuf, CompositionError> {
        let table = self.require_table()?;
        let set: Vec<String> = record.keys().map(|k| format!("{}=?", k)).collect();
        let mut q = QueryBuf::new(format!(
            "UPDATE {} SET {}{}",
            table,
            set.join(", "),
            self.where_clause()
        ));
        q.params.extend(record.values().cloned());
        q.params.extend(self.arg_values());
        Ok(q)
    }

    pub fn build_delete(&self) -> Result<QueryBuf, CompositionError> {
        let table = self.require_table()?;
        let mut q = QueryBuf::new(format!("DELETE FROM {}{}", table, self.where_clause()));
        q.params.extend(self.arg_values());
        Ok(q)
    }

    pub async fn query(
        &self,
        conn: &mut SqliteConnection,
        projection: &[String],
        group_by: Option<&str>,
        having: Option<&str>,
        order_by: Option<&str>,
        limit: Option<&str>,
    ) -> Result<Vec<Record>, AppError> {
        let q = self.build_query(projection, group_by, having, order_by, limit)?;
        crud::fetch_all(conn, &q).await
    }

    pub async fn update(&self, conn: &mut SqliteConnection, record: &Record) -> Result<u64, AppError> {
        if record.is_empty() {
            return Err(AppError::BadRequest("update requires at least one column".into()));
        }
        let q = self.build_update(record)?;
        crud::execute(conn, &q).await
    }

    pub async fn delete(&self, conn: &mut SqliteConnection) -> Result<u64, AppError> {
        let q = self.build_delete()?;
        crud::execute(conn, &q).await
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Selection[table={}, selection={}, args={:?}]",
            self.table.as_deref().unwrap_or("-"),
            self.selection,
            self.args
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NO_ARGS: [&str; 0] = [];

    #[test]
    fn fragments_are_parenthesized_and_anded() {
        let mut s = Selection::new();
        s.where_("x=1", NO_ARGS).unwrap().where_("y=2", NO_ARGS).unwrap();
        assert_eq!(s.selection(), "(x=1) AND (y=2)");
        assert!(s.selection_args().is_empty());
        s.where_("z=?", ["v"]).unwrap();
        assert_eq!(s.selection(), "(x=1) AND (y=2) AND (z=?)");
        assert_eq!(s.selection_args(), ["v".to_string()]);
    }

    #[test]
    fn empty_expression() {
        let mut s = Selection::new();
        s.where_("", NO_ARGS).unwrap();
        assert_eq!(s.selection(), "");
        assert_eq!(
            s.where_("  ", ["1"]).map(|_| ()),
            Err(CompositionError::ArgsWithoutSelection)
        );
    }

    #[test]
    fn table_is_required() {
        let s = Selection::new();
        assert!(matches!(s.build_delete(), Err(CompositionError::TableNotSet)));
        assert!(matches!(
            s.build_query(&[], None, None, None, None),
            Err(CompositionError::TableNotSet)
        ));
    }

    #[test]
    fn projection_aliases_leave_where_alone() {
        let mut s = Selection::new();
        s.table("notes JOIN lists ON notes.listId = lists._id")
            .map("_id", "notes._id")
            .map("_id", "lists._id")
            .map_to_table("title", "lists");
        s.where_("_id=?", ["3"]).unwrap();
        let q = s
            .build_query(
                &["_id".into(), "title".into(), "note".into()],
                None,
                None,
                Some("title ASC"),
                Some("10"),
            )
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT lists._id AS _id, lists.title AS title, note FROM notes JOIN lists ON notes.listId = lists._id WHERE (_id=?) ORDER BY title ASC LIMIT 10"
        );
        assert_eq!(q.params, vec![json!("3")]);
    }

    #[test]
    fn clause_order() {
        let mut s = Selection::new();
        s.table("notes");
        let q = s
            .build_query(&[], Some("status"), Some("count(*) > 1"), Some("status"), None)
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT * FROM notes GROUP BY status HAVING count(*) > 1 ORDER BY status"
        );
    }

    #[test]
    fn update_binds_record_before_selection() {
        let mut s = Selection::new();
        s.table("notes").where_("_id=?", ["42"]).unwrap();
        let mut record = Record::new();
        record.insert("note".into(), json!("hi"));
        record.insert("status".into(), json!("new"));
        let q = s.build_update(&record).unwrap();
        assert_eq!(q.sql, "UPDATE notes SET note=?, status=? WHERE (_id=?)");
        assert_eq!(q.params, vec![json!("hi"), json!("new"), json!("42")]);
    }

    #[test]
    fn reset_clears_state() {
        let mut s = Selection::new();
        s.table("notes").where_("a=?", ["1"]).unwrap();
        s.reset();
        assert_eq!(s.selection(), "");
        assert!(s.table_name().is_none());
        assert_eq!(s.to_string(), "Selection[table=-, selection=, args=[]]");
    }

    #[test]
    fn insert_defaults_when_empty() {
        assert_eq!(insert("notes", &Record::new()).sql, "INSERT INTO notes DEFAULT VALUES");
        let mut record = Record::new();
        record.insert("note".into(), json!("a"));
        let q = insert("notes", &record);
        assert_eq!(q.sql, "INSERT INTO notes (note) VALUES (?)");
        assert_eq!(q.params, vec![json!("a")]);
    }
}
