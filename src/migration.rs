//! DDL synthesis: one `CREATE TABLE` per table of the schema model, SQLite dialect.
//! Column clause order: NOT NULL, DEFAULT, PRIMARY KEY, UNIQUE, CHECK, AUTOINCREMENT, REFERENCES.
//! Trailing table clauses: primary key, checks, uniques, foreign keys.

use crate::config::{
    CheckConstraint, Column, ColumnReference, ConflictPolicy, ForeignKeyAction, ForeignKeyConstraint,
    KeyConstraint, PrimaryKey, SchemaModel, Table,
};
use crate::error::SchemaError;
use sqlx::SqliteConnection;
use tracing::{debug, info};

fn on_conflict(def: &mut String, policy: ConflictPolicy) {
    if let Some(p) = policy.keyword() {
        def.push_str(" ON CONFLICT ");
        def.push_str(p);
    }
}

fn fk_actions(def: &mut String, on_delete: ForeignKeyAction, on_update: ForeignKeyAction) {
    if let Some(a) = on_delete.keyword() {
        def.push_str(" ON DELETE ");
        def.push_str(a);
    }
    if let Some(a) = on_update.keyword() {
        def.push_str(" ON UPDATE ");
        def.push_str(a);
    }
}

fn constraint_name(def: &mut String, name: &Option<String>) {
    if let Some(n) = name {
        def.push_str("CONSTRAINT ");
        def.push_str(n);
        def.push(' ');
    }
}

fn column_def(c: &Column, inline_pk: bool) -> String {
    let mut def = format!("{} {}", c.name, c.data_type.as_sql());
    if let Some(p) = c.not_null {
        def.push_str(" NOT NULL");
        on_conflict(&mut def, p);
    }
    if let Some(ref d) = c.default {
        def.push_str(" DEFAULT ");
        def.push_str(d);
    }
    if inline_pk {
        def.push_str(" PRIMARY KEY");
        on_conflict(&mut def, c.primary_key.unwrap_or_default());
    }
    if let Some(p) = c.unique {
        def.push_str(" UNIQUE");
        on_conflict(&mut def, p);
    }
    if let Some(ref expr) = c.check {
        def.push_str(&format!(" CHECK ( {} )", expr));
    }
    if c.auto_increment {
        def.push_str(" AUTOINCREMENT");
    }
    if let Some(ColumnReference {
        table,
        column,
        on_delete,
        on_update,
    }) = &c.references
    {
        def.push_str(&format!(" REFERENCES {}({})", table, column));
        fk_actions(&mut def, *on_delete, *on_update);
    }
    def
}

fn key_clause(keyword: &str, k: &KeyConstraint) -> String {
    let mut def = String::new();
    constraint_name(&mut def, &k.name);
    def.push_str(&format!("{} ({})", keyword, k.columns.join(", ")));
    on_conflict(&mut def, k.on_conflict);
    def
}

fn check_clause(ch: &CheckConstraint) -> String {
    let mut def = String::new();
    constraint_name(&mut def, &ch.name);
    def.push_str(&format!("CHECK ( {} )", ch.expression));
    def
}

fn foreign_key_clause(fk: &ForeignKeyConstraint) -> String {
    let mut def = String::new();
    constraint_name(&mut def, &fk.name);
    def.push_str(&format!(
        "FOREIGN KEY ({}) REFERENCES {} ({})",
        fk.columns.join(", "),
        fk.referenced_table,
        fk.referenced_columns.join(", ")
    ));
    fk_actions(&mut def, fk.on_delete, fk.on_update);
    def
}

/// Emit the `CREATE TABLE` statement for a validated table.
pub fn synthesize(t: &Table) -> String {
    let inline_pk = match t.primary_key {
        PrimaryKey::Column(idx) => Some(idx),
        _ => None,
    };
    let mut defs: Vec<String> = t
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| column_def(c, inline_pk == Some(i)))
        .collect();

    if let PrimaryKey::Constraint(ref pk) = t.primary_key {
        defs.push(key_clause("PRIMARY KEY", pk));
    }
    defs.extend(t.checks.iter().map(check_clause));
    defs.extend(t.unique.iter().map(|u| key_clause("UNIQUE", u)));
    defs.extend(t.foreign_keys.iter().map(foreign_key_clause));

    format!(
        "CREATE TABLE {}{} ({})",
        if t.if_not_exists { "IF NOT EXISTS " } else { "" },
        t.name,
        defs.join(", ")
    )
}

/// DDL for a whole schema, tables in declaration order.
#[derive(Clone, Debug)]
pub struct CompiledSchema {
    pub name: String,
    pub version: u32,
    pub statements: Vec<(String, String)>,
    pub exec_on_create: Vec<String>,
}

impl CompiledSchema {
    pub fn compile(schema: &SchemaModel) -> Self {
        Self {
            name: schema.name.clone(),
            version: schema.version,
            statements: schema
                .tables
                .iter()
                .map(|t| (t.name.clone(), synthesize(t)))
                .collect(),
            exec_on_create: schema.exec_on_create.clone(),
        }
    }

    pub fn create_statement(&self, table: &str) -> Result<&str, SchemaError> {
        self.statements
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, ddl)| ddl.as_str())
            .ok_or_else(|| SchemaError::MissingTable(table.to_string()))
    }
}

/// Run every `CREATE TABLE` and then the `exec_on_create` statements on one connection.
/// The caller owns the surrounding transaction.
pub async fn apply_migrations(
    conn: &mut SqliteConnection,
    schema: &CompiledSchema,
) -> Result<(), sqlx::Error> {
    for (table, ddl) in &schema.statements {
        debug!(table = %table, sql = %ddl, "create table");
        sqlx::query(ddl).execute(&mut *conn).await?;
    }
    for sql in &schema.exec_on_create {
        debug!(sql = %sql, "exec on create");
        sqlx::query(sql).execute(&mut *conn).await?;
    }
    info!(
        database = %schema.name,
        tables = schema.statements.len(),
        "schema created"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve_schema, DataType};

    fn col(name: &str, data_type: DataType) -> Column {
        Column {
            name: name.into(),
            data_type,
            not_null: None,
            primary_key: None,
            unique: None,
            auto_increment: false,
            default: None,
            check: None,
            references: None,
        }
    }

    fn table(name: &str, columns: Vec<Column>, primary_key: PrimaryKey) -> Table {
        Table {
            name: name.into(),
            if_not_exists: false,
            columns,
            primary_key,
            unique: Vec::new(),
            checks: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    #[test]
    fn notes_table() {
        let mut id = col("_id", DataType::Integer);
        id.primary_key = Some(ConflictPolicy::None);
        id.auto_increment = true;
        let mut status = col("status", DataType::Text);
        status.check = Some("status in ('new','completed')".into());
        let t = table(
            "notes",
            vec![id, col("note", DataType::Text), status],
            PrimaryKey::Column(0),
        );
        assert_eq!(
            synthesize(&t),
            "CREATE TABLE notes (_id INTEGER PRIMARY KEY AUTOINCREMENT, note TEXT, status TEXT CHECK ( status in ('new','completed') ))"
        );
    }

    #[test]
    fn autoincrement_never_adds_table_key() {
        let mut id = col("_id", DataType::Integer);
        id.primary_key = Some(ConflictPolicy::Replace);
        id.auto_increment = true;
        let ddl = synthesize(&table("t", vec![id], PrimaryKey::Column(0)));
        assert!(ddl.contains("PRIMARY KEY ON CONFLICT REPLACE AUTOINCREMENT"));
        assert!(!ddl.contains("PRIMARY KEY ("));
    }

    #[test]
    fn composite_key_is_trailing_clause() {
        let t = table(
            "memberships",
            vec![
                col("user_id", DataType::Integer),
                col("group_id", DataType::Integer),
                col("role", DataType::Text),
            ],
            PrimaryKey::Constraint(KeyConstraint {
                name: None,
                columns: vec!["user_id".into(), "group_id".into()],
                on_conflict: ConflictPolicy::Ignore,
            }),
        );
        assert_eq!(
            synthesize(&t),
            "CREATE TABLE memberships (user_id INTEGER, group_id INTEGER, role TEXT, PRIMARY KEY (user_id, group_id) ON CONFLICT IGNORE)"
        );
    }

    #[test]
    fn conflict_clause_follows_its_keyword() {
        let mut c = col("email", DataType::Text);
        c.not_null = Some(ConflictPolicy::Fail);
        c.default = Some("''".into());
        c.unique = Some(ConflictPolicy::None);
        let ddl = synthesize(&table("users", vec![c], PrimaryKey::None));
        assert_eq!(
            ddl,
            "CREATE TABLE users (email TEXT NOT NULL ON CONFLICT FAIL DEFAULT '' UNIQUE)"
        );
        assert_eq!(ddl.matches("ON CONFLICT").count(), 1);
    }

    #[test]
    fn trailing_clause_order_and_names() {
        let mut t = table(
            "notes",
            vec![
                col("_id", DataType::Integer),
                col("list_id", DataType::Integer),
                col("title", DataType::Text),
            ],
            PrimaryKey::Constraint(KeyConstraint {
                name: Some("pk_notes".into()),
                columns: vec!["_id".into()],
                on_conflict: ConflictPolicy::None,
            }),
        );
        t.if_not_exists = true;
        t.unique.push(KeyConstraint {
            name: Some("uq_title".into()),
            columns: vec!["list_id".into(), "title".into()],
            on_conflict: ConflictPolicy::Abort,
        });
        t.checks.push(CheckConstraint {
            name: None,
            expression: "length(title) > 0".into(),
        });
        t.foreign_keys.push(ForeignKeyConstraint {
            name: Some("fk_list".into()),
            columns: vec!["list_id".into()],
            referenced_table: "lists".into(),
            referenced_columns: vec!["_id".into()],
            on_delete: ForeignKeyAction::Cascade,
            on_update: ForeignKeyAction::None,
        });
        assert_eq!(
            synthesize(&t),
            "CREATE TABLE IF NOT EXISTS notes (_id INTEGER, list_id INTEGER, title TEXT, \
             CONSTRAINT pk_notes PRIMARY KEY (_id), \
             CHECK ( length(title) > 0 ), \
             CONSTRAINT uq_title UNIQUE (list_id, title) ON CONFLICT ABORT, \
             CONSTRAINT fk_list FOREIGN KEY (list_id) REFERENCES lists (_id) ON DELETE CASCADE)"
        );
    }

    #[test]
    fn inline_reference_with_actions() {
        let mut c = col("list_id", DataType::Integer);
        c.references = Some(ColumnReference {
            table: "lists".into(),
            column: "_id".into(),
            on_delete: ForeignKeyAction::SetNull,
            on_update: ForeignKeyAction::NoAction,
        });
        assert_eq!(
            synthesize(&table("notes", vec![c], PrimaryKey::None)),
            "CREATE TABLE notes (list_id INTEGER REFERENCES lists(_id) ON DELETE SET NULL ON UPDATE NO ACTION)"
        );
    }

    #[test]
    fn unknown_table_lookup() {
        let config = crate::config::from_json_str(
            r#"{
                "database": { "name": "d", "version": 1, "tables": [
                    { "name": "a", "columns": [ { "name": "x", "type": "TEXT" } ] }
                ] },
                "provider": { "name": "p", "groups": [] }
            }"#,
        )
        .unwrap();
        let compiled = CompiledSchema::compile(&resolve_schema(&config.database).unwrap());
        assert_eq!(compiled.create_statement("a").unwrap(), "CREATE TABLE a (x TEXT)");
        assert_eq!(
            compiled.create_statement("b"),
            Err(SchemaError::MissingTable("b".into()))
        );
    }
}
