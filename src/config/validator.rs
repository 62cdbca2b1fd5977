//! Schema validation: identifiers, primary key exclusivity, auto-increment rules, constraint references.

use crate::config::{DataType, DatabaseConfig, TableConfig};
use crate::error::SchemaError;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

fn identifier_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok())
        .as_ref()
}

/// Table and column names are emitted unquoted, so they must be plain SQL identifiers.
pub fn validate_identifier(
    kind: &'static str,
    name: &str,
    context: Option<&str>,
) -> Result<(), SchemaError> {
    if name.trim().is_empty() {
        return Err(SchemaError::EmptyIdentifier {
            kind,
            context: context.map(str::to_string),
        });
    }
    if !identifier_pattern().is_some_and(|re| re.is_match(name)) {
        return Err(SchemaError::InvalidIdentifier {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Highest version `PRAGMA user_version` (a signed 32-bit integer) can hold.
pub const MAX_VERSION: u32 = i32::MAX as u32;

pub fn validate_schema(config: &DatabaseConfig) -> Result<(), SchemaError> {
    if config.version == 0 || config.version > MAX_VERSION {
        return Err(SchemaError::InvalidVersion(config.version));
    }

    let mut table_names = HashSet::new();
    for t in &config.tables {
        validate_identifier("table", &t.name, None)?;
        if !table_names.insert(t.name.as_str()) {
            return Err(SchemaError::DuplicateTable(t.name.clone()));
        }
    }

    let columns_by_table: HashMap<&str, HashSet<&str>> = config
        .tables
        .iter()
        .map(|t| (t.name.as_str(), t.columns.iter().map(|c| c.name.as_str()).collect()))
        .collect();

    for t in &config.tables {
        validate_table(t, &columns_by_table)?;
    }
    Ok(())
}

fn validate_table(
    t: &TableConfig,
    columns_by_table: &HashMap<&str, HashSet<&str>>,
) -> Result<(), SchemaError> {
    if t.columns.is_empty() {
        return Err(SchemaError::NoColumns(t.name.clone()));
    }

    let mut seen = HashSet::new();
    for c in &t.columns {
        validate_identifier("column", &c.name, Some(&t.name))?;
        if !seen.insert(c.name.as_str()) {
            return Err(SchemaError::DuplicateColumn {
                table: t.name.clone(),
                column: c.name.clone(),
            });
        }
    }

    let flagged_pk: Vec<&str> = t
        .columns
        .iter()
        .filter(|c| c.primary_key.policy().is_some())
        .map(|c| c.name.as_str())
        .collect();
    if flagged_pk.len() > 1 || (!flagged_pk.is_empty() && t.primary_key.is_some()) {
        return Err(SchemaError::ConflictingPrimaryKey {
            table: t.name.clone(),
        });
    }

    let auto: Vec<_> = t.columns.iter().filter(|c| c.auto_increment).collect();
    if auto.len() > 1 {
        return Err(SchemaError::MultipleAutoIncrement {
            table: t.name.clone(),
        });
    }
    if let Some(c) = auto.first() {
        match &t.primary_key {
            Some(pk) if pk.columns.len() > 1 => {
                return Err(SchemaError::AutoIncrementWithCompositeKey {
                    table: t.name.clone(),
                    column: c.name.clone(),
                });
            }
            _ => {}
        }
        if c.primary_key.policy().is_none() {
            return Err(SchemaError::AutoIncrementWithoutPrimaryKey {
                table: t.name.clone(),
                column: c.name.clone(),
            });
        }
        if c.data_type != DataType::Integer {
            return Err(SchemaError::AutoIncrementRequiresInteger {
                table: t.name.clone(),
                column: c.name.clone(),
            });
        }
    }

    let own_columns = columns_by_table.get(t.name.as_str()).cloned().unwrap_or_default();
    let check_own = |names: &[String]| -> Result<(), SchemaError> {
        if names.is_empty() {
            return Err(SchemaError::EmptyIdentifier {
                kind: "constraint column",
                context: Some(t.name.clone()),
            });
        }
        for n in names {
            if !own_columns.contains(n.as_str()) {
                return Err(SchemaError::UnknownColumn {
                    table: t.name.clone(),
                    column: n.clone(),
                });
            }
        }
        Ok(())
    };

    if let Some(pk) = &t.primary_key {
        check_own(&pk.columns)?;
    }
    for u in &t.unique {
        check_own(&u.columns)?;
    }
    for ch in &t.check {
        if ch.expression.trim().is_empty() {
            return Err(SchemaError::EmptyIdentifier {
                kind: "check expression",
                context: Some(t.name.clone()),
            });
        }
    }

    for c in &t.columns {
        if let Some(r) = &c.references {
            resolve_target(t, columns_by_table, &r.table, std::slice::from_ref(&r.column))?;
        }
    }
    for fk in &t.foreign_keys {
        check_own(&fk.columns)?;
        if fk.columns.len() != fk.referenced_columns.len() {
            return Err(SchemaError::ForeignKeyArity {
                table: t.name.clone(),
                columns: fk.columns.len(),
                referenced: fk.referenced_columns.len(),
            });
        }
        resolve_target(t, columns_by_table, &fk.referenced_table, &fk.referenced_columns)?;
    }
    Ok(())
}

fn resolve_target(
    t: &TableConfig,
    columns_by_table: &HashMap<&str, HashSet<&str>>,
    target_table: &str,
    target_columns: &[String],
) -> Result<(), SchemaError> {
    let unresolved = || SchemaError::UnresolvedForeignKey {
        table: t.name.clone(),
        target: format!("{}({})", target_table, target_columns.join(", ")),
    };
    let cols = columns_by_table.get(target_table).ok_or_else(unresolved)?;
    if target_columns.iter().any(|c| !cols.contains(c.as_str())) {
        return Err(unresolved());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnConfig, ConflictPolicy, FlagConfig, KeyConstraintConfig, ReferencesConfig};

    fn column(name: &str, data_type: DataType) -> ColumnConfig {
        ColumnConfig {
            name: name.into(),
            data_type,
            not_null: FlagConfig::Off,
            primary_key: FlagConfig::Off,
            unique: FlagConfig::Off,
            auto_increment: false,
            default: None,
            check: None,
            references: None,
        }
    }

    fn table(name: &str, columns: Vec<ColumnConfig>) -> TableConfig {
        TableConfig {
            name: name.into(),
            if_not_exists: false,
            columns,
            primary_key: None,
            unique: Vec::new(),
            check: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    fn db(tables: Vec<TableConfig>) -> DatabaseConfig {
        DatabaseConfig {
            name: "test".into(),
            version: 1,
            tables,
            exec_on_create: Vec::new(),
        }
    }

    #[test]
    fn rejects_column_flag_and_constraint_together() {
        let mut id = column("_id", DataType::Integer);
        id.primary_key = FlagConfig::On(ConflictPolicy::None);
        let mut t = table("notes", vec![id, column("note", DataType::Text)]);
        t.primary_key = Some(KeyConstraintConfig {
            name: None,
            columns: vec!["_id".into()],
            on_conflict: ConflictPolicy::None,
        });
        assert_eq!(
            validate_schema(&db(vec![t])),
            Err(SchemaError::ConflictingPrimaryKey { table: "notes".into() })
        );
    }

    #[test]
    fn rejects_auto_increment_with_composite_key() {
        let mut a = column("a", DataType::Integer);
        a.auto_increment = true;
        let mut t = table("pairs", vec![a, column("b", DataType::Integer)]);
        t.primary_key = Some(KeyConstraintConfig {
            name: None,
            columns: vec!["a".into(), "b".into()],
            on_conflict: ConflictPolicy::None,
        });
        assert!(matches!(
            validate_schema(&db(vec![t])),
            Err(SchemaError::AutoIncrementWithCompositeKey { .. })
        ));
    }

    #[test]
    fn rejects_auto_increment_on_non_key_column() {
        let mut a = column("a", DataType::Integer);
        a.auto_increment = true;
        let t = table("t", vec![a]);
        assert!(matches!(
            validate_schema(&db(vec![t])),
            Err(SchemaError::AutoIncrementWithoutPrimaryKey { .. })
        ));
    }

    #[test]
    fn rejects_unknown_reference_target() {
        let mut list_id = column("listId", DataType::Integer);
        list_id.references = Some(ReferencesConfig {
            table: "lists".into(),
            column: "_id".into(),
            on_delete: Default::default(),
            on_update: Default::default(),
        });
        let t = table("notes", vec![list_id]);
        assert!(matches!(
            validate_schema(&db(vec![t])),
            Err(SchemaError::UnresolvedForeignKey { .. })
        ));
    }

    #[test]
    fn rejects_bad_identifiers() {
        assert!(matches!(
            validate_schema(&db(vec![table("", vec![column("a", DataType::Text)])])),
            Err(SchemaError::EmptyIdentifier { kind: "table", .. })
        ));
        assert!(matches!(
            validate_schema(&db(vec![table("t", vec![column("a b", DataType::Text)])])),
            Err(SchemaError::InvalidIdentifier { kind: "column", .. })
        ));
        assert_eq!(
            validate_schema(&db(vec![
                table("t", vec![column("a", DataType::Text)]),
                table("t", vec![column("a", DataType::Text)]),
            ])),
            Err(SchemaError::DuplicateTable("t".into()))
        );
    }

    #[test]
    fn rejects_two_flagged_key_columns() {
        let mut a = column("a", DataType::Integer);
        a.primary_key = FlagConfig::On(ConflictPolicy::None);
        let mut b = column("b", DataType::Integer);
        b.primary_key = FlagConfig::On(ConflictPolicy::Replace);
        assert_eq!(
            validate_schema(&db(vec![table("pairs", vec![a, b])])),
            Err(SchemaError::ConflictingPrimaryKey { table: "pairs".into() })
        );
    }

    #[test]
    fn version_must_fit_user_version() {
        let mut d = db(vec![table("t", vec![column("a", DataType::Text)])]);
        d.version = MAX_VERSION;
        assert_eq!(validate_schema(&d), Ok(()));
        d.version = MAX_VERSION + 1;
        assert_eq!(validate_schema(&d), Err(SchemaError::InvalidVersion(MAX_VERSION + 1)));
        d.version = 0;
        assert_eq!(validate_schema(&d), Err(SchemaError::InvalidVersion(0)));
    }
}
