//! Statement execution against SQLite and row decoding to JSON.

use crate::error::AppError;
use crate::sql::{insert, QueryBuf, Record, SqliteBindValue};
use serde_json::Value;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::query::Query;
use sqlx::SqliteConnection;

fn bind_all<'q>(q: &'q QueryBuf) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(SqliteBindValue::from_json(p));
    }
    query
}

pub async fn fetch_all(conn: &mut SqliteConnection, q: &QueryBuf) -> Result<Vec<Record>, AppError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let rows = bind_all(q).fetch_all(&mut *conn).await?;
    Ok(rows.iter().map(row_to_json).collect())
}

/// Run a statement and return the number of affected rows.
pub async fn execute(conn: &mut SqliteConnection, q: &QueryBuf) -> Result<u64, AppError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
    let done = bind_all(q).execute(&mut *conn).await?;
    Ok(done.rows_affected())
}

/// Insert one record and return its rowid.
pub async fn insert_row(
    conn: &mut SqliteConnection,
    table: &str,
    record: &Record,
) -> Result<i64, AppError> {
    let q = insert(table, record);
    tracing::debug!(sql = %q.sql, params = ?q.params, "insert");
    let done = bind_all(&q).execute(&mut *conn).await?;
    Ok(done.last_insert_rowid())
}

/// Decode a row by column name. With joins, the first column of a repeated name wins.
pub fn row_to_json(row: &SqliteRow) -> Record {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Record::new();
    for col in row.columns() {
        map.entry(col.name())
            .or_insert_with(|| cell_to_value(row, col.ordinal()));
    }
    map
}

fn cell_to_value(row: &SqliteRow, idx: usize) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(idx) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(idx) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(idx) {
        return Value::String(s);
    }
    if let Ok(Some(b)) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return Value::Array(b.into_iter().map(|x| Value::Number(x.into())).collect());
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn insert_then_fetch_decodes_storage_classes() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let mut conn = pool.acquire().await.unwrap();
        sqlx::query("CREATE TABLE t (_id INTEGER PRIMARY KEY AUTOINCREMENT, n INTEGER, r REAL, s TEXT)")
            .execute(&mut *conn)
            .await
            .unwrap();

        let mut record = Record::new();
        record.insert("n".into(), json!(7));
        record.insert("r".into(), json!(2.5));
        record.insert("s".into(), json!("x"));
        assert_eq!(insert_row(&mut conn, "t", &record).await.unwrap(), 1);
        assert_eq!(insert_row(&mut conn, "t", &Record::new()).await.unwrap(), 2);

        let rows = fetch_all(
            &mut conn,
            &QueryBuf {
                sql: "SELECT * FROM t ORDER BY _id".into(),
                params: Vec::new(),
            },
        )
        .await
        .unwrap();
        assert_eq!(
            Value::Object(rows[0].clone()),
            json!({ "_id": 1, "n": 7, "r": 2.5, "s": "x" })
        );
        assert_eq!(
            Value::Object(rows[1].clone()),
            json!({ "_id": 2, "n": null, "r": null, "s": null })
        );
    }
}
