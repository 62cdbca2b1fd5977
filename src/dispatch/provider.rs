//! Run-time dispatch: match the locator, compose the selection from the plan, execute,
//! then fan out change notifications.

use crate::config::Operation;
use crate::dispatch::hooks::{InsertContext, Mutation, NotifyContext};
use crate::dispatch::notify::ChangeNotifier;
use crate::dispatch::plan::{CompiledProvider, EndpointPlan};
use crate::error::AppError;
use crate::matcher::Locator;
use crate::service::crud;
use crate::sql::Record;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub projection: Vec<String>,
    #[serde(default)]
    pub selection: Option<String>,
    #[serde(default)]
    pub selection_args: Vec<String>,
    #[serde(default)]
    pub sort_order: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct QueryResult {
    pub rows: Vec<Record>,
    /// Locator whose change signals invalidate these rows.
    pub notification_uri: String,
}

/// Caller filter for update and delete.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub selection: Option<String>,
    #[serde(default)]
    pub selection_args: Vec<String>,
}

/// One step of a transactional batch.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BatchOperation {
    Insert {
        locator: String,
        #[serde(default)]
        record: Record,
    },
    Update {
        locator: String,
        record: Record,
        #[serde(flatten)]
        filter: Filter,
    },
    Delete {
        locator: String,
        #[serde(flatten)]
        filter: Filter,
    },
}

/// Outcome of one batch step: the new locator for inserts, the affected count otherwise.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    pub count: u64,
}

#[derive(Clone)]
pub struct Provider {
    compiled: Arc<CompiledProvider>,
    pool: SqlitePool,
    notifier: Arc<dyn ChangeNotifier>,
}

impl Provider {
    pub fn new(
        compiled: Arc<CompiledProvider>,
        pool: SqlitePool,
        notifier: Arc<dyn ChangeNotifier>,
    ) -> Self {
        Self {
            compiled,
            pool,
            notifier,
        }
    }

    pub fn compiled(&self) -> &CompiledProvider {
        &self.compiled
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn plan(&self, locator: &Locator, operation: Operation) -> Result<&EndpointPlan, AppError> {
        let plan = self.compiled.resolve(locator)?;
        if !plan.endpoint.operations.allows(operation) {
            return Err(AppError::NotAllowed {
                operation: operation.as_str(),
                path: plan.endpoint.path.clone(),
            });
        }
        Ok(plan)
    }

    pub fn resolve_type(&self, locator: &str) -> Result<&str, AppError> {
        let plan = self.compiled.resolve(&Locator::parse(locator))?;
        Ok(plan.endpoint.type_tag.as_str())
    }

    pub async fn query(&self, locator: &str, req: QueryRequest) -> Result<QueryResult, AppError> {
        let locator = Locator::parse(locator);
        let plan = self.plan(&locator, Operation::Query)?;
        let e = &plan.endpoint;
        let selection = plan.selection(
            Operation::Query,
            &locator,
            req.selection.as_deref(),
            &req.selection_args,
        )?;
        let mut conn = self.pool.acquire().await?;
        let rows = selection
            .query(
                &mut conn,
                &req.projection,
                e.group_by.as_deref(),
                e.having.as_deref(),
                plan.effective_sort(req.sort_order.as_deref()),
                e.limit.as_deref(),
            )
            .await?;
        Ok(QueryResult {
            rows,
            notification_uri: plan
                .notification_uri
                .clone()
                .unwrap_or_else(|| locator.as_str().to_string()),
        })
    }

    /// Insert one record; returns the locator of the new row.
    pub async fn insert(&self, locator: &str, record: Record) -> Result<String, AppError> {
        let locator = Locator::parse(locator);
        let plan = self.plan(&locator, Operation::Insert)?;
        let mut conn = self.pool.acquire().await?;
        let (uri, targets) = insert_on(&mut conn, plan, &locator, &record).await?;
        self.emit(targets).await;
        Ok(uri)
    }

    /// Insert all records in one transaction; returns how many were written.
    pub async fn bulk_insert(&self, locator: &str, records: Vec<Record>) -> Result<usize, AppError> {
        let locator = Locator::parse(locator);
        let plan = self.plan(&locator, Operation::Insert)?;
        for record in &records {
            plan.check_record(record)?;
        }
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(records.len());
        for record in &records {
            ids.push(crud::insert_row(&mut tx, &plan.endpoint.table, record).await?);
        }
        let targets = plan.notify_targets(&NotifyContext {
            mutation: Mutation::BulkInsert,
            locator: &locator,
            record: None,
            records: &records,
            ids: &ids,
            count: records.len() as u64,
            selection: "",
            selection_args: &[],
        });
        tx.commit().await?;
        self.emit(targets).await;
        Ok(records.len())
    }

    pub async fn update(&self, locator: &str, record: Record, filter: Filter) -> Result<u64, AppError> {
        let locator = Locator::parse(locator);
        let plan = self.plan(&locator, Operation::Update)?;
        let mut conn = self.pool.acquire().await?;
        let (count, targets) = update_on(&mut conn, plan, &locator, &record, &filter).await?;
        self.emit(targets).await;
        Ok(count)
    }

    pub async fn delete(&self, locator: &str, filter: Filter) -> Result<u64, AppError> {
        let locator = Locator::parse(locator);
        let plan = self.plan(&locator, Operation::Delete)?;
        let mut conn = self.pool.acquire().await?;
        let (count, targets) = delete_on(&mut conn, plan, &locator, &filter).await?;
        self.emit(targets).await;
        Ok(count)
    }

    /// Apply every operation in one transaction. Any failure rolls the whole batch back and
    /// nothing is signalled; on commit all collected notifications are sent in order.
    pub async fn apply_batch(&self, ops: Vec<BatchOperation>) -> Result<Vec<BatchResult>, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut results = Vec::with_capacity(ops.len());
        let mut targets = Vec::new();
        for op in &ops {
            match op {
                BatchOperation::Insert { locator, record } => {
                    let locator = Locator::parse(locator);
                    let plan = self.plan(&locator, Operation::Insert)?;
                    let (uri, t) = insert_on(&mut tx, plan, &locator, record).await?;
                    targets.extend(t);
                    results.push(BatchResult {
                        locator: Some(uri),
                        count: 1,
                    });
                }
                BatchOperation::Update {
                    locator,
                    record,
                    filter,
                } => {
                    let locator = Locator::parse(locator);
                    let plan = self.plan(&locator, Operation::Update)?;
                    let (count, t) = update_on(&mut tx, plan, &locator, record, filter).await?;
                    targets.extend(t);
                    results.push(BatchResult {
                        locator: None,
                        count,
                    });
                }
                BatchOperation::Delete { locator, filter } => {
                    let locator = Locator::parse(locator);
                    let plan = self.plan(&locator, Operation::Delete)?;
                    let (count, t) = delete_on(&mut tx, plan, &locator, filter).await?;
                    targets.extend(t);
                    results.push(BatchResult {
                        locator: None,
                        count,
                    });
                }
            }
        }
        tx.commit().await?;
        debug!(operations = ops.len(), "batch committed");
        self.emit(targets).await;
        Ok(results)
    }

    async fn emit(&self, targets: Vec<String>) {
        for target in targets {
            debug!(locator = %target, "notify change");
            self.notifier.notify_change(&target).await;
        }
    }
}

async fn insert_on(
    conn: &mut SqliteConnection,
    plan: &EndpointPlan,
    locator: &Locator,
    record: &Record,
) -> Result<(String, Vec<String>), AppError> {
    plan.check_record(record)?;
    let id = crud::insert_row(conn, &plan.endpoint.table, record).await?;
    let targets = plan.notify_targets(&NotifyContext {
        mutation: Mutation::Insert,
        locator,
        record: Some(record),
        records: &[],
        ids: &[id],
        count: 1,
        selection: "",
        selection_args: &[],
    });
    let uri = match &plan.insert_uri {
        Some(hook) => hook(&InsertContext {
            locator,
            record,
            id,
        }),
        None => format!("{}/{}", locator.as_str().trim_end_matches('/'), id),
    };
    Ok((uri, targets))
}

async fn update_on(
    conn: &mut SqliteConnection,
    plan: &EndpointPlan,
    locator: &Locator,
    record: &Record,
    filter: &Filter,
) -> Result<(u64, Vec<String>), AppError> {
    plan.check_record(record)?;
    let selection = plan.selection(
        Operation::Update,
        locator,
        filter.selection.as_deref(),
        &filter.selection_args,
    )?;
    debug!(selection = %selection, "update");
    let count = selection.update(conn, record).await?;
    if count == 0 {
        return Ok((0, Vec::new()));
    }
    let targets = plan.notify_targets(&NotifyContext {
        mutation: Mutation::Update,
        locator,
        record: Some(record),
        records: &[],
        ids: &[],
        count,
        selection: selection.selection(),
        selection_args: selection.selection_args(),
    });
    Ok((count, targets))
}

async fn delete_on(
    conn: &mut SqliteConnection,
    plan: &EndpointPlan,
    locator: &Locator,
    filter: &Filter,
) -> Result<(u64, Vec<String>), AppError> {
    let selection = plan.selection(
        Operation::Delete,
        locator,
        filter.selection.as_deref(),
        &filter.selection_args,
    )?;
    debug!(selection = %selection, "delete");
    let count = selection.delete(conn).await?;
    if count == 0 {
        return Ok((0, Vec::new()));
    }
    let targets = plan.notify_targets(&NotifyContext {
        mutation: Mutation::Delete,
        locator,
        record: None,
        records: &[],
        ids: &[],
        count,
        selection: selection.selection(),
        selection_args: selection.selection_args(),
    });
    Ok((count, targets))
}
