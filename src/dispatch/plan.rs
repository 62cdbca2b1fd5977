//! Compile-time dispatch plans: one per endpoint, with every override slot already resolved.

use crate::config::{
    resolve_endpoints, ContractKind, Endpoint, EndpointGroupConfig, NotifyDefaultsConfig, Operation,
    OverrideKind, ProviderConfig, SchemaModel, Table,
};
use crate::dispatch::hooks::{
    HookContext, HookRegistry, InsertUriHook, JoinHook, Mutation, NotifyContext, NotifyHook,
    WhereHook,
};
use crate::error::{AppError, ConfigError, RouteError, SchemaError};
use crate::matcher::{Locator, MatchCode, RouteTable, RouteTableBuilder};
use crate::sql::{check_record, Record, Selection, ValuesBuilder};
use std::collections::{HashMap, HashSet};
use std::iter;

/// An override slot after resolution. `GroupDefault` covers both group and provider defaults.
#[derive(Clone)]
pub enum Override<F> {
    None,
    PathSpecific(F),
    GroupDefault(F),
}

impl<F> Override<F> {
    pub fn hook(&self) -> Option<&F> {
        match self {
            Override::None => None,
            Override::PathSpecific(f) | Override::GroupDefault(f) => Some(f),
        }
    }

    pub fn is_path_specific(&self) -> bool {
        matches!(self, Override::PathSpecific(_))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Override::None)
    }
}

impl<F> Default for Override<F> {
    fn default() -> Self {
        Override::None
    }
}

#[derive(Clone, Default)]
pub struct NotifyPlan {
    pub insert: Override<NotifyHook>,
    pub bulk_insert: Override<NotifyHook>,
    pub update: Override<NotifyHook>,
    pub delete: Override<NotifyHook>,
}

impl NotifyPlan {
    pub fn slot(&self, mutation: Mutation) -> &Override<NotifyHook> {
        match mutation {
            Mutation::Insert => &self.insert,
            Mutation::BulkInsert => &self.bulk_insert,
            Mutation::Update => &self.update,
            Mutation::Delete => &self.delete,
        }
    }
}

#[derive(Clone)]
pub struct EndpointPlan {
    pub code: MatchCode,
    pub endpoint: Endpoint,
    /// Definition of `endpoint.table`; record keys are checked against its columns.
    pub table: Table,
    /// Projection aliases of the owning group.
    pub column_map: Vec<(String, String)>,
    pub where_hook: Option<WhereHook>,
    pub join_hook: Option<JoinHook>,
    pub insert_uri: Option<InsertUriHook>,
    pub notify: NotifyPlan,
    /// Locator reported with query results instead of the request locator.
    pub notification_uri: Option<String>,
}

impl EndpointPlan {
    /// Compose the selection for one request: aliases, path bindings, static fragments,
    /// caller filter, then the where hook. Queries target the table plus joins; mutations
    /// target the plain table.
    pub fn selection(
        &self,
        operation: Operation,
        locator: &Locator,
        selection: Option<&str>,
        selection_args: &[String],
    ) -> Result<Selection, AppError> {
        let mut s = Selection::new();
        for (from, to) in &self.column_map {
            s.map(from.as_str(), to.as_str());
        }
        if self.endpoint.kind == ContractKind::Pattern {
            for b in &self.endpoint.bindings {
                let value = locator
                    .segment(b.segment)
                    .ok_or_else(|| RouteError::Unknown(locator.as_str().to_string()))?;
                s.where_(&format!("{}=?", b.column), [value])?;
            }
        }
        for fragment in &self.endpoint.where_fragments {
            s.where_(fragment, iter::empty::<String>())?;
        }
        s.where_(selection.unwrap_or(""), selection_args.iter().cloned())?;

        let ctx = HookContext { operation, locator };
        if let Some(hook) = &self.where_hook {
            for fragment in hook(&ctx) {
                s.where_(&fragment, iter::empty::<String>())?;
            }
        }

        match operation {
            Operation::Query => s.table(self.joined_table(&ctx)),
            _ => s.table(self.endpoint.table.as_str()),
        };
        Ok(s)
    }

    /// Reject mutation payloads with keys that are not columns of the endpoint table.
    pub fn check_record(&self, record: &Record) -> Result<(), AppError> {
        check_record(&self.table, record).map_err(|e| AppError::BadRequest(e.to_string()))
    }

    pub fn values(&self) -> ValuesBuilder<'_> {
        ValuesBuilder::new(&self.table)
    }

    fn joined_table(&self, ctx: &HookContext<'_>) -> String {
        let mut table = self.endpoint.table.clone();
        if let Some(join) = &self.endpoint.join {
            table.push(' ');
            table.push_str(join);
        }
        if let Some(hook) = &self.join_hook {
            for join in hook(ctx) {
                table.push(' ');
                table.push_str(&join);
            }
        }
        table
    }

    /// Caller sort when given, otherwise the endpoint default.
    pub fn effective_sort<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        requested
            .filter(|s| !s.trim().is_empty())
            .or(self.endpoint.default_sort.as_deref())
    }

    /// Locators to signal after a mutation. Count gating is up to the caller.
    pub fn notify_targets(&self, ctx: &NotifyContext<'_>) -> Vec<String> {
        match self.notify.slot(ctx.mutation).hook() {
            Some(hook) => hook(ctx),
            None => vec![ctx.locator.as_str().to_string()],
        }
    }
}

/// The route table plus one plan per registered endpoint, indexed by match code.
pub struct CompiledProvider {
    pub name: String,
    routes: RouteTable,
    plans: Vec<EndpointPlan>,
}

impl CompiledProvider {
    pub fn compile(
        config: &ProviderConfig,
        schema: &SchemaModel,
        hooks: &HookRegistry,
    ) -> Result<Self, ConfigError> {
        let endpoints = resolve_endpoints(config, schema)?;

        let mut builder = RouteTableBuilder::new();
        let mut codes = Vec::with_capacity(endpoints.len());
        for e in &endpoints {
            codes.push(builder.register(e)?);
        }
        let routes = builder.build();
        let known: HashSet<String> = endpoints.iter().map(|e| e.path.clone()).collect();

        let mut overrides: HashMap<(OverrideKind, String), String> = HashMap::new();
        let mut notification_uris: HashMap<String, String> = HashMap::new();
        for group in &config.groups {
            for o in &group.overrides {
                for path in &o.paths {
                    let path = bound_path(o.kind.as_str(), path, &known)?;
                    if overrides
                        .insert((o.kind, path.clone()), o.hook.clone())
                        .is_some()
                    {
                        return Err(RouteError::DuplicateOverride {
                            kind: o.kind.as_str(),
                            path,
                        }
                        .into());
                    }
                }
            }
            for n in &group.notification_uris {
                for path in &n.paths {
                    let path = bound_path("notification_uri", path, &known)?;
                    if notification_uris.insert(path.clone(), n.uri.clone()).is_some() {
                        return Err(RouteError::DuplicateOverride {
                            kind: "notification_uri",
                            path,
                        }
                        .into());
                    }
                }
            }
        }

        let provider_defaults = NotifyDefaults::resolve(&config.notify_defaults, hooks)?;
        let mut group_defaults = HashMap::new();
        let mut column_maps = HashMap::new();
        for group in &config.groups {
            group_defaults.insert(
                group.name.as_str(),
                NotifyDefaults::resolve(&group.notify_defaults, hooks)?,
            );
            column_maps.insert(group.name.as_str(), column_map(group));
        }

        let mut plans = Vec::with_capacity(endpoints.len());
        for (e, code) in endpoints.into_iter().zip(codes) {
            let path_hook = |kind: OverrideKind| overrides.get(&(kind, e.path.clone()));
            let notify_slot = |kind: OverrideKind, mutation: Mutation| -> Result<Override<NotifyHook>, ConfigError> {
                if let Some(name) = path_hook(kind) {
                    return Ok(Override::PathSpecific(hooks.notify_hook(name)?));
                }
                let fallback = group_defaults
                    .get(e.group.as_str())
                    .and_then(|d| d.get(mutation))
                    .or_else(|| provider_defaults.get(mutation));
                Ok(fallback.cloned().map_or(Override::None, Override::GroupDefault))
            };

            let notify = NotifyPlan {
                insert: notify_slot(OverrideKind::NotifyInsert, Mutation::Insert)?,
                bulk_insert: notify_slot(OverrideKind::NotifyBulkInsert, Mutation::BulkInsert)?,
                update: notify_slot(OverrideKind::NotifyUpdate, Mutation::Update)?,
                delete: notify_slot(OverrideKind::NotifyDelete, Mutation::Delete)?,
            };
            let where_hook = path_hook(OverrideKind::Where)
                .map(|n| hooks.where_hook(n))
                .transpose()?;
            let join_hook = path_hook(OverrideKind::Join)
                .map(|n| hooks.join_hook(n))
                .transpose()?;
            let insert_uri = path_hook(OverrideKind::InsertUri)
                .map(|n| hooks.insert_uri_hook(n))
                .transpose()?;

            let table = schema
                .table(&e.table)
                .cloned()
                .ok_or_else(|| SchemaError::MissingTable(e.table.clone()))?;

            plans.push(EndpointPlan {
                code,
                table,
                column_map: column_maps.get(e.group.as_str()).cloned().unwrap_or_default(),
                where_hook,
                join_hook,
                insert_uri,
                notify,
                notification_uri: notification_uris.get(&e.path).cloned(),
                endpoint: e,
            });
        }

        Ok(Self {
            name: config.name.clone(),
            routes,
            plans,
        })
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn plans(&self) -> &[EndpointPlan] {
        &self.plans
    }

    pub fn resolve(&self, locator: &Locator) -> Result<&EndpointPlan, RouteError> {
        let code = self.routes.match_locator(locator)?;
        self.plans
            .get(code.0)
            .ok_or_else(|| RouteError::Unknown(locator.as_str().to_string()))
    }
}

fn bound_path(
    kind: &'static str,
    path: &str,
    known: &HashSet<String>,
) -> Result<String, RouteError> {
    let canonical = Endpoint::canonical_path(path);
    if !known.contains(&canonical) {
        return Err(RouteError::UnboundOverride {
            kind,
            path: path.to_string(),
        });
    }
    Ok(canonical)
}

fn column_map(group: &EndpointGroupConfig) -> Vec<(String, String)> {
    group
        .map_columns
        .iter()
        .map(|(from, to)| (from.clone(), to.clone()))
        .collect()
}

#[derive(Default)]
struct NotifyDefaults {
    insert: Option<NotifyHook>,
    bulk_insert: Option<NotifyHook>,
    update: Option<NotifyHook>,
    delete: Option<NotifyHook>,
}

impl NotifyDefaults {
    fn resolve(config: &NotifyDefaultsConfig, hooks: &HookRegistry) -> Result<Self, ConfigError> {
        let hook = |name: &Option<String>| name.as_deref().map(|n| hooks.notify_hook(n)).transpose();
        Ok(Self {
            insert: hook(&config.insert)?,
            bulk_insert: hook(&config.bulk_insert)?,
            update: hook(&config.update)?,
            delete: hook(&config.delete)?,
        })
    }

    fn get(&self, mutation: Mutation) -> Option<&NotifyHook> {
        match mutation {
            Mutation::Insert => self.insert.as_ref(),
            Mutation::BulkInsert => self.bulk_insert.as_ref(),
            Mutation::Update => self.update.as_ref(),
            Mutation::Delete => self.delete.as_ref(),
        }
    }
}
