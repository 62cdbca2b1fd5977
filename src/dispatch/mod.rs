//! Dispatch: compile-time plans per endpoint and the run-time provider that executes them.

pub mod hooks;
pub mod notify;
pub mod plan;
pub mod provider;

pub use hooks::{
    HookContext, HookRegistry, InsertContext, InsertUriHook, JoinHook, Mutation, NotifyContext,
    NotifyHook, WhereHook,
};
pub use notify::{BroadcastNotifier, ChangeNotifier};
pub use plan::{CompiledProvider, EndpointPlan, NotifyPlan, Override};
pub use provider::{BatchOperation, BatchResult, Filter, Provider, QueryRequest, QueryResult};
