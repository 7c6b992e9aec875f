//! # flowcore
//!
//! The core stepwise execution engine of a flow-instance runtime: a single
//! `Instance` walks a directed graph of tasks and links to completion one
//! work-item at a time, delegating all interpretation to host-supplied
//! `FlowBehavior`/`TaskBehavior` implementations resolved through a
//! `FlowModel` registry.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Instance                             │
//! │   id, status, attrs, queue — the step loop (`do_step`)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ owns
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          TaskEnv                              │
//! │   task_datas, link_datas — factory + reaper (spec §4.8)      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ addressed by id, never borrowed
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              TaskData / LinkData / ChangeTracker              │
//! │   per-task/link runtime state, journaled for the host         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! `FlowDefinition`/`Task`/`Link` (the graph itself), `FlowModel`/
//! `ModelRegistry` (behavior resolution), and `Mapper`/`Patch`/`Interceptor`
//! (data movement between scopes) are all host-supplied contracts this crate
//! only ever reads through.

pub mod activity;
pub mod attr;
pub mod behavior;
pub mod change;
pub mod error;
pub mod flow;
pub mod instance;
pub mod link;
pub mod mapper;
pub mod task;
pub mod task_env;
pub mod work_item;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::activity::{Activity, ActivityMetadata, ActivityRegistry};
    pub use crate::attr::{AttrTable, Attribute};
    pub use crate::behavior::{FlowBehavior, FlowModel, ModelRegistry, TaskBehavior, TaskDoneOutcome};
    pub use crate::change::{ChangeKind, ChangeTracker, SharedTracker};
    pub use crate::error::{AttrError, InstanceError};
    pub use crate::flow::{FlowDefinition, FlowProvider, Link, Task};
    pub use crate::instance::{Instance, InstanceStatus};
    pub use crate::link::{LinkBehavior, LinkData, UnconditionalLink};
    pub use crate::mapper::{AttrScope, Interceptor, InterceptorEntry, Mapper, Patch};
    pub use crate::task::{TaskCx, TaskData, TaskEntry};
    pub use crate::task_env::TaskEnv;
    pub use crate::work_item::{ExecType, WorkItem};
}

pub use instance::{Instance, InstanceStatus};
