//! `FlowBehavior`, `TaskBehavior`, and the registries that resolve them by
//! type id (spec §6, §9 "polymorphic behaviors" — "model as capability sets
//! with a registry keyed by type id, avoid class hierarchies").

use std::sync::Arc;

use serde_json::Value;

use crate::instance::Instance;
use crate::task::{TaskCx, TaskEntry};

/// Result of `TaskBehavior::done` (spec §4.5 step 1).
#[derive(Debug, Clone, Default)]
pub struct TaskDoneOutcome {
    pub notify_parent: bool,
    pub child_done_code: i64,
    pub task_entries: Vec<TaskEntry>,
}

/// The interpretation policy for a flow type (spec §6 `FlowBehavior`).
pub trait FlowBehavior: Send + Sync {
    fn start(&self, instance: &mut Instance, payload: &Value) -> (bool, i64);

    fn resume(&self, instance: &mut Instance, payload: &Value) -> bool;

    fn tasks_done(&self, instance: &mut Instance, done_code: i64);

    fn done(&self, instance: &mut Instance);
}

/// The interpretation policy for a task type (spec §6 `TaskBehavior`).
///
/// Every entry point receives a [`TaskCx`] rather than a bare `&mut
/// TaskData`, since `Enter`/`Eval`/`Done`/`ChildDone` all potentially need
/// link traversal, activity resolution, or scheduling — capabilities spec
/// §4.6 assigns to TaskData but that this crate resolves transiently (see
/// `task` module docs).
pub trait TaskBehavior: Send + Sync {
    fn enter(&self, cx: &mut TaskCx<'_>, enter_code: i64) -> (bool, i64);

    fn eval(&self, cx: &mut TaskCx<'_>, eval_code: i64) -> (bool, i64);

    /// `resume_data` is whatever was passed to [`TaskCx::schedule_post_eval`]
    /// when this `PostEval` work-item was scheduled (spec §9 — the
    /// resumption-payload slot an async activity uses to carry state from
    /// the call that suspended through to the call that resumes it), or
    /// `None` if the scheduler didn't supply one.
    fn post_eval(&self, cx: &mut TaskCx<'_>, eval_code: i64, resume_data: Option<Value>) -> (bool, i64);

    fn done(&self, cx: &mut TaskCx<'_>, done_code: i64) -> TaskDoneOutcome;

    fn child_done(&self, cx: &mut TaskCx<'_>, child_task_id: &str, child_done_code: i64) -> (bool, i64);

    /// Optional fault-propagation hook (spec §7 — "Implementations SHOULD
    /// extend the contract with a fault-propagation return ... routed to
    /// the nearest enclosing fault-handling task", open question §9). A
    /// behavior that does not participate in fault handling returns `None`
    /// and the fault keeps walking up to the parent's own `fault`.
    fn fault(&self, _cx: &mut TaskCx<'_>, _fault_code: i64, _payload: Option<Value>) -> Option<TaskDoneOutcome> {
        None
    }

    /// Whether this task type handles faults itself (spec §7's "nearest
    /// enclosing fault-handling task"). A fault keeps walking up through
    /// parents while this returns `false`.
    fn handles_fault(&self) -> bool {
        false
    }
}

/// Per-model lookup of behaviors by task/flow type id (spec §6 `FlowModel`).
pub trait FlowModel: Send + Sync {
    fn flow_behavior(&self, type_id: &str) -> Option<Arc<dyn FlowBehavior>>;

    fn task_behavior(&self, type_id: &str) -> Option<Arc<dyn TaskBehavior>>;
}

/// Global lookup of a [`FlowModel`] by the flow definition's model id (spec
/// §6 "FlowModel registry").
pub trait ModelRegistry: Send + Sync {
    fn model(&self, model_id: &str) -> Option<Arc<dyn FlowModel>>;
}
