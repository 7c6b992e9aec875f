//! `WorkItem` — an event scheduled for delivery to a task (spec §3).

use serde_json::Value;

/// Which task-behavior entry point a [`WorkItem`] invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecType {
    Eval,
    PostEval,
}

/// A pending unit of execution against one `TaskData`.
///
/// `task_id` addresses the target indirectly through the owning
/// `TaskEnv`'s map rather than holding a live reference, so a `WorkItem` can
/// sit in the queue, be journaled by the `ChangeTracker`, and be
/// reconstructed on restart without borrowing anything (spec §9,
/// "arena-and-index").
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub id: u64,
    pub task_id: String,
    pub exec_type: ExecType,
    pub eval_code: i64,

    /// Resumption payload for an async activity's `PostEval` (spec §9 —
    /// "Implementers MAY extend the work-item with a resumption-payload
    /// slot"). Set by whoever scheduled this item
    /// (`TaskCx::schedule_post_eval`) and forwarded verbatim as `post_eval`'s
    /// third argument when the item is executed; `Eval` items never carry
    /// one.
    pub resume_data: Option<Value>,
}

impl WorkItem {
    pub(crate) fn new(
        id: u64,
        task_id: impl Into<String>,
        exec_type: ExecType,
        eval_code: i64,
        resume_data: Option<Value>,
    ) -> Self {
        Self {
            id,
            task_id: task_id.into(),
            exec_type,
            eval_code,
            resume_data,
        }
    }
}
