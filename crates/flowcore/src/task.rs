//! `TaskData` — per-instance runtime state of one task (spec §3, §4.6), and
//! [`TaskCx`], the transient context object that gives a `TaskBehavior`
//! access to the capabilities spec §4.6 describes as "implemented by
//! TaskData": link traversal, child entry, and activity resolution.
//!
//! `TaskData` itself only holds what it can own outright (state, done,
//! attributes). Everything that needs its sibling `TaskEnv`/`Instance`
//! state — `FromLinks`, `EnterChildren`, `Activity`, identity accessors —
//! is re-resolved per call through `TaskCx` rather than via a back-pointer
//! stored on `TaskData`, so a single task's `TaskData` never borrows its
//! own owner (spec §9, "arena-and-index").

use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::activity::{Activity, ActivityRegistry};
use crate::attr::{self, AttrTable, Attribute};
use crate::behavior::FlowModel;
use crate::change::{ChangeKind, SharedTracker, TaskDataSnapshot};
use crate::error::{AttrError, InstanceError};
use crate::flow::FlowDefinition;
use crate::link::LinkData;
use crate::task_env::TaskEnv;
use crate::work_item::{ExecType, WorkItem};

/// Runtime state of one task within an instance's single `TaskEnv`.
pub struct TaskData {
    task_id: String,
    state: i64,
    done: bool,
    attrs: AttrTable,
    declared_attrs: Arc<[Attribute]>,
    tracker: SharedTracker,
}

impl TaskData {
    pub(crate) fn new(
        task_id: impl Into<String>,
        declared_attrs: Arc<[Attribute]>,
        tracker: SharedTracker,
    ) -> Self {
        let task_id = task_id.into();
        let data = Self {
            task_id: task_id.clone(),
            state: 0,
            done: false,
            attrs: AttrTable::new(),
            declared_attrs,
            tracker,
        };
        data.tracker
            .lock()
            .record_task_data(ChangeKind::Add, task_id, Some(data.snapshot()));
        data
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn state(&self) -> i64 {
        self.state
    }

    /// `SetState` — records a tracker Upd (spec §4.6).
    pub fn set_state(&mut self, state: i64) {
        self.state = state;
        self.journal_upd();
    }

    pub fn done(&self) -> bool {
        self.done
    }

    pub(crate) fn set_done(&mut self, done: bool) {
        self.done = done;
        self.journal_upd();
    }

    pub fn get_attr_value(&self, name: &str) -> Option<&str> {
        attr::lookup_value(&self.attrs, &self.declared_attrs, name)
    }

    pub fn get_attr_type(&self, name: &str) -> Option<&str> {
        attr::lookup_type(&self.attrs, &self.declared_attrs, name)
    }

    /// Type-preserving update of an already-known name (spec §4.6). Unlike
    /// the teacher's rendition of a similar "keep declared type" rule, an
    /// unknown name is a typed error rather than a silent no-op, so the
    /// caller can log it (spec §7's own recommendation).
    pub fn set_attr_value(&mut self, name: &str, value: String) -> Result<(), AttrError> {
        attr::set_value(&mut self.attrs, &self.declared_attrs, name, value)?;
        self.journal_upd();
        Ok(())
    }

    pub fn add_attr(
        &mut self,
        name: &str,
        type_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), AttrError> {
        attr::add_attr(&mut self.attrs, &self.declared_attrs, name, type_name.into(), value.into())?;
        self.journal_upd();
        Ok(())
    }

    fn journal_upd(&self) {
        self.tracker.lock().record_task_data(
            ChangeKind::Upd,
            self.task_id.clone(),
            Some(self.snapshot()),
        );
    }

    pub(crate) fn snapshot(&self) -> TaskDataSnapshot {
        TaskDataSnapshot {
            task_id: self.task_id.clone(),
            state: self.state,
            done: self.done,
            attrs: self.attrs.iter().cloned().collect(),
        }
    }
}

impl crate::mapper::AttrScope for TaskData {
    fn get_attr_value(&self, name: &str) -> Option<&str> {
        TaskData::get_attr_value(self, name)
    }

    fn get_attr_type(&self, name: &str) -> Option<&str> {
        TaskData::get_attr_type(self, name)
    }

    fn set_attr_value(&mut self, name: &str, value: String) -> Result<(), AttrError> {
        TaskData::set_attr_value(self, name, value)
    }

    fn add_attr(&mut self, name: &str, type_name: String, value: String) -> Result<(), AttrError> {
        TaskData::add_attr(self, name, type_name, value)
    }
}

/// One entry in an `EnterChildren` call or a behavior-returned task-entry
/// list (spec §4.5 step 3, §4.6 `EnterChildren`): `task_id = None` is the
/// "all children" sentinel, only meaningful when it is the sole entry.
#[derive(Debug, Clone)]
pub struct TaskEntry {
    pub task_id: Option<String>,
    pub enter_code: i64,
}

impl TaskEntry {
    pub fn all_children(enter_code: i64) -> Self {
        Self { task_id: None, enter_code }
    }

    pub fn task(task_id: impl Into<String>, enter_code: i64) -> Self {
        Self { task_id: Some(task_id.into()), enter_code }
    }
}

/// Transient per-call context giving a `TaskBehavior` the capabilities spec
/// §4.6 assigns to `TaskData`: link lookup, activity resolution, child
/// entry, identity, and scheduling. Constructed fresh by `Instance` for the
/// duration of one behavior call; never stored.
pub struct TaskCx<'a> {
    task_id: String,
    flow: &'a dyn FlowDefinition,
    model: &'a dyn FlowModel,
    activity_registry: &'a dyn ActivityRegistry,
    instance_id: &'a str,
    flow_name: &'a str,
    queue: &'a mut VecDeque<WorkItem>,
    wi_counter: &'a mut u64,
    env: &'a mut TaskEnv,
    tracker: &'a SharedTracker,
}

impl<'a> TaskCx<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        task_id: impl Into<String>,
        flow: &'a dyn FlowDefinition,
        model: &'a dyn FlowModel,
        activity_registry: &'a dyn ActivityRegistry,
        instance_id: &'a str,
        flow_name: &'a str,
        queue: &'a mut VecDeque<WorkItem>,
        wi_counter: &'a mut u64,
        env: &'a mut TaskEnv,
        tracker: &'a SharedTracker,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            flow,
            model,
            activity_registry,
            instance_id,
            flow_name,
            queue,
            wi_counter,
            env,
            tracker,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn flow_instance_id(&self) -> &str {
        self.instance_id
    }

    pub fn flow_name(&self) -> &str {
        self.flow_name
    }

    pub fn task_name(&self) -> &str {
        self.flow.task(&self.task_id).map(|t| t.name()).unwrap_or(&self.task_id)
    }

    /// Fails with [`InstanceError::MissingTaskData`] if this task's data was
    /// released out from under the call (e.g. a misbehaving `TaskBehavior`
    /// releasing its own task before finishing its own `Eval`).
    pub fn data(&self) -> Result<&TaskData, InstanceError> {
        self.env
            .task_data(&self.task_id)
            .ok_or_else(|| InstanceError::MissingTaskData(self.task_id.clone()))
    }

    /// See [`TaskCx::data`].
    pub fn data_mut(&mut self) -> Result<&mut TaskData, InstanceError> {
        self.env
            .task_datas_mut()
            .get_mut(&self.task_id)
            .ok_or_else(|| InstanceError::MissingTaskData(self.task_id.clone()))
    }

    /// `FromLinks` — `FindOrCreateLinkData` for each inbound link, in
    /// declared order (spec §4.6).
    pub fn from_links(&mut self) -> Vec<&LinkData> {
        let Some(task) = self.flow.task(&self.task_id) else {
            return Vec::new();
        };
        let link_ids = task.from_link_ids().to_vec();
        for link_id in &link_ids {
            self.find_or_create_link_data(link_id);
        }
        let map = self.env.link_datas();
        link_ids.iter().filter_map(|id| map.get(id)).collect()
    }

    pub fn find_or_create_link_data(&mut self, link_id: &str) -> &mut LinkData {
        self.env.find_or_create_link_data(link_id, self.tracker)
    }

    /// `EvalLink` — unconditional mark (spec §4.6).
    pub fn eval_link(&mut self, link_id: &str) {
        self.eval_link_with(link_id, &crate::link::UnconditionalLink);
    }

    /// `EvalLink` against a supplied [`LinkBehavior`] (spec §9 — the
    /// reserved capability slot for conditional links).
    pub fn eval_link_with(&mut self, link_id: &str, behavior: &dyn crate::link::LinkBehavior) {
        behavior.evaluate(self.find_or_create_link_data(link_id));
    }

    /// Resolves the task's declared activity type (spec §4.6 `Activity()`
    /// — this task data doubles as the activity's context).
    pub fn activity(&self) -> Option<Arc<dyn Activity>> {
        let task = self.flow.task(&self.task_id)?;
        self.activity_registry.get(task.activity_type())
    }

    /// Schedule an `Eval` work-item for `task_id` and journal the add.
    pub fn schedule_eval(&mut self, task_id: impl Into<String>, eval_code: i64) {
        self.schedule(task_id, ExecType::Eval, eval_code, None);
    }

    /// Schedule a `PostEval` work-item, optionally carrying a resumption
    /// payload forward to the `post_eval` call that executes it. Exposed so
    /// async activities have a symmetric scheduling hook (spec §5 —
    /// "implementers must add a symmetric schedulePostEval").
    pub fn schedule_post_eval(&mut self, task_id: impl Into<String>, eval_code: i64, resume_data: Option<Value>) {
        self.schedule(task_id, ExecType::PostEval, eval_code, resume_data);
    }

    fn schedule(&mut self, task_id: impl Into<String>, exec_type: ExecType, eval_code: i64, resume_data: Option<Value>) {
        *self.wi_counter += 1;
        let item = WorkItem::new(*self.wi_counter, task_id, exec_type, eval_code, resume_data);
        trace!(task_id = %item.task_id, id = item.id, ?exec_type, "scheduling work item");
        self.tracker.lock().record_work_item_add(item.clone());
        self.queue.push_back(item);
    }

    pub fn find_or_create_task_data(&mut self, task_id: &str) -> &mut TaskData {
        self.env.find_or_create_task_data(self.flow, task_id, self.tracker)
    }

    /// `EnterChildren` (spec §4.6). A *present-but-empty* list is a no-op —
    /// this is what `TaskDoneOutcome::default()` produces, and a behavior
    /// whose `Done` has nothing further to enter should get that for free.
    /// The "enter every child" shortcut is reserved for the single
    /// null-target entry the spec describes (spec's "entries absent" case,
    /// which a zero-argument call in the original would produce, is
    /// exposed here as the explicit [`TaskCx::enter_all_children`]
    /// convenience instead — Rust has no nil/empty-slice distinction to
    /// hang that default on).
    pub fn enter_children(&mut self, entries: &[TaskEntry]) -> Result<(), InstanceError> {
        if let [TaskEntry { task_id: None, enter_code }] = entries {
            return self.enter_all_children(*enter_code);
        }

        for entry in entries {
            let Some(task_id) = entry.task_id.as_deref() else {
                continue;
            };
            self.enter_one(task_id, entry.enter_code)?;
        }
        Ok(())
    }

    /// Enter every child of this task with one shared `enter_code` (spec
    /// §4.6's "entries absent" shortcut). The natural call from within a
    /// parent task's own `Enter` handler.
    pub fn enter_all_children(&mut self, enter_code: i64) -> Result<(), InstanceError> {
        let child_ids = self
            .flow
            .task(&self.task_id)
            .map(|t| t.child_ids().to_vec())
            .unwrap_or_default();
        for child_id in child_ids {
            self.enter_one(&child_id, enter_code)?;
        }
        Ok(())
    }

    fn enter_one(&mut self, task_id: &str, enter_code: i64) -> Result<(), InstanceError> {
        self.find_or_create_task_data(task_id);
        let type_id = self
            .flow
            .task(task_id)
            .ok_or_else(|| InstanceError::TaskNotFound(task_id.to_string()))?
            .type_id()
            .to_string();
        let behavior = self
            .model
            .task_behavior(&type_id)
            .ok_or(InstanceError::UnknownTaskBehavior(type_id))?;

        let mut child_cx = TaskCx::new(
            task_id,
            self.flow,
            self.model,
            self.activity_registry,
            self.instance_id,
            self.flow_name,
            self.queue,
            self.wi_counter,
            self.env,
            self.tracker,
        );
        let (eval, eval_code) = behavior.enter(&mut child_cx, enter_code);
        if eval {
            child_cx.schedule_eval(task_id, eval_code);
        }
        Ok(())
    }
}
