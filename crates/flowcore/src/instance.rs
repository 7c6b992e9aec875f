//! `Instance` — the top-level runtime state and the stepwise execution loop
//! (spec §3 Instance, §4.1–§4.5, §4.7, §4.9).

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::activity::ActivityRegistry;
use crate::attr::{self, AttrTable, Attribute, WriteKind};
use crate::behavior::{FlowBehavior, FlowModel, ModelRegistry, TaskBehavior};
use crate::change::{ChangeKind, ChangeTracker, SharedTracker};
use crate::error::{AttrError, InstanceError};
use crate::flow::{FlowDefinition, FlowProvider};
use crate::mapper::{AttrScope, Interceptor, Patch};
use crate::task::{TaskCx, TaskEntry};
use crate::task_env::TaskEnv;
use crate::work_item::{ExecType, WorkItem};

use parking_lot::Mutex;

/// Lifecycle status of an instance (spec §3). Monotonic modulo a
/// host-driven `Restart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    NotStarted,
    Active,
    Completed,
    Cancelled,
    Failed,
}

/// One running execution of a flow.
pub struct Instance {
    id: String,
    flow_uri: String,
    flow: Arc<dyn FlowDefinition>,
    model_registry: Arc<dyn ModelRegistry>,
    activity_registry: Arc<dyn ActivityRegistry>,
    flow_provider: Option<Arc<dyn FlowProvider>>,
    patch: Option<Arc<dyn Patch>>,
    interceptor: Option<Arc<dyn Interceptor>>,
    status: InstanceStatus,
    state: i64,
    step_id: u64,
    attrs: AttrTable,
    queue: VecDeque<WorkItem>,
    wi_counter: u64,
    root_env: TaskEnv,
    tracker: SharedTracker,
}

impl Instance {
    /// `New(id, flowURI, flow)` (spec §4.1), extended with the registries
    /// every behavior/activity lookup needs — the spec leaves these as
    /// ambient collaborators (§6) rather than constructor arguments, but a
    /// Rust `Instance` has nowhere else to hold them.
    pub fn new(
        id: impl Into<String>,
        flow_uri: impl Into<String>,
        flow: Arc<dyn FlowDefinition>,
        model_registry: Arc<dyn ModelRegistry>,
        activity_registry: Arc<dyn ActivityRegistry>,
    ) -> Self {
        let id = id.into();
        let root_env = TaskEnv::new(format!("{id}/root-env"), flow.root_task_id());
        Self {
            id,
            flow_uri: flow_uri.into(),
            flow,
            model_registry,
            activity_registry,
            flow_provider: None,
            patch: None,
            interceptor: None,
            status: InstanceStatus::NotStarted,
            state: 0,
            step_id: 0,
            attrs: AttrTable::new(),
            queue: VecDeque::new(),
            wi_counter: 0,
            root_env,
            tracker: Arc::new(Mutex::new(ChangeTracker::new())),
        }
    }

    pub fn set_flow_provider(&mut self, provider: Arc<dyn FlowProvider>) {
        self.flow_provider = Some(provider);
    }

    pub fn set_patch(&mut self, patch: Arc<dyn Patch>) {
        self.patch = Some(patch);
    }

    pub fn set_interceptor(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptor = Some(interceptor);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn flow_uri(&self) -> &str {
        &self.flow_uri
    }

    pub fn status(&self) -> InstanceStatus {
        self.status
    }

    pub fn state(&self) -> i64 {
        self.state
    }

    pub fn set_state(&mut self, state: i64) {
        self.state = state;
        self.tracker.lock().record_state(state);
    }

    pub fn step_id(&self) -> u64 {
        self.step_id
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Target task ids of every `WorkItem` currently queued, in FIFO order.
    pub fn queued_task_ids(&self) -> Vec<String> {
        self.queue.iter().map(|item| item.task_id.clone()).collect()
    }

    pub fn root_env(&self) -> &TaskEnv {
        &self.root_env
    }

    /// `Restart(id, provider)` (spec §4.1): resolves `flow` via the
    /// provider, confirms a `FlowModel` exists for it, then reconnects the
    /// env tree.
    #[instrument(skip(self, provider), fields(instance_id = %self.id))]
    pub fn restart(&mut self, provider: Arc<dyn FlowProvider>) -> Result<(), InstanceError> {
        let flow = provider.get_flow(&self.flow_uri)?;
        self.model_registry
            .model(flow.model_id())
            .ok_or_else(|| InstanceError::UnknownFlowBehavior(flow.model_id().to_string()))?;
        self.root_env
            .reconnect(flow.as_ref())
            .map_err(InstanceError::ReconnectFailed)?;
        info!(instance_id = %self.id, flow_uri = %self.flow_uri, "instance reconnected after restart");
        self.flow = flow;
        self.flow_provider = Some(provider);
        Ok(())
    }

    /// Convenience over [`Instance::restart`] using a previously installed
    /// provider (spec §3 `flowProvider`, "used only on restart").
    pub fn restart_with_stored_provider(&mut self) -> Result<(), InstanceError> {
        let provider = self.flow_provider.clone().ok_or(InstanceError::NoFlowProvider)?;
        self.restart(provider)
    }

    /// `Start(payload)` (spec §4.1).
    #[instrument(skip(self, payload), fields(instance_id = %self.id))]
    pub fn start(&mut self, payload: Value) -> Result<bool, InstanceError> {
        self.status = InstanceStatus::Active;
        self.tracker.lock().record_status(InstanceStatus::Active);
        self.update_attrs(&payload);

        let flow_behavior = self.flow_behavior()?;
        let (ok, eval_code) = flow_behavior.start(self, &payload);
        if ok {
            let flow = self.flow.clone();
            let tracker = self.tracker.clone();
            let root_id = flow.root_task_id().to_string();
            self.root_env.new_task_data(flow.as_ref(), &root_id, &tracker);
            self.schedule_eval(root_id, eval_code);
            info!(instance_id = %self.id, "instance started");
        }
        Ok(ok)
    }

    /// `Resume(payload)` (spec §4.1). The core does not interpret `payload`.
    pub fn resume(&mut self, payload: Value) -> Result<bool, InstanceError> {
        let flow_behavior = self.flow_behavior()?;
        Ok(flow_behavior.resume(self, &payload))
    }

    /// Host-driven cancellation (spec §5 — "Cancellation is represented by
    /// the host transitioning status to Cancelled before the next DoStep").
    /// `do_step`'s own non-Active short-circuit then leaves the queue
    /// untouched forever, same as a completed instance.
    pub fn cancel(&mut self) {
        self.status = InstanceStatus::Cancelled;
        self.tracker.lock().record_status(InstanceStatus::Cancelled);
        info!(instance_id = %self.id, "instance cancelled");
    }

    /// `DoStep()` — the step loop (spec §4.2). One call processes at most
    /// one work-item.
    #[instrument(skip(self), fields(instance_id = %self.id, step_id = self.step_id + 1))]
    pub fn do_step(&mut self) -> Result<bool, InstanceError> {
        self.tracker.lock().reset();
        self.step_id += 1;

        if self.status != InstanceStatus::Active {
            return Ok(false);
        }

        let Some(item) = self.queue.pop_front() else {
            return Ok(false);
        };
        self.tracker.lock().record_work_item_del(item.id);

        debug!(task_id = %item.task_id, exec_type = ?item.exec_type, "executing work item");
        self.exec_work_item(item)?;
        Ok(true)
    }

    pub fn get_changes(&self) -> ChangeTracker {
        self.tracker.lock().clone()
    }

    pub fn reset_changes(&mut self) {
        self.tracker.lock().reset();
    }

    // ---- Instance attribute scope (spec §4.7) --------------------------

    pub fn get_attr_value(&self, name: &str) -> Option<&str> {
        attr::lookup_value(&self.attrs, self.flow.attrs(), name)
    }

    pub fn get_attr_type(&self, name: &str) -> Option<&str> {
        attr::lookup_type(&self.attrs, self.flow.attrs(), name)
    }

    pub fn set_attr_value(&mut self, name: &str, value: String) -> Result<(), AttrError> {
        let kind = match attr::set_value(&mut self.attrs, self.flow.attrs(), name, value) {
            Ok(kind) => kind,
            Err(e) => {
                warn!(name, error = %e, "instance set_attr_value failed");
                return Err(e);
            }
        };
        let change_kind = match kind {
            WriteKind::Add => ChangeKind::Add,
            WriteKind::Upd => ChangeKind::Upd,
        };
        self.journal_attr(change_kind, name);
        Ok(())
    }

    pub fn add_attr(
        &mut self,
        name: &str,
        type_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), AttrError> {
        if let Err(e) = attr::add_attr(&mut self.attrs, self.flow.attrs(), name, type_name.into(), value.into()) {
            warn!(name, error = %e, "instance add_attr failed");
            return Err(e);
        }
        self.journal_attr(ChangeKind::Add, name);
        Ok(())
    }

    /// `UpdateAttrs(update)` (spec §4.7): string-object payloads add or
    /// overwrite instance attributes; anything else is ignored.
    pub fn update_attrs(&mut self, update: &Value) {
        let Some(map) = update.as_object() else {
            return;
        };
        for (k, v) in map {
            let Some(s) = v.as_str() else { continue };
            let kind = if self.attrs.contains(k) {
                ChangeKind::Upd
            } else {
                ChangeKind::Add
            };
            self.attrs.insert(Attribute::new(k.clone(), "string", s));
            self.journal_attr(kind, k);
        }
    }

    fn journal_attr(&self, kind: ChangeKind, name: &str) {
        self.tracker.lock().record_attr(kind, name, self.attrs.get(name).cloned());
    }

    // ---- behavior resolution --------------------------------------------

    fn flow_model(&self) -> Result<Arc<dyn FlowModel>, InstanceError> {
        self.model_registry
            .model(self.flow.model_id())
            .ok_or_else(|| InstanceError::UnknownFlowBehavior(self.flow.model_id().to_string()))
    }

    fn flow_behavior(&self) -> Result<Arc<dyn FlowBehavior>, InstanceError> {
        let model = self.flow_model()?;
        model
            .flow_behavior(self.flow.type_id())
            .ok_or_else(|| InstanceError::UnknownFlowBehavior(self.flow.type_id().to_string()))
    }

    fn task_behavior(&self, model: &dyn FlowModel, task_id: &str) -> Result<Arc<dyn TaskBehavior>, InstanceError> {
        let type_id = self
            .flow
            .task(task_id)
            .ok_or_else(|| InstanceError::TaskNotFound(task_id.to_string()))?
            .type_id()
            .to_string();
        model
            .task_behavior(&type_id)
            .ok_or(InstanceError::UnknownTaskBehavior(type_id))
    }

    fn schedule_eval(&mut self, task_id: impl Into<String>, eval_code: i64) {
        self.schedule(task_id, ExecType::Eval, eval_code);
    }

    fn schedule(&mut self, task_id: impl Into<String>, exec_type: ExecType, eval_code: i64) {
        self.wi_counter += 1;
        let item = WorkItem::new(self.wi_counter, task_id, exec_type, eval_code, None);
        self.tracker.lock().record_work_item_add(item.clone());
        self.queue.push_back(item);
    }

    fn make_cx<'a>(
        id: &'a str,
        flow: &'a dyn FlowDefinition,
        model: &'a dyn FlowModel,
        activity_registry: &'a dyn ActivityRegistry,
        queue: &'a mut VecDeque<WorkItem>,
        wi_counter: &'a mut u64,
        env: &'a mut TaskEnv,
        tracker: &'a SharedTracker,
        task_id: impl Into<String>,
    ) -> TaskCx<'a> {
        TaskCx::new(
            task_id,
            flow,
            model,
            activity_registry,
            id,
            flow.name(),
            queue,
            wi_counter,
            env,
            tracker,
        )
    }

    // ---- §4.3 executing a work-item -------------------------------------

    fn exec_work_item(&mut self, item: WorkItem) -> Result<(), InstanceError> {
        let flow = self.flow.clone();
        let model = self.flow_model()?;
        let activity_registry = self.activity_registry.clone();
        let tracker = self.tracker.clone();
        let behavior = self.task_behavior(model.as_ref(), &item.task_id)?;

        let (done, done_code) = match item.exec_type {
            ExecType::Eval => self.eval(&flow, &model, &activity_registry, &tracker, &item.task_id, item.eval_code, behavior.as_ref())?,
            ExecType::PostEval => {
                if !self.root_env.has_task(&item.task_id) {
                    return Err(InstanceError::MissingTaskData(item.task_id.clone()));
                }
                let mut cx = Self::make_cx(
                    self.id.as_str(),
                    flow.as_ref(),
                    model.as_ref(),
                    activity_registry.as_ref(),
                    &mut self.queue,
                    &mut self.wi_counter,
                    &mut self.root_env,
                    &tracker,
                    item.task_id.clone(),
                );
                behavior.post_eval(&mut cx, item.eval_code, item.resume_data.clone())
            }
        };

        if done {
            if let Some(data) = self.root_env.task_datas_mut().get_mut(&item.task_id) {
                data.set_done(true);
            }
            self.apply_output(&flow, &item.task_id)?;
            self.handle_task_done(&flow, &model, &activity_registry, &tracker, &item.task_id, done_code)?;
        }
        Ok(())
    }

    /// Eval path (spec §4.3 steps a–c).
    #[allow(clippy::too_many_arguments)]
    fn eval(
        &mut self,
        flow: &Arc<dyn FlowDefinition>,
        model: &Arc<dyn FlowModel>,
        activity_registry: &Arc<dyn ActivityRegistry>,
        tracker: &SharedTracker,
        task_id: &str,
        eval_code: i64,
        behavior: &dyn TaskBehavior,
    ) -> Result<(bool, i64), InstanceError> {
        if !self.root_env.has_task(task_id) {
            return Err(InstanceError::MissingTaskData(task_id.to_string()));
        }
        let task = flow.task(task_id).ok_or_else(|| InstanceError::TaskNotFound(task_id.to_string()))?;

        // a. effective input mapper: instance scope -> task scope.
        let mapper = self
            .patch
            .as_ref()
            .and_then(|p| p.input_mapper(task_id))
            .or_else(|| task.input_mapper());
        if let Some(mapper) = mapper {
            let source = InstanceScope {
                attrs: &self.attrs,
                declared: flow.attrs(),
            };
            let target = self
                .root_env
                .task_datas_mut()
                .get_mut(task_id)
                .ok_or_else(|| InstanceError::MissingTaskData(task_id.to_string()))?;
            mapper.apply(&source, target);
        }

        // b. interceptor inputs + skip.
        let mut skip = false;
        if let Some(entry) = self.interceptor.as_ref().and_then(|i| i.for_task(task_id)) {
            let inputs = entry.inputs.clone();
            skip = entry.skip;
            let target = self
                .root_env
                .task_datas_mut()
                .get_mut(task_id)
                .ok_or_else(|| InstanceError::MissingTaskData(task_id.to_string()))?;
            for input in &inputs {
                if let Err(e) = target.set_attr_value(&input.name, input.value.clone()) {
                    warn!(task_id, attr = %input.name, error = %e, "interceptor input set failed");
                }
            }
        }

        if skip {
            return Ok((true, 0));
        }

        // c. dispatch to the behavior.
        let mut cx = Self::make_cx(
            self.id.as_str(),
            flow.as_ref(),
            model.as_ref(),
            activity_registry.as_ref(),
            &mut self.queue,
            &mut self.wi_counter,
            &mut self.root_env,
            tracker,
            task_id,
        );
        Ok(behavior.eval(&mut cx, eval_code))
    }

    /// Output handling (spec §4.4).
    fn apply_output(&mut self, flow: &Arc<dyn FlowDefinition>, task_id: &str) -> Result<(), InstanceError> {
        let task = flow.task(task_id).ok_or_else(|| InstanceError::TaskNotFound(task_id.to_string()))?;

        // 1. interceptor outputs -> task data, take precedence over mappers.
        if let Some(entry) = self.interceptor.as_ref().and_then(|i| i.for_task(task_id)) {
            let outputs = entry.outputs.clone();
            let target = self
                .root_env
                .task_datas_mut()
                .get_mut(task_id)
                .ok_or_else(|| InstanceError::MissingTaskData(task_id.to_string()))?;
            for output in &outputs {
                if target.set_attr_value(&output.name, output.value.clone()).is_err() {
                    if let Err(e) = target.add_attr(&output.name, output.type_name.clone(), output.value.clone()) {
                        warn!(task_id, attr = %output.name, error = %e, "interceptor output set failed");
                    }
                }
            }
        }

        // 2/3. effective output mapper: task scope -> instance scope.
        let mapper = self
            .patch
            .as_ref()
            .and_then(|p| p.output_mapper(task_id))
            .or_else(|| task.output_mapper());

        if let Some(mapper) = mapper {
            let source = self
                .root_env
                .task_datas_mut()
                .get(task_id)
                .ok_or_else(|| InstanceError::MissingTaskData(task_id.to_string()))?;
            let mut target = InstanceWriteScope {
                attrs: &mut self.attrs,
                declared: flow.attrs(),
                touched: Vec::new(),
            };
            mapper.apply(source, &mut target);
            let touched = target.touched;
            for name in touched {
                self.journal_attr(ChangeKind::Upd, &name);
            }
            return Ok(());
        }

        // 4. default output mapping: T<taskID>.<name> for each output the
        // task's resolved activity declares (spec §4.4 step 4, §6 "Activity
        // registry: Get(typeName) -> Activity; activity exposes
        // Metadata().Outputs"). A task whose activity type isn't registered
        // (e.g. a pure routing task with no activity) simply has nothing to
        // map.
        let Some(activity) = self.activity_registry.get(task.activity_type()) else {
            return Ok(());
        };
        let outputs = activity.metadata().outputs.clone();
        for output in outputs {
            let value = self
                .root_env
                .task_data(task_id)
                .and_then(|d| d.get_attr_value(&output.name))
                .map(|s| s.to_string());
            let Some(value) = value else { continue };
            let name = format!("T{task_id}.{}", output.name);
            if let Err(e) = self.add_attr(&name, output.type_name.clone(), value) {
                warn!(task_id, attr = %name, error = %e, "default output mapping failed");
            }
        }
        Ok(())
    }

    /// `handleTaskDone` (spec §4.5) — true recursion so that a parent's own
    /// entries/release (performed when the recursive call returns) happen
    /// strictly after the parent's own notification chain has settled, per
    /// the tie-break note in spec §4.5.
    #[allow(clippy::too_many_arguments)]
    fn handle_task_done(
        &mut self,
        flow: &Arc<dyn FlowDefinition>,
        model: &Arc<dyn FlowModel>,
        activity_registry: &Arc<dyn ActivityRegistry>,
        tracker: &SharedTracker,
        task_id: &str,
        done_code: i64,
    ) -> Result<(), InstanceError> {
        let behavior = self.task_behavior(model.as_ref(), task_id)?;

        let outcome = {
            let mut cx = Self::make_cx(
                self.id.as_str(),
                flow.as_ref(),
                model.as_ref(),
                activity_registry.as_ref(),
                &mut self.queue,
                &mut self.wi_counter,
                &mut self.root_env,
                tracker,
                task_id,
            );
            behavior.done(&mut cx, done_code)
        };

        if outcome.notify_parent {
            let parent_id = flow.task(task_id).and_then(|t| t.parent_id()).map(|s| s.to_string());
            match parent_id {
                Some(parent_id) => {
                    if !self.root_env.has_task(&parent_id) {
                        return Err(InstanceError::MissingParentData(task_id.to_string(), parent_id));
                    }
                    let parent_behavior = self.task_behavior(model.as_ref(), &parent_id)?;

                    let (parent_done, parent_done_code) = {
                        let mut parent_cx = Self::make_cx(
                            self.id.as_str(),
                            flow.as_ref(),
                            model.as_ref(),
                            activity_registry.as_ref(),
                            &mut self.queue,
                            &mut self.wi_counter,
                            &mut self.root_env,
                            tracker,
                            parent_id.as_str(),
                        );
                        parent_behavior.child_done(&mut parent_cx, task_id, outcome.child_done_code)
                    };

                    if parent_done {
                        self.handle_task_done(flow, model, activity_registry, tracker, &parent_id, parent_done_code)?;
                    }
                }
                None => {
                    let flow_behavior = self.flow_behavior()?;
                    flow_behavior.tasks_done(self, outcome.child_done_code);
                    flow_behavior.done(self);
                    self.status = InstanceStatus::Completed;
                    self.tracker.lock().record_status(InstanceStatus::Completed);
                    info!(instance_id = %self.id, "instance completed");
                }
            }
        }

        self.enter_entries(flow, model, activity_registry, tracker, task_id, &outcome.task_entries)?;

        let task = flow.task(task_id).ok_or_else(|| InstanceError::TaskNotFound(task_id.to_string()))?;
        self.root_env.release_task(flow.as_ref(), task, tracker);

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn enter_entries(
        &mut self,
        flow: &Arc<dyn FlowDefinition>,
        model: &Arc<dyn FlowModel>,
        activity_registry: &Arc<dyn ActivityRegistry>,
        tracker: &SharedTracker,
        parent_task_id: &str,
        entries: &[TaskEntry],
    ) -> Result<(), InstanceError> {
        let mut cx = Self::make_cx(
            self.id.as_str(),
            flow.as_ref(),
            model.as_ref(),
            activity_registry.as_ref(),
            &mut self.queue,
            &mut self.wi_counter,
            &mut self.root_env,
            tracker,
            parent_task_id,
        );
        cx.enter_children(entries)
    }
}

impl AttrScope for Instance {
    fn get_attr_value(&self, name: &str) -> Option<&str> {
        Instance::get_attr_value(self, name)
    }

    fn get_attr_type(&self, name: &str) -> Option<&str> {
        Instance::get_attr_type(self, name)
    }

    fn set_attr_value(&mut self, name: &str, value: String) -> Result<(), AttrError> {
        Instance::set_attr_value(self, name, value)
    }

    fn add_attr(&mut self, name: &str, type_name: String, value: String) -> Result<(), AttrError> {
        Instance::add_attr(self, name, type_name, value)
    }
}

/// Read-only view of instance scope used as a mapper *source* without
/// requiring a live `&Instance` (so the target task-data borrow, taken from
/// a different field, can coexist — see `eval`'s step a).
struct InstanceScope<'a> {
    attrs: &'a AttrTable,
    declared: &'a [Attribute],
}

impl AttrScope for InstanceScope<'_> {
    fn get_attr_value(&self, name: &str) -> Option<&str> {
        attr::lookup_value(self.attrs, self.declared, name)
    }

    fn get_attr_type(&self, name: &str) -> Option<&str> {
        attr::lookup_type(self.attrs, self.declared, name)
    }

    fn set_attr_value(&mut self, _name: &str, _value: String) -> Result<(), AttrError> {
        unreachable!("InstanceScope is only ever passed as an immutable mapper source")
    }

    fn add_attr(&mut self, _name: &str, _type_name: String, _value: String) -> Result<(), AttrError> {
        unreachable!("InstanceScope is only ever passed as an immutable mapper source")
    }
}

/// Write-capable view of instance scope used as a mapper *target*
/// (`apply_output`'s step 2/3); records which names changed so the caller
/// can journal them without re-borrowing `self.attrs`.
struct InstanceWriteScope<'a> {
    attrs: &'a mut AttrTable,
    declared: &'a [Attribute],
    touched: Vec<String>,
}

impl AttrScope for InstanceWriteScope<'_> {
    fn get_attr_value(&self, name: &str) -> Option<&str> {
        attr::lookup_value(self.attrs, self.declared, name)
    }

    fn get_attr_type(&self, name: &str) -> Option<&str> {
        attr::lookup_type(self.attrs, self.declared, name)
    }

    fn set_attr_value(&mut self, name: &str, value: String) -> Result<(), AttrError> {
        attr::set_value(self.attrs, self.declared, name, value)?;
        self.touched.push(name.to_string());
        Ok(())
    }

    fn add_attr(&mut self, name: &str, type_name: String, value: String) -> Result<(), AttrError> {
        attr::add_attr(self.attrs, self.declared, name, type_name, value)?;
        self.touched.push(name.to_string());
        Ok(())
    }
}
