//! `TaskEnv` — the execution scope owning a flow's `TaskData`/`LinkData`
//! maps: factory and reaper (spec §3, §4.8).
//!
//! The core only ever instantiates one `TaskEnv` per instance, rooted at the
//! flow's root task; the design leaves room for nested sub-envs (e.g. a
//! future per-iteration scope for loop constructs) but nothing in this
//! crate creates one.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::change::{ChangeKind, SharedTracker};
use crate::flow::{FlowDefinition, Task};
use crate::link::LinkData;
use crate::task::TaskData;

/// Owns the live `TaskData`/`LinkData` for one scope. A task is present in
/// `task_datas` iff it is currently active (spec §3 invariant).
pub struct TaskEnv {
    id: String,
    root_task_id: String,
    task_datas: HashMap<String, TaskData>,
    link_datas: HashMap<String, LinkData>,
}

impl TaskEnv {
    pub(crate) fn new(id: impl Into<String>, root_task_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            root_task_id: root_task_id.into(),
            task_datas: HashMap::new(),
            link_datas: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root_task_id(&self) -> &str {
        &self.root_task_id
    }

    pub fn task_data(&self, task_id: &str) -> Option<&TaskData> {
        self.task_datas.get(task_id)
    }

    pub fn task_datas(&self) -> &HashMap<String, TaskData> {
        &self.task_datas
    }

    pub fn task_datas_mut(&mut self) -> &mut HashMap<String, TaskData> {
        &mut self.task_datas
    }

    pub fn link_datas(&self) -> &HashMap<String, LinkData> {
        &self.link_datas
    }

    pub fn link_datas_mut(&mut self) -> &mut HashMap<String, LinkData> {
        &mut self.link_datas
    }

    pub fn has_task(&self, task_id: &str) -> bool {
        self.task_datas.contains_key(task_id)
    }

    /// `FindOrCreateTaskData` (spec §4.8).
    pub(crate) fn find_or_create_task_data(
        &mut self,
        flow: &dyn FlowDefinition,
        task_id: &str,
        tracker: &SharedTracker,
    ) -> &mut TaskData {
        self.task_datas.entry(task_id.to_string()).or_insert_with(|| {
            let declared: Arc<[_]> = flow
                .task(task_id)
                .map(|t| Arc::from(t.attrs().to_vec()))
                .unwrap_or_else(|| Arc::from(Vec::new()));
            TaskData::new(task_id, declared, tracker.clone())
        })
    }

    /// `NewTaskData` — unconditional create, used for the root task at
    /// `Start` (spec §4.8).
    pub(crate) fn new_task_data(
        &mut self,
        flow: &dyn FlowDefinition,
        task_id: &str,
        tracker: &SharedTracker,
    ) {
        let declared: Arc<[_]> = flow
            .task(task_id)
            .map(|t| Arc::from(t.attrs().to_vec()))
            .unwrap_or_else(|| Arc::from(Vec::new()));
        let data = TaskData::new(task_id, declared, tracker.clone());
        self.task_datas.insert(task_id.to_string(), data);
    }

    /// `FindOrCreateLinkData` (spec §4.8).
    pub(crate) fn find_or_create_link_data(
        &mut self,
        link_id: &str,
        tracker: &SharedTracker,
    ) -> &mut LinkData {
        self.link_datas
            .entry(link_id.to_string())
            .or_insert_with(|| LinkData::new(link_id, tracker.clone()))
    }

    /// `releaseTask` — the sole garbage-collection point (spec §4.8): drops
    /// the task's own data, every child's data, and every inbound link's
    /// data, journaling a `Del` for each.
    pub(crate) fn release_task(&mut self, flow: &dyn FlowDefinition, task: &dyn Task, tracker: &SharedTracker) {
        self.delete_task_data(task.id(), tracker);

        for child_id in task.child_ids() {
            self.delete_task_data(child_id, tracker);
        }

        for link_id in task.from_link_ids() {
            self.delete_link_data(link_id, tracker);
        }

        let _ = flow;
    }

    fn delete_task_data(&mut self, task_id: &str, tracker: &SharedTracker) {
        if self.task_datas.remove(task_id).is_some() {
            debug!(task_id, "releasing task data");
            tracker.lock().record_task_data(ChangeKind::Del, task_id, None);
        }
    }

    fn delete_link_data(&mut self, link_id: &str, tracker: &SharedTracker) {
        if self.link_datas.remove(link_id).is_some() {
            tracker.lock().record_link_data(ChangeKind::Del, link_id, None);
        }
    }

    /// Rehydration (spec §4.1 `Restart`, §4.8 `init`): reconnects each
    /// persisted `TaskData`/`LinkData` to its flow `task`/`link` by the id
    /// carried inside the datum, refusing ids the flow no longer defines.
    pub(crate) fn reconnect(&self, flow: &dyn FlowDefinition) -> Result<(), String> {
        for task_id in self.task_datas.keys() {
            if flow.task(task_id).is_none() {
                return Err(format!("restart: flow no longer defines task {task_id}"));
            }
        }
        for link_id in self.link_datas.keys() {
            if flow.link(link_id).is_none() {
                return Err(format!("restart: flow no longer defines link {link_id}"));
            }
        }
        Ok(())
    }
}
