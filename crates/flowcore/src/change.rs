//! `ChangeTracker` — per-step journal of state mutations (spec §3, §4.9).
//!
//! The tracker accumulates the last-seen status/state and append-only lists
//! of attribute, work-item, task-data, and link-data deltas. It is shared
//! (via [`SharedTracker`]) between `Instance`, `TaskData`, and `LinkData` so
//! that a mutation recorded deep inside a behavior call — e.g. a
//! `TaskData::set_state` invoked from a pluggable `TaskBehavior` — lands in
//! the same journal the step loop resets and hands back to the host.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::attr::Attribute;
use crate::instance::InstanceStatus;
use crate::work_item::WorkItem;

/// Shared handle installed on every `TaskData`/`LinkData` created within an
/// instance's lifetime, plus on `Instance` itself.
pub type SharedTracker = Arc<Mutex<ChangeTracker>>;

/// Whether an entity was added, updated, or removed this step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Upd,
    Del,
}

/// A point-in-time copy of a `TaskData`, tracker-handle stripped out, for
/// the journal.
#[derive(Debug, Clone)]
pub struct TaskDataSnapshot {
    pub task_id: String,
    pub state: i64,
    pub done: bool,
    pub attrs: Vec<Attribute>,
}

/// A point-in-time copy of a `LinkData`.
#[derive(Debug, Clone)]
pub struct LinkDataSnapshot {
    pub link_id: String,
    pub state: i64,
}

#[derive(Debug, Clone)]
pub struct AttrChange {
    pub kind: ChangeKind,
    pub name: String,
    pub attr: Option<Attribute>,
}

#[derive(Debug, Clone)]
pub struct WorkItemChange {
    pub kind: ChangeKind,
    pub id: u64,
    pub item: Option<WorkItem>,
}

#[derive(Debug, Clone)]
pub struct TaskDataChange {
    pub kind: ChangeKind,
    pub task_id: String,
    pub snapshot: Option<TaskDataSnapshot>,
}

#[derive(Debug, Clone)]
pub struct LinkDataChange {
    pub kind: ChangeKind,
    pub link_id: String,
    pub snapshot: Option<LinkDataSnapshot>,
}

/// One step's worth of deltas. Reset at the top of every `DoStep` (see
/// [`ChangeTracker::reset`]); overwritten status/state fields keep only the
/// latest value, the rest accumulate as lists (spec §4.9).
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    pub status: Option<InstanceStatus>,
    pub state: Option<i64>,
    pub attrs: Vec<AttrChange>,
    pub work_items: Vec<WorkItemChange>,
    pub task_data: Vec<TaskDataChange>,
    pub link_data: Vec<LinkDataChange>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the journal in place. Takes `&mut self` through the
    /// [`SharedTracker`] mutex rather than replacing the `Arc`, so every
    /// clone already handed out to a `TaskData`/`LinkData` keeps observing
    /// the same tracker after a reset.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_status(&mut self, status: InstanceStatus) {
        self.status = Some(status);
    }

    pub fn record_state(&mut self, state: i64) {
        self.state = Some(state);
    }

    pub fn record_attr(&mut self, kind: ChangeKind, name: impl Into<String>, attr: Option<Attribute>) {
        self.attrs.push(AttrChange {
            kind,
            name: name.into(),
            attr,
        });
    }

    pub fn record_work_item_add(&mut self, item: WorkItem) {
        self.work_items.push(WorkItemChange {
            kind: ChangeKind::Add,
            id: item.id,
            item: Some(item),
        });
    }

    pub fn record_work_item_del(&mut self, id: u64) {
        self.work_items.push(WorkItemChange {
            kind: ChangeKind::Del,
            id,
            item: None,
        });
    }

    pub fn record_task_data(
        &mut self,
        kind: ChangeKind,
        task_id: impl Into<String>,
        snapshot: Option<TaskDataSnapshot>,
    ) {
        self.task_data.push(TaskDataChange {
            kind,
            task_id: task_id.into(),
            snapshot,
        });
    }

    pub fn record_link_data(
        &mut self,
        kind: ChangeKind,
        link_id: impl Into<String>,
        snapshot: Option<LinkDataSnapshot>,
    ) {
        self.link_data.push(LinkDataChange {
            kind,
            link_id: link_id.into(),
            snapshot,
        });
    }
}
