//! External contracts for the immutable flow/task/link definitions (spec
//! §6). The core only reads these; it never owns their lifetime (spec §1
//! Non-goals) and never mutates them.

use std::sync::Arc;

use crate::attr::Attribute;
use crate::error::InstanceError;
use crate::mapper::Mapper;

/// A directed graph of tasks and links with a single root (GLOSSARY
/// "Flow"). Implementations are expected to be cheap to clone behind an
/// `Arc` and shared read-only across every instance of the same flow (spec
/// §5).
pub trait FlowDefinition: Send + Sync {
    /// Identifies the `FlowModel` used to resolve behaviors for this flow.
    fn model_id(&self) -> &str;

    /// The flow's own type id, passed to `FlowModel::flow_behavior`.
    fn type_id(&self) -> &str;

    fn name(&self) -> &str;

    fn root_task_id(&self) -> &str;

    /// Flow-scope attribute declarations, consulted as the second lookup
    /// tier by `Instance::get_attr_value`/`get_attr_type` (spec §4.7).
    fn attrs(&self) -> &[Attribute];

    fn task(&self, task_id: &str) -> Option<&dyn Task>;

    fn link(&self, link_id: &str) -> Option<&dyn Link>;
}

/// A node in the flow graph (GLOSSARY "Task").
pub trait Task: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// Looked up in the `FlowModel`'s task-behavior registry.
    fn type_id(&self) -> &str;

    fn parent_id(&self) -> Option<&str>;

    fn child_ids(&self) -> &[String];

    /// Ids of links whose `to` endpoint is this task, in the order
    /// `FromLinks` should hand them back (spec §3 TaskData, §4.6).
    fn from_link_ids(&self) -> &[String];

    /// Task-scope attribute declarations, the second lookup tier for
    /// `TaskData::get_attr_value`/`get_attr_type` (spec §4.6).
    fn attrs(&self) -> &[Attribute];

    /// Looked up in the activity registry (spec §4.6 `Activity()`); the
    /// resolved `Activity::metadata().outputs` is the sole source of
    /// declared output attributes for the default output mapping (spec
    /// §4.4 step 4, §6).
    fn activity_type(&self) -> &str;

    fn input_mapper(&self) -> Option<&dyn Mapper>;

    fn output_mapper(&self) -> Option<&dyn Mapper>;
}

/// A directed edge between tasks (GLOSSARY "Link").
pub trait Link: Send + Sync {
    fn id(&self) -> &str;

    fn from_task_id(&self) -> &str;

    fn to_task_id(&self) -> &str;
}

/// Resolves `flow` from `flowURI` on `Instance::restart` (spec §4.1, §6).
/// The only collaborator the core touches outside of a live step.
pub trait FlowProvider: Send + Sync {
    fn get_flow(&self, flow_uri: &str) -> Result<Arc<dyn FlowDefinition>, InstanceError>;
}
