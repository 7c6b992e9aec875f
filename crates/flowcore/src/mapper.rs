//! `Mapper`, `Patch`, and `Interceptor` — host-supplied collaborators
//! consumed but never evaluated by the core itself (spec §1 Non-goals,
//! §6). Mapper *evaluation* (expression parsing, path resolution) is out of
//! scope; the core only calls `Mapper::apply` at the two fixed points
//! spec §4.3/§4.4 define and passes scopes in the declared direction.

use crate::attr::Attribute;
use crate::error::AttrError;

/// One side of a mapper's source/target scope: read declared+dynamic
/// attributes, write dynamic ones. `Instance` and `TaskData` each implement
/// this so a `Mapper` can move data instance→task (input) or task→instance
/// (output) without depending on either concrete type.
pub trait AttrScope {
    fn get_attr_value(&self, name: &str) -> Option<&str>;
    fn get_attr_type(&self, name: &str) -> Option<&str>;
    fn set_attr_value(&mut self, name: &str, value: String) -> Result<(), AttrError>;
    fn add_attr(&mut self, name: &str, type_name: String, value: String) -> Result<(), AttrError>;
}

/// A host-supplied data transform between two attribute scopes (spec §6).
///
/// The core never parses or constructs a `Mapper`; it only calls `apply`
/// with the scopes the spec assigns to each direction:
/// - input mapper: `apply(instance_scope, task_scope)`
/// - output mapper: `apply(task_scope, instance_scope)`
pub trait Mapper: Send + Sync {
    fn apply(&self, source: &dyn AttrScope, target: &mut dyn AttrScope);
}

/// Host-supplied per-task override of mappers (spec §4.3 step a, §4.4 step
/// 2). Absent entirely, or present but silent on a given task id — both
/// states are "no override" and the task's declared mapper is used.
pub trait Patch: Send + Sync {
    fn input_mapper(&self, task_id: &str) -> Option<&dyn Mapper>;
    fn output_mapper(&self, task_id: &str) -> Option<&dyn Mapper>;
}

/// Host-supplied per-task override of input/output attributes and a skip
/// flag (spec §4.3 step b, §4.4 step 1).
#[derive(Debug, Clone, Default)]
pub struct InterceptorEntry {
    pub inputs: Vec<Attribute>,
    pub outputs: Vec<Attribute>,
    pub skip: bool,
}

/// Lookup of [`InterceptorEntry`] by task id. A task absent from the
/// interceptor behaves exactly as if no interceptor were installed at all.
pub trait Interceptor: Send + Sync {
    fn for_task(&self, task_id: &str) -> Option<&InterceptorEntry>;
}
