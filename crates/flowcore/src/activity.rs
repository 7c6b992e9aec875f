//! `Activity` and its registry — the pluggable unit of work a task wraps
//! (spec §6, GLOSSARY "Activity"). The core never invokes an activity
//! itself; `TaskBehavior` implementations resolve one via `TaskCx::activity`
//! and call it however their task type requires.

use std::sync::Arc;

use crate::attr::Attribute;

/// Declared shape of an activity's output attributes, consulted by the
/// default output mapping (spec §4.4 step 4).
#[derive(Debug, Clone, Default)]
pub struct ActivityMetadata {
    pub outputs: Vec<Attribute>,
}

/// A pluggable unit of work, resolved by type name from an
/// [`ActivityRegistry`]. The core is oblivious to what an activity actually
/// does; it only reads `metadata().outputs` for the default output mapping.
pub trait Activity: Send + Sync {
    fn metadata(&self) -> &ActivityMetadata;
}

/// `Get(typeName) → Activity` (spec §6). Implementations typically hold a
/// static map from type name to a boxed `Activity`; the core only ever
/// reads through this trait.
pub trait ActivityRegistry: Send + Sync {
    fn get(&self, type_name: &str) -> Option<Arc<dyn Activity>>;
}
