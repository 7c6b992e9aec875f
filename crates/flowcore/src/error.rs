//! Error types for the flow-instance execution core.

use thiserror::Error;

/// Errors from attribute-scope lookups (spec §4.6, §4.7, §7).
///
/// Both are intentional no-op-with-diagnostic paths rather than panics: a
/// behavior that races a mapper, or an interceptor naming an attribute that
/// was never declared, should not bring the step down.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttrError {
    /// `SetAttrValue` (or an interceptor input) named an attribute that is
    /// neither set on the scope nor declared on the owning flow/task.
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    /// `AddAttr` named an attribute that already exists at this scope or at
    /// the enclosing declared scope; the existing value is left untouched.
    #[error("attribute already exists: {0}")]
    AlreadyExists(String),
}

/// Errors surfaced by `Instance` lifecycle and step operations.
#[derive(Debug, Error)]
pub enum InstanceError {
    /// An attribute-scope operation failed.
    #[error(transparent)]
    Attr(#[from] AttrError),

    /// `flowModel` has no behavior registered for the flow's type id.
    #[error("no flow behavior registered for type: {0}")]
    UnknownFlowBehavior(String),

    /// `flowModel` has no behavior registered for a task's type id.
    #[error("no task behavior registered for type: {0}")]
    UnknownTaskBehavior(String),

    /// A task id referenced by a work-item or a flow edge has no
    /// definition in the flow.
    #[error("task not found in flow definition: {0}")]
    TaskNotFound(String),

    /// A link id has no definition in the flow.
    #[error("link not found in flow definition: {0}")]
    LinkNotFound(String),

    /// `handleTaskDone` needed the parent's `TaskData` but it was absent.
    ///
    /// Per spec §9 this should never happen if `EnterChildren` always
    /// creates the parent's data before scheduling a child; surfacing it as
    /// an error rather than a panic keeps a malformed behavior from taking
    /// the whole process down.
    #[error("parent task data missing for task {0} (parent {1})")]
    MissingParentData(String, String),

    /// `Restart` was called without a `FlowProvider` installed.
    #[error("no flow provider installed; call SetFlowProvider before Restart")]
    NoFlowProvider,

    /// The `FlowProvider` failed to resolve `flowURI` into a definition.
    #[error("failed to resolve flow {uri}: {source}")]
    FlowResolution {
        /// The flow URI that failed to resolve.
        uri: String,
        /// Underlying provider error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// `Restart` found a persisted `TaskData`/`LinkData` whose id has no
    /// counterpart in the resolved flow definition — the definition used at
    /// restart does not match the one the snapshot was taken against.
    #[error("restart reconnection failed: {0}")]
    ReconnectFailed(String),

    /// A step tried to act on a task whose `TaskData` is not (or no longer)
    /// live in the env — e.g. a work-item surviving past its task's release.
    #[error("task data missing for task {0}")]
    MissingTaskData(String),
}
