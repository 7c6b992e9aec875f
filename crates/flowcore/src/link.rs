//! `LinkData` — per-instance runtime state for one flow link (spec §3).

use crate::change::{ChangeKind, LinkDataSnapshot, SharedTracker};

/// Conventional state value meaning "evaluated true / traversable" (spec §3
/// — "by convention 2 means true"). Any other `i64` is host-defined.
pub const EVALUATED_TRUE: i64 = 2;

/// Runtime state of one link within a single instance.
///
/// Addresses its flow link indirectly by `link_id` rather than holding a
/// reference, so it can be created, journaled, and released without
/// borrowing the owning `TaskEnv` (spec §9, "arena-and-index").
pub struct LinkData {
    link_id: String,
    state: i64,
    tracker: SharedTracker,
}

impl LinkData {
    pub(crate) fn new(link_id: impl Into<String>, tracker: SharedTracker) -> Self {
        let link_id = link_id.into();
        let data = Self {
            link_id: link_id.clone(),
            state: 0,
            tracker,
        };
        data.tracker.lock().record_link_data(
            ChangeKind::Add,
            link_id,
            Some(data.snapshot()),
        );
        data
    }

    pub fn link_id(&self) -> &str {
        &self.link_id
    }

    pub fn state(&self) -> i64 {
        self.state
    }

    pub fn is_true(&self) -> bool {
        self.state == EVALUATED_TRUE
    }

    /// `LinkData.SetState` (spec §4.6's link-side analogue): record the new
    /// state and journal an `Upd`.
    pub fn set_state(&mut self, state: i64) {
        self.state = state;
        self.tracker
            .lock()
            .record_link_data(ChangeKind::Upd, self.link_id.clone(), Some(self.snapshot()));
    }

    fn snapshot(&self) -> LinkDataSnapshot {
        LinkDataSnapshot {
            link_id: self.link_id.clone(),
            state: self.state,
        }
    }
}

/// Pluggable link evaluation (spec §9 — "a pluggable link behavior is
/// anticipated by the design but not implemented; reserve a `LinkBehavior`
/// capability slot"). `TaskCx::eval_link` uses [`UnconditionalLink`] by
/// default; a host wiring up conditional links supplies its own
/// implementation and calls `eval_link_with` instead.
pub trait LinkBehavior: Send + Sync {
    fn evaluate(&self, link: &mut LinkData);
}

/// The engine's only implemented link behavior: unconditionally marks the
/// link [`EVALUATED_TRUE`] (spec §4.6 `EvalLink`).
pub struct UnconditionalLink;

impl LinkBehavior for UnconditionalLink {
    fn evaluate(&self, link: &mut LinkData) {
        link.set_state(EVALUATED_TRUE);
    }
}
