//! Consolidated state of one resource shared by several contents.
//!
//! Every content sharing a resource asks for a desired resource state; the
//! resource is driven towards the highest of them. What each content gets to
//! see is clamped: only the *escalator*, the content that pushed the resource
//! to where it is now, observes the reported state directly. Everybody else
//! sees at most what they asked for.

use std::collections::BTreeMap;

use stageproto::{ContentId, ResourceState};

/// A content's desire slot on a resource.
///
/// Each content has two: its own, and a hold slot that keeps the resource up
/// while a hide animation is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateKey {
    pub content: ContentId,
    pub animation_hold: bool,
}

impl StateKey {
    pub fn own(content: ContentId) -> Self {
        Self {
            content,
            animation_hold: false,
        }
    }

    pub fn hold(content: ContentId) -> Self {
        Self {
            content,
            animation_hold: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SharedResourceState {
    desired: BTreeMap<StateKey, ResourceState>,
    reported: ResourceState,
    requested: ResourceState,
    escalator: Option<StateKey>,
}

impl SharedResourceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn desired_state(&self, key: StateKey) -> ResourceState {
        self.desired.get(&key).copied().unwrap_or_default()
    }

    /// Highest desired state over all slots.
    pub fn consolidated_desired_state(&self) -> ResourceState {
        self.desired.values().copied().max().unwrap_or_default()
    }

    pub fn reported_state(&self) -> ResourceState {
        self.reported
    }

    pub fn requested_state(&self) -> ResourceState {
        self.requested
    }

    pub fn escalator(&self) -> Option<StateKey> {
        self.escalator
    }

    pub fn set_requested_state(&mut self, state: ResourceState) {
        self.requested = state;
    }

    pub fn set_desired_state(&mut self, key: StateKey, state: ResourceState) {
        let previous = self.desired.insert(key, state).unwrap_or_default();

        // the escalator stepping down hands over to whoever still wants at
        // least as much
        if self.escalator == Some(key) && state < previous {
            if let Some(next) = self.highest_other_than(key, state) {
                self.escalator = Some(next);
            }
        }
    }

    pub fn set_reported_state(&mut self, state: ResourceState) {
        self.reported = state;

        let keeps = self
            .escalator
            .map(|k| self.desired_state(k) >= state)
            .unwrap_or(false);
        if !keeps {
            if let Some(next) = self.highest_at_least(state) {
                self.escalator = Some(next);
            }
        }
    }

    /// What the slot `key` observes of the resource.
    pub fn current_state_for(&self, key: StateKey) -> ResourceState {
        if self.escalator == Some(key) {
            self.reported
        } else {
            self.reported.min(self.desired_state(key))
        }
    }

    fn highest_at_least(&self, floor: ResourceState) -> Option<StateKey> {
        self.desired
            .iter()
            .filter(|(_, s)| **s >= floor)
            .max_by_key(|(_, s)| **s)
            .map(|(k, _)| *k)
    }

    fn highest_other_than(&self, key: StateKey, floor: ResourceState) -> Option<StateKey> {
        self.desired
            .iter()
            .filter(|(k, s)| **k != key && **s >= floor)
            .max_by_key(|(_, s)| **s)
            .map(|(k, _)| *k)
    }
}
