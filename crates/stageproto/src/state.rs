//! Lifecycle states shared by providers, consumers and the orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol-level state of one content as tracked by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentState {
    /// Never offered, or withdrawn. The record only remembers its last provider.
    #[default]
    Unknown,
    Offered,
    Assigned,
    ReadyRequested,
    Ready,
    Shown,
    StopOfferRequested,
}

impl ContentState {
    /// `Assigned` through `Shown`: the consumer drives the lifecycle.
    pub fn is_consumer_controlled(self) -> bool {
        matches!(
            self,
            ContentState::Assigned
                | ContentState::ReadyRequested
                | ContentState::Ready
                | ContentState::Shown
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentState::Unknown => "unknown",
            ContentState::Offered => "offered",
            ContentState::Assigned => "assigned",
            ContentState::ReadyRequested => "ready_requested",
            ContentState::Ready => "ready",
            ContentState::Shown => "shown",
            ContentState::StopOfferRequested => "stop_offer_requested",
        }
    }
}

impl fmt::Display for ContentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target state a consumer asks for in a state-change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerRequest {
    /// Give the content back, keeping it offered.
    Offered,
    Assigned,
    Ready,
    Shown,
    /// Acknowledge a pending stop-offer.
    AcceptStopOffer,
}

impl fmt::Display for ConsumerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConsumerRequest::Offered => "offered",
            ConsumerRequest::Assigned => "assigned",
            ConsumerRequest::Ready => "ready",
            ConsumerRequest::Shown => "shown",
            ConsumerRequest::AcceptStopOffer => "accept_stop_offer",
        };
        f.write_str(s)
    }
}

/// Lifecycle of the underlying renderable resource.
///
/// Totally ordered: `Unavailable < Available < Ready < Rendered`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    #[default]
    Unavailable,
    Available,
    Ready,
    Rendered,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceState::Unavailable => "unavailable",
            ResourceState::Available => "available",
            ResourceState::Ready => "ready",
            ResourceState::Rendered => "rendered",
        };
        f.write_str(s)
    }
}

/// Kind of resource backing a content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// A scene whose lifecycle the orchestrator drives.
    SceneResource,
    /// An externally produced video surface; tracked but not state-controlled.
    SurfaceResource,
}
