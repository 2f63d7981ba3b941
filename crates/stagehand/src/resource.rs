//! The resource side: whatever actually loads, maps and renders the technical
//! content behind a descriptor.
//!
//! Requests go out through [`ResourceControl`]; results and spontaneous
//! changes come back as [`ResourceEvent`]s drained once per tick.

use serde::{Deserialize, Serialize};
use stageproto::{ResourceState, TechnicalContentDescriptor};
use thiserror::Error;

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_handle!(
    /// Output a resource is mapped onto.
    DisplayId
);
define_handle!(
    /// Framebuffer or offscreen buffer on a display.
    DisplayBufferId
);
define_handle!(
    /// Data provider or data consumer slot inside one resource.
    DataSlotId
);
define_handle!(PickableObjectId);
define_handle!(
    /// Video stream source.
    StreamId
);

/// The resource controller refused a request.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ResourceError(pub String);

/// Requests the orchestrator makes of the resource controller.
///
/// Every request is asynchronous. `Ok` only means it was accepted; the outcome
/// shows up later in [`ResourceControl::drain_events`].
pub trait ResourceControl {
    /// Move the resource one step towards `state`.
    fn set_resource_state(
        &mut self,
        resource: TechnicalContentDescriptor,
        state: ResourceState,
    ) -> Result<(), ResourceError>;

    fn set_resource_mapping(
        &mut self,
        resource: TechnicalContentDescriptor,
        display: DisplayId,
    ) -> Result<(), ResourceError>;

    fn set_display_buffer_assignment(
        &mut self,
        resource: TechnicalContentDescriptor,
        buffer: DisplayBufferId,
        render_order: i32,
    ) -> Result<(), ResourceError>;

    fn link_offscreen_buffer(
        &mut self,
        buffer: DisplayBufferId,
        consumer: TechnicalContentDescriptor,
        consumer_slot: DataSlotId,
    ) -> Result<(), ResourceError>;

    fn link_data(
        &mut self,
        provider: TechnicalContentDescriptor,
        provider_slot: DataSlotId,
        consumer: TechnicalContentDescriptor,
        consumer_slot: DataSlotId,
    ) -> Result<(), ResourceError>;

    fn unlink_data(
        &mut self,
        consumer: TechnicalContentDescriptor,
        consumer_slot: DataSlotId,
    ) -> Result<(), ResourceError>;

    /// Coordinates are normalized to the buffer the resource renders into.
    fn handle_pick_event(
        &mut self,
        resource: TechnicalContentDescriptor,
        x: f32,
        y: f32,
    ) -> Result<(), ResourceError>;

    /// Everything that happened since the last call, oldest first.
    fn drain_events(&mut self) -> Vec<ResourceEvent>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent {
    StateChanged {
        resource: TechnicalContentDescriptor,
        state: ResourceState,
    },
    OffscreenBufferLinked {
        buffer: DisplayBufferId,
        consumer: TechnicalContentDescriptor,
        consumer_slot: DataSlotId,
        success: bool,
    },
    DataLinked {
        provider: TechnicalContentDescriptor,
        provider_slot: DataSlotId,
        consumer: TechnicalContentDescriptor,
        consumer_slot: DataSlotId,
        success: bool,
    },
    DataUnlinked {
        consumer: TechnicalContentDescriptor,
        consumer_slot: DataSlotId,
        success: bool,
    },
    ObjectsPicked {
        resource: TechnicalContentDescriptor,
        objects: Vec<PickableObjectId>,
    },
    DataProviderCreated {
        resource: TechnicalContentDescriptor,
        slot: DataSlotId,
    },
    DataProviderDestroyed {
        resource: TechnicalContentDescriptor,
        slot: DataSlotId,
    },
    DataConsumerCreated {
        resource: TechnicalContentDescriptor,
        slot: DataSlotId,
    },
    DataConsumerDestroyed {
        resource: TechnicalContentDescriptor,
        slot: DataSlotId,
    },
    Flushed {
        resource: TechnicalContentDescriptor,
        version: u64,
    },
    ExpirationMonitoringEnabled {
        resource: TechnicalContentDescriptor,
    },
    ExpirationMonitoringDisabled {
        resource: TechnicalContentDescriptor,
    },
    Expired {
        resource: TechnicalContentDescriptor,
    },
    RecoveredFromExpiration {
        resource: TechnicalContentDescriptor,
    },
    StreamAvailabilityChanged {
        stream: StreamId,
        available: bool,
    },
}
