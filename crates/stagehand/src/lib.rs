//! Stagehand - content distribution between providers and consumers
//!
//! Two layers:
//!
//! - [`DistributionEngine`] runs the provider/consumer protocol. It tracks
//!   every content in a registry, moves messages through a [`Transport`] and
//!   queues callbacks for the local provider and consumer roles. It is `Sync`;
//!   any thread may call into it.
//! - [`ContentControl`] sits on the engine's consumer role and on a
//!   [`ResourceControl`], and turns both into one `Available` / `Ready` /
//!   `Shown` state per content for the application. It is driven by
//!   `update(now, handler)` from a single thread.
//!
//! ```text
//!   provider app                                consumer app
//!        |                                           |
//!   DistributionEngine <-- Transport --> DistributionEngine
//!                                                    |
//!                                              ContentControl --> ResourceControl
//! ```
//!
//! [`Transport`]: stageproto::Transport

pub mod control;
pub mod engine;
pub mod error;
pub mod events;
pub mod participants;
pub mod queue;
pub mod registry;
pub mod resource;
pub mod shared_state;
pub mod telemetry;

pub use control::{ContentControl, ControlOptions, Lifecycle, PublishedState};
pub use engine::{DistributionEngine, EngineOptions};
pub use error::{ControlError, EngineError, Role};
pub use events::{ContentControlEvent, ContentControlEventHandler, ReadyResult};
pub use queue::{ConsumerEvent, ConsumerEventHandler, ProviderEvent, ProviderEventHandler};
pub use registry::ContentSnapshot;
pub use resource::{
    DataSlotId, DisplayBufferId, DisplayId, PickableObjectId, ResourceControl, ResourceError,
    ResourceEvent, StreamId,
};
pub use shared_state::{SharedResourceState, StateKey};
