//! stageproto - Protocol types for the Stagehand content distribution engine
//!
//! This crate defines the values exchanged between content providers and
//! content consumers. It carries no behavior beyond validation helpers, so it
//! can be shared by the engine, transports and applications alike.
//!
//! ## Identifiers
//!
//! - `ContentId` - a logical piece of renderable material
//! - `Category` - consumer-side region contents are offered into
//! - `TechnicalContentDescriptor` - the underlying resource a content maps to
//! - `ParticipantId` - a process taking part in the protocol
//!
//! All four are 64-bit handles with a reserved `INVALID` value.
//!
//! ## States
//!
//! - `ContentState` - protocol lifecycle as tracked by the registry
//! - `ConsumerRequest` - what a consumer may ask the provider for
//! - `ResourceState` - totally ordered lifecycle of the underlying resource
//!
//! ## Wire
//!
//! `ProtocolMessage` is the closed set of messages a `Transport` moves between
//! participants. Encoding is left to the transport; every type here derives
//! serde traits.

pub mod ids;
pub mod layout;
pub mod message;
pub mod metadata;
pub mod state;
pub mod transport;

pub use ids::{Category, ContentId, ParticipantId, TechnicalContentDescriptor};
pub use layout::{AnimationWindow, CategoryInfo, Rect, Size};
pub use message::{FocusState, Layout, ProtocolMessage, StatusMessage};
pub use metadata::ContentMetadata;
pub use state::{ConsumerRequest, ContentState, ContentType, ResourceState};
pub use transport::{Transport, TransportError};
