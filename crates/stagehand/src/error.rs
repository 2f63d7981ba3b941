//! Error types for the protocol engine and the orchestrator.

use stageproto::{
    Category, ConsumerRequest, ContentId, ContentState, ContentType, ParticipantId,
    TechnicalContentDescriptor, TransportError,
};
use thiserror::Error;

use crate::resource::ResourceError;

/// Which local role an operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Provider,
    Consumer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Provider => f.write_str("provider"),
            Role::Consumer => f.write_str("consumer"),
        }
    }
}

/// Precondition failures of the protocol engine.
///
/// A call that returns one of these has not changed any state.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("local {0} role is not active")]
    RoleNotActive(Role),

    #[error("local {0} role is already {1}")]
    RoleUnchanged(Role, &'static str),

    #[error("invalid {0}")]
    InvalidId(&'static str),

    #[error("{0} is not known")]
    UnknownContent(ContentId),

    #[error("{content} is provided by {provider}, not by this participant")]
    NotProvider {
        content: ContentId,
        provider: ParticipantId,
    },

    #[error("{content} is consumed by {consumer}, not by this participant")]
    NotConsumer {
        content: ContentId,
        consumer: ParticipantId,
    },

    #[error("{content} is already offered by {provider}")]
    AlreadyOffered {
        content: ContentId,
        provider: ParticipantId,
    },

    #[error("{content}: cannot go from {from} via request {request}")]
    IllegalTransition {
        content: ContentId,
        from: ContentState,
        request: ConsumerRequest,
    },

    #[error("{content}: {operation} not allowed in state {state}")]
    WrongState {
        content: ContentId,
        operation: &'static str,
        state: ContentState,
    },

    #[error("{content} is already described as {descriptor}")]
    AlreadyDescribed {
        content: ContentId,
        descriptor: TechnicalContentDescriptor,
    },

    #[error("{content}: focus request {request} is already active")]
    FocusRequestActive { content: ContentId, request: i32 },

    #[error("{content}: focus request {request} is not active")]
    FocusRequestInactive { content: ContentId, request: i32 },

    #[error("may not receive from {0}")]
    ReceiveNotAllowed(ParticipantId),

    #[error("may not deliver to {0}")]
    DeliverNotAllowed(ParticipantId),

    #[error("transport: {0}")]
    Transport(#[from] TransportError),
}

/// Failures of the content-control orchestrator.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("{0} is not known to content control")]
    UnknownContent(ContentId),

    #[error("{0} is not known")]
    UnknownCategory(Category),

    #[error("{0} was already added")]
    DuplicateCategory(Category),

    #[error("{0}: render size and category rect must be set and non-empty")]
    IncompleteCategoryInfo(Category),

    #[error("{content} has type {content_type:?} which cannot be controlled here")]
    UnsupportedContentType {
        content: ContentId,
        content_type: ContentType,
    },

    #[error("{content}: {reason}")]
    NotReady {
        content: ContentId,
        reason: &'static str,
    },

    #[error("{content}: {reason}")]
    InvalidRequest {
        content: ContentId,
        reason: &'static str,
    },

    #[error("update at {now} is older than previous update at {previous}")]
    TimeWentBackwards { now: u64, previous: u64 },

    #[error("resource control rejected request: {0}")]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
