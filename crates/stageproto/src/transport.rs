//! The seam between the protocol engine and whatever moves bytes.

use thiserror::Error;

use crate::{ParticipantId, ProtocolMessage};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("participant {0} is not reachable")]
    Unreachable(ParticipantId),

    #[error("transport closed")]
    Closed,

    #[error("send failed: {0}")]
    Send(String),
}

/// Outbound half of a transport.
///
/// Inbound messages and connection changes are pushed into the engine by the
/// transport calling `DistributionEngine::handle_message`,
/// `participant_connected` and `participant_disconnected`.
///
/// Sends happen while the engine holds its lock. An implementation must not
/// call back into the engine from inside `send_*`.
pub trait Transport: Send + Sync {
    fn send_unicast(&self, to: ParticipantId, message: &ProtocolMessage)
        -> Result<(), TransportError>;

    fn send_broadcast(&self, message: &ProtocolMessage) -> Result<(), TransportError>;
}
