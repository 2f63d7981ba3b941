//! Connected participants and the send/receive permission checks.

use std::collections::BTreeSet;

use stageproto::ParticipantId;

use crate::error::EngineError;

#[derive(Debug)]
pub struct Participants {
    local: ParticipantId,
    connected: BTreeSet<ParticipantId>,
}

impl Participants {
    pub fn new(local: ParticipantId) -> Self {
        Self {
            local,
            connected: BTreeSet::new(),
        }
    }

    pub fn local(&self) -> ParticipantId {
        self.local
    }

    /// Returns false if `id` was already connected.
    pub fn connect(&mut self, id: ParticipantId) -> bool {
        self.connected.insert(id)
    }

    /// Returns false if `id` was not connected.
    pub fn disconnect(&mut self, id: ParticipantId) -> bool {
        self.connected.remove(&id)
    }

    pub fn is_connected(&self, id: ParticipantId) -> bool {
        self.connected.contains(&id)
    }

    pub fn connected(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.connected.iter().copied()
    }

    /// Inbound traffic must come from a valid, connected, remote participant.
    pub fn may_receive_from(&self, id: ParticipantId) -> Result<(), EngineError> {
        if !id.is_valid() || id == self.local || !self.connected.contains(&id) {
            return Err(EngineError::ReceiveNotAllowed(id));
        }
        Ok(())
    }

    /// Outbound traffic may target self or a connected participant.
    pub fn may_deliver_to(&self, id: ParticipantId) -> Result<(), EngineError> {
        if !id.is_valid() || (id != self.local && !self.connected.contains(&id)) {
            return Err(EngineError::DeliverNotAllowed(id));
        }
        Ok(())
    }
}
