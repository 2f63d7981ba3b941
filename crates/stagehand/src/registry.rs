//! Content registry and the protocol state machine.
//!
//! One record per content ever seen. A withdrawn content keeps its record so
//! the last provider is remembered, but everything that only makes sense
//! while offered lives inside [`Offer`] and is dropped together with it.

use std::collections::BTreeMap;

use serde::Serialize;
use stageproto::{
    Category, ConsumerRequest, ContentId, ContentMetadata, ContentState, ContentType,
    ParticipantId, TechnicalContentDescriptor,
};

/// Result of applying a consumer request to the current state.
///
/// Total over both enums; `None` means the request is illegal.
pub fn transition(current: ContentState, request: ConsumerRequest) -> Option<ContentState> {
    use ConsumerRequest as R;
    use ContentState as S;

    match (current, request) {
        (S::Offered, R::Assigned) => Some(S::Assigned),
        (S::Offered, R::Offered | R::Ready | R::Shown | R::AcceptStopOffer) => None,

        (S::Assigned, R::Offered) => Some(S::Offered),
        (S::Assigned, R::Ready) => Some(S::ReadyRequested),
        (S::Assigned, R::Assigned | R::Shown | R::AcceptStopOffer) => None,

        (S::ReadyRequested, R::Offered) => Some(S::Offered),
        (S::ReadyRequested, R::Assigned) => Some(S::Assigned),
        (S::ReadyRequested, R::Ready | R::Shown | R::AcceptStopOffer) => None,

        (S::Ready, R::Offered) => Some(S::Offered),
        (S::Ready, R::Assigned) => Some(S::Assigned),
        (S::Ready, R::Shown) => Some(S::Shown),
        (S::Ready, R::Ready | R::AcceptStopOffer) => None,

        (S::Shown, R::Offered) => Some(S::Offered),
        (S::Shown, R::Assigned) => Some(S::Assigned),
        (S::Shown, R::Ready) => Some(S::Ready),
        (S::Shown, R::Shown | R::AcceptStopOffer) => None,

        (S::StopOfferRequested, R::AcceptStopOffer) => Some(S::Unknown),
        (S::StopOfferRequested, R::Offered | R::Assigned | R::Ready | R::Shown) => None,

        (S::Unknown, _) => None,
    }
}

/// Everything attached to a content while it is offered.
#[derive(Debug, Clone)]
pub struct Offer {
    pub state: ContentState,
    pub category: Category,
    pub content_type: ContentType,
    pub friendly_name: String,
    pub local_only: bool,
    /// `INVALID` while no consumer is attached.
    pub consumer: ParticipantId,
    /// `INVALID` until the provider describes the content.
    pub descriptor: TechnicalContentDescriptor,
    pub metadata: ContentMetadata,
    /// Active focus request ids in the order they were enabled.
    pub focus_requests: Vec<i32>,
}

impl Offer {
    fn new(
        category: Category,
        content_type: ContentType,
        friendly_name: String,
        local_only: bool,
    ) -> Self {
        Self {
            state: ContentState::Offered,
            category,
            content_type,
            friendly_name,
            local_only,
            consumer: ParticipantId::INVALID,
            descriptor: TechnicalContentDescriptor::INVALID,
            metadata: ContentMetadata::default(),
            focus_requests: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContentRecord {
    pub content: ContentId,
    /// Last provider, kept after the offer is withdrawn.
    pub provider: ParticipantId,
    pub offer: Option<Offer>,
}

impl ContentRecord {
    pub fn state(&self) -> ContentState {
        self.offer
            .as_ref()
            .map(|o| o.state)
            .unwrap_or(ContentState::Unknown)
    }

    pub fn consumer(&self) -> ParticipantId {
        self.offer
            .as_ref()
            .map(|o| o.consumer)
            .unwrap_or(ParticipantId::INVALID)
    }

    pub fn is_active(&self) -> bool {
        self.offer.is_some()
    }
}

/// Observable view of one record, for queries and logs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentSnapshot {
    pub content: ContentId,
    pub state: ContentState,
    pub provider: ParticipantId,
    pub consumer: ParticipantId,
    pub category: Option<Category>,
    pub content_type: Option<ContentType>,
    pub friendly_name: Option<String>,
    pub descriptor: TechnicalContentDescriptor,
    pub metadata: ContentMetadata,
    pub focus_requests: Vec<i32>,
    pub local_only: bool,
}

impl From<&ContentRecord> for ContentSnapshot {
    fn from(record: &ContentRecord) -> Self {
        match &record.offer {
            Some(offer) => Self {
                content: record.content,
                state: offer.state,
                provider: record.provider,
                consumer: offer.consumer,
                category: Some(offer.category),
                content_type: Some(offer.content_type),
                friendly_name: Some(offer.friendly_name.clone()),
                descriptor: offer.descriptor,
                metadata: offer.metadata.clone(),
                focus_requests: offer.focus_requests.clone(),
                local_only: offer.local_only,
            },
            None => Self {
                content: record.content,
                state: ContentState::Unknown,
                provider: record.provider,
                consumer: ParticipantId::INVALID,
                category: None,
                content_type: None,
                friendly_name: None,
                descriptor: TechnicalContentDescriptor::INVALID,
                metadata: ContentMetadata::default(),
                focus_requests: Vec::new(),
                local_only: false,
            },
        }
    }
}

/// Owns every content record.
#[derive(Debug, Default)]
pub struct Registry {
    records: BTreeMap<ContentId, ContentRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, content: ContentId) -> Option<&ContentRecord> {
        self.records.get(&content)
    }

    pub fn get_mut(&mut self, content: ContentId) -> Option<&mut ContentRecord> {
        self.records.get_mut(&content)
    }

    /// The live offer of `content`, if any.
    pub fn offer(&self, content: ContentId) -> Option<&Offer> {
        self.records.get(&content).and_then(|r| r.offer.as_ref())
    }

    pub fn offer_mut(&mut self, content: ContentId) -> Option<&mut Offer> {
        self.records.get_mut(&content).and_then(|r| r.offer.as_mut())
    }

    pub fn state(&self, content: ContentId) -> ContentState {
        self.records
            .get(&content)
            .map(ContentRecord::state)
            .unwrap_or(ContentState::Unknown)
    }

    /// Create or revive the record with a fresh offer from `provider`.
    ///
    /// Callers check ownership first; this never fails.
    pub fn insert_offer(
        &mut self,
        content: ContentId,
        provider: ParticipantId,
        category: Category,
        content_type: ContentType,
        friendly_name: String,
        local_only: bool,
    ) {
        let record = self.records.entry(content).or_insert(ContentRecord {
            content,
            provider,
            offer: None,
        });
        record.provider = provider;
        record.offer = Some(Offer::new(category, content_type, friendly_name, local_only));
    }

    /// Drop the offer, keeping only the last provider. Returns the removed offer.
    pub fn reset(&mut self, content: ContentId) -> Option<Offer> {
        self.records.get_mut(&content).and_then(|r| r.offer.take())
    }

    /// Ids of live contents matching `filter`, in id order.
    pub fn select(&self, mut filter: impl FnMut(&ContentRecord, &Offer) -> bool) -> Vec<ContentId> {
        self.records
            .values()
            .filter_map(|r| {
                r.offer
                    .as_ref()
                    .filter(|o| filter(r, o))
                    .map(|_| r.content)
            })
            .collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &ContentRecord> {
        self.records.values()
    }
}
