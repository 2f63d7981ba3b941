//! Events the orchestrator publishes to the application.

use serde::Serialize;
use stageproto::{Category, ContentId, ContentMetadata};

use crate::resource::{DataSlotId, DisplayBufferId, PickableObjectId, StreamId};

/// Outcome of a ready request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyResult {
    Ok,
    TimedOut,
}

/// Callbacks invoked from inside `ContentControl::update`, in order.
///
/// Handlers may call back into the orchestrator; whatever that emits is
/// delivered on the next update.
pub trait ContentControlEventHandler {
    fn content_available(&mut self, content: ContentId, category: Category);

    fn content_ready(&mut self, content: ContentId, result: ReadyResult);

    fn content_shown(&mut self, content: ContentId);

    fn content_enable_focus_request(&mut self, _content: ContentId, _request: i32) {}

    fn content_disable_focus_request(&mut self, _content: ContentId, _request: i32) {}

    fn content_stop_offer_requested(&mut self, content: ContentId);

    fn content_not_available(&mut self, content: ContentId);

    fn content_metadata_updated(&mut self, _content: ContentId, _metadata: &ContentMetadata) {}

    fn offscreen_buffer_linked(
        &mut self,
        _buffer: DisplayBufferId,
        _consumer: ContentId,
        _consumer_slot: DataSlotId,
        _success: bool,
    ) {
    }

    fn data_linked(
        &mut self,
        _provider: ContentId,
        _provider_slot: DataSlotId,
        _consumer: ContentId,
        _consumer_slot: DataSlotId,
        _success: bool,
    ) {
    }

    fn data_unlinked(&mut self, _consumer: ContentId, _consumer_slot: DataSlotId, _success: bool) {}

    fn objects_picked(&mut self, _content: ContentId, _objects: &[PickableObjectId]) {}

    fn data_provider_created(&mut self, _content: ContentId, _slot: DataSlotId) {}

    fn data_provider_destroyed(&mut self, _content: ContentId, _slot: DataSlotId) {}

    fn data_consumer_created(&mut self, _content: ContentId, _slot: DataSlotId) {}

    fn data_consumer_destroyed(&mut self, _content: ContentId, _slot: DataSlotId) {}

    fn content_flushed(&mut self, _content: ContentId, _version: u64) {}

    fn content_expiration_monitoring_enabled(&mut self, _content: ContentId) {}

    fn content_expiration_monitoring_disabled(&mut self, _content: ContentId) {}

    fn content_expired(&mut self, _content: ContentId) {}

    fn content_recovered_from_expiration(&mut self, _content: ContentId) {}

    fn stream_availability_changed(&mut self, _stream: StreamId, _available: bool) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentControlEvent {
    Available {
        content: ContentId,
        category: Category,
    },
    Ready {
        content: ContentId,
        result: ReadyResult,
    },
    Shown {
        content: ContentId,
    },
    EnableFocusRequest {
        content: ContentId,
        request: i32,
    },
    DisableFocusRequest {
        content: ContentId,
        request: i32,
    },
    StopOfferRequested {
        content: ContentId,
    },
    NotAvailable {
        content: ContentId,
    },
    MetadataUpdated {
        content: ContentId,
        metadata: ContentMetadata,
    },
    OffscreenBufferLinked {
        buffer: DisplayBufferId,
        consumer: ContentId,
        consumer_slot: DataSlotId,
        success: bool,
    },
    DataLinked {
        provider: ContentId,
        provider_slot: DataSlotId,
        consumer: ContentId,
        consumer_slot: DataSlotId,
        success: bool,
    },
    DataUnlinked {
        consumer: ContentId,
        consumer_slot: DataSlotId,
        success: bool,
    },
    ObjectsPicked {
        content: ContentId,
        objects: Vec<PickableObjectId>,
    },
    DataProviderCreated {
        content: ContentId,
        slot: DataSlotId,
    },
    DataProviderDestroyed {
        content: ContentId,
        slot: DataSlotId,
    },
    DataConsumerCreated {
        content: ContentId,
        slot: DataSlotId,
    },
    DataConsumerDestroyed {
        content: ContentId,
        slot: DataSlotId,
    },
    Flushed {
        content: ContentId,
        version: u64,
    },
    ExpirationMonitoringEnabled {
        content: ContentId,
    },
    ExpirationMonitoringDisabled {
        content: ContentId,
    },
    Expired {
        content: ContentId,
    },
    RecoveredFromExpiration {
        content: ContentId,
    },
    StreamAvailabilityChanged {
        stream: StreamId,
        available: bool,
    },
}

impl ContentControlEvent {
    pub fn deliver(self, handler: &mut dyn ContentControlEventHandler) {
        use ContentControlEvent as E;
        match self {
            E::Available { content, category } => handler.content_available(content, category),
            E::Ready { content, result } => handler.content_ready(content, result),
            E::Shown { content } => handler.content_shown(content),
            E::EnableFocusRequest { content, request } => {
                handler.content_enable_focus_request(content, request)
            }
            E::DisableFocusRequest { content, request } => {
                handler.content_disable_focus_request(content, request)
            }
            E::StopOfferRequested { content } => handler.content_stop_offer_requested(content),
            E::NotAvailable { content } => handler.content_not_available(content),
            E::MetadataUpdated { content, metadata } => {
                handler.content_metadata_updated(content, &metadata)
            }
            E::OffscreenBufferLinked {
                buffer,
                consumer,
                consumer_slot,
                success,
            } => handler.offscreen_buffer_linked(buffer, consumer, consumer_slot, success),
            E::DataLinked {
                provider,
                provider_slot,
                consumer,
                consumer_slot,
                success,
            } => handler.data_linked(provider, provider_slot, consumer, consumer_slot, success),
            E::DataUnlinked {
                consumer,
                consumer_slot,
                success,
            } => handler.data_unlinked(consumer, consumer_slot, success),
            E::ObjectsPicked { content, objects } => handler.objects_picked(content, &objects),
            E::DataProviderCreated { content, slot } => handler.data_provider_created(content, slot),
            E::DataProviderDestroyed { content, slot } => {
                handler.data_provider_destroyed(content, slot)
            }
            E::DataConsumerCreated { content, slot } => handler.data_consumer_created(content, slot),
            E::DataConsumerDestroyed { content, slot } => {
                handler.data_consumer_destroyed(content, slot)
            }
            E::Flushed { content, version } => handler.content_flushed(content, version),
            E::ExpirationMonitoringEnabled { content } => {
                handler.content_expiration_monitoring_enabled(content)
            }
            E::ExpirationMonitoringDisabled { content } => {
                handler.content_expiration_monitoring_disabled(content)
            }
            E::Expired { content } => handler.content_expired(content),
            E::RecoveredFromExpiration { content } => {
                handler.content_recovered_from_expiration(content)
            }
            E::StreamAvailabilityChanged { stream, available } => {
                handler.stream_availability_changed(stream, available)
            }
        }
    }
}
