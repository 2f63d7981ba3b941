//! Shared fakes for the integration tests: a transport that records what the
//! engine sends, a resource controller that acknowledges every state request,
//! and handlers that collect callbacks as event values.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use stagehand::{
    ConsumerEvent, ConsumerEventHandler, ContentControlEvent, ContentControlEventHandler,
    DataSlotId, DisplayBufferId, DisplayId, DistributionEngine, PickableObjectId, ProviderEvent,
    ProviderEventHandler, ReadyResult, ResourceControl, ResourceError, ResourceEvent, StreamId,
};
use stageproto::{
    AnimationWindow, Category, CategoryInfo, ConsumerRequest, ContentId, ContentMetadata,
    ContentType, ParticipantId, ProtocolMessage, Rect, ResourceState, Size, StatusMessage,
    TechnicalContentDescriptor, Transport, TransportError,
};

pub const LOCAL: ParticipantId = ParticipantId::new(1);
pub const REMOTE: ParticipantId = ParticipantId::new(2);
pub const OTHER: ParticipantId = ParticipantId::new(3);

pub const NAV: ContentId = ContentId::new(100);
pub const MEDIA: ContentId = ContentId::new(101);
pub const DRIVER: Category = Category::new(10);
pub const SCENE: TechnicalContentDescriptor = TechnicalContentDescriptor::new(555);
pub const DISPLAY: DisplayId = DisplayId(1);

pub fn category_info() -> CategoryInfo {
    CategoryInfo::new(Size::new(1280, 480), Rect::new(0, 0, 1280, 480))
}

// ----------------------------------------------------------------------------
// Transport
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Unicast(ParticipantId, ProtocolMessage),
    Broadcast(ProtocolMessage),
}

#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn take(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn record(&self, sent: Sent) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

impl Transport for RecordingTransport {
    fn send_unicast(
        &self,
        to: ParticipantId,
        message: &ProtocolMessage,
    ) -> Result<(), TransportError> {
        self.record(Sent::Unicast(to, message.clone()))
    }

    fn send_broadcast(&self, message: &ProtocolMessage) -> Result<(), TransportError> {
        self.record(Sent::Broadcast(message.clone()))
    }
}

pub fn engine(local: ParticipantId) -> (Arc<DistributionEngine>, Arc<RecordingTransport>) {
    let transport = RecordingTransport::new();
    let engine = Arc::new(DistributionEngine::new(local, transport.clone()));
    (engine, transport)
}

// ----------------------------------------------------------------------------
// Engine handlers
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct ProviderLog(pub Vec<ProviderEvent>);

impl ProviderEventHandler for ProviderLog {
    fn content_state_change(
        &mut self,
        content: ContentId,
        request: ConsumerRequest,
        category_info: &CategoryInfo,
        animation: AnimationWindow,
    ) {
        self.0.push(ProviderEvent::StateChange {
            content,
            request,
            category_info: *category_info,
            animation,
        });
    }

    fn canvas_size_change(
        &mut self,
        content: ContentId,
        category_info: &CategoryInfo,
        animation: AnimationWindow,
        consumer: ParticipantId,
    ) {
        self.0.push(ProviderEvent::CanvasSizeChange {
            content,
            category_info: *category_info,
            animation,
            consumer,
        });
    }

    fn content_status(&mut self, content: ContentId, status: &StatusMessage, consumer: ParticipantId) {
        self.0.push(ProviderEvent::Status {
            content,
            status: status.clone(),
            consumer,
        });
    }
}

#[derive(Default)]
pub struct ConsumerLog(pub Vec<ConsumerEvent>);

impl ConsumerEventHandler for ConsumerLog {
    fn content_offered(&mut self, content: ContentId, category: Category, content_type: ContentType) {
        self.0.push(ConsumerEvent::Offered {
            content,
            category,
            content_type,
        });
    }

    fn content_description(&mut self, content: ContentId, descriptor: TechnicalContentDescriptor) {
        self.0.push(ConsumerEvent::Description {
            content,
            descriptor,
        });
    }

    fn content_ready(&mut self, content: ContentId) {
        self.0.push(ConsumerEvent::Ready { content });
    }

    fn content_enable_focus_request(&mut self, content: ContentId, request: i32) {
        self.0
            .push(ConsumerEvent::EnableFocusRequest { content, request });
    }

    fn content_disable_focus_request(&mut self, content: ContentId, request: i32) {
        self.0
            .push(ConsumerEvent::DisableFocusRequest { content, request });
    }

    fn content_stop_offer_requested(&mut self, content: ContentId) {
        self.0.push(ConsumerEvent::StopOfferRequested { content });
    }

    fn force_content_offer_stopped(&mut self, content: ContentId) {
        self.0.push(ConsumerEvent::ForceStopped { content });
    }

    fn content_metadata_updated(&mut self, content: ContentId, metadata: &ContentMetadata) {
        self.0.push(ConsumerEvent::MetadataUpdated {
            content,
            metadata: metadata.clone(),
        });
    }
}

pub fn provider_events(engine: &DistributionEngine) -> Vec<ProviderEvent> {
    let mut log = ProviderLog::default();
    engine
        .dispatch_provider_events(&mut log, std::time::Duration::ZERO)
        .unwrap();
    log.0
}

pub fn consumer_events(engine: &DistributionEngine) -> Vec<ConsumerEvent> {
    let mut log = ConsumerLog::default();
    engine
        .dispatch_consumer_events(&mut log, std::time::Duration::ZERO)
        .unwrap();
    log.0
}

/// Local provider that marks contents ready as soon as they are requested.
pub struct EagerProvider<'a>(pub &'a DistributionEngine);

impl ProviderEventHandler for EagerProvider<'_> {
    fn content_state_change(
        &mut self,
        content: ContentId,
        request: ConsumerRequest,
        _category_info: &CategoryInfo,
        _animation: AnimationWindow,
    ) {
        if request == ConsumerRequest::Ready {
            self.0.mark_ready(content).unwrap();
        }
    }
}

pub fn run_eager_provider(engine: &DistributionEngine) {
    engine
        .dispatch_provider_events(&mut EagerProvider(engine), std::time::Duration::ZERO)
        .unwrap();
}

// ----------------------------------------------------------------------------
// Resources
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceCall {
    State(TechnicalContentDescriptor, ResourceState),
    Mapping(TechnicalContentDescriptor, DisplayId),
    BufferAssignment(TechnicalContentDescriptor, DisplayBufferId, i32),
    LinkOffscreen(DisplayBufferId, TechnicalContentDescriptor, DataSlotId),
    LinkData(
        TechnicalContentDescriptor,
        DataSlotId,
        TechnicalContentDescriptor,
        DataSlotId,
    ),
    Unlink(TechnicalContentDescriptor, DataSlotId),
    Pick(TechnicalContentDescriptor),
}

/// Resource controller that reaches every requested state on the next drain.
#[derive(Default)]
pub struct FakeResources {
    pub calls: Vec<ResourceCall>,
    pending: Vec<ResourceEvent>,
    pub manual: bool,
}

impl FakeResources {
    pub fn report(&mut self, resource: TechnicalContentDescriptor, state: ResourceState) {
        self.pending
            .push(ResourceEvent::StateChanged { resource, state });
    }

    pub fn push(&mut self, event: ResourceEvent) {
        self.pending.push(event);
    }

    pub fn take_calls(&mut self) -> Vec<ResourceCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn state_requests(&self) -> Vec<ResourceState> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                ResourceCall::State(_, s) => Some(*s),
                _ => None,
            })
            .collect()
    }
}

impl ResourceControl for FakeResources {
    fn set_resource_state(
        &mut self,
        resource: TechnicalContentDescriptor,
        state: ResourceState,
    ) -> Result<(), ResourceError> {
        self.calls.push(ResourceCall::State(resource, state));
        if !self.manual {
            self.report(resource, state);
        }
        Ok(())
    }

    fn set_resource_mapping(
        &mut self,
        resource: TechnicalContentDescriptor,
        display: DisplayId,
    ) -> Result<(), ResourceError> {
        self.calls.push(ResourceCall::Mapping(resource, display));
        Ok(())
    }

    fn set_display_buffer_assignment(
        &mut self,
        resource: TechnicalContentDescriptor,
        buffer: DisplayBufferId,
        render_order: i32,
    ) -> Result<(), ResourceError> {
        self.calls
            .push(ResourceCall::BufferAssignment(resource, buffer, render_order));
        Ok(())
    }

    fn link_offscreen_buffer(
        &mut self,
        buffer: DisplayBufferId,
        consumer: TechnicalContentDescriptor,
        consumer_slot: DataSlotId,
    ) -> Result<(), ResourceError> {
        self.calls
            .push(ResourceCall::LinkOffscreen(buffer, consumer, consumer_slot));
        Ok(())
    }

    fn link_data(
        &mut self,
        provider: TechnicalContentDescriptor,
        provider_slot: DataSlotId,
        consumer: TechnicalContentDescriptor,
        consumer_slot: DataSlotId,
    ) -> Result<(), ResourceError> {
        self.calls.push(ResourceCall::LinkData(
            provider,
            provider_slot,
            consumer,
            consumer_slot,
        ));
        Ok(())
    }

    fn unlink_data(
        &mut self,
        consumer: TechnicalContentDescriptor,
        consumer_slot: DataSlotId,
    ) -> Result<(), ResourceError> {
        self.calls.push(ResourceCall::Unlink(consumer, consumer_slot));
        Ok(())
    }

    fn handle_pick_event(
        &mut self,
        resource: TechnicalContentDescriptor,
        _x: f32,
        _y: f32,
    ) -> Result<(), ResourceError> {
        self.calls.push(ResourceCall::Pick(resource));
        Ok(())
    }

    fn drain_events(&mut self) -> Vec<ResourceEvent> {
        std::mem::take(&mut self.pending)
    }
}

// ----------------------------------------------------------------------------
// Application
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct AppLog(pub Vec<ContentControlEvent>);

impl AppLog {
    pub fn take(&mut self) -> Vec<ContentControlEvent> {
        std::mem::take(&mut self.0)
    }
}

impl ContentControlEventHandler for AppLog {
    fn content_available(&mut self, content: ContentId, category: Category) {
        self.0
            .push(ContentControlEvent::Available { content, category });
    }

    fn content_ready(&mut self, content: ContentId, result: ReadyResult) {
        self.0.push(ContentControlEvent::Ready { content, result });
    }

    fn content_shown(&mut self, content: ContentId) {
        self.0.push(ContentControlEvent::Shown { content });
    }

    fn content_enable_focus_request(&mut self, content: ContentId, request: i32) {
        self.0
            .push(ContentControlEvent::EnableFocusRequest { content, request });
    }

    fn content_stop_offer_requested(&mut self, content: ContentId) {
        self.0
            .push(ContentControlEvent::StopOfferRequested { content });
    }

    fn content_not_available(&mut self, content: ContentId) {
        self.0.push(ContentControlEvent::NotAvailable { content });
    }

    fn content_metadata_updated(&mut self, content: ContentId, metadata: &ContentMetadata) {
        self.0.push(ContentControlEvent::MetadataUpdated {
            content,
            metadata: metadata.clone(),
        });
    }

    fn offscreen_buffer_linked(
        &mut self,
        buffer: DisplayBufferId,
        consumer: ContentId,
        consumer_slot: DataSlotId,
        success: bool,
    ) {
        self.0.push(ContentControlEvent::OffscreenBufferLinked {
            buffer,
            consumer,
            consumer_slot,
            success,
        });
    }

    fn objects_picked(&mut self, content: ContentId, objects: &[PickableObjectId]) {
        self.0.push(ContentControlEvent::ObjectsPicked {
            content,
            objects: objects.to_vec(),
        });
    }

    fn content_flushed(&mut self, content: ContentId, version: u64) {
        self.0.push(ContentControlEvent::Flushed { content, version });
    }

    fn stream_availability_changed(&mut self, stream: StreamId, available: bool) {
        self.0
            .push(ContentControlEvent::StreamAvailabilityChanged { stream, available });
    }
}
