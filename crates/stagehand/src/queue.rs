//! Provider-bound and consumer-bound event queues.
//!
//! Events are immutable once queued and delivered exactly once. Dispatch takes
//! the whole queue before calling the handler, so a handler that calls back
//! into the engine only ever affects the next dispatch.

use std::collections::VecDeque;

use stageproto::{
    AnimationWindow, Category, CategoryInfo, ConsumerRequest, ContentId, ContentMetadata,
    ContentType, ParticipantId, StatusMessage, TechnicalContentDescriptor,
};

/// Callbacks for the local provider.
pub trait ProviderEventHandler {
    fn content_state_change(
        &mut self,
        content: ContentId,
        request: ConsumerRequest,
        category_info: &CategoryInfo,
        animation: AnimationWindow,
    );

    fn canvas_size_change(
        &mut self,
        _content: ContentId,
        _category_info: &CategoryInfo,
        _animation: AnimationWindow,
        _consumer: ParticipantId,
    ) {
    }

    fn content_status(
        &mut self,
        _content: ContentId,
        _status: &StatusMessage,
        _consumer: ParticipantId,
    ) {
    }
}

/// Callbacks for the local consumer.
pub trait ConsumerEventHandler {
    fn content_offered(&mut self, content: ContentId, category: Category, content_type: ContentType);

    fn content_description(&mut self, content: ContentId, descriptor: TechnicalContentDescriptor);

    fn content_ready(&mut self, content: ContentId);

    fn content_enable_focus_request(&mut self, _content: ContentId, _request: i32) {}

    fn content_disable_focus_request(&mut self, _content: ContentId, _request: i32) {}

    fn content_stop_offer_requested(&mut self, content: ContentId);

    fn force_content_offer_stopped(&mut self, content: ContentId);

    fn content_metadata_updated(&mut self, _content: ContentId, _metadata: &ContentMetadata) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    StateChange {
        content: ContentId,
        request: ConsumerRequest,
        category_info: CategoryInfo,
        animation: AnimationWindow,
    },
    CanvasSizeChange {
        content: ContentId,
        category_info: CategoryInfo,
        animation: AnimationWindow,
        consumer: ParticipantId,
    },
    Status {
        content: ContentId,
        status: StatusMessage,
        consumer: ParticipantId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsumerEvent {
    Offered {
        content: ContentId,
        category: Category,
        content_type: ContentType,
    },
    Description {
        content: ContentId,
        descriptor: TechnicalContentDescriptor,
    },
    Ready {
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
    ForceStopped {
        content: ContentId,
    },
    MetadataUpdated {
        content: ContentId,
        metadata: ContentMetadata,
    },
}

impl ProviderEvent {
    pub fn content(&self) -> ContentId {
        match self {
            ProviderEvent::StateChange { content, .. }
            | ProviderEvent::CanvasSizeChange { content, .. }
            | ProviderEvent::Status { content, .. } => *content,
        }
    }

    pub fn deliver(self, handler: &mut dyn ProviderEventHandler) {
        match self {
            ProviderEvent::StateChange {
                content,
                request,
                category_info,
                animation,
            } => handler.content_state_change(content, request, &category_info, animation),
            ProviderEvent::CanvasSizeChange {
                content,
                category_info,
                animation,
                consumer,
            } => handler.canvas_size_change(content, &category_info, animation, consumer),
            ProviderEvent::Status {
                content,
                status,
                consumer,
            } => handler.content_status(content, &status, consumer),
        }
    }
}

impl ConsumerEvent {
    pub fn content(&self) -> ContentId {
        match self {
            ConsumerEvent::Offered { content, .. }
            | ConsumerEvent::Description { content, .. }
            | ConsumerEvent::Ready { content }
            | ConsumerEvent::EnableFocusRequest { content, .. }
            | ConsumerEvent::DisableFocusRequest { content, .. }
            | ConsumerEvent::StopOfferRequested { content }
            | ConsumerEvent::ForceStopped { content }
            | ConsumerEvent::MetadataUpdated { content, .. } => *content,
        }
    }

    pub fn deliver(self, handler: &mut dyn ConsumerEventHandler) {
        match self {
            ConsumerEvent::Offered {
                content,
                category,
                content_type,
            } => handler.content_offered(content, category, content_type),
            ConsumerEvent::Description {
                content,
                descriptor,
            } => handler.content_description(content, descriptor),
            ConsumerEvent::Ready { content } => handler.content_ready(content),
            ConsumerEvent::EnableFocusRequest { content, request } => {
                handler.content_enable_focus_request(content, request)
            }
            ConsumerEvent::DisableFocusRequest { content, request } => {
                handler.content_disable_focus_request(content, request)
            }
            ConsumerEvent::StopOfferRequested { content } => {
                handler.content_stop_offer_requested(content)
            }
            ConsumerEvent::ForceStopped { content } => handler.force_content_offer_stopped(content),
            ConsumerEvent::MetadataUpdated { content, metadata } => {
                handler.content_metadata_updated(content, &metadata)
            }
        }
    }
}

/// FIFO of pending events for one local role.
#[derive(Debug)]
pub struct EventQueue<E> {
    events: VecDeque<E>,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self {
            events: VecDeque::new(),
        }
    }
}

impl<E> EventQueue<E> {
    pub fn push(&mut self, event: E) {
        self.events.push_back(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Take every queued event, leaving the queue empty.
    pub fn take(&mut self) -> VecDeque<E> {
        std::mem::take(&mut self.events)
    }

    /// Drop queued events for which `keep` returns false. Returns how many went.
    pub fn retain(&mut self, keep: impl FnMut(&E) -> bool) -> usize {
        let before = self.events.len();
        self.events.retain(keep);
        before - self.events.len()
    }
}
