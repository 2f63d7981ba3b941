//! The content distribution protocol engine.
//!
//! Key concepts:
//! - One mutex guards the registry, the participant set and both event queues
//! - Every operation validates first, then sends, then mutates; a failed call
//!   leaves no trace
//! - A participant that is both provider and consumer of a content talks to
//!   itself through the local queues, never through the transport
//! - Dispatch swaps the queue out before invoking handlers, so handlers may
//!   call back into the engine

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use stageconf::EngineConfig;
use stageproto::{
    AnimationWindow, Category, CategoryInfo, ConsumerRequest, ContentId, ContentMetadata,
    ContentState, ContentType, ParticipantId, ProtocolMessage, StatusMessage,
    TechnicalContentDescriptor, Transport,
};
use tracing::{debug, info, warn};

use crate::error::{EngineError, Role};
use crate::participants::Participants;
use crate::queue::{
    ConsumerEvent, ConsumerEventHandler, EventQueue, ProviderEvent, ProviderEventHandler,
};
use crate::registry::{transition, ContentSnapshot, Offer, Registry};

/// Engine tuning, usually derived from `EngineConfig`.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// When false every offer behaves as local-only.
    pub broadcast_offers: bool,
    /// Blocking budget used by the `poll_*` helpers.
    pub dispatch_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for EngineOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            broadcast_offers: config.broadcast_offers,
            dispatch_timeout: Duration::from_millis(config.dispatch_timeout_ms),
        }
    }
}

/// Where an event for a participant goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Local,
    Remote(ParticipantId),
}

struct EngineState {
    participants: Participants,
    registry: Registry,
    provider_active: bool,
    consumer_active: bool,
    provider_queue: EventQueue<ProviderEvent>,
    consumer_queue: EventQueue<ConsumerEvent>,
}

impl EngineState {
    fn local(&self) -> ParticipantId {
        self.participants.local()
    }

    fn require_role(&self, role: Role) -> Result<(), EngineError> {
        let active = match role {
            Role::Provider => self.provider_active,
            Role::Consumer => self.consumer_active,
        };
        if active {
            Ok(())
        } else {
            Err(EngineError::RoleNotActive(role))
        }
    }

    fn route(&self, target: ParticipantId) -> Result<Route, EngineError> {
        if target == self.local() {
            Ok(Route::Local)
        } else {
            self.participants.may_deliver_to(target)?;
            Ok(Route::Remote(target))
        }
    }

    fn live_offer(&self, content: ContentId) -> Result<&Offer, EngineError> {
        self.registry
            .offer(content)
            .ok_or(EngineError::UnknownContent(content))
    }

    /// Live offer of `content` that `provider` owns.
    fn offer_from(&self, content: ContentId, provider: ParticipantId) -> Result<&Offer, EngineError> {
        let offer = self.live_offer(content)?;
        let owner = self
            .registry
            .get(content)
            .map(|r| r.provider)
            .unwrap_or(ParticipantId::INVALID);
        if owner != provider {
            return Err(EngineError::NotProvider {
                content,
                provider: owner,
            });
        }
        Ok(offer)
    }

    fn provider_of(&self, content: ContentId) -> ParticipantId {
        self.registry
            .get(content)
            .map(|r| r.provider)
            .unwrap_or(ParticipantId::INVALID)
    }

    fn push_consumer(&mut self, event: ConsumerEvent) {
        if self.consumer_active {
            self.consumer_queue.push(event);
        } else {
            debug!(content = %event.content(), "no local consumer, dropping event");
        }
    }

    fn push_provider(&mut self, event: ProviderEvent) {
        if self.provider_active {
            self.provider_queue.push(event);
        } else {
            debug!(content = %event.content(), "no local provider, dropping event");
        }
    }

    /// Drop everything still queued for `content` on the consumer side.
    fn purge_consumer_events(&mut self, content: ContentId) {
        let purged = self.consumer_queue.retain(|e| e.content() != content);
        if purged > 0 {
            debug!(%content, purged, "purged queued consumer events");
        }
    }

    /// Events that bring a freshly assigned consumer up to date.
    fn catch_up(content: ContentId, offer: &Offer) -> Vec<(ConsumerEvent, ProtocolMessage)> {
        let mut out = Vec::new();
        if offer.descriptor.is_valid() {
            out.push((
                ConsumerEvent::Description {
                    content,
                    descriptor: offer.descriptor,
                },
                ProtocolMessage::ContentDescription {
                    content,
                    descriptor: offer.descriptor,
                },
            ));
        }
        if !offer.metadata.is_empty() {
            out.push((
                ConsumerEvent::MetadataUpdated {
                    content,
                    metadata: offer.metadata.clone(),
                },
                ProtocolMessage::UpdateMetadata {
                    content,
                    metadata: offer.metadata.clone(),
                },
            ));
        }
        for request in &offer.focus_requests {
            out.push((
                ConsumerEvent::EnableFocusRequest {
                    content,
                    request: *request,
                },
                ProtocolMessage::EnableFocusRequest {
                    content,
                    request: *request,
                },
            ));
        }
        out
    }
}

/// Protocol engine shared by the local provider, the local consumer and the
/// transport's inbound callbacks.
pub struct DistributionEngine {
    transport: Arc<dyn Transport>,
    options: EngineOptions,
    state: Mutex<EngineState>,
    provider_signal: Condvar,
    consumer_signal: Condvar,
}

impl DistributionEngine {
    pub fn new(local_id: ParticipantId, transport: Arc<dyn Transport>) -> Self {
        Self::with_options(local_id, transport, EngineOptions::default())
    }

    pub fn with_options(
        local_id: ParticipantId,
        transport: Arc<dyn Transport>,
        options: EngineOptions,
    ) -> Self {
        Self {
            transport,
            options,
            state: Mutex::new(EngineState {
                participants: Participants::new(local_id),
                registry: Registry::new(),
                provider_active: false,
                consumer_active: false,
                provider_queue: EventQueue::default(),
                consumer_queue: EventQueue::default(),
            }),
            provider_signal: Condvar::new(),
            consumer_signal: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wake(&self) {
        self.provider_signal.notify_all();
        self.consumer_signal.notify_all();
    }

    fn broadcast_best_effort(&self, message: &ProtocolMessage) {
        if let Err(e) = self.transport.send_broadcast(message) {
            warn!(content = %message.content(), kind = message.kind(), "broadcast failed: {}", e);
        }
    }

    fn unicast_best_effort(&self, to: ParticipantId, message: &ProtocolMessage) {
        if let Err(e) = self.transport.send_unicast(to, message) {
            warn!(content = %message.content(), kind = message.kind(), %to, "unicast failed: {}", e);
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn local_id(&self) -> ParticipantId {
        self.lock().local()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn is_local_provider_active(&self) -> bool {
        self.lock().provider_active
    }

    pub fn is_local_consumer_active(&self) -> bool {
        self.lock().consumer_active
    }

    pub fn connected_participants(&self) -> Vec<ParticipantId> {
        self.lock().participants.connected().collect()
    }

    /// `Unknown` for contents never seen.
    pub fn content_state(&self, content: ContentId) -> ContentState {
        self.lock().registry.state(content)
    }

    pub fn content_snapshot(&self, content: ContentId) -> Option<ContentSnapshot> {
        self.lock().registry.get(content).map(ContentSnapshot::from)
    }

    /// Log one line per known content.
    pub fn log_state(&self) {
        let state = self.lock();
        info!(
            local = %state.local(),
            provider_active = state.provider_active,
            consumer_active = state.consumer_active,
            connected = state.participants.connected().count(),
            "distribution engine state"
        );
        for record in state.registry.records() {
            let snapshot = ContentSnapshot::from(record);
            info!(
                content = %snapshot.content,
                state = %snapshot.state,
                provider = %snapshot.provider,
                consumer = %snapshot.consumer,
                category = ?snapshot.category,
                "content"
            );
        }
    }

    // ------------------------------------------------------------------
    // Local roles
    // ------------------------------------------------------------------

    /// Enable or disable the local provider role.
    ///
    /// Disabling force-stops every content this participant provides.
    pub fn set_local_provider_availability(&self, available: bool) -> Result<(), EngineError> {
        let mut state = self.lock();
        if state.provider_active == available {
            return Err(EngineError::RoleUnchanged(
                Role::Provider,
                if available { "enabled" } else { "disabled" },
            ));
        }

        if !available {
            let local = state.local();
            let owned = state.registry.select(|r, _| r.provider == local);
            for content in owned {
                let local_only = state
                    .registry
                    .offer(content)
                    .map(|o| o.local_only)
                    .unwrap_or(true);
                if !local_only {
                    self.broadcast_best_effort(&ProtocolMessage::ForceStopOffer { content });
                }
                state.purge_consumer_events(content);
                state.push_consumer(ConsumerEvent::ForceStopped { content });
                state.registry.reset(content);
                info!(%content, "force-stopped, local provider going away");
            }
        }

        state.provider_active = available;
        state.provider_queue.clear();
        info!(available, "local provider availability changed");
        drop(state);
        self.wake();
        Ok(())
    }

    /// Enable or disable the local consumer role.
    ///
    /// Disabling hands every consumed content back to its provider.
    pub fn set_local_consumer_availability(&self, available: bool) -> Result<(), EngineError> {
        let mut state = self.lock();
        if state.consumer_active == available {
            return Err(EngineError::RoleUnchanged(
                Role::Consumer,
                if available { "enabled" } else { "disabled" },
            ));
        }

        let local = state.local();
        if available {
            state.consumer_active = true;
            state.consumer_queue.clear();
            // late consumer: announce what is up for grabs
            let offered = state
                .registry
                .select(|_, o| o.state == ContentState::Offered);
            for content in offered {
                if let Some(offer) = state.registry.offer(content) {
                    let event = ConsumerEvent::Offered {
                        content,
                        category: offer.category,
                        content_type: offer.content_type,
                    };
                    state.consumer_queue.push(event);
                }
            }
        } else {
            let consumed = state.registry.select(|_, o| o.consumer == local);
            for content in consumed {
                self.release_consumer(&mut state, content);
            }
            state.consumer_active = false;
            state.consumer_queue.clear();
        }

        info!(available, "local consumer availability changed");
        drop(state);
        self.wake();
        Ok(())
    }

    /// The consumer of `content` went away: give it back to the provider.
    fn release_consumer(&self, state: &mut EngineState, content: ContentId) {
        let Some(current) = state.registry.offer(content).map(|o| o.state) else {
            return;
        };
        let provider = state.provider_of(content);

        let request = if current == ContentState::StopOfferRequested {
            state.registry.reset(content);
            ConsumerRequest::AcceptStopOffer
        } else if current.is_consumer_controlled() {
            if let Some(offer) = state.registry.offer_mut(content) {
                offer.state = ContentState::Offered;
                offer.consumer = ParticipantId::INVALID;
            }
            ConsumerRequest::Offered
        } else {
            return;
        };
        info!(%content, from = %current, %request, "consumer gone");

        let event = ProviderEvent::StateChange {
            content,
            request,
            category_info: CategoryInfo::default(),
            animation: AnimationWindow::IMMEDIATE,
        };
        if provider == state.local() {
            state.push_provider(event);
        } else if state.participants.may_deliver_to(provider).is_ok() {
            self.unicast_best_effort(
                provider,
                &ProtocolMessage::ContentStateChange {
                    content,
                    request,
                    category_info: CategoryInfo::default(),
                    animation: AnimationWindow::IMMEDIATE,
                },
            );
        }
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// A remote participant appeared. It is told about every local offer.
    pub fn participant_connected(&self, id: ParticipantId) {
        let mut state = self.lock();
        if !id.is_valid() || id == state.local() {
            debug!(%id, "ignoring connect of self or invalid participant");
            return;
        }
        if !state.participants.connect(id) {
            debug!(%id, "duplicate connect, re-sending offers");
        }

        let local = state.local();
        let owned = state.registry.select(|r, o| {
            r.provider == local && !o.local_only && o.state != ContentState::StopOfferRequested
        });
        for content in owned {
            if let Some(offer) = state.registry.offer(content) {
                let message = ProtocolMessage::OfferContent {
                    content,
                    category: offer.category,
                    content_type: offer.content_type,
                    friendly_name: offer.friendly_name.clone(),
                };
                self.unicast_best_effort(id, &message);
            }
        }
        info!(%id, "participant connected");
    }

    /// A remote participant went away; everything it provided or consumed is
    /// cleaned up.
    pub fn participant_disconnected(&self, id: ParticipantId) {
        let mut state = self.lock();
        if !id.is_valid() || id == state.local() {
            debug!(%id, "ignoring disconnect of self or invalid participant");
            return;
        }
        if !state.participants.disconnect(id) {
            debug!(%id, "disconnect of unknown participant");
            return;
        }

        let provided = state.registry.select(|r, _| r.provider == id);
        for content in provided {
            state.purge_consumer_events(content);
            state.registry.reset(content);
            state.push_consumer(ConsumerEvent::ForceStopped { content });
            info!(%content, provider = %id, "provider disconnected, content removed");
        }

        let local = state.local();
        let consumed = state
            .registry
            .select(|r, o| r.provider == local && o.consumer == id);
        for content in consumed {
            self.release_consumer(&mut state, content);
        }

        info!(%id, "participant disconnected");
        drop(state);
        self.wake();
    }

    // ------------------------------------------------------------------
    // Provider operations
    // ------------------------------------------------------------------

    /// Offer `content` into `category`.
    pub fn offer(
        &self,
        content: ContentId,
        category: Category,
        content_type: ContentType,
        friendly_name: &str,
        local_only: bool,
    ) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.require_role(Role::Provider)?;
        if !content.is_valid() {
            return Err(EngineError::InvalidId("content"));
        }
        if !category.is_valid() {
            return Err(EngineError::InvalidId("category"));
        }

        let local = state.local();
        if let Some(record) = state.registry.get(content) {
            let current = record.state();
            let reoffer = record.provider == local && current == ContentState::StopOfferRequested;
            if current != ContentState::Unknown && !reoffer {
                return Err(EngineError::AlreadyOffered {
                    content,
                    provider: record.provider,
                });
            }
        }

        let local_only = local_only || !self.options.broadcast_offers;
        if !local_only {
            self.transport.send_broadcast(&ProtocolMessage::OfferContent {
                content,
                category,
                content_type,
                friendly_name: friendly_name.to_string(),
            })?;
        }

        state.registry.insert_offer(
            content,
            local,
            category,
            content_type,
            friendly_name.to_string(),
            local_only,
        );
        state.push_consumer(ConsumerEvent::Offered {
            content,
            category,
            content_type,
        });
        info!(%content, %category, local_only, "offered");
        drop(state);
        self.wake();
        Ok(())
    }

    /// Announce the resource backing `content`.
    ///
    /// Held back until a consumer is assigned.
    pub fn describe(
        &self,
        content: ContentId,
        descriptor: TechnicalContentDescriptor,
    ) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.require_role(Role::Provider)?;
        if !descriptor.is_valid() {
            return Err(EngineError::InvalidId("technical content descriptor"));
        }
        let local = state.local();
        let offer = state.offer_from(content, local)?;
        if !matches!(
            offer.state,
            ContentState::Offered | ContentState::Assigned | ContentState::ReadyRequested
        ) {
            return Err(EngineError::WrongState {
                content,
                operation: "describe",
                state: offer.state,
            });
        }
        if offer.descriptor.is_valid() {
            return Err(EngineError::AlreadyDescribed {
                content,
                descriptor: offer.descriptor,
            });
        }

        let route = if offer.state.is_consumer_controlled() {
            Some(state.route(offer.consumer)?)
        } else {
            None
        };
        if let Some(Route::Remote(to)) = route {
            self.transport
                .send_unicast(to, &ProtocolMessage::ContentDescription { content, descriptor })?;
        }

        if let Some(offer) = state.registry.offer_mut(content) {
            offer.descriptor = descriptor;
        }
        if route == Some(Route::Local) {
            state.push_consumer(ConsumerEvent::Description {
                content,
                descriptor,
            });
        }
        info!(%content, %descriptor, sent = route.is_some(), "described");
        drop(state);
        self.wake();
        Ok(())
    }

    /// Tell the consumer the content finished preparing.
    pub fn mark_ready(&self, content: ContentId) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.require_role(Role::Provider)?;
        let local = state.local();
        let offer = state.offer_from(content, local)?;
        if offer.state != ContentState::ReadyRequested {
            return Err(EngineError::WrongState {
                content,
                operation: "mark ready",
                state: offer.state,
            });
        }

        let route = state.route(offer.consumer)?;
        if let Route::Remote(to) = route {
            self.transport
                .send_unicast(to, &ProtocolMessage::ContentReady { content })?;
        }

        if let Some(offer) = state.registry.offer_mut(content) {
            offer.state = ContentState::Ready;
        }
        if route == Route::Local {
            state.push_consumer(ConsumerEvent::Ready { content });
        }
        info!(%content, "ready_requested -> ready");
        drop(state);
        self.wake();
        Ok(())
    }

    /// Ask the consumer to let go of `content`.
    ///
    /// Without a consumer the content is withdrawn on the spot.
    pub fn request_stop_offer(&self, content: ContentId) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.require_role(Role::Provider)?;
        let local = state.local();
        let offer = state.offer_from(content, local)?;
        let current = offer.state;
        if current == ContentState::StopOfferRequested {
            return Err(EngineError::WrongState {
                content,
                operation: "request stop offer",
                state: current,
            });
        }
        if !offer.local_only {
            self.transport
                .send_broadcast(&ProtocolMessage::StopOfferRequest { content })?;
        }

        state.push_consumer(ConsumerEvent::StopOfferRequested { content });
        if current == ContentState::Offered {
            state.registry.reset(content);
            state.push_provider(ProviderEvent::StateChange {
                content,
                request: ConsumerRequest::AcceptStopOffer,
                category_info: CategoryInfo::default(),
                animation: AnimationWindow::IMMEDIATE,
            });
            info!(%content, "offered -> unknown, no consumer to ask");
        } else {
            if let Some(offer) = state.registry.offer_mut(content) {
                offer.state = ContentState::StopOfferRequested;
            }
            info!(%content, from = %current, "-> stop_offer_requested");
        }
        drop(state);
        self.wake();
        Ok(())
    }

    /// Withdraw `content` immediately, whatever its state.
    ///
    /// Anything still queued for it on the consumer side is discarded.
    pub fn force_stop_offer(&self, content: ContentId) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.require_role(Role::Provider)?;
        let local = state.local();
        let offer = state.offer_from(content, local)?;
        let current = offer.state;
        if !offer.local_only {
            self.transport
                .send_broadcast(&ProtocolMessage::ForceStopOffer { content })?;
        }

        state.purge_consumer_events(content);
        state.provider_queue.retain(|e| e.content() != content);
        state.push_consumer(ConsumerEvent::ForceStopped { content });
        state.registry.reset(content);
        info!(%content, from = %current, "force-stopped -> unknown");
        drop(state);
        self.wake();
        Ok(())
    }

    pub fn enable_focus_request(&self, content: ContentId, request: i32) -> Result<(), EngineError> {
        self.change_focus_request(content, request, true)
    }

    pub fn disable_focus_request(&self, content: ContentId, request: i32) -> Result<(), EngineError> {
        self.change_focus_request(content, request, false)
    }

    fn change_focus_request(
        &self,
        content: ContentId,
        request: i32,
        enable: bool,
    ) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.require_role(Role::Provider)?;
        let local = state.local();
        let offer = state.offer_from(content, local)?;
        if !offer.state.is_consumer_controlled() {
            return Err(EngineError::WrongState {
                content,
                operation: "focus request",
                state: offer.state,
            });
        }
        let active = offer.focus_requests.contains(&request);
        if enable && active {
            return Err(EngineError::FocusRequestActive { content, request });
        }
        if !enable && !active {
            return Err(EngineError::FocusRequestInactive { content, request });
        }

        let route = state.route(offer.consumer)?;
        if let Route::Remote(to) = route {
            let message = if enable {
                ProtocolMessage::EnableFocusRequest { content, request }
            } else {
                ProtocolMessage::DisableFocusRequest { content, request }
            };
            self.transport.send_unicast(to, &message)?;
        }

        if let Some(offer) = state.registry.offer_mut(content) {
            if enable {
                offer.focus_requests.push(request);
            } else {
                offer.focus_requests.retain(|r| *r != request);
            }
        }
        if route == Route::Local {
            state.push_consumer(if enable {
                ConsumerEvent::EnableFocusRequest { content, request }
            } else {
                ConsumerEvent::DisableFocusRequest { content, request }
            });
        }
        debug!(%content, request, enable, "focus request changed");
        drop(state);
        self.wake();
        Ok(())
    }

    /// Merge `metadata` into the content's metadata.
    ///
    /// Sent right away when a consumer is attached, otherwise on assignment.
    pub fn update_metadata(
        &self,
        content: ContentId,
        metadata: ContentMetadata,
    ) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.require_role(Role::Provider)?;
        let local = state.local();
        let offer = state.offer_from(content, local)?;
        if offer.state == ContentState::StopOfferRequested {
            return Err(EngineError::WrongState {
                content,
                operation: "update metadata",
                state: offer.state,
            });
        }

        let route = if offer.state.is_consumer_controlled() {
            Some(state.route(offer.consumer)?)
        } else {
            None
        };
        if let Some(Route::Remote(to)) = route {
            self.transport.send_unicast(
                to,
                &ProtocolMessage::UpdateMetadata {
                    content,
                    metadata: metadata.clone(),
                },
            )?;
        }

        if let Some(offer) = state.registry.offer_mut(content) {
            offer.metadata.merge(metadata.clone());
        }
        if route == Some(Route::Local) {
            state.push_consumer(ConsumerEvent::MetadataUpdated { content, metadata });
        }
        debug!(%content, "metadata updated");
        drop(state);
        self.wake();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Consumer operations
    // ------------------------------------------------------------------

    /// Ask the provider to move `content` along the lifecycle.
    pub fn request_state_change(
        &self,
        content: ContentId,
        request: ConsumerRequest,
        category_info: CategoryInfo,
        animation: AnimationWindow,
    ) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.require_role(Role::Consumer)?;
        let local = state.local();
        let offer = state.live_offer(content)?;
        let current = offer.state;
        if current != ContentState::Offered && offer.consumer != local {
            return Err(EngineError::NotConsumer {
                content,
                consumer: offer.consumer,
            });
        }
        let next = transition(current, request).ok_or(EngineError::IllegalTransition {
            content,
            from: current,
            request,
        })?;

        let provider = state.provider_of(content);
        let route = state.route(provider)?;
        if let Route::Remote(to) = route {
            self.transport.send_unicast(
                to,
                &ProtocolMessage::ContentStateChange {
                    content,
                    request,
                    category_info,
                    animation,
                },
            )?;
        }

        let catch_up = apply_transition(&mut state.registry, content, next, local);
        if route == Route::Local {
            state.push_provider(ProviderEvent::StateChange {
                content,
                request,
                category_info,
                animation,
            });
            for (event, _) in catch_up {
                state.push_consumer(event);
            }
        }
        info!(%content, from = %current, to = %next, "consumer request {}", request);
        drop(state);
        self.wake();
        Ok(())
    }

    /// Acknowledge a stop-offer; the content is gone afterwards.
    pub fn accept_stop_offer(
        &self,
        content: ContentId,
        animation: AnimationWindow,
    ) -> Result<(), EngineError> {
        self.request_state_change(
            content,
            ConsumerRequest::AcceptStopOffer,
            CategoryInfo::default(),
            animation,
        )
    }

    /// Tell the provider its canvas changed.
    pub fn content_size_change(
        &self,
        content: ContentId,
        category_info: CategoryInfo,
        animation: AnimationWindow,
    ) -> Result<(), EngineError> {
        self.send_to_provider(
            content,
            ProtocolMessage::CanvasSizeChange {
                content,
                category_info,
                animation,
            },
        )
    }

    pub fn send_content_status(
        &self,
        content: ContentId,
        status: StatusMessage,
    ) -> Result<(), EngineError> {
        self.send_to_provider(content, ProtocolMessage::ContentStatus { content, status })
    }

    /// Side-channel messages the attached consumer may send at any time.
    fn send_to_provider(
        &self,
        content: ContentId,
        message: ProtocolMessage,
    ) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.require_role(Role::Consumer)?;
        let local = state.local();
        let offer = state.live_offer(content)?;
        if offer.consumer != local {
            return Err(EngineError::NotConsumer {
                content,
                consumer: offer.consumer,
            });
        }

        let provider = state.provider_of(content);
        match state.route(provider)? {
            Route::Remote(to) => self.transport.send_unicast(to, &message)?,
            Route::Local => {
                let event = match message {
                    ProtocolMessage::CanvasSizeChange {
                        content,
                        category_info,
                        animation,
                    } => ProviderEvent::CanvasSizeChange {
                        content,
                        category_info,
                        animation,
                        consumer: local,
                    },
                    ProtocolMessage::ContentStatus { content, status } => ProviderEvent::Status {
                        content,
                        status,
                        consumer: local,
                    },
                    other => {
                        debug!(kind = other.kind(), "not a consumer side-channel message");
                        return Ok(());
                    }
                };
                state.push_provider(event);
            }
        }
        drop(state);
        self.wake();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    /// Entry point for every message the transport receives.
    pub fn handle_message(
        &self,
        from: ParticipantId,
        message: ProtocolMessage,
    ) -> Result<(), EngineError> {
        let kind = message.kind();
        let content = message.content();
        let result = self.handle_message_inner(from, message);
        if let Err(e) = &result {
            warn!(%from, kind, %content, "rejected inbound message: {}", e);
        }
        result
    }

    fn handle_message_inner(
        &self,
        from: ParticipantId,
        message: ProtocolMessage,
    ) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.participants.may_receive_from(from)?;
        let local = state.local();

        match message {
            ProtocolMessage::OfferContent {
                content,
                category,
                content_type,
                friendly_name,
            } => {
                if !content.is_valid() {
                    return Err(EngineError::InvalidId("content"));
                }
                if !category.is_valid() {
                    return Err(EngineError::InvalidId("category"));
                }
                if let Some(record) = state.registry.get(content) {
                    let current = record.state();
                    let reoffer =
                        record.provider == from && current == ContentState::StopOfferRequested;
                    if current != ContentState::Unknown && !reoffer {
                        return Err(EngineError::AlreadyOffered {
                            content,
                            provider: record.provider,
                        });
                    }
                }
                state
                    .registry
                    .insert_offer(content, from, category, content_type, friendly_name, false);
                state.push_consumer(ConsumerEvent::Offered {
                    content,
                    category,
                    content_type,
                });
                info!(%content, %category, provider = %from, "remote offer");
            }

            ProtocolMessage::ContentDescription {
                content,
                descriptor,
            } => {
                state.offer_from(content, from)?;
                if !descriptor.is_valid() {
                    return Err(EngineError::InvalidId("technical content descriptor"));
                }
                if let Some(offer) = state.registry.offer_mut(content) {
                    offer.descriptor = descriptor;
                }
                state.push_consumer(ConsumerEvent::Description {
                    content,
                    descriptor,
                });
            }

            ProtocolMessage::ContentReady { content } => {
                let offer = state.offer_from(content, from)?;
                if offer.state != ContentState::ReadyRequested {
                    return Err(EngineError::WrongState {
                        content,
                        operation: "ready",
                        state: offer.state,
                    });
                }
                if let Some(offer) = state.registry.offer_mut(content) {
                    offer.state = ContentState::Ready;
                }
                state.push_consumer(ConsumerEvent::Ready { content });
                info!(%content, "ready_requested -> ready (remote)");
            }

            ProtocolMessage::EnableFocusRequest { content, request } => {
                let offer = state.offer_from(content, from)?;
                if offer.focus_requests.contains(&request) {
                    return Err(EngineError::FocusRequestActive { content, request });
                }
                if let Some(offer) = state.registry.offer_mut(content) {
                    offer.focus_requests.push(request);
                }
                state.push_consumer(ConsumerEvent::EnableFocusRequest { content, request });
            }

            ProtocolMessage::DisableFocusRequest { content, request } => {
                let offer = state.offer_from(content, from)?;
                if !offer.focus_requests.contains(&request) {
                    return Err(EngineError::FocusRequestInactive { content, request });
                }
                if let Some(offer) = state.registry.offer_mut(content) {
                    offer.focus_requests.retain(|r| *r != request);
                }
                state.push_consumer(ConsumerEvent::DisableFocusRequest { content, request });
            }

            ProtocolMessage::StopOfferRequest { content } => {
                let current = state.offer_from(content, from)?.state;
                match current {
                    ContentState::Offered => {
                        state.registry.reset(content);
                    }
                    ContentState::StopOfferRequested => {
                        return Err(EngineError::WrongState {
                            content,
                            operation: "request stop offer",
                            state: current,
                        });
                    }
                    _ => {
                        if let Some(offer) = state.registry.offer_mut(content) {
                            offer.state = ContentState::StopOfferRequested;
                        }
                    }
                }
                state.push_consumer(ConsumerEvent::StopOfferRequested { content });
                info!(%content, from = %current, "remote stop offer request");
            }

            ProtocolMessage::ForceStopOffer { content } => {
                state.offer_from(content, from)?;
                state.purge_consumer_events(content);
                state.registry.reset(content);
                state.push_consumer(ConsumerEvent::ForceStopped { content });
                info!(%content, "force-stopped by remote provider");
            }

            ProtocolMessage::UpdateMetadata { content, metadata } => {
                state.offer_from(content, from)?;
                if let Some(offer) = state.registry.offer_mut(content) {
                    offer.metadata.merge(metadata.clone());
                }
                state.push_consumer(ConsumerEvent::MetadataUpdated { content, metadata });
            }

            ProtocolMessage::ContentStateChange {
                content,
                request,
                category_info,
                animation,
            } => {
                let offer = state.offer_from(content, local)?;
                let current = offer.state;
                if current != ContentState::Offered && offer.consumer != from {
                    return Err(EngineError::NotConsumer {
                        content,
                        consumer: offer.consumer,
                    });
                }
                let next = transition(current, request).ok_or(EngineError::IllegalTransition {
                    content,
                    from: current,
                    request,
                })?;

                let catch_up = apply_transition(&mut state.registry, content, next, from);
                for (_, message) in catch_up {
                    self.unicast_best_effort(from, &message);
                }
                state.push_provider(ProviderEvent::StateChange {
                    content,
                    request,
                    category_info,
                    animation,
                });
                info!(%content, from = %current, to = %next, consumer = %from, "remote consumer request {}", request);
            }

            ProtocolMessage::CanvasSizeChange {
                content,
                category_info,
                animation,
            } => {
                let offer = state.offer_from(content, local)?;
                if offer.consumer != from {
                    return Err(EngineError::NotConsumer {
                        content,
                        consumer: offer.consumer,
                    });
                }
                state.push_provider(ProviderEvent::CanvasSizeChange {
                    content,
                    category_info,
                    animation,
                    consumer: from,
                });
            }

            ProtocolMessage::ContentStatus { content, status } => {
                let offer = state.offer_from(content, local)?;
                if offer.consumer != from {
                    return Err(EngineError::NotConsumer {
                        content,
                        consumer: offer.consumer,
                    });
                }
                state.push_provider(ProviderEvent::Status {
                    content,
                    status,
                    consumer: from,
                });
            }
        }

        drop(state);
        self.wake();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Deliver queued provider events, waiting up to `timeout` for the first.
    ///
    /// Returns the number of events delivered.
    pub fn dispatch_provider_events(
        &self,
        handler: &mut dyn ProviderEventHandler,
        timeout: Duration,
    ) -> Result<usize, EngineError> {
        let events = {
            let mut state = self.lock();
            state.require_role(Role::Provider)?;
            if state.provider_queue.is_empty() && !timeout.is_zero() {
                let (guard, _) = self
                    .provider_signal
                    .wait_timeout_while(state, timeout, |s| {
                        s.provider_active && s.provider_queue.is_empty()
                    })
                    .unwrap_or_else(PoisonError::into_inner);
                state = guard;
            }
            state.provider_queue.take()
        };

        let count = events.len();
        if count > 0 {
            debug!(count, "dispatching provider events");
        }
        for event in events {
            event.deliver(handler);
        }
        Ok(count)
    }

    /// Deliver queued consumer events, waiting up to `timeout` for the first.
    pub fn dispatch_consumer_events(
        &self,
        handler: &mut dyn ConsumerEventHandler,
        timeout: Duration,
    ) -> Result<usize, EngineError> {
        let events = {
            let mut state = self.lock();
            state.require_role(Role::Consumer)?;
            if state.consumer_queue.is_empty() && !timeout.is_zero() {
                let (guard, _) = self
                    .consumer_signal
                    .wait_timeout_while(state, timeout, |s| {
                        s.consumer_active && s.consumer_queue.is_empty()
                    })
                    .unwrap_or_else(PoisonError::into_inner);
                state = guard;
            }
            state.consumer_queue.take()
        };

        let count = events.len();
        if count > 0 {
            debug!(count, "dispatching consumer events");
        }
        for event in events {
            event.deliver(handler);
        }
        Ok(count)
    }

    /// `dispatch_provider_events` with the configured blocking budget.
    pub fn poll_provider_events(
        &self,
        handler: &mut dyn ProviderEventHandler,
    ) -> Result<usize, EngineError> {
        self.dispatch_provider_events(handler, self.options.dispatch_timeout)
    }

    /// `dispatch_consumer_events` with the configured blocking budget.
    pub fn poll_consumer_events(
        &self,
        handler: &mut dyn ConsumerEventHandler,
    ) -> Result<usize, EngineError> {
        self.dispatch_consumer_events(handler, self.options.dispatch_timeout)
    }
}

/// Write an accepted transition into the registry.
///
/// Returns the catch-up events for a consumer that was just assigned.
fn apply_transition(
    registry: &mut Registry,
    content: ContentId,
    next: ContentState,
    consumer: ParticipantId,
) -> Vec<(ConsumerEvent, ProtocolMessage)> {
    if next == ContentState::Unknown {
        registry.reset(content);
        return Vec::new();
    }
    let Some(offer) = registry.offer_mut(content) else {
        return Vec::new();
    };
    let assigning = offer.state == ContentState::Offered && next == ContentState::Assigned;
    offer.state = next;
    if next == ContentState::Offered {
        offer.consumer = ParticipantId::INVALID;
    }
    if assigning {
        offer.consumer = consumer;
        return EngineState::catch_up(content, offer);
    }
    Vec::new()
}
