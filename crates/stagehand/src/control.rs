//! Content control: the consumer-side orchestrator.
//!
//! Sits on top of the local consumer role of a [`DistributionEngine`] and a
//! [`ResourceControl`]. For every content it combines the protocol lifecycle
//! with the state of the resource behind it and publishes one of
//! `Available`, `Ready` or `Shown` to the application.
//!
//! Key concepts:
//! - Single threaded. Nothing happens outside `update()` except the direct
//!   effects of the request methods
//! - Resources are shared; per-resource desire is consolidated by
//!   [`SharedResourceState`] and the resource is moved one level at a time
//! - Show and hide carry an animation window. The resource flips to rendered
//!   at the window's start on show, and is held rendered until its finish on
//!   hide
//! - A ready request can carry a deadline; when it passes, the content rolls
//!   back to assigned and the application gets a `TimedOut` result

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use stageconf::EngineConfig;
use stageproto::{
    AnimationWindow, Category, CategoryInfo, ConsumerRequest, ContentId, ContentMetadata,
    ContentState, ContentType, ResourceState, TechnicalContentDescriptor,
};
use tracing::{debug, error, info, warn};

use crate::engine::DistributionEngine;
use crate::error::ControlError;
use crate::events::{ContentControlEvent, ContentControlEventHandler, ReadyResult};
use crate::queue::ConsumerEventHandler;
use crate::resource::{DataSlotId, DisplayBufferId, DisplayId, ResourceControl, ResourceEvent};
use crate::shared_state::{SharedResourceState, StateKey};

/// Deadline value meaning "no deadline".
const NEVER: u64 = u64::MAX;

#[derive(Debug, Clone, Default)]
pub struct ControlOptions {
    /// Used by `request_ready_default`; 0 means no deadline.
    pub default_ready_timeout_ms: u64,
}

impl From<&EngineConfig> for ControlOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            default_ready_timeout_ms: config.default_ready_timeout_ms,
        }
    }
}

/// Protocol lifecycle of an assigned content, as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Assigned,
    ReadyRequested,
    Ready,
    Shown,
}

/// What the application is told about a content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishedState {
    Invalid,
    Available,
    Ready,
    Shown,
}

#[derive(Debug)]
struct CategoryEntry {
    info: CategoryInfo,
    display: DisplayId,
    assigned: BTreeSet<ContentId>,
}

#[derive(Debug)]
struct ContentEntry {
    category: Category,
    content_type: ContentType,
    lifecycle: Lifecycle,
    descriptor: TechnicalContentDescriptor,
    buffer: Option<DisplayBufferId>,
    ready_deadline: u64,
}

#[derive(Debug, Default)]
struct ResourceEntry {
    shared: SharedResourceState,
    display: Option<DisplayId>,
    associated: BTreeSet<ContentId>,
}

#[derive(Debug, Clone, Copy)]
struct CachedOffer {
    content: ContentId,
    category: Category,
    content_type: ContentType,
}

/// Desired-state flip to apply at a point in time.
#[derive(Debug, Clone, Copy)]
struct ScheduledCommand {
    at: u64,
    resource: TechnicalContentDescriptor,
    state: ResourceState,
}

pub struct ContentControl<R: ResourceControl> {
    engine: Arc<DistributionEngine>,
    resources: R,
    options: ControlOptions,
    categories: BTreeMap<Category, CategoryEntry>,
    contents: BTreeMap<ContentId, ContentEntry>,
    shared: BTreeMap<TechnicalContentDescriptor, ResourceEntry>,
    cached_offers: Vec<CachedOffer>,
    scheduled: BTreeMap<StateKey, ScheduledCommand>,
    pending: Vec<ContentControlEvent>,
    now: u64,
}

impl<R: ResourceControl> ContentControl<R> {
    /// Takes over the engine's local consumer role, enabling it if needed.
    pub fn new(
        engine: Arc<DistributionEngine>,
        resources: R,
        options: ControlOptions,
    ) -> Result<Self, ControlError> {
        if !engine.is_local_consumer_active() {
            engine.set_local_consumer_availability(true)?;
        }
        Ok(Self {
            engine,
            resources,
            options,
            categories: BTreeMap::new(),
            contents: BTreeMap::new(),
            shared: BTreeMap::new(),
            cached_offers: Vec::new(),
            scheduled: BTreeMap::new(),
            pending: Vec::new(),
            now: 0,
        })
    }

    pub fn engine(&self) -> &Arc<DistributionEngine> {
        &self.engine
    }

    pub fn resources(&self) -> &R {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut R {
        &mut self.resources
    }

    /// Timestamp of the last successful `update`.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn content_state(&self, content: ContentId) -> PublishedState {
        self.determine_state(content)
    }

    pub fn lifecycle(&self, content: ContentId) -> Option<Lifecycle> {
        self.contents.get(&content).map(|e| e.lifecycle)
    }

    pub fn shared_state(&self, resource: TechnicalContentDescriptor) -> Option<&SharedResourceState> {
        self.shared.get(&resource).map(|r| &r.shared)
    }

    // ------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------

    pub fn add_content_category(
        &mut self,
        category: Category,
        display_id: DisplayId,
        info: CategoryInfo,
    ) -> Result<(), ControlError> {
        info!(%category, display = %display_id, ?info, "adding content category");
        if self.categories.contains_key(&category) {
            return Err(ControlError::DuplicateCategory(category));
        }
        if !info.is_complete() {
            return Err(ControlError::IncompleteCategoryInfo(category));
        }
        self.categories.insert(
            category,
            CategoryEntry {
                info,
                display: display_id,
                assigned: BTreeSet::new(),
            },
        );

        let (replay, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut self.cached_offers)
            .into_iter()
            .partition(|o| o.category == category);
        self.cached_offers = keep;
        for offer in replay {
            self.content_offered(offer.content, offer.category, offer.content_type);
        }
        Ok(())
    }

    /// Forget a category. Its contents go back to the offer cache.
    pub fn remove_content_category(&mut self, category: Category) -> Result<(), ControlError> {
        info!(%category, "removing content category");
        let entry = self
            .categories
            .remove(&category)
            .ok_or(ControlError::UnknownCategory(category))?;
        for content in entry.assigned {
            let content_type = self.contents.get(&content).map(|e| e.content_type);
            self.drop_resource_desire(content);
            self.remove_content(content);

            // back to offered so a later category can assign it again
            let handed_back = self.engine.request_state_change(
                content,
                ConsumerRequest::Offered,
                CategoryInfo::default(),
                AnimationWindow::IMMEDIATE,
            );
            match (handed_back, content_type) {
                (Ok(()), Some(content_type)) => self.cached_offers.push(CachedOffer {
                    content,
                    category,
                    content_type,
                }),
                (Ok(()), None) => {}
                (Err(e), _) => warn!(%content, "could not hand content back: {}", e),
            }
        }
        Ok(())
    }

    /// Push a layout change to every content in `category`.
    pub fn set_category_info(
        &mut self,
        category: Category,
        update: CategoryInfo,
        animation: AnimationWindow,
    ) -> Result<(), ControlError> {
        info!(%category, ?update, ?animation, "setting category info");
        let entry = self
            .categories
            .get(&category)
            .ok_or(ControlError::UnknownCategory(category))?;

        let mut first_error = None;
        for content in &entry.assigned {
            if let Err(e) = self.engine.content_size_change(*content, update, animation) {
                error!(%content, "failed to send size change: {}", e);
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e.into());
        }

        if let Some(entry) = self.categories.get_mut(&category) {
            entry.info.apply(&update);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // State control
    // ------------------------------------------------------------------

    fn controllable(&self, content: ContentId) -> Result<&ContentEntry, ControlError> {
        let entry = self
            .contents
            .get(&content)
            .ok_or(ControlError::UnknownContent(content))?;
        if entry.content_type == ContentType::SurfaceResource {
            return Err(ControlError::UnsupportedContentType {
                content,
                content_type: entry.content_type,
            });
        }
        Ok(entry)
    }

    fn deadline_after(&self, timeout_ms: u64) -> u64 {
        if timeout_ms > 0 {
            self.now.saturating_add(timeout_ms)
        } else {
            NEVER
        }
    }

    /// Ask for `content` to become ready within `timeout_ms` (0 = no limit).
    ///
    /// A content that is already ready stays as it is and gets no deadline.
    /// One on its way there only has its deadline moved.
    pub fn request_ready(&mut self, content: ContentId, timeout_ms: u64) -> Result<(), ControlError> {
        info!(%content, timeout_ms, now = self.now, "request ready");
        let lifecycle = self.controllable(content)?.lifecycle;
        let deadline = self.deadline_after(timeout_ms);
        let last = self.determine_state(content);

        match last {
            PublishedState::Shown => Err(ControlError::InvalidRequest {
                content,
                reason: "content is shown already, cannot request ready",
            }),
            PublishedState::Ready => {
                self.set_deadline(content, NEVER);
                Ok(())
            }
            PublishedState::Available if lifecycle > Lifecycle::Assigned => {
                self.set_deadline(content, deadline);
                Ok(())
            }
            PublishedState::Available => {
                self.engine.request_state_change(
                    content,
                    ConsumerRequest::Ready,
                    CategoryInfo::default(),
                    AnimationWindow::IMMEDIATE,
                )?;
                if let Some(entry) = self.contents.get_mut(&content) {
                    entry.lifecycle = Lifecycle::ReadyRequested;
                    entry.ready_deadline = deadline;
                }
                self.request_resource_state(content, ResourceState::Ready);
                self.content_state_changed(content, last);
                Ok(())
            }
            PublishedState::Invalid => Err(ControlError::UnknownContent(content)),
        }
    }

    /// `request_ready` with the configured default timeout.
    pub fn request_ready_default(&mut self, content: ContentId) -> Result<(), ControlError> {
        self.request_ready(content, self.options.default_ready_timeout_ms)
    }

    fn set_deadline(&mut self, content: ContentId, deadline: u64) {
        if let Some(entry) = self.contents.get_mut(&content) {
            entry.ready_deadline = deadline;
        }
    }

    pub fn show(&mut self, content: ContentId, animation: AnimationWindow) -> Result<(), ControlError> {
        info!(%content, ?animation, "show");
        let lifecycle = self.controllable(content)?.lifecycle;
        if lifecycle != Lifecycle::Ready {
            return Err(ControlError::NotReady {
                content,
                reason: "provider has not reported ready",
            });
        }
        let last = self.determine_state(content);
        if last != PublishedState::Ready {
            return Err(ControlError::NotReady {
                content,
                reason: "content is not ready yet",
            });
        }
        let Some(resource) = self.resource_of(content) else {
            return Err(ControlError::NotReady {
                content,
                reason: "content has no resource",
            });
        };

        self.engine.request_state_change(
            content,
            ConsumerRequest::Shown,
            CategoryInfo::default(),
            animation,
        )?;
        if let Some(entry) = self.contents.get_mut(&content) {
            entry.lifecycle = Lifecycle::Shown;
        }
        debug!(%content, at = animation.start_ms, "scheduling resource -> rendered");
        self.scheduled.insert(
            StateKey::own(content),
            ScheduledCommand {
                at: animation.start_ms,
                resource,
                state: ResourceState::Rendered,
            },
        );
        self.content_state_changed(content, last);
        Ok(())
    }

    pub fn hide(&mut self, content: ContentId, animation: AnimationWindow) -> Result<(), ControlError> {
        info!(%content, ?animation, "hide");
        let lifecycle = self.controllable(content)?.lifecycle;
        let last = self.determine_state(content);
        if last == PublishedState::Available || last == PublishedState::Invalid {
            return Err(ControlError::InvalidRequest {
                content,
                reason: "content is not shown, cannot hide",
            });
        }

        if lifecycle == Lifecycle::Shown {
            self.engine.request_state_change(
                content,
                ConsumerRequest::Ready,
                CategoryInfo::default(),
                animation,
            )?;
            self.schedule_hide_animation(content, animation, ResourceState::Ready);
            if let Some(entry) = self.contents.get_mut(&content) {
                entry.lifecycle = Lifecycle::Ready;
            }
        }
        self.content_state_changed(content, last);
        Ok(())
    }

    /// Give up on a content: back to assigned, resource back to available.
    pub fn release(
        &mut self,
        content: ContentId,
        animation: AnimationWindow,
    ) -> Result<(), ControlError> {
        info!(%content, ?animation, "release");
        self.controllable(content)?;
        let last = self.determine_state(content);

        if self.engine.content_state(content) != ContentState::Assigned {
            self.engine.request_state_change(
                content,
                ConsumerRequest::Assigned,
                CategoryInfo::default(),
                animation,
            )?;
        }
        if let Some(entry) = self.contents.get_mut(&content) {
            entry.lifecycle = Lifecycle::Assigned;
            entry.ready_deadline = NEVER;
        }

        if last == PublishedState::Shown {
            self.schedule_hide_animation(content, animation, ResourceState::Available);
        } else {
            self.request_resource_state(content, ResourceState::Available);
        }
        self.content_state_changed(content, last);
        Ok(())
    }

    /// Let the provider withdraw `content`. No event follows; the content is
    /// gone from here on.
    pub fn accept_stop_offer(
        &mut self,
        content: ContentId,
        animation: AnimationWindow,
    ) -> Result<(), ControlError> {
        info!(%content, ?animation, "accept stop offer");
        self.controllable(content)?;
        self.engine.accept_stop_offer(content, animation)?;

        if self.determine_state(content) == PublishedState::Shown {
            self.schedule_hide_animation(content, animation, ResourceState::Available);
        } else {
            self.request_resource_state(content, ResourceState::Available);
        }
        self.remove_content(content);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Buffers, links, picking
    // ------------------------------------------------------------------

    /// Resource of a content that the provider reported ready at least once.
    fn ready_resource(
        &self,
        content: ContentId,
        reason: &'static str,
    ) -> Result<TechnicalContentDescriptor, ControlError> {
        let entry = self.controllable(content)?;
        let ready = matches!(entry.lifecycle, Lifecycle::Ready | Lifecycle::Shown);
        match self.resource_of(content) {
            Some(resource) if ready => Ok(resource),
            _ => Err(ControlError::NotReady { content, reason }),
        }
    }

    fn described_resource(&self, content: ContentId) -> Result<TechnicalContentDescriptor, ControlError> {
        self.controllable(content)?;
        self.resource_of(content).ok_or(ControlError::NotReady {
            content,
            reason: "content has no resource yet, make it ready at least once",
        })
    }

    pub fn assign_to_display_buffer(
        &mut self,
        content: ContentId,
        buffer: DisplayBufferId,
        render_order: i32,
    ) -> Result<(), ControlError> {
        info!(%content, %buffer, render_order, "assign to display buffer");
        let resource = self.ready_resource(
            content,
            "content must be ready before it can be assigned to a buffer",
        )?;
        if let Some(entry) = self.contents.get_mut(&content) {
            entry.buffer = Some(buffer);
        }
        self.resources
            .set_display_buffer_assignment(resource, buffer, render_order)?;
        Ok(())
    }

    pub fn link_offscreen_buffer(
        &mut self,
        buffer: DisplayBufferId,
        consumer: ContentId,
        consumer_slot: DataSlotId,
    ) -> Result<(), ControlError> {
        info!(%buffer, %consumer, %consumer_slot, "link offscreen buffer");
        let consumer_resource = self.ready_resource(
            consumer,
            "consumer content must be ready at least once before linking",
        )?;
        self.resources
            .link_offscreen_buffer(buffer, consumer_resource, consumer_slot)?;
        Ok(())
    }

    /// Link the buffer `content` renders into as a texture of `consumer`.
    pub fn link_content_to_texture_consumer(
        &mut self,
        content: ContentId,
        consumer: ContentId,
        consumer_slot: DataSlotId,
    ) -> Result<(), ControlError> {
        info!(%content, %consumer, %consumer_slot, "link content to texture consumer");
        let consumer_resource = self.ready_resource(
            consumer,
            "consumer content must be ready at least once before linking",
        )?;
        self.ready_resource(content, "content must be ready to link to a texture consumer")?;
        let buffer = self
            .contents
            .get(&content)
            .and_then(|e| e.buffer)
            .ok_or(ControlError::InvalidRequest {
                content,
                reason: "content is not assigned to an offscreen buffer",
            })?;
        self.resources
            .link_offscreen_buffer(buffer, consumer_resource, consumer_slot)?;
        Ok(())
    }

    pub fn link_data(
        &mut self,
        provider: ContentId,
        provider_slot: DataSlotId,
        consumer: ContentId,
        consumer_slot: DataSlotId,
    ) -> Result<(), ControlError> {
        info!(%provider, %provider_slot, %consumer, %consumer_slot, "link data");
        let provider_resource = self.described_resource(provider)?;
        let consumer_resource = self.described_resource(consumer)?;
        self.resources.link_data(
            provider_resource,
            provider_slot,
            consumer_resource,
            consumer_slot,
        )?;
        Ok(())
    }

    pub fn unlink_data(
        &mut self,
        consumer: ContentId,
        consumer_slot: DataSlotId,
    ) -> Result<(), ControlError> {
        info!(%consumer, %consumer_slot, "unlink data");
        let consumer_resource = self.described_resource(consumer)?;
        self.resources.unlink_data(consumer_resource, consumer_slot)?;
        Ok(())
    }

    /// `x` and `y` are normalized to the buffer the content renders into.
    pub fn handle_pick_event(&mut self, content: ContentId, x: f32, y: f32) -> Result<(), ControlError> {
        debug!(%content, x, y, "pick event");
        let resource = self.described_resource(content)?;
        self.resources.handle_pick_event(resource, x, y)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance time to `now`, process everything that came in and deliver
    /// the resulting events.
    ///
    /// Fails without any effect if `now` is older than the previous update
    /// or the engine's consumer role is inactive.
    pub fn update(
        &mut self,
        now: u64,
        handler: &mut dyn ContentControlEventHandler,
    ) -> Result<(), ControlError> {
        if now < self.now {
            return Err(ControlError::TimeWentBackwards {
                now,
                previous: self.now,
            });
        }
        let engine = Arc::clone(&self.engine);
        engine.dispatch_consumer_events(&mut Inbox(&mut *self), Duration::ZERO)?;
        self.now = now;

        for event in self.resources.drain_events() {
            self.resource_event(event);
        }

        self.execute_due_commands();
        self.process_timeouts();

        let events = std::mem::take(&mut self.pending);
        if !events.is_empty() {
            debug!(count = events.len(), "dispatching content control events");
        }
        for event in events {
            event.deliver(handler);
        }
        Ok(())
    }

    fn execute_due_commands(&mut self) {
        let due: Vec<StateKey> = self
            .scheduled
            .iter()
            .filter(|(_, cmd)| cmd.at <= self.now)
            .map(|(key, _)| *key)
            .collect();

        for key in due {
            let Some(cmd) = self.scheduled.remove(&key) else {
                continue;
            };
            info!(
                content = %key.content,
                resource = %cmd.resource,
                state = %cmd.state,
                "executing scheduled command"
            );
            let last = self.determine_state(key.content);
            self.shared
                .entry(cmd.resource)
                .or_default()
                .shared
                .set_desired_state(key, cmd.state);
            self.go_to_consolidated(cmd.resource);
            self.content_state_changed(key.content, last);
        }
    }

    fn process_timeouts(&mut self) {
        let now = self.now;
        let expired: Vec<ContentId> = self
            .contents
            .iter()
            .filter(|(c, e)| {
                matches!(e.lifecycle, Lifecycle::ReadyRequested | Lifecycle::Ready)
                    && now > e.ready_deadline
                    && self.determine_state(**c) == PublishedState::Available
            })
            .map(|(c, _)| *c)
            .collect();

        for content in expired {
            warn!(%content, now, "ready request timed out, releasing content; request ready again to retry");
            self.pending.push(ContentControlEvent::Ready {
                content,
                result: ReadyResult::TimedOut,
            });
            if let Some(entry) = self.contents.get_mut(&content) {
                entry.lifecycle = Lifecycle::Assigned;
                entry.ready_deadline = NEVER;
            }

            // the resource controller may still be working on the old request,
            // or may never answer it; fall back to what it last reported
            if let Some(resource) = self.resource_of(content) {
                if let Some(entry) = self.shared.get_mut(&resource) {
                    let reported = entry.shared.reported_state();
                    if reported != entry.shared.requested_state() {
                        match self.resources.set_resource_state(resource, reported) {
                            Ok(()) => entry.shared.set_requested_state(reported),
                            Err(e) => error!(%resource, %reported, "failed to request resource state: {}", e),
                        }
                    }
                }
            }

            if let Err(e) = self.release(content, AnimationWindow::IMMEDIATE) {
                // e.g. a stop offer is pending; the resource is let go anyway
                warn!(%content, "release after timeout failed: {}", e);
                self.request_resource_state(content, ResourceState::Available);
            }
        }
    }

    // ------------------------------------------------------------------
    // Derived state
    // ------------------------------------------------------------------

    fn resource_of(&self, content: ContentId) -> Option<TechnicalContentDescriptor> {
        self.contents
            .get(&content)
            .map(|e| e.descriptor)
            .filter(|d| d.is_valid())
    }

    fn determine_state(&self, content: ContentId) -> PublishedState {
        let Some(entry) = self.contents.get(&content) else {
            return PublishedState::Invalid;
        };
        let Some(resource) = self.resource_of(content).and_then(|r| self.shared.get(&r)) else {
            return PublishedState::Available;
        };

        let lifecycle = entry.lifecycle;
        let current = resource.shared.current_state_for(StateKey::own(content));
        let requested = resource.shared.requested_state();

        if lifecycle < Lifecycle::Ready
            || current < ResourceState::Ready
            || requested < ResourceState::Ready
        {
            return PublishedState::Available;
        }
        if lifecycle == Lifecycle::Ready
            || current == ResourceState::Ready
            || requested == ResourceState::Ready
        {
            return PublishedState::Ready;
        }
        PublishedState::Shown
    }

    /// Emit an event if the published state moved away from `last`.
    fn content_state_changed(&mut self, content: ContentId, last: PublishedState) {
        let current = self.determine_state(content);
        if current == last {
            return;
        }
        let Some(entry) = self.contents.get_mut(&content) else {
            return;
        };
        match current {
            PublishedState::Available | PublishedState::Invalid => entry.buffer = None,
            PublishedState::Ready => entry.ready_deadline = NEVER,
            PublishedState::Shown => {}
        }

        info!(%content, from = ?last, to = ?current, "content state changed");
        let event = match current {
            PublishedState::Available => ContentControlEvent::Available {
                content,
                category: entry.category,
            },
            PublishedState::Ready => ContentControlEvent::Ready {
                content,
                result: ReadyResult::Ok,
            },
            PublishedState::Shown => ContentControlEvent::Shown { content },
            PublishedState::Invalid => return,
        };
        self.pending.push(event);
    }

    fn request_resource_state(&mut self, content: ContentId, state: ResourceState) {
        let Some(resource) = self.resource_of(content) else {
            return;
        };
        self.scheduled.remove(&StateKey::own(content));
        self.shared
            .entry(resource)
            .or_default()
            .shared
            .set_desired_state(StateKey::own(content), state);
        self.go_to_consolidated(resource);
    }

    fn schedule_hide_animation(
        &mut self,
        content: ContentId,
        animation: AnimationWindow,
        target: ResourceState,
    ) {
        let Some(resource) = self.resource_of(content) else {
            return;
        };
        self.scheduled.remove(&StateKey::own(content));
        let shared = &mut self.shared.entry(resource).or_default().shared;
        shared.set_desired_state(StateKey::hold(content), ResourceState::Rendered);
        shared.set_desired_state(StateKey::own(content), target);
        debug!(%content, at = animation.finish_ms, "scheduling hold release");
        self.scheduled.insert(
            StateKey::hold(content),
            ScheduledCommand {
                at: animation.finish_ms,
                resource,
                state: ResourceState::Available,
            },
        );
    }

    /// Request the next step towards the consolidated desired state, if the
    /// resource is idle.
    fn go_to_consolidated(&mut self, resource: TechnicalContentDescriptor) {
        let Some(entry) = self.shared.get_mut(&resource) else {
            return;
        };
        let reported = entry.shared.reported_state();
        let requested = entry.shared.requested_state();
        let consolidated = entry.shared.consolidated_desired_state();

        let idle = requested == reported || requested == ResourceState::Unavailable;
        if !idle
            || reported == consolidated
            || reported == ResourceState::Unavailable
            || consolidated == ResourceState::Unavailable
        {
            return;
        }

        if consolidated >= ResourceState::Ready && reported < ResourceState::Ready {
            match entry.display {
                Some(display_id) => {
                    if let Err(e) = self.resources.set_resource_mapping(resource, display_id) {
                        error!(%resource, display = %display_id, "failed to map resource: {}", e);
                    }
                }
                None => error!(%resource, "no display to map resource onto"),
            }
        }

        // one level at a time
        let next = if reported == ResourceState::Ready {
            consolidated
        } else {
            ResourceState::Ready
        };
        info!(%resource, from = %reported, to = %next, "requesting resource state");
        match self.resources.set_resource_state(resource, next) {
            Ok(()) => entry.shared.set_requested_state(next),
            Err(e) => error!(%resource, state = %next, "failed to request resource state: {}", e),
        }
    }

    /// Withdraw everything `content` asks of its resource, pending animations
    /// included. The resource steps down if nobody else needs it.
    fn drop_resource_desire(&mut self, content: ContentId) {
        self.scheduled.retain(|key, _| key.content != content);
        let Some(resource) = self.resource_of(content) else {
            return;
        };
        if let Some(entry) = self.shared.get_mut(&resource) {
            entry
                .shared
                .set_desired_state(StateKey::own(content), ResourceState::Available);
            entry
                .shared
                .set_desired_state(StateKey::hold(content), ResourceState::Available);
        }
        self.go_to_consolidated(resource);
    }

    fn remove_content(&mut self, content: ContentId) {
        info!(%content, "removing content");
        self.contents.remove(&content);
        for category in self.categories.values_mut() {
            category.assigned.remove(&content);
        }
        for resource in self.shared.values_mut() {
            resource.associated.remove(&content);
        }
    }

    fn contents_of(&self, resource: TechnicalContentDescriptor) -> Vec<ContentId> {
        self.shared
            .get(&resource)
            .map(|r| r.associated.iter().copied().collect())
            .unwrap_or_default()
    }

    /// First content associated with `resource`, for events that name one.
    fn first_content_of(&self, resource: TechnicalContentDescriptor, what: &str) -> ContentId {
        let contents = self.contents_of(resource);
        match contents.as_slice() {
            [] => {
                warn!(%resource, "{} event for a resource without content, reporting invalid content", what);
                ContentId::INVALID
            }
            [only] => *only,
            [first, ..] => {
                debug!(%resource, ?contents, "{} event for shared resource, reporting first content", what);
                *first
            }
        }
    }

    // ------------------------------------------------------------------
    // Inbound: protocol
    // ------------------------------------------------------------------

    fn content_offered(&mut self, content: ContentId, category: Category, content_type: ContentType) {
        let Some(entry) = self.categories.get(&category) else {
            info!(%content, %category, "offer for unknown category, caching");
            self.cached_offers.push(CachedOffer {
                content,
                category,
                content_type,
            });
            return;
        };
        if let Some(known) = self.contents.get(&content) {
            if known.category != category {
                warn!(
                    %content,
                    assigned = %known.category,
                    requested = %category,
                    "content already assigned to another category, stop offer first"
                );
                return;
            }
        }

        let info = entry.info;
        if let Err(e) = self.engine.request_state_change(
            content,
            ConsumerRequest::Assigned,
            info,
            AnimationWindow::IMMEDIATE,
        ) {
            warn!(%content, %category, "could not assign content: {}", e);
            return;
        }
        info!(%content, %category, "assigned content");
        if let Some(entry) = self.categories.get_mut(&category) {
            entry.assigned.insert(content);
        }
        self.contents.insert(
            content,
            ContentEntry {
                category,
                content_type,
                lifecycle: Lifecycle::Assigned,
                descriptor: TechnicalContentDescriptor::INVALID,
                buffer: None,
                ready_deadline: NEVER,
            },
        );
        self.content_state_changed(content, PublishedState::Invalid);
    }

    fn content_described(&mut self, content: ContentId, descriptor: TechnicalContentDescriptor) {
        let Some(entry) = self.contents.get_mut(&content) else {
            debug!(%content, "description for unassigned content, ignoring");
            return;
        };
        info!(%content, %descriptor, "content described");
        entry.descriptor = descriptor;
        let content_type = entry.content_type;
        let lifecycle = entry.lifecycle;
        let target = self.categories.get(&entry.category).map(|c| c.display);

        let resource = self.shared.entry(descriptor).or_default();
        if let (Some(previous), Some(next)) = (resource.display, target) {
            if previous != next {
                warn!(%descriptor, %previous, %next, "resource moves to another display");
            }
        }
        resource.display = target.or(resource.display);

        match content_type {
            ContentType::SceneResource => {
                resource.associated.insert(content);
                let state = if lifecycle == Lifecycle::ReadyRequested {
                    ResourceState::Ready
                } else {
                    ResourceState::Available
                };
                self.request_resource_state(content, state);
            }
            ContentType::SurfaceResource => {
                warn!(%content, "surface contents are tracked but not controlled here");
            }
        }
    }

    fn content_ready(&mut self, content: ContentId) {
        let Some(entry) = self.contents.get(&content) else {
            debug!(%content, "ready for unassigned content, ignoring");
            return;
        };
        if entry.lifecycle != Lifecycle::ReadyRequested {
            debug!(%content, lifecycle = ?entry.lifecycle, "ready not requested or released since, ignoring");
            return;
        }
        let last = self.determine_state(content);
        if let Some(entry) = self.contents.get_mut(&content) {
            entry.lifecycle = Lifecycle::Ready;
        }
        self.content_state_changed(content, last);
    }

    fn drop_cached_offer(&mut self, content: ContentId) {
        self.cached_offers.retain(|o| o.content != content);
    }

    fn stop_offer_requested(&mut self, content: ContentId) {
        if self.contents.contains_key(&content) {
            self.pending
                .push(ContentControlEvent::StopOfferRequested { content });
        } else {
            debug!(%content, "stop offer for unassigned content");
            self.drop_cached_offer(content);
        }
    }

    fn force_stopped(&mut self, content: ContentId) {
        if !self.contents.contains_key(&content) {
            debug!(%content, "force stop for unassigned content");
            self.drop_cached_offer(content);
            return;
        }

        self.drop_resource_desire(content);
        self.remove_content(content);
        self.pending.push(ContentControlEvent::NotAvailable { content });
    }

    fn push_if_known(&mut self, content: ContentId, event: ContentControlEvent) {
        if self.contents.contains_key(&content) {
            self.pending.push(event);
        } else {
            debug!(%content, "event for unassigned content, ignoring");
        }
    }

    // ------------------------------------------------------------------
    // Inbound: resources
    // ------------------------------------------------------------------

    fn resource_state_changed(&mut self, resource: TechnicalContentDescriptor, state: ResourceState) {
        info!(%resource, %state, "resource state changed");
        let associated = self.contents_of(resource);
        let last: Vec<(ContentId, PublishedState)> = associated
            .iter()
            .map(|c| (*c, self.determine_state(*c)))
            .collect();

        let entry = self.shared.entry(resource).or_default();
        entry.shared.set_reported_state(state);
        if state == ResourceState::Unavailable {
            entry.shared.set_requested_state(state);
        }

        for (content, last) in last {
            self.content_state_changed(content, last);
        }
        self.go_to_consolidated(resource);
    }

    fn fan_out(
        &mut self,
        resource: TechnicalContentDescriptor,
        what: &str,
        event: impl Fn(ContentId) -> ContentControlEvent,
    ) {
        let contents = self.contents_of(resource);
        if contents.is_empty() {
            warn!(%resource, "{} event for a resource without content", what);
        }
        for content in contents {
            debug!(%content, %resource, "{}", what);
            self.pending.push(event(content));
        }
    }

    fn resource_event(&mut self, event: ResourceEvent) {
        use ResourceEvent as E;
        match event {
            E::StateChanged { resource, state } => self.resource_state_changed(resource, state),
            E::OffscreenBufferLinked {
                buffer,
                consumer,
                consumer_slot,
                success,
            } => {
                let consumer = self.first_content_of(consumer, "offscreen buffer linked");
                info!(%buffer, %consumer, %consumer_slot, success, "offscreen buffer linked");
                self.pending.push(ContentControlEvent::OffscreenBufferLinked {
                    buffer,
                    consumer,
                    consumer_slot,
                    success,
                });
            }
            E::DataLinked {
                provider,
                provider_slot,
                consumer,
                consumer_slot,
                success,
            } => {
                let provider = self.first_content_of(provider, "data linked");
                let consumer = self.first_content_of(consumer, "data linked");
                info!(%provider, %provider_slot, %consumer, %consumer_slot, success, "data linked");
                self.pending.push(ContentControlEvent::DataLinked {
                    provider,
                    provider_slot,
                    consumer,
                    consumer_slot,
                    success,
                });
            }
            E::DataUnlinked {
                consumer,
                consumer_slot,
                success,
            } => {
                let consumer = self.first_content_of(consumer, "data unlinked");
                info!(%consumer, %consumer_slot, success, "data unlinked");
                self.pending.push(ContentControlEvent::DataUnlinked {
                    consumer,
                    consumer_slot,
                    success,
                });
            }
            E::ObjectsPicked { resource, objects } => {
                let content = self.first_content_of(resource, "objects picked");
                debug!(%content, count = objects.len(), "objects picked");
                self.pending
                    .push(ContentControlEvent::ObjectsPicked { content, objects });
            }
            E::DataProviderCreated { resource, slot } => {
                self.fan_out(resource, "data provider created", |content| {
                    ContentControlEvent::DataProviderCreated { content, slot }
                })
            }
            E::DataProviderDestroyed { resource, slot } => {
                self.fan_out(resource, "data provider destroyed", |content| {
                    ContentControlEvent::DataProviderDestroyed { content, slot }
                })
            }
            E::DataConsumerCreated { resource, slot } => {
                self.fan_out(resource, "data consumer created", |content| {
                    ContentControlEvent::DataConsumerCreated { content, slot }
                })
            }
            E::DataConsumerDestroyed { resource, slot } => {
                self.fan_out(resource, "data consumer destroyed", |content| {
                    ContentControlEvent::DataConsumerDestroyed { content, slot }
                })
            }
            E::Flushed { resource, version } => self.fan_out(resource, "flushed", |content| {
                ContentControlEvent::Flushed { content, version }
            }),
            E::ExpirationMonitoringEnabled { resource } => {
                self.fan_out(resource, "expiration monitoring enabled", |content| {
                    ContentControlEvent::ExpirationMonitoringEnabled { content }
                })
            }
            E::ExpirationMonitoringDisabled { resource } => {
                self.fan_out(resource, "expiration monitoring disabled", |content| {
                    ContentControlEvent::ExpirationMonitoringDisabled { content }
                })
            }
            E::Expired { resource } => self.fan_out(resource, "expired", |content| {
                ContentControlEvent::Expired { content }
            }),
            E::RecoveredFromExpiration { resource } => {
                self.fan_out(resource, "recovered from expiration", |content| {
                    ContentControlEvent::RecoveredFromExpiration { content }
                })
            }
            E::StreamAvailabilityChanged { stream, available } => {
                info!(%stream, available, "stream availability changed");
                self.pending
                    .push(ContentControlEvent::StreamAvailabilityChanged { stream, available });
            }
        }
    }
}

/// Routes engine consumer callbacks into the orchestrator.
struct Inbox<'a, R: ResourceControl>(&'a mut ContentControl<R>);

impl<R: ResourceControl> ConsumerEventHandler for Inbox<'_, R> {
    fn content_offered(&mut self, content: ContentId, category: Category, content_type: ContentType) {
        self.0.content_offered(content, category, content_type);
    }

    fn content_description(&mut self, content: ContentId, descriptor: TechnicalContentDescriptor) {
        self.0.content_described(content, descriptor);
    }

    fn content_ready(&mut self, content: ContentId) {
        self.0.content_ready(content);
    }

    fn content_enable_focus_request(&mut self, content: ContentId, request: i32) {
        self.0
            .push_if_known(content, ContentControlEvent::EnableFocusRequest { content, request });
    }

    fn content_disable_focus_request(&mut self, content: ContentId, request: i32) {
        self.0
            .push_if_known(content, ContentControlEvent::DisableFocusRequest { content, request });
    }

    fn content_stop_offer_requested(&mut self, content: ContentId) {
        self.0.stop_offer_requested(content);
    }

    fn force_content_offer_stopped(&mut self, content: ContentId) {
        self.0.force_stopped(content);
    }

    fn content_metadata_updated(&mut self, content: ContentId, metadata: &ContentMetadata) {
        self.0.push_if_known(
            content,
            ContentControlEvent::MetadataUpdated {
                content,
                metadata: metadata.clone(),
            },
        );
    }
}
