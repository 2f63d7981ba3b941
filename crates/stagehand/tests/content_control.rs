//! Orchestrator tests: one participant acting as local provider and local
//! consumer, with a resource controller that reaches every requested state
//! one update later.

mod common;

use std::sync::Arc;

use common::*;
use pretty_assertions::assert_eq;
use stagehand::{
    ContentControl, ContentControlEvent, ControlError, ControlOptions, DataSlotId,
    DisplayBufferId, DistributionEngine, Lifecycle, PickableObjectId, ProviderEvent,
    PublishedState, ReadyResult, ResourceEvent, StreamId,
};
use stageproto::{
    AnimationWindow, CategoryInfo, ContentId, ContentMetadata, ContentState, ContentType,
    ResourceState, Size,
};

struct Rig {
    engine: Arc<DistributionEngine>,
    control: ContentControl<FakeResources>,
    app: AppLog,
}

impl Rig {
    fn bare(options: ControlOptions) -> Self {
        let (engine, _transport) = engine(LOCAL);
        engine.set_local_provider_availability(true).unwrap();
        let control =
            ContentControl::new(Arc::clone(&engine), FakeResources::default(), options).unwrap();
        Self {
            engine,
            control,
            app: AppLog::default(),
        }
    }

    fn new() -> Self {
        let mut rig = Self::bare(ControlOptions::default());
        rig.control
            .add_content_category(DRIVER, DISPLAY, category_info())
            .unwrap();
        rig
    }

    fn tick(&mut self, now: u64) -> Vec<ContentControlEvent> {
        self.control.update(now, &mut self.app).unwrap();
        self.app.take()
    }

    fn provide(&self) {
        run_eager_provider(&self.engine);
    }

    /// Offer and describe `content` on the shared scene, ending up assigned.
    fn offer(&mut self, content: ContentId, now: u64) {
        self.engine
            .offer(content, DRIVER, ContentType::SceneResource, "widget", true)
            .unwrap();
        self.engine.describe(content, SCENE).unwrap();
        self.control
            .resources_mut()
            .report(SCENE, ResourceState::Available);
        assert_eq!(
            self.tick(now),
            vec![ContentControlEvent::Available {
                content,
                category: DRIVER,
            }]
        );
        // description arrives as catch-up after assignment
        assert_eq!(self.tick(now), vec![]);
    }

    fn make_ready(&mut self, content: ContentId, now: u64) {
        self.control.request_ready(content, 0).unwrap();
        self.provide();
        assert_eq!(self.tick(now), vec![ready(content)]);
    }

    fn state_requests(&self) -> Vec<ResourceState> {
        self.control.resources().state_requests()
    }
}

fn ready(content: ContentId) -> ContentControlEvent {
    ContentControlEvent::Ready {
        content,
        result: ReadyResult::Ok,
    }
}

fn timed_out(content: ContentId) -> ContentControlEvent {
    ContentControlEvent::Ready {
        content,
        result: ReadyResult::TimedOut,
    }
}

#[test]
fn test_show_hide_release_cycle() {
    let mut rig = Rig::new();
    rig.offer(NAV, 10);
    rig.make_ready(NAV, 20);
    assert_eq!(
        rig.control.resources().calls[0],
        ResourceCall::Mapping(SCENE, DISPLAY)
    );
    assert_eq!(rig.engine.content_state(NAV), ContentState::Ready);

    rig.control
        .show(NAV, AnimationWindow::new(40, 60))
        .unwrap();
    assert_eq!(rig.tick(30), vec![]);
    assert_eq!(rig.tick(40), vec![]);
    assert_eq!(rig.tick(50), vec![ContentControlEvent::Shown { content: NAV }]);
    assert_eq!(rig.control.content_state(NAV), PublishedState::Shown);

    rig.control
        .hide(NAV, AnimationWindow::new(60, 80))
        .unwrap();
    assert_eq!(rig.tick(60), vec![ready(NAV)]);
    // held rendered until the animation finishes
    assert_eq!(
        rig.state_requests(),
        vec![ResourceState::Ready, ResourceState::Rendered]
    );
    assert_eq!(rig.tick(80), vec![]);
    assert_eq!(rig.tick(90), vec![]);

    rig.control
        .release(NAV, AnimationWindow::IMMEDIATE)
        .unwrap();
    assert_eq!(
        rig.tick(100),
        vec![ContentControlEvent::Available {
            content: NAV,
            category: DRIVER,
        }]
    );
    assert_eq!(
        rig.state_requests(),
        vec![
            ResourceState::Ready,
            ResourceState::Rendered,
            ResourceState::Ready,
            ResourceState::Available,
        ]
    );
    assert_eq!(rig.engine.content_state(NAV), ContentState::Assigned);
    assert_eq!(rig.control.lifecycle(NAV), Some(Lifecycle::Assigned));
}

#[test]
fn test_ready_is_reported_once() {
    let mut rig = Rig::new();
    rig.offer(NAV, 10);
    rig.make_ready(NAV, 20);

    // asking again while ready only moves the deadline
    rig.control.request_ready(NAV, 0).unwrap();
    assert_eq!(rig.tick(30), vec![]);
    assert_eq!(rig.tick(40), vec![]);
    assert_eq!(rig.state_requests(), vec![ResourceState::Ready]);
}

#[test]
fn test_show_requires_provider_ready() {
    let mut rig = Rig::new();
    rig.offer(NAV, 10);
    assert!(matches!(
        rig.control.show(NAV, AnimationWindow::IMMEDIATE),
        Err(ControlError::NotReady { .. })
    ));

    rig.control.request_ready(NAV, 0).unwrap();
    assert!(matches!(
        rig.control.show(NAV, AnimationWindow::IMMEDIATE),
        Err(ControlError::NotReady { .. })
    ));
    assert_eq!(rig.engine.content_state(NAV), ContentState::ReadyRequested);
}

#[test]
fn test_ready_timeout_fires_once_and_retry_gets_fresh_deadline() {
    let mut rig = Rig::new();
    rig.offer(NAV, 10);
    assert_eq!(rig.tick(100), vec![]);

    // provider never answers
    rig.control.request_ready(NAV, 50).unwrap();
    assert_eq!(rig.tick(150), vec![]);
    assert_eq!(rig.tick(151), vec![timed_out(NAV)]);
    assert_eq!(rig.tick(200), vec![]);
    assert_eq!(rig.engine.content_state(NAV), ContentState::Assigned);
    assert_eq!(rig.control.lifecycle(NAV), Some(Lifecycle::Assigned));

    rig.control.request_ready(NAV, 50).unwrap();
    assert_eq!(rig.engine.content_state(NAV), ContentState::ReadyRequested);
    assert_eq!(rig.tick(250), vec![]);
    assert_eq!(rig.tick(251), vec![timed_out(NAV)]);
    assert_eq!(rig.tick(400), vec![]);
}

#[test]
fn test_ready_before_deadline_cancels_timeout() {
    let mut rig = Rig::new();
    rig.offer(NAV, 10);
    assert_eq!(rig.tick(100), vec![]);

    rig.control.request_ready(NAV, 50).unwrap();
    rig.provide();
    assert_eq!(rig.tick(120), vec![ready(NAV)]);
    assert_eq!(rig.tick(500), vec![]);
}

#[test]
fn test_request_ready_on_ready_content_never_times_out() {
    let mut rig = Rig::new();
    rig.offer(NAV, 10);
    rig.make_ready(NAV, 20);

    rig.control.request_ready(NAV, 50).unwrap();
    assert_eq!(rig.tick(100), vec![]);
    assert_eq!(rig.tick(200), vec![]);
    assert_eq!(rig.control.content_state(NAV), PublishedState::Ready);
    assert_eq!(rig.engine.content_state(NAV), ContentState::Ready);
}

#[test]
fn test_default_ready_timeout_applies() {
    let mut rig = Rig::bare(ControlOptions {
        default_ready_timeout_ms: 50,
    });
    rig.control
        .add_content_category(DRIVER, DISPLAY, category_info())
        .unwrap();
    rig.offer(NAV, 10);

    rig.control.request_ready_default(NAV).unwrap();
    assert_eq!(rig.tick(60), vec![]);
    assert_eq!(rig.tick(61), vec![timed_out(NAV)]);
}

#[test]
fn test_time_going_backwards_is_rejected() {
    let mut rig = Rig::new();
    rig.tick(20);
    let err = rig.control.update(10, &mut rig.app).unwrap_err();
    assert!(matches!(
        err,
        ControlError::TimeWentBackwards {
            now: 10,
            previous: 20
        }
    ));
    assert_eq!(rig.control.now(), 20);
    rig.tick(20);
}

#[test]
fn test_failed_update_keeps_the_clock() {
    let mut rig = Rig::new();
    rig.tick(10);

    rig.engine.set_local_consumer_availability(false).unwrap();
    let err = rig.control.update(500, &mut rig.app).unwrap_err();
    assert!(matches!(err, ControlError::Engine(_)));
    assert_eq!(rig.control.now(), 10);

    rig.engine.set_local_consumer_availability(true).unwrap();
    rig.tick(20);
    assert_eq!(rig.control.now(), 20);
}

#[test]
fn test_offer_waits_for_its_category() {
    let mut rig = Rig::bare(ControlOptions::default());
    rig.engine
        .offer(NAV, DRIVER, ContentType::SceneResource, "nav", true)
        .unwrap();
    assert_eq!(rig.tick(10), vec![]);
    assert_eq!(rig.engine.content_state(NAV), ContentState::Offered);
    assert_eq!(rig.control.content_state(NAV), PublishedState::Invalid);

    rig.control
        .add_content_category(DRIVER, DISPLAY, category_info())
        .unwrap();
    assert_eq!(rig.engine.content_state(NAV), ContentState::Assigned);
    assert_eq!(
        rig.tick(20),
        vec![ContentControlEvent::Available {
            content: NAV,
            category: DRIVER,
        }]
    );
}

#[test]
fn test_removed_category_hands_contents_back() {
    let mut rig = Rig::new();
    rig.offer(NAV, 10);
    rig.make_ready(NAV, 20);

    rig.control.remove_content_category(DRIVER).unwrap();
    assert_eq!(rig.engine.content_state(NAV), ContentState::Offered);
    assert_eq!(rig.control.content_state(NAV), PublishedState::Invalid);
    assert_eq!(rig.tick(30), vec![]);
    assert_eq!(rig.state_requests().last(), Some(&ResourceState::Available));

    rig.control
        .add_content_category(DRIVER, DISPLAY, category_info())
        .unwrap();
    assert_eq!(
        rig.tick(40),
        vec![ContentControlEvent::Available {
            content: NAV,
            category: DRIVER,
        }]
    );
    assert_eq!(rig.engine.content_state(NAV), ContentState::Assigned);
}

#[test]
fn test_category_validation() {
    let mut rig = Rig::new();
    assert!(matches!(
        rig.control
            .add_content_category(DRIVER, DISPLAY, category_info()),
        Err(ControlError::DuplicateCategory(c)) if c == DRIVER
    ));
    assert!(matches!(
        rig.control.add_content_category(
            stageproto::Category::new(11),
            DISPLAY,
            CategoryInfo::default()
        ),
        Err(ControlError::IncompleteCategoryInfo(_))
    ));
    assert!(matches!(
        rig.control
            .remove_content_category(stageproto::Category::new(12)),
        Err(ControlError::UnknownCategory(_))
    ));
}

#[test]
fn test_category_info_change_reaches_provider() {
    let mut rig = Rig::new();
    rig.offer(NAV, 10);
    provider_events(&rig.engine);

    let update = CategoryInfo {
        render_size: Some(Size::new(800, 480)),
        ..Default::default()
    };
    let animation = AnimationWindow::new(100, 200);
    rig.control
        .set_category_info(DRIVER, update, animation)
        .unwrap();
    assert_eq!(
        provider_events(&rig.engine),
        vec![ProviderEvent::CanvasSizeChange {
            content: NAV,
            category_info: update,
            animation,
            consumer: LOCAL,
        }]
    );
}

#[test]
fn test_force_stop_reports_not_available() {
    let mut rig = Rig::new();
    rig.offer(NAV, 10);
    rig.make_ready(NAV, 20);

    rig.engine.force_stop_offer(NAV).unwrap();
    assert_eq!(
        rig.tick(30),
        vec![ContentControlEvent::NotAvailable { content: NAV }]
    );
    assert_eq!(rig.control.content_state(NAV), PublishedState::Invalid);
    assert_eq!(
        rig.state_requests(),
        vec![ResourceState::Ready, ResourceState::Available]
    );
    assert!(matches!(
        rig.control.request_ready(NAV, 0),
        Err(ControlError::UnknownContent(_))
    ));
}

#[test]
fn test_stop_offer_request_and_accept() {
    let mut rig = Rig::new();
    rig.offer(NAV, 10);
    rig.make_ready(NAV, 20);
    provider_events(&rig.engine);

    rig.engine.request_stop_offer(NAV).unwrap();
    assert_eq!(
        rig.tick(30),
        vec![ContentControlEvent::StopOfferRequested { content: NAV }]
    );

    rig.control
        .accept_stop_offer(NAV, AnimationWindow::IMMEDIATE)
        .unwrap();
    assert_eq!(rig.engine.content_state(NAV), ContentState::Unknown);
    assert_eq!(rig.control.content_state(NAV), PublishedState::Invalid);
    assert_eq!(rig.tick(40), vec![]);
    assert_eq!(rig.state_requests().last(), Some(&ResourceState::Available));
}

#[test]
fn test_timeout_during_stop_offer_lets_resource_go() {
    let mut rig = Rig::new();
    rig.offer(NAV, 10);

    // provider never answers, then asks to withdraw
    rig.control.request_ready(NAV, 50).unwrap();
    rig.engine.request_stop_offer(NAV).unwrap();
    assert_eq!(
        rig.tick(30),
        vec![ContentControlEvent::StopOfferRequested { content: NAV }]
    );
    assert_eq!(rig.state_requests(), vec![ResourceState::Ready]);

    assert_eq!(rig.tick(61), vec![timed_out(NAV)]);
    assert_eq!(rig.engine.content_state(NAV), ContentState::StopOfferRequested);
    assert_eq!(
        rig.state_requests(),
        vec![ResourceState::Ready, ResourceState::Available]
    );

    rig.control
        .accept_stop_offer(NAV, AnimationWindow::IMMEDIATE)
        .unwrap();
    assert_eq!(rig.engine.content_state(NAV), ContentState::Unknown);
}

#[test]
fn test_two_contents_share_one_resource() {
    let mut rig = Rig::new();
    rig.engine
        .offer(NAV, DRIVER, ContentType::SceneResource, "nav", true)
        .unwrap();
    rig.engine
        .offer(MEDIA, DRIVER, ContentType::SceneResource, "media", true)
        .unwrap();
    rig.engine.describe(NAV, SCENE).unwrap();
    rig.engine.describe(MEDIA, SCENE).unwrap();
    rig.control
        .resources_mut()
        .report(SCENE, ResourceState::Available);
    assert_eq!(rig.tick(10).len(), 2);
    assert_eq!(rig.tick(10), vec![]);

    rig.control.request_ready(NAV, 0).unwrap();
    rig.control.request_ready(MEDIA, 0).unwrap();
    rig.provide();
    assert_eq!(rig.tick(20), vec![ready(NAV), ready(MEDIA)]);

    rig.control.show(NAV, AnimationWindow::IMMEDIATE).unwrap();
    assert_eq!(rig.tick(30), vec![]);
    assert_eq!(rig.tick(40), vec![ContentControlEvent::Shown { content: NAV }]);
    assert_eq!(rig.control.content_state(MEDIA), PublishedState::Ready);

    // the other content letting go does not pull the resource down
    rig.control
        .release(MEDIA, AnimationWindow::IMMEDIATE)
        .unwrap();
    assert_eq!(
        rig.tick(50),
        vec![ContentControlEvent::Available {
            content: MEDIA,
            category: DRIVER,
        }]
    );
    assert_eq!(
        rig.state_requests(),
        vec![ResourceState::Ready, ResourceState::Rendered]
    );
    let shared = rig.control.shared_state(SCENE).unwrap();
    assert_eq!(shared.consolidated_desired_state(), ResourceState::Rendered);
    assert_eq!(shared.reported_state(), ResourceState::Rendered);

    rig.control.hide(NAV, AnimationWindow::IMMEDIATE).unwrap();
    assert_eq!(rig.tick(60), vec![ready(NAV)]);
    assert_eq!(rig.tick(70), vec![]);
    assert_eq!(
        rig.state_requests(),
        vec![
            ResourceState::Ready,
            ResourceState::Rendered,
            ResourceState::Ready
        ]
    );
}

#[test]
fn test_hide_and_request_ready_preconditions() {
    let mut rig = Rig::new();
    rig.offer(NAV, 10);
    assert!(matches!(
        rig.control.hide(NAV, AnimationWindow::IMMEDIATE),
        Err(ControlError::InvalidRequest { .. })
    ));

    rig.make_ready(NAV, 20);
    // hiding something that is only ready changes nothing
    rig.control.hide(NAV, AnimationWindow::IMMEDIATE).unwrap();
    assert_eq!(rig.tick(30), vec![]);
    assert_eq!(rig.engine.content_state(NAV), ContentState::Ready);

    rig.control.show(NAV, AnimationWindow::IMMEDIATE).unwrap();
    rig.tick(40);
    assert_eq!(rig.tick(50), vec![ContentControlEvent::Shown { content: NAV }]);
    assert!(matches!(
        rig.control.request_ready(NAV, 0),
        Err(ControlError::InvalidRequest { .. })
    ));
    assert!(matches!(
        rig.control.request_ready(ContentId::new(999), 0),
        Err(ControlError::UnknownContent(_))
    ));
}

#[test]
fn test_surface_contents_are_not_controllable() {
    let mut rig = Rig::new();
    rig.engine
        .offer(MEDIA, DRIVER, ContentType::SurfaceResource, "camera", true)
        .unwrap();
    assert_eq!(
        rig.tick(10),
        vec![ContentControlEvent::Available {
            content: MEDIA,
            category: DRIVER,
        }]
    );
    assert!(matches!(
        rig.control.request_ready(MEDIA, 0),
        Err(ControlError::UnsupportedContentType { .. })
    ));
}

#[test]
fn test_buffers_links_and_picking() {
    let mut rig = Rig::new();
    rig.offer(NAV, 10);
    let buffer = DisplayBufferId(5);
    assert!(matches!(
        rig.control.assign_to_display_buffer(NAV, buffer, 2),
        Err(ControlError::NotReady { .. })
    ));
    assert!(matches!(
        rig.control
            .link_content_to_texture_consumer(NAV, NAV, DataSlotId(3)),
        Err(ControlError::NotReady { .. })
    ));

    rig.make_ready(NAV, 20);
    rig.control.resources_mut().take_calls();
    rig.control.assign_to_display_buffer(NAV, buffer, 2).unwrap();
    rig.control
        .link_content_to_texture_consumer(NAV, NAV, DataSlotId(3))
        .unwrap();
    rig.control
        .link_data(NAV, DataSlotId(1), NAV, DataSlotId(2))
        .unwrap();
    rig.control.unlink_data(NAV, DataSlotId(2)).unwrap();
    rig.control.handle_pick_event(NAV, 0.5, 0.25).unwrap();
    assert_eq!(
        rig.control.resources_mut().take_calls(),
        vec![
            ResourceCall::BufferAssignment(SCENE, buffer, 2),
            ResourceCall::LinkOffscreen(buffer, SCENE, DataSlotId(3)),
            ResourceCall::LinkData(SCENE, DataSlotId(1), SCENE, DataSlotId(2)),
            ResourceCall::Unlink(SCENE, DataSlotId(2)),
            ResourceCall::Pick(SCENE),
        ]
    );

    let resources = rig.control.resources_mut();
    resources.push(ResourceEvent::OffscreenBufferLinked {
        buffer,
        consumer: SCENE,
        consumer_slot: DataSlotId(3),
        success: true,
    });
    resources.push(ResourceEvent::ObjectsPicked {
        resource: SCENE,
        objects: vec![PickableObjectId(9)],
    });
    resources.push(ResourceEvent::Flushed {
        resource: SCENE,
        version: 4,
    });
    resources.push(ResourceEvent::StreamAvailabilityChanged {
        stream: StreamId(2),
        available: true,
    });
    assert_eq!(
        rig.tick(30),
        vec![
            ContentControlEvent::OffscreenBufferLinked {
                buffer,
                consumer: NAV,
                consumer_slot: DataSlotId(3),
                success: true,
            },
            ContentControlEvent::ObjectsPicked {
                content: NAV,
                objects: vec![PickableObjectId(9)],
            },
            ContentControlEvent::Flushed {
                content: NAV,
                version: 4,
            },
            ContentControlEvent::StreamAvailabilityChanged {
                stream: StreamId(2),
                available: true,
            },
        ]
    );
}

#[test]
fn test_metadata_and_focus_pass_through() {
    let mut rig = Rig::new();
    rig.offer(NAV, 10);

    let metadata = ContentMetadata {
        widget_order: Some(3),
        ..Default::default()
    };
    rig.engine.update_metadata(NAV, metadata.clone()).unwrap();
    rig.engine.enable_focus_request(NAV, 1).unwrap();
    assert_eq!(
        rig.tick(20),
        vec![
            ContentControlEvent::MetadataUpdated {
                content: NAV,
                metadata,
            },
            ContentControlEvent::EnableFocusRequest {
                content: NAV,
                request: 1,
            },
        ]
    );
}
