/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! End-to-end scenarios driving the lifecycle controller through the typed
//! command/event boundary against scripted surfaces.

use std::rc::Rc;
use std::time::{Duration, Instant};

use flowdeck::ViewLifecycleController;
use flowdeck::comms::{UiCommand, UiEvent, UiReply};
use flowdeck::prefs::AppPreferences;
use flowdeck::registry::{PageId, ViewKey, WorkspaceId};
use flowdeck::session::{CapturedPageState, RestoreMethod};
use flowdeck::surface::{BlockElementProbe, SurfaceEvent};
use flowdeck::testing::{FakeSurface, FakeSurfaceFactory, RecordingHandoff};

const ARTICLE_URL: &str = "https://site.example/article";
const CHAPTER_TEXT: &str =
    "Chapter 3 begins here with a long winding discussion of everything that came before it";

fn controller() -> (
    Rc<FakeSurfaceFactory>,
    ViewLifecycleController,
    tempfile::TempDir,
) {
    let factory = Rc::new(FakeSurfaceFactory::new());
    let dir = tempfile::tempdir().expect("tempdir");
    let prefs = AppPreferences::for_testing(dir.path().to_path_buf());
    let controller = ViewLifecycleController::new(
        factory.clone(),
        Box::new(RecordingHandoff::new()),
        &prefs,
    );
    (factory, controller, dir)
}

fn open_article(
    controller: &mut ViewLifecycleController,
    factory: &FakeSurfaceFactory,
) -> (ViewKey, FakeSurface) {
    let workspace = WorkspaceId::new();
    let page = PageId::new();
    controller.handle_command(UiCommand::SelectView {
        workspace_id: workspace,
        page_id: Some(page),
        url: Some(ARTICLE_URL.into()),
        state: None,
    });
    let mut surface = factory.surface_for(ARTICLE_URL).expect("surface");
    surface.set_document(6800.0, 900.0);
    surface.push_element(BlockElementProbe {
        tag: "P".into(),
        text: CHAPTER_TEXT.into(),
        offset_top: 4212.0,
        bounding_top: 0.0,
    });
    (ViewKey::new(workspace, page), surface)
}

fn settle_and_drain(controller: &mut ViewLifecycleController, key: ViewKey) -> Vec<UiEvent> {
    controller.on_surface_event(key, SurfaceEvent::LoadFinished);
    controller.on_surface_event(key, SurfaceEvent::FrameRendered);
    controller.on_surface_event(key, SurfaceEvent::FrameRendered);
    controller.take_pending_events()
}

#[test]
fn end_to_end_capture_reload_and_anchor_restore() {
    let (factory, mut controller, _dir) = controller();
    let (key, mut surface) = open_article(&mut controller, &factory);
    surface.set_scroll(0.0, 4200.0);

    // Capture the reading position through the command boundary.
    let reply = controller.handle_command(UiCommand::CaptureState {
        workspace_id: key.workspace,
        page_id: key.page,
    });
    let Some(UiReply::CapturedState { state: Some(state) }) = reply else {
        panic!("expected a captured state, got {reply:?}");
    };
    assert_eq!(state.scroll_y, 4200.0);
    let anchor = state.anchor.clone().expect("anchor");
    assert_eq!(anchor.tag, "P");
    assert!(anchor.text.starts_with("Chapter 3 begins here"));
    assert_eq!(anchor.offset, -12.0);
    let ratio = state.scroll_ratio.expect("ratio");
    assert!((ratio - 4200.0 / 6800.0).abs() < 1e-9);

    // Simulate a restart: the view is torn down and recreated with the
    // captured state attached.
    controller.handle_command(UiCommand::RemoveView {
        workspace_id: key.workspace,
        page_id: key.page,
    });
    controller.handle_command(UiCommand::CreateView {
        workspace_id: key.workspace,
        page_id: key.page,
        url: ARTICLE_URL.into(),
        state: Some(state),
    });
    controller.handle_command(UiCommand::SelectView {
        workspace_id: key.workspace,
        page_id: Some(key.page),
        url: None,
        state: None,
    });

    let mut reloaded = factory.surface_for(ARTICLE_URL).expect("reloaded surface");
    reloaded.set_document(6800.0, 900.0);
    reloaded.push_element(BlockElementProbe {
        tag: "P".into(),
        text: CHAPTER_TEXT.into(),
        offset_top: 4212.0,
        bounding_top: 0.0,
    });

    let events = settle_and_drain(&mut controller, key);
    assert!(
        matches!(
            events.as_slice(),
            [UiEvent::RestoreResult {
                page_id,
                method: RestoreMethod::Anchor,
                success: true,
                ..
            }] if *page_id == key.page
        ),
        "unexpected events: {events:?}"
    );
    let (_, scroll_y) = reloaded.scroll_position();
    assert!(
        (scroll_y - 4200.0).abs() <= 2.0,
        "anchor restore landed at {scroll_y}"
    );
    assert!(
        controller
            .registry()
            .get(key)
            .expect("handle")
            .pending_restore()
            .is_none(),
        "pending state is consumed by the first restoration run"
    );
}

#[test]
fn cascade_falls_back_to_ratio_when_anchor_text_is_gone() {
    let (factory, mut controller, _dir) = controller();
    let (key, mut surface) = open_article(&mut controller, &factory);
    surface.clear_elements();

    controller.handle_command(UiCommand::RestoreState {
        workspace_id: key.workspace,
        page_id: key.page,
        state: CapturedPageState {
            scroll_y: 4200.0,
            scroll_ratio: Some(4200.0 / 6800.0),
            anchor: Some(flowdeck::PageAnchor {
                text: CHAPTER_TEXT.into(),
                tag: "P".into(),
                offset: -12.0,
            }),
            ..CapturedPageState::default()
        },
    });
    assert_eq!(surface.reload_count(), 1);

    let events = settle_and_drain(&mut controller, key);
    assert!(matches!(
        events.as_slice(),
        [UiEvent::RestoreResult {
            method: RestoreMethod::Ratio,
            success: true,
            ..
        }]
    ));
}

#[test]
fn redirected_page_aborts_restoration_without_scrolling() {
    let (factory, mut controller, _dir) = controller();
    let (key, mut surface) = open_article(&mut controller, &factory);

    controller.handle_command(UiCommand::RestoreState {
        workspace_id: key.workspace,
        page_id: key.page,
        state: CapturedPageState {
            scroll_y: 4200.0,
            scroll_ratio: Some(0.62),
            ..CapturedPageState::default()
        },
    });

    // The reload lands somewhere else entirely.
    surface.set_current_url("https://login.elsewhere.example/gate");
    controller.on_surface_event(
        key,
        SurfaceEvent::UrlChanged {
            url: "https://login.elsewhere.example/gate".into(),
        },
    );
    let events = settle_and_drain(&mut controller, key);

    let restore = events
        .iter()
        .find_map(|event| match event {
            UiEvent::RestoreResult {
                method,
                success,
                message,
                ..
            } => Some((*method, *success, message.clone())),
            _ => None,
        })
        .expect("restore result");
    assert_eq!(restore.0, RestoreMethod::None);
    assert!(!restore.1);
    assert_eq!(restore.2.as_deref(), Some("Page redirected"));
    assert!(surface.scroll_calls().is_empty());
}

#[test]
fn pixel_restore_stops_after_exactly_five_retries() {
    let (factory, mut controller, _dir) = controller();
    let (key, mut surface) = open_article(&mut controller, &factory);
    surface.set_document(12000.0, 900.0);
    surface.set_scroll_sticky(Some(0.0));

    controller.handle_command(UiCommand::RestoreState {
        workspace_id: key.workspace,
        page_id: key.page,
        state: CapturedPageState {
            scroll_y: 4200.0,
            ..CapturedPageState::default()
        },
    });
    let mut events = settle_and_drain(&mut controller, key);

    let t0 = Instant::now();
    let mut step = 0u32;
    while events.is_empty() && step < 60 {
        step += 1;
        controller.tick(t0 + Duration::from_millis(100) * step);
        events = controller.take_pending_events();
    }

    assert!(matches!(
        events.as_slice(),
        [UiEvent::RestoreResult {
            method: RestoreMethod::Top,
            success: false,
            ..
        }]
    ));
    // Initial attempt plus exactly five paced retries.
    assert_eq!(surface.scroll_calls().len(), 6);
}

#[test]
fn at_most_one_view_is_active_across_workspaces() {
    let (_factory, mut controller, _dir) = controller();
    let w1 = WorkspaceId::new();
    let w2 = WorkspaceId::new();
    let pages: Vec<PageId> = (0..4).map(|_| PageId::new()).collect();

    for (n, page) in pages.iter().enumerate() {
        let workspace = if n % 2 == 0 { w1 } else { w2 };
        controller.handle_command(UiCommand::SelectView {
            workspace_id: workspace,
            page_id: Some(*page),
            url: Some(format!("https://page{n}.example/")),
            state: None,
        });
        assert_eq!(controller.registry().attached_count(), 1);
    }

    // Overview: nothing attached, nothing active.
    controller.handle_command(UiCommand::SelectView {
        workspace_id: w1,
        page_id: None,
        url: None,
        state: None,
    });
    assert_eq!(controller.registry().attached_count(), 0);
    assert_eq!(controller.registry().active_key(), None);
    assert_eq!(controller.registry().len(), 4);
}

#[test]
fn create_view_twice_behaves_as_select() {
    let (factory, mut controller, _dir) = controller();
    let workspace = WorkspaceId::new();
    let page = PageId::new();
    for _ in 0..2 {
        controller.handle_command(UiCommand::CreateView {
            workspace_id: workspace,
            page_id: page,
            url: ARTICLE_URL.into(),
            state: None,
        });
    }
    assert_eq!(factory.created_count(), 1);
    assert_eq!(
        controller.registry().active_key(),
        Some(ViewKey::new(workspace, page))
    );
    let surface = factory.surface_for(ARTICLE_URL).expect("surface");
    assert!(surface.navigations().is_empty(), "no re-navigation");
}

#[test]
fn workspace_deletion_tears_down_every_view() {
    let (_factory, mut controller, _dir) = controller();
    let workspace = WorkspaceId::new();
    for n in 0..3 {
        controller.handle_command(UiCommand::SelectView {
            workspace_id: workspace,
            page_id: Some(PageId::new()),
            url: Some(format!("https://doc{n}.example/")),
            state: None,
        });
    }
    controller.handle_command(UiCommand::RemoveWorkspaceViews {
        workspace_id: workspace,
    });
    assert_eq!(controller.registry().len(), 0);
    assert_eq!(controller.registry().active_key(), None);
    assert_eq!(controller.registry().attached_count(), 0);
}

#[test]
fn popups_are_denied_flattened_or_opened_natively() {
    let (factory, mut controller, _dir) = controller();
    let (key, surface) = open_article(&mut controller, &factory);

    // Evasion-shaped popups never open.
    controller.on_surface_event(
        key,
        SurfaceEvent::PopupRequested {
            target_url: "about:blank".into(),
        },
    );
    assert_eq!(factory.created_count(), 1);
    assert!(surface.navigations().is_empty());

    // Identity providers get a real native window.
    controller.on_surface_event(
        key,
        SurfaceEvent::PopupRequested {
            target_url: "https://accounts.google.com/o/oauth2/v2/auth".into(),
        },
    );
    assert_eq!(
        factory.native_windows(),
        vec!["https://accounts.google.com/o/oauth2/v2/auth".to_string()]
    );

    // Everything else navigates the requesting page instead.
    controller.on_surface_event(
        key,
        SurfaceEvent::PopupRequested {
            target_url: "https://other.example/promo".into(),
        },
    );
    assert_eq!(
        surface.navigations(),
        vec!["https://other.example/promo".to_string()]
    );
    assert_eq!(factory.created_count(), 1, "no surface for a flattened popup");
}

#[test]
fn blocker_hook_protects_requests_from_the_first_navigation() {
    let (factory, mut controller, _dir) = controller();
    let (_key, surface) = open_article(&mut controller, &factory);

    // The bundled fallback list is live before any cache or network I/O.
    assert!(surface.request_blocked("https://doubleclick.net/instream/ad.js"));
    assert!(surface.request_blocked("https://stats.g.doubleclick.net/r/collect"));
    assert!(!surface.request_blocked("https://site.example/app.js"));
    assert!(!surface.request_blocked("not a url"));

    let reply = controller.handle_command(UiCommand::GetBlockerStatus);
    let Some(UiReply::BlockerStatus { status }) = reply else {
        panic!("expected blocker status, got {reply:?}");
    };
    assert!(status.is_enabled);
    assert_eq!(status.blocked_count, 2);

    let reply = controller.handle_command(UiCommand::ToggleBlocker);
    assert_eq!(reply, Some(UiReply::BlockerEnabled { is_enabled: false }));
    assert!(!surface.request_blocked("https://doubleclick.net/instream/ad.js"));
}

#[test]
fn navigation_passthroughs_act_on_the_active_view() {
    let (factory, mut controller, _dir) = controller();
    let (_key, surface) = open_article(&mut controller, &factory);

    controller.handle_command(UiCommand::Back);
    controller.handle_command(UiCommand::Forward);
    controller.handle_command(UiCommand::Reload);
    controller.handle_command(UiCommand::ToggleDevtools);
    assert_eq!(surface.back_count(), 1);
    assert_eq!(surface.forward_count(), 1);
    assert_eq!(surface.reload_count(), 1);
    assert_eq!(surface.devtools_toggles(), 1);

    let reply = controller.handle_command(UiCommand::GetHtml);
    let Some(UiReply::Html { html: Some(html) }) = reply else {
        panic!("expected html, got {reply:?}");
    };
    assert!(html.contains(ARTICLE_URL));
    let reply = controller.handle_command(UiCommand::CaptureScreenshot);
    assert!(matches!(reply, Some(UiReply::Screenshot { png: Some(_) })));
}
