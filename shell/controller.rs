/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! View lifecycle orchestration.
//!
//! Everything here runs on the controller's single event loop turn:
//! commands from the UI collaborator, semantic events from the surface
//! adapters, and the tick that paces restore retries. Registry mutations
//! are therefore serialized; the only state shared with other threads is
//! the blocker (atomics plus the rule set behind its lock).

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use url::Url;

use crate::blocker::engine::BlockDecisionEngine;
use crate::blocker::rules::{DomainBlockRules, host_matches_any, hostname_of};
use crate::comms::{UiCommand, UiEvent, UiReply};
use crate::prefs::AppPreferences;
use crate::registry::{PageId, ViewKey, ViewRegistry, WorkspaceId};
use crate::session::restore::RestoreMachine;
use crate::session::{CapturedPageState, capture};
use crate::shell::SystemHandoff;
use crate::surface::net_errors::{
    error_name, is_auth_blocked_error, is_connection_security_error,
};
use crate::surface::{SurfaceEvent, SurfaceFactory};

/// Identity providers whose multi-step flows check real window properties;
/// their popups open as separate native windows instead of being flattened.
const OAUTH_POPUP_ALLOWLIST: &[&str] = &[
    "accounts.google.com",
    "login.microsoftonline.com",
    "login.live.com",
    "appleid.apple.com",
    "github.com",
    "gitlab.com",
    "auth0.com",
    "okta.com",
];

/// Identity providers known to refuse embedded contexts outright. A blocked
/// load failure on these hands the URL to the system default browser.
const AUTH_HANDOFF_DOMAINS: &[&str] = &[
    "accounts.google.com",
    "login.microsoftonline.com",
    "login.live.com",
    "appleid.apple.com",
    "id.atlassian.com",
    "login.yahoo.com",
];

/// What became of a popup request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupDecision {
    /// Blocked outright (evasion shape or blocklisted target).
    Denied,
    /// Allow-listed identity provider: opened as a real native window.
    OpenedNativeWindow,
    /// Everything else: the requesting surface navigates there itself.
    /// There is no user-facing tab or window concept to open into.
    Flattened,
}

pub struct ViewLifecycleController {
    registry: ViewRegistry,
    blocker: Arc<BlockDecisionEngine>,
    block_rules: DomainBlockRules,
    restores: HashMap<ViewKey, RestoreMachine>,
    pending_events: Vec<UiEvent>,
    factory: Rc<dyn SurfaceFactory>,
    handoff: Box<dyn SystemHandoff>,
}

impl ViewLifecycleController {
    pub fn new(
        factory: Rc<dyn SurfaceFactory>,
        handoff: Box<dyn SystemHandoff>,
        prefs: &AppPreferences,
    ) -> Self {
        let block_rules =
            DomainBlockRules::new(prefs.blocklist_cache_path(), prefs.blocklist_url.clone());
        block_rules.bootstrap();
        block_rules.load_cache();
        if prefs.refresh_blocklist_on_startup {
            block_rules.spawn_refresh();
        }
        let blocker = Arc::new(BlockDecisionEngine::new(
            block_rules.shared(),
            prefs.blocker_enabled,
        ));
        let registry = ViewRegistry::new(factory.clone(), blocker.clone());
        Self {
            registry,
            blocker,
            block_rules,
            restores: HashMap::new(),
            pending_events: Vec::new(),
            factory,
            handoff,
        }
    }

    pub fn registry(&self) -> &ViewRegistry {
        &self.registry
    }

    pub fn blocker(&self) -> &BlockDecisionEngine {
        &self.blocker
    }

    /// The blocked-domain store, for hosts that want to trigger a manual
    /// refresh beyond the startup one.
    pub fn block_rules(&self) -> &DomainBlockRules {
        &self.block_rules
    }

    /// Drain events queued for the UI collaborator.
    pub fn take_pending_events(&mut self) -> Vec<UiEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Handle one UI command. Query-shaped commands return a reply.
    pub fn handle_command(&mut self, command: UiCommand) -> Option<UiReply> {
        match command {
            UiCommand::CreateView {
                workspace_id,
                page_id,
                url,
                state,
            } => {
                self.create_view(workspace_id, page_id, &url, state);
                None
            },
            UiCommand::SelectView {
                workspace_id,
                page_id,
                url,
                state,
            } => {
                self.select_view(workspace_id, page_id, url.as_deref(), state);
                None
            },
            UiCommand::ResizeView {
                bounds,
                workspace_id,
                page_id,
            } => {
                let key = match (workspace_id, page_id) {
                    (Some(workspace), Some(page)) => Some(ViewKey::new(workspace, page)),
                    (None, None) => None,
                    _ => {
                        warn!("resize with a partial view key; targeting the active view");
                        None
                    },
                };
                self.registry.resize(bounds.into(), key);
                None
            },
            UiCommand::RemoveView {
                workspace_id,
                page_id,
            } => {
                self.remove_view(ViewKey::new(workspace_id, page_id));
                None
            },
            UiCommand::RemoveWorkspaceViews { workspace_id } => {
                self.remove_workspace_views(workspace_id);
                None
            },
            UiCommand::CaptureState {
                workspace_id,
                page_id,
            } => {
                let state = self.capture_state(ViewKey::new(workspace_id, page_id));
                Some(UiReply::CapturedState { state })
            },
            UiCommand::RestoreState {
                workspace_id,
                page_id,
                state,
            } => {
                self.restore_state(ViewKey::new(workspace_id, page_id), state);
                None
            },
            UiCommand::GetBlockerStatus => Some(UiReply::BlockerStatus {
                status: self.blocker.status(),
            }),
            UiCommand::ToggleBlocker => Some(UiReply::BlockerEnabled {
                is_enabled: self.blocker.toggle(),
            }),
            UiCommand::Back => {
                if let Some(handle) = self.registry.active_handle_mut() {
                    handle.surface_mut().go_back();
                }
                None
            },
            UiCommand::Forward => {
                if let Some(handle) = self.registry.active_handle_mut() {
                    handle.surface_mut().go_forward();
                }
                None
            },
            UiCommand::Reload => {
                if let Some(handle) = self.registry.active_handle_mut() {
                    handle.surface_mut().reload();
                }
                None
            },
            UiCommand::CaptureScreenshot => {
                let png = self
                    .registry
                    .active_handle_mut()
                    .and_then(|handle| handle.surface().capture_screenshot().ok());
                Some(UiReply::Screenshot { png })
            },
            UiCommand::GetHtml => {
                let html = self
                    .registry
                    .active_handle_mut()
                    .and_then(|handle| handle.surface().capture_html().ok());
                Some(UiReply::Html { html })
            },
            UiCommand::ToggleDevtools => {
                if let Some(handle) = self.registry.active_handle_mut() {
                    handle.surface_mut().toggle_devtools();
                }
                None
            },
            UiCommand::AllowInsecure {
                workspace_id,
                page_id,
            } => {
                self.allow_insecure(ViewKey::new(workspace_id, page_id));
                None
            },
            UiCommand::DismissInterstitial {
                workspace_id,
                page_id,
            } => {
                self.dismiss_interstitial(ViewKey::new(workspace_id, page_id));
                None
            },
        }
    }

    /// Handle one semantic event from a surface adapter.
    pub fn on_surface_event(&mut self, key: ViewKey, event: SurfaceEvent) {
        match event {
            SurfaceEvent::LoadFinished => self.on_load_finished(key),
            SurfaceEvent::LoadFailed {
                code,
                url,
                is_main_frame,
            } => self.on_load_failed(key, code, &url, is_main_frame),
            SurfaceEvent::UrlChanged { url } => {
                if let Some(handle) = self.registry.get_mut(key) {
                    handle.set_url(url.clone());
                    self.pending_events.push(UiEvent::ViewUrlUpdated {
                        workspace_id: key.workspace,
                        page_id: key.page,
                        url,
                    });
                }
            },
            SurfaceEvent::TitleChanged { title } => {
                if let Some(handle) = self.registry.get_mut(key) {
                    handle.set_title(Some(title.clone()));
                    self.pending_events.push(UiEvent::ViewTitleUpdated {
                        workspace_id: key.workspace,
                        page_id: key.page,
                        title,
                    });
                }
            },
            SurfaceEvent::PopupRequested { target_url } => {
                self.handle_popup(key, &target_url);
            },
            SurfaceEvent::FullscreenChanged { is_fullscreen } => {
                self.on_fullscreen_changed(key, is_fullscreen);
            },
            SurfaceEvent::FrameRendered => {
                if let Some(machine) = self.restores.get_mut(&key) {
                    machine.on_frame();
                }
                self.pump_restore(key, Instant::now());
            },
        }
    }

    /// Pace pending restore machines (pixel retry delays). Call once per
    /// event loop turn.
    pub fn tick(&mut self, now: Instant) {
        let keys: Vec<ViewKey> = self.restores.keys().copied().collect();
        for key in keys {
            self.pump_restore(key, now);
        }
    }

    pub fn create_view(
        &mut self,
        workspace: WorkspaceId,
        page: PageId,
        url: &str,
        state: Option<CapturedPageState>,
    ) {
        let key = ViewKey::new(workspace, page);
        if self.registry.contains(key) {
            // Idempotent: the second create behaves as a select, keeping
            // the outgoing-capture ordering of the select path.
            if let Some(state) = state
                && let Some(handle) = self.registry.get_mut(key)
            {
                handle.set_pending_restore(state);
            }
            self.select_view(workspace, Some(page), None, None);
            return;
        }
        self.registry.create(key, url, state);
    }

    pub fn select_view(
        &mut self,
        workspace: WorkspaceId,
        page: Option<PageId>,
        url: Option<&str>,
        state: Option<CapturedPageState>,
    ) {
        let incoming = page.map(|page| ViewKey::new(workspace, page));
        if let Some(outgoing) = self.registry.active_key()
            && Some(outgoing) != incoming
        {
            // The outgoing capture completes (or is abandoned) before the
            // incoming selection begins, so it can not read the wrong
            // page's position.
            if let Some(handle) = self.registry.get_mut(outgoing) {
                let captured = capture::capture(handle.surface());
                handle.set_last_capture(captured);
            }
        }
        self.registry.select(workspace, page, url, state);
    }

    pub fn remove_view(&mut self, key: ViewKey) {
        self.restores.remove(&key);
        self.registry.remove(key);
    }

    pub fn remove_workspace_views(&mut self, workspace: WorkspaceId) {
        self.restores.retain(|key, _| key.workspace != workspace);
        let removed = self.registry.remove_all(workspace);
        debug!("removed {removed} views of workspace {workspace}");
    }

    /// Snapshot the page's current reading position. Falls back to the last
    /// capture taken when the page lost visibility.
    pub fn capture_state(&mut self, key: ViewKey) -> Option<CapturedPageState> {
        let handle = self.registry.get_mut(key)?;
        let captured = capture::capture(handle.surface());
        handle.set_last_capture(captured.clone());
        captured.or_else(|| handle.last_capture().cloned())
    }

    /// Queue `state` for restoration and reload the page so the load-finish
    /// path consumes it.
    pub fn restore_state(&mut self, key: ViewKey, state: CapturedPageState) {
        let Some(handle) = self.registry.get_mut(key) else {
            warn!("restore for unknown view {key:?}; ignoring");
            return;
        };
        handle.set_pending_restore(state);
        handle.surface_mut().reload();
    }

    fn on_load_finished(&mut self, key: ViewKey) {
        let Some(handle) = self.registry.get_mut(key) else {
            return;
        };
        // Restoration begins only on this surface's own load-finish, never
        // speculatively, and only when a pending state is attached.
        if let Some(pending) = handle.pending_restore() {
            self.restores.insert(
                key,
                RestoreMachine::new(pending.state.clone(), pending.origin_url.clone()),
            );
        }
    }

    fn on_load_failed(&mut self, key: ViewKey, code: i32, failed_url: &str, is_main_frame: bool) {
        if !is_main_frame {
            // Subframe failures are routine (blocked trackers among them)
            // and never raise interstitials or handoffs.
            return;
        }
        let failed_host = hostname_of(failed_url);
        if let Some(host) = &failed_host
            && host_matches_any(host, AUTH_HANDOFF_DOMAINS)
            && is_auth_blocked_error(code)
        {
            info!(
                "auth provider {host} refused the embedded context ({}); opening externally",
                error_name(code)
            );
            self.handoff.open_in_default_browser(failed_url);
            return;
        }
        if is_connection_security_error(code) {
            if self.registry.active_key() == Some(key) {
                self.registry.deactivate_current();
            }
            if let Some(handle) = self.registry.get_mut(key) {
                handle.set_interstitial(true);
            }
            self.pending_events.push(UiEvent::LoadInterstitial {
                url: failed_url.to_string(),
                error: error_name(code).to_string(),
                original_url: insecure_variant(failed_url)
                    .unwrap_or_else(|| failed_url.to_string()),
            });
            return;
        }
        debug!("unhandled main-frame load failure {code} for {failed_url}");
    }

    pub(crate) fn handle_popup(&mut self, key: ViewKey, target_url: &str) -> PopupDecision {
        if self.blocker.should_block_popup(target_url) {
            debug!("denied popup to {target_url:?}");
            return PopupDecision::Denied;
        }
        if let Some(host) = hostname_of(target_url)
            && host_matches_any(&host, OAUTH_POPUP_ALLOWLIST)
        {
            self.factory.open_native_window(target_url);
            return PopupDecision::OpenedNativeWindow;
        }
        if let Some(handle) = self.registry.get_mut(key) {
            handle.surface_mut().navigate(target_url);
        }
        PopupDecision::Flattened
    }

    fn on_fullscreen_changed(&mut self, key: ViewKey, is_fullscreen: bool) {
        let window_bounds = self.factory.window_bounds();
        let Some(handle) = self.registry.get_mut(key) else {
            return;
        };
        if is_fullscreen {
            handle.save_pre_fullscreen_bounds();
            handle.surface_mut().set_bounds(window_bounds);
        } else {
            // The exact tracked bounds, not a recomputed layout: no jump.
            let bounds = handle.take_pre_fullscreen_bounds().unwrap_or(handle.bounds());
            handle.surface_mut().set_bounds(bounds);
        }
        self.pending_events.push(UiEvent::FullscreenChanged {
            page_id: key.page,
            is_fullscreen,
        });
    }

    fn allow_insecure(&mut self, key: ViewKey) {
        let Some(handle) = self.registry.get_mut(key) else {
            return;
        };
        handle.set_interstitial(false);
        let retry_url =
            insecure_variant(handle.url()).unwrap_or_else(|| handle.url().to_string());
        handle.set_url(retry_url.clone());
        handle.surface_mut().navigate(&retry_url);
        self.select_view(key.workspace, Some(key.page), None, None);
    }

    fn dismiss_interstitial(&mut self, key: ViewKey) {
        let Some(handle) = self.registry.get_mut(key) else {
            return;
        };
        handle.set_interstitial(false);
        handle.surface_mut().go_back();
        self.select_view(key.workspace, Some(key.page), None, None);
    }

    fn pump_restore(&mut self, key: ViewKey, now: Instant) {
        if !self.restores.contains_key(&key) {
            return;
        }
        let Some(handle) = self.registry.get_mut(key) else {
            // The view died mid-restore; drop the machine with it.
            self.restores.remove(&key);
            return;
        };
        let Some(machine) = self.restores.get_mut(&key) else {
            return;
        };
        if let Some(outcome) = machine.poll(handle.surface_mut(), now) {
            handle.clear_pending_restore();
            self.restores.remove(&key);
            self.pending_events.push(UiEvent::RestoreResult {
                page_id: key.page,
                method: outcome.method,
                success: outcome.success,
                message: outcome.message,
            });
        }
    }
}

/// Plain-http variant of an https URL, for the "allow insecure and retry"
/// interstitial choice.
fn insecure_variant(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    if parsed.scheme() != "https" {
        return None;
    }
    parsed.set_scheme("http").ok()?;
    Some(parsed.to_string())
}
