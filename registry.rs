/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The owning map of rendering surfaces, keyed by workspace and page.
//!
//! At most one handle is "active" (attached to the window, receiving input)
//! at any instant. All activation goes through a single
//! deactivate-then-activate path; callers never toggle attachment on
//! surfaces directly.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::{CapturedPageState, PendingRestore};
use crate::surface::{RenderSurface, RequestInterceptor, SurfaceFactory, SurfaceRect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub Uuid);

impl WorkspaceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkspaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Registry key: one page of one workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewKey {
    pub workspace: WorkspaceId,
    pub page: PageId,
}

impl ViewKey {
    pub fn new(workspace: WorkspaceId, page: PageId) -> Self {
        Self { workspace, page }
    }
}

/// One live rendering surface and its bookkeeping.
pub struct ViewHandle {
    key: ViewKey,
    url: String,
    title: Option<String>,
    bounds: SurfaceRect,
    pending_restore: Option<PendingRestore>,
    /// Most recent capture taken when this page lost visibility. Served to
    /// the persistence collaborator on request.
    last_capture: Option<CapturedPageState>,
    /// Set while a blocking security interstitial covers this page. An
    /// interstitialed handle refuses re-attachment until the user decides.
    interstitial: bool,
    backgrounded_since: Option<Instant>,
    /// Exact bounds to restore when fullscreen ends.
    pre_fullscreen_bounds: Option<SurfaceRect>,
    surface: Box<dyn RenderSurface>,
}

impl ViewHandle {
    pub fn key(&self) -> ViewKey {
        self.key
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn set_url(&mut self, url: String) {
        self.url = url;
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub(crate) fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }

    pub fn bounds(&self) -> SurfaceRect {
        self.bounds
    }

    pub fn is_interstitial(&self) -> bool {
        self.interstitial
    }

    pub(crate) fn set_interstitial(&mut self, interstitial: bool) {
        self.interstitial = interstitial;
    }

    pub fn backgrounded_since(&self) -> Option<Instant> {
        self.backgrounded_since
    }

    pub fn pending_restore(&self) -> Option<&PendingRestore> {
        self.pending_restore.as_ref()
    }

    pub(crate) fn set_pending_restore(&mut self, state: CapturedPageState) {
        self.pending_restore = Some(PendingRestore {
            state,
            origin_url: self.url.clone(),
        });
    }

    pub(crate) fn clear_pending_restore(&mut self) {
        self.pending_restore = None;
    }

    pub(crate) fn last_capture(&self) -> Option<&CapturedPageState> {
        self.last_capture.as_ref()
    }

    pub(crate) fn set_last_capture(&mut self, capture: Option<CapturedPageState>) {
        if capture.is_some() {
            self.last_capture = capture;
        }
    }

    pub(crate) fn save_pre_fullscreen_bounds(&mut self) {
        self.pre_fullscreen_bounds = Some(self.bounds);
    }

    pub(crate) fn take_pre_fullscreen_bounds(&mut self) -> Option<SurfaceRect> {
        self.pre_fullscreen_bounds.take()
    }

    pub fn surface(&self) -> &dyn RenderSurface {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> &mut dyn RenderSurface {
        self.surface.as_mut()
    }
}

/// Owning map of workspace/page keys to view handles, plus the single
/// active-handle pointer.
pub struct ViewRegistry {
    handles: HashMap<ViewKey, ViewHandle>,
    active: Option<ViewKey>,
    factory: Rc<dyn SurfaceFactory>,
    request_hook: Arc<dyn RequestInterceptor>,
}

impl ViewRegistry {
    pub fn new(factory: Rc<dyn SurfaceFactory>, request_hook: Arc<dyn RequestInterceptor>) -> Self {
        Self {
            handles: HashMap::new(),
            active: None,
            factory,
            request_hook,
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn contains(&self, key: ViewKey) -> bool {
        self.handles.contains_key(&key)
    }

    pub fn get(&self, key: ViewKey) -> Option<&ViewHandle> {
        self.handles.get(&key)
    }

    pub fn get_mut(&mut self, key: ViewKey) -> Option<&mut ViewHandle> {
        self.handles.get_mut(&key)
    }

    pub fn active_key(&self) -> Option<ViewKey> {
        self.active
    }

    pub fn active_handle_mut(&mut self) -> Option<&mut ViewHandle> {
        let key = self.active?;
        self.handles.get_mut(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = ViewKey> + '_ {
        self.handles.keys().copied()
    }

    /// How many surfaces are currently attached to the window. The registry
    /// invariant keeps this at zero or one.
    pub fn attached_count(&self) -> usize {
        self.handles
            .values()
            .filter(|handle| handle.surface.is_attached())
            .count()
    }

    /// Allocate a surface for `key` and begin navigating it, without
    /// activating it. Idempotent: when a handle already exists the call
    /// degenerates into a select, overwriting its pending state if one was
    /// supplied, and no second surface is created. Returns whether a new
    /// handle was created.
    pub fn create(
        &mut self,
        key: ViewKey,
        url: &str,
        pending: Option<CapturedPageState>,
    ) -> bool {
        if let Some(handle) = self.handles.get_mut(&key) {
            if let Some(state) = pending {
                handle.set_pending_restore(state);
            }
            debug!("create for existing view {key:?} degenerates to select");
            self.deactivate_current();
            self.activate(key);
            return false;
        }

        let mut surface = self
            .factory
            .create_surface(url, self.request_hook.clone());
        let bounds = self.factory.window_bounds();
        surface.set_bounds(bounds);
        let handle = ViewHandle {
            key,
            url: url.to_string(),
            title: None,
            bounds,
            pending_restore: pending.map(|state| PendingRestore {
                state,
                origin_url: url.to_string(),
            }),
            last_capture: None,
            interstitial: false,
            backgrounded_since: None,
            pre_fullscreen_bounds: None,
            surface,
        };
        self.handles.insert(key, handle);
        true
    }

    /// Make `page` the visible, input-receiving view of the window. Always
    /// deactivates the current view first; `page = None` stops there (the
    /// workspace overview shows no surface). An unknown key with a `url`
    /// creates the handle lazily.
    pub fn select(
        &mut self,
        workspace: WorkspaceId,
        page: Option<PageId>,
        url: Option<&str>,
        state: Option<CapturedPageState>,
    ) {
        self.deactivate_current();
        let Some(page) = page else {
            return;
        };
        let key = ViewKey::new(workspace, page);

        if !self.handles.contains_key(&key) {
            let Some(url) = url else {
                warn!("select for unknown view {key:?} without a url; ignoring");
                return;
            };
            self.create(key, url, state);
        } else if let Some(state) = state
            && let Some(handle) = self.handles.get_mut(&key)
        {
            handle.set_pending_restore(state);
        }

        self.activate(key);
    }

    /// Apply bounds to a specific handle, or to the active one when no key
    /// is given.
    pub fn resize(&mut self, bounds: SurfaceRect, key: Option<ViewKey>) {
        let target = key.or(self.active);
        let Some(target) = target else {
            return;
        };
        if let Some(handle) = self.handles.get_mut(&target) {
            handle.bounds = bounds;
            handle.surface.set_bounds(bounds);
        }
    }

    /// Destroy the surface for `key` and drop the entry. Deactivates first
    /// when it is the active view.
    pub fn remove(&mut self, key: ViewKey) -> bool {
        if self.active == Some(key) {
            self.deactivate_current();
        }
        self.handles.remove(&key).is_some()
    }

    /// Destroy every handle under a workspace. Returns how many were
    /// removed. The active pointer never survives pointing at a removed
    /// entry.
    pub fn remove_all(&mut self, workspace: WorkspaceId) -> usize {
        let keys: Vec<ViewKey> = self
            .handles
            .keys()
            .copied()
            .filter(|key| key.workspace == workspace)
            .collect();
        let mut removed = 0;
        for key in keys {
            if self.remove(key) {
                removed += 1;
            }
        }
        removed
    }

    /// Detach the active surface, if any, leaving no view attached.
    pub fn deactivate_current(&mut self) {
        if let Some(key) = self.active.take()
            && let Some(handle) = self.handles.get_mut(&key)
        {
            handle.surface.detach();
            handle.backgrounded_since = Some(Instant::now());
        }
    }

    /// Attach `key` and mark it active. Callers must have deactivated the
    /// previous view already; this is the only place a surface is attached.
    fn activate(&mut self, key: ViewKey) {
        debug_assert!(self.active.is_none(), "activate without deactivate");
        let Some(handle) = self.handles.get_mut(&key) else {
            return;
        };
        if handle.interstitial {
            // The interstitial overlay owns this slot until the user
            // decides; a stray select must not un-hide the page under it.
            debug!("refusing to activate interstitialed view {key:?}");
            return;
        }
        handle.surface.attach();
        handle.backgrounded_since = None;
        self.active = Some(key);
    }
}

#[cfg(test)]
mod tests {
    use euclid::default::{Point2D, Rect, Size2D};

    use super::*;
    use crate::testing::{AllowAllHook, FakeSurfaceFactory};

    fn registry() -> (Rc<FakeSurfaceFactory>, ViewRegistry) {
        let factory = Rc::new(FakeSurfaceFactory::new());
        let registry = ViewRegistry::new(factory.clone(), Arc::new(AllowAllHook));
        (factory, registry)
    }

    fn key() -> ViewKey {
        ViewKey::new(WorkspaceId::new(), PageId::new())
    }

    #[test]
    fn test_create_is_idempotent_and_does_not_renavigate() {
        let (factory, mut registry) = registry();
        let key = key();
        assert!(registry.create(key, "https://a.example/", None));
        assert!(!registry.create(key, "https://a.example/", None));
        assert_eq!(registry.len(), 1);
        assert_eq!(factory.created_count(), 1);
        let surface = factory.surface_for("https://a.example/").expect("surface");
        assert!(surface.navigations().is_empty(), "no re-navigation");
        // The second create behaved as a select.
        assert_eq!(registry.active_key(), Some(key));
    }

    #[test]
    fn test_create_existing_overwrites_pending_state() {
        let (_factory, mut registry) = registry();
        let key = key();
        registry.create(key, "https://a.example/", None);
        let state = CapturedPageState {
            scroll_y: 77.0,
            ..CapturedPageState::default()
        };
        registry.create(key, "https://a.example/", Some(state));
        let pending = registry.get(key).and_then(ViewHandle::pending_restore);
        assert_eq!(pending.expect("pending").state.scroll_y, 77.0);
    }

    #[test]
    fn test_at_most_one_handle_is_attached_across_any_sequence() {
        let (_factory, mut registry) = registry();
        let w1 = WorkspaceId::new();
        let w2 = WorkspaceId::new();
        let pages: Vec<PageId> = (0..4).map(|_| PageId::new()).collect();

        registry.create(ViewKey::new(w1, pages[0]), "https://a.example/", None);
        registry.select(w1, Some(pages[0]), None, None);
        registry.select(w1, Some(pages[1]), Some("https://b.example/"), None);
        registry.select(w2, Some(pages[2]), Some("https://c.example/"), None);
        registry.create(ViewKey::new(w2, pages[3]), "https://d.example/", None);
        registry.select(w2, Some(pages[3]), None, None);

        assert_eq!(registry.attached_count(), 1);
        assert_eq!(
            registry.active_key(),
            Some(ViewKey::new(w2, pages[3]))
        );

        registry.select(w2, None, None, None);
        assert_eq!(registry.attached_count(), 0);
        assert_eq!(registry.active_key(), None);
    }

    #[test]
    fn test_select_lazily_creates_with_pending_state() {
        let (factory, mut registry) = registry();
        let workspace = WorkspaceId::new();
        let page = PageId::new();
        let state = CapturedPageState {
            scroll_y: 1200.0,
            ..CapturedPageState::default()
        };
        registry.select(workspace, Some(page), Some("https://lazy.example/"), Some(state));

        let key = ViewKey::new(workspace, page);
        assert!(registry.contains(key));
        assert_eq!(registry.active_key(), Some(key));
        assert_eq!(factory.created_count(), 1);
        let pending = registry.get(key).and_then(ViewHandle::pending_restore);
        assert_eq!(pending.expect("pending").origin_url, "https://lazy.example/");
    }

    #[test]
    fn test_deactivation_stamps_backgrounded_since() {
        let (_factory, mut registry) = registry();
        let workspace = WorkspaceId::new();
        let page = PageId::new();
        registry.select(workspace, Some(page), Some("https://a.example/"), None);
        let key = ViewKey::new(workspace, page);
        assert!(registry.get(key).expect("handle").backgrounded_since().is_none());

        registry.select(workspace, None, None, None);
        assert!(registry.get(key).expect("handle").backgrounded_since().is_some());

        registry.select(workspace, Some(page), None, None);
        assert!(registry.get(key).expect("handle").backgrounded_since().is_none());
    }

    #[test]
    fn test_remove_active_view_leaves_no_dangling_pointer() {
        let (_factory, mut registry) = registry();
        let workspace = WorkspaceId::new();
        let page = PageId::new();
        registry.select(workspace, Some(page), Some("https://a.example/"), None);
        assert!(registry.remove(ViewKey::new(workspace, page)));
        assert_eq!(registry.active_key(), None);
        assert_eq!(registry.attached_count(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_all_clears_only_that_workspace() {
        let (_factory, mut registry) = registry();
        let doomed = WorkspaceId::new();
        let kept = WorkspaceId::new();
        for n in 0..3 {
            registry.create(
                ViewKey::new(doomed, PageId::new()),
                &format!("https://doomed.example/{n}"),
                None,
            );
        }
        let kept_key = ViewKey::new(kept, PageId::new());
        registry.create(kept_key, "https://kept.example/", None);
        registry.select(kept_key.workspace, Some(kept_key.page), None, None);

        assert_eq!(registry.remove_all(doomed), 3);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.active_key(), Some(kept_key));
    }

    #[test]
    fn test_interstitialed_handle_refuses_reactivation() {
        let (_factory, mut registry) = registry();
        let workspace = WorkspaceId::new();
        let page = PageId::new();
        registry.select(workspace, Some(page), Some("https://a.example/"), None);
        let key = ViewKey::new(workspace, page);

        registry.deactivate_current();
        registry
            .get_mut(key)
            .expect("handle")
            .set_interstitial(true);

        registry.select(workspace, Some(page), None, None);
        assert_eq!(registry.active_key(), None);
        assert_eq!(registry.attached_count(), 0);
    }

    #[test]
    fn test_resize_targets_specific_or_active_handle() {
        let (_factory, mut registry) = registry();
        let workspace = WorkspaceId::new();
        let front = PageId::new();
        let back = PageId::new();
        registry.select(workspace, Some(front), Some("https://front.example/"), None);
        registry.create(ViewKey::new(workspace, back), "https://back.example/", None);
        registry.select(workspace, Some(front), None, None);

        let split: SurfaceRect = Rect::new(Point2D::new(640, 0), Size2D::new(640, 720));
        registry.resize(split, Some(ViewKey::new(workspace, back)));
        assert_eq!(registry.get(ViewKey::new(workspace, back)).expect("handle").bounds(), split);

        let full: SurfaceRect = Rect::new(Point2D::new(0, 0), Size2D::new(1280, 720));
        registry.resize(full, None);
        assert_eq!(
            registry.get(ViewKey::new(workspace, front)).expect("handle").bounds(),
            full
        );
    }
}
