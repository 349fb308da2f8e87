/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Scripted fakes for tests: a rendering surface with a configurable DOM
//! model, the factory that hands them out, and a recording system handoff.
//!
//! A [`FakeSurface`] clones share one underlying state, so a test can keep
//! a handle to a surface after its `Box` moved into the registry and
//! observe scrolls, navigations and bounds from outside.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use euclid::default::{Point2D, Rect, Size2D};

use crate::shell::SystemHandoff;
use crate::surface::{
    BlockElementProbe, FormFieldProbe, RenderSurface, RequestInterceptor, ScrollMetrics,
    SurfaceError, SurfaceFactory, SurfaceRect,
};

struct FakeSurfaceState {
    url: String,
    attached: bool,
    bounds: SurfaceRect,
    zoom: f64,
    document_height: f64,
    viewport_height: f64,
    scroll_x: f64,
    scroll_y: f64,
    /// When set, every scroll lands at this vertical offset instead of the
    /// requested one (a page that keeps snapping back).
    scroll_sticky: Option<f64>,
    fail_page_calls: bool,
    elements: Vec<BlockElementProbe>,
    form_fields: Vec<FormFieldProbe>,
    scroll_calls: Vec<(f64, f64)>,
    navigations: Vec<String>,
    applied_form_values: BTreeMap<String, String>,
    reload_count: usize,
    back_count: usize,
    forward_count: usize,
    devtools_toggles: usize,
    request_hook: Option<Arc<dyn RequestInterceptor>>,
}

/// A scripted in-memory rendering surface.
#[derive(Clone)]
pub struct FakeSurface {
    state: Rc<RefCell<FakeSurfaceState>>,
}

impl FakeSurface {
    pub fn new(url: &str) -> Self {
        Self {
            state: Rc::new(RefCell::new(FakeSurfaceState {
                url: url.to_string(),
                attached: false,
                bounds: Rect::new(Point2D::new(0, 0), Size2D::new(1280, 720)),
                zoom: 1.0,
                document_height: 0.0,
                viewport_height: 720.0,
                scroll_x: 0.0,
                scroll_y: 0.0,
                scroll_sticky: None,
                fail_page_calls: false,
                elements: Vec::new(),
                form_fields: Vec::new(),
                scroll_calls: Vec::new(),
                navigations: Vec::new(),
                applied_form_values: BTreeMap::new(),
                reload_count: 0,
                back_count: 0,
                forward_count: 0,
                devtools_toggles: 0,
                request_hook: None,
            })),
        }
    }

    fn with_hook(url: &str, hook: Arc<dyn RequestInterceptor>) -> Self {
        let surface = Self::new(url);
        surface.state.borrow_mut().request_hook = Some(hook);
        surface
    }

    // Scripting.

    pub fn set_document(&mut self, document_height: f64, viewport_height: f64) {
        let mut state = self.state.borrow_mut();
        state.document_height = document_height;
        state.viewport_height = viewport_height;
    }

    pub fn set_scroll(&mut self, x: f64, y: f64) {
        let mut state = self.state.borrow_mut();
        state.scroll_x = x;
        state.scroll_y = y;
    }

    pub fn set_scroll_sticky(&mut self, sticky: Option<f64>) {
        self.state.borrow_mut().scroll_sticky = sticky;
    }

    pub fn set_current_url(&mut self, url: &str) {
        self.state.borrow_mut().url = url.to_string();
    }

    pub fn push_element(&mut self, element: BlockElementProbe) {
        self.state.borrow_mut().elements.push(element);
    }

    pub fn clear_elements(&mut self) {
        self.state.borrow_mut().elements.clear();
    }

    pub fn push_form_field(&mut self, field: FormFieldProbe) {
        self.state.borrow_mut().form_fields.push(field);
    }

    pub fn fail_page_calls(&mut self, fail: bool) {
        self.state.borrow_mut().fail_page_calls = fail;
    }

    // Observation.

    pub fn scroll_position(&self) -> (f64, f64) {
        let state = self.state.borrow();
        (state.scroll_x, state.scroll_y)
    }

    pub fn scroll_calls(&self) -> Vec<(f64, f64)> {
        self.state.borrow().scroll_calls.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.borrow().navigations.clone()
    }

    pub fn zoom_factor_value(&self) -> f64 {
        self.state.borrow().zoom
    }

    pub fn bounds_value(&self) -> SurfaceRect {
        self.state.borrow().bounds
    }

    pub fn applied_form_values(&self) -> BTreeMap<String, String> {
        self.state.borrow().applied_form_values.clone()
    }

    pub fn reload_count(&self) -> usize {
        self.state.borrow().reload_count
    }

    pub fn back_count(&self) -> usize {
        self.state.borrow().back_count
    }

    pub fn forward_count(&self) -> usize {
        self.state.borrow().forward_count
    }

    pub fn devtools_toggles(&self) -> usize {
        self.state.borrow().devtools_toggles
    }

    /// Run a URL through the request hook installed at creation, the way
    /// the engine's network layer would before fetching.
    pub fn request_blocked(&self, url: &str) -> bool {
        let hook = self.state.borrow().request_hook.clone();
        hook.map(|hook| hook.should_block(url)).unwrap_or(false)
    }

    fn max_scroll_y(state: &FakeSurfaceState) -> f64 {
        (state.document_height - state.viewport_height).max(0.0)
    }

    fn page_call_guard(&self) -> Result<(), SurfaceError> {
        if self.state.borrow().fail_page_calls {
            Err(SurfaceError::Gone)
        } else {
            Ok(())
        }
    }
}

impl RenderSurface for FakeSurface {
    fn navigate(&mut self, url: &str) {
        let mut state = self.state.borrow_mut();
        state.url = url.to_string();
        state.navigations.push(url.to_string());
        state.scroll_x = 0.0;
        state.scroll_y = 0.0;
    }

    fn current_url(&self) -> String {
        self.state.borrow().url.clone()
    }

    fn go_back(&mut self) {
        self.state.borrow_mut().back_count += 1;
    }

    fn go_forward(&mut self) {
        self.state.borrow_mut().forward_count += 1;
    }

    fn reload(&mut self) {
        self.state.borrow_mut().reload_count += 1;
    }

    fn attach(&mut self) {
        self.state.borrow_mut().attached = true;
    }

    fn detach(&mut self) {
        self.state.borrow_mut().attached = false;
    }

    fn is_attached(&self) -> bool {
        self.state.borrow().attached
    }

    fn set_bounds(&mut self, bounds: SurfaceRect) {
        self.state.borrow_mut().bounds = bounds;
    }

    fn zoom_factor(&self) -> f64 {
        self.state.borrow().zoom
    }

    fn set_zoom(&mut self, factor: f64) {
        self.state.borrow_mut().zoom = factor;
    }

    fn scroll_metrics(&self) -> Result<ScrollMetrics, SurfaceError> {
        self.page_call_guard()?;
        let state = self.state.borrow();
        Ok(ScrollMetrics {
            scroll_x: state.scroll_x,
            scroll_y: state.scroll_y,
            viewport_height: state.viewport_height,
            document_height: state.document_height,
            max_scroll_y: Self::max_scroll_y(&state),
        })
    }

    fn block_elements(&self) -> Result<Vec<BlockElementProbe>, SurfaceError> {
        self.page_call_guard()?;
        let state = self.state.borrow();
        Ok(state
            .elements
            .iter()
            .map(|el| BlockElementProbe {
                tag: el.tag.clone(),
                text: el.text.clone(),
                offset_top: el.offset_top,
                // Viewport-relative, recomputed against the live scroll.
                bounding_top: el.offset_top - state.scroll_y,
            })
            .collect())
    }

    fn form_fields(&self) -> Result<Vec<FormFieldProbe>, SurfaceError> {
        self.page_call_guard()?;
        Ok(self.state.borrow().form_fields.clone())
    }

    fn anchor_match_offset(
        &self,
        tag: &str,
        fragment: &str,
    ) -> Result<Option<f64>, SurfaceError> {
        self.page_call_guard()?;
        let state = self.state.borrow();
        let tagged = state
            .elements
            .iter()
            .find(|el| el.tag.eq_ignore_ascii_case(tag) && el.text.contains(fragment));
        // Fallback sweep over the other block tags.
        let matched =
            tagged.or_else(|| state.elements.iter().find(|el| el.text.contains(fragment)));
        Ok(matched.map(|el| el.offset_top))
    }

    fn scroll_to(&mut self, x: f64, y: f64) -> Result<(), SurfaceError> {
        self.page_call_guard()?;
        let mut state = self.state.borrow_mut();
        let max_scroll_y = Self::max_scroll_y(&state);
        state.scroll_calls.push((x, y));
        state.scroll_x = x;
        state.scroll_y = match state.scroll_sticky {
            Some(sticky) => sticky,
            None => y.clamp(0.0, max_scroll_y),
        };
        Ok(())
    }

    fn apply_form_values(
        &mut self,
        values: &BTreeMap<String, String>,
    ) -> Result<(), SurfaceError> {
        self.page_call_guard()?;
        self.state
            .borrow_mut()
            .applied_form_values
            .extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    fn capture_html(&self) -> Result<String, SurfaceError> {
        self.page_call_guard()?;
        let state = self.state.borrow();
        Ok(format!("<html data-url=\"{}\"></html>", state.url))
    }

    fn capture_screenshot(&self) -> Result<Vec<u8>, SurfaceError> {
        self.page_call_guard()?;
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    fn toggle_devtools(&mut self) {
        self.state.borrow_mut().devtools_toggles += 1;
    }
}

/// Factory producing [`FakeSurface`]s and recording what was asked of it.
pub struct FakeSurfaceFactory {
    created: RefCell<Vec<(String, FakeSurface)>>,
    native_windows: RefCell<Vec<String>>,
    window_bounds: RefCell<SurfaceRect>,
}

impl FakeSurfaceFactory {
    pub fn new() -> Self {
        Self {
            created: RefCell::new(Vec::new()),
            native_windows: RefCell::new(Vec::new()),
            window_bounds: RefCell::new(Rect::new(
                Point2D::new(0, 0),
                Size2D::new(1280, 720),
            )),
        }
    }

    pub fn created_count(&self) -> usize {
        self.created.borrow().len()
    }

    /// Shared handle to the most recently created surface for `url`.
    pub fn surface_for(&self, url: &str) -> Option<FakeSurface> {
        self.created
            .borrow()
            .iter()
            .rev()
            .find(|(created_url, _)| created_url == url)
            .map(|(_, surface)| surface.clone())
    }

    pub fn native_windows(&self) -> Vec<String> {
        self.native_windows.borrow().clone()
    }

    pub fn set_window_bounds(&self, bounds: SurfaceRect) {
        *self.window_bounds.borrow_mut() = bounds;
    }
}

impl Default for FakeSurfaceFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceFactory for FakeSurfaceFactory {
    fn create_surface(
        &self,
        url: &str,
        request_hook: Arc<dyn RequestInterceptor>,
    ) -> Box<dyn RenderSurface> {
        let surface = FakeSurface::with_hook(url, request_hook);
        self.created
            .borrow_mut()
            .push((url.to_string(), surface.clone()));
        Box::new(surface)
    }

    fn open_native_window(&self, url: &str) {
        self.native_windows.borrow_mut().push(url.to_string());
    }

    fn window_bounds(&self) -> SurfaceRect {
        *self.window_bounds.borrow()
    }
}

/// Request hook that blocks nothing.
pub struct AllowAllHook;

impl RequestInterceptor for AllowAllHook {
    fn should_block(&self, _url: &str) -> bool {
        false
    }
}

/// System handoff that records instead of opening a browser.
#[derive(Clone, Default)]
pub struct RecordingHandoff {
    opened: Rc<RefCell<Vec<String>>>,
}

impl RecordingHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.borrow().clone()
    }
}

impl SystemHandoff for RecordingHandoff {
    fn open_in_default_browser(&self, url: &str) {
        self.opened.borrow_mut().push(url.to_string());
    }
}
