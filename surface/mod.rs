/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The seam between flowdeck and the embeddable rendering engine.
//!
//! Everything the rest of the crate knows about a live page goes through
//! [`RenderSurface`]. The page-context queries (`scroll_metrics`,
//! `block_elements`, `anchor_match_offset`, ...) are round-trips into the
//! rendered document's script context: they are deliberately narrow and
//! typed, and they fail with [`SurfaceError`] when the surface has navigated
//! away or been destroyed mid-call. Callers treat a failed round-trip as
//! "that step failed", never as a reason to crash the controller.

pub mod net_errors;

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

/// Bounds rectangle of a surface inside the host window, in device pixels.
pub type SurfaceRect = euclid::default::Rect<i32>;

#[derive(Debug, Error)]
pub enum SurfaceError {
    /// The surface was destroyed or navigated away before the call landed.
    #[error("surface is gone or navigated away")]
    Gone,
    /// The in-page script evaluation failed.
    #[error("page script evaluation failed: {0}")]
    Script(String),
}

/// Scroll geometry of the live document.
///
/// Implementations read the document's dedicated scrolling element first and
/// fall back to window-level offsets when that element is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub viewport_height: f64,
    pub document_height: f64,
    /// Largest reachable vertical scroll offset right now.
    pub max_scroll_y: f64,
}

/// One block-level element candidate reported by the live document, in
/// document order. Used to pick a reading anchor at capture time.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockElementProbe {
    /// Upper-cased tag name (`P`, `H2`, `LI`, ...).
    pub tag: String,
    /// Visible text content of the element.
    pub text: String,
    /// Element top relative to the document origin.
    pub offset_top: f64,
    /// Element top relative to the current viewport.
    pub bounding_top: f64,
}

/// One form control reported by the live document.
#[derive(Debug, Clone, PartialEq)]
pub struct FormFieldProbe {
    pub id: Option<String>,
    pub name: Option<String>,
    pub value: String,
}

/// Semantic events a surface adapter feeds back into the lifecycle
/// controller. Mirrors what engine delegate callbacks report.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// Main-document load finished.
    LoadFinished,
    LoadFailed {
        code: i32,
        url: String,
        is_main_frame: bool,
    },
    UrlChanged {
        url: String,
    },
    TitleChanged {
        title: String,
    },
    /// The page asked for a new window or tab.
    PopupRequested {
        target_url: String,
    },
    FullscreenChanged {
        is_fullscreen: bool,
    },
    /// A frame was presented for this surface. Two of these after a load
    /// are treated as "layout has settled" by the restore pipeline.
    FrameRendered,
}

/// Network-request interception hook installed into each surface at
/// creation. Returning `true` cancels the request before any fetch starts.
pub trait RequestInterceptor: Send + Sync {
    fn should_block(&self, url: &str) -> bool;
}

/// One embedded rendering surface backing one page.
pub trait RenderSurface {
    fn navigate(&mut self, url: &str);
    fn current_url(&self) -> String;
    fn go_back(&mut self);
    fn go_forward(&mut self);
    fn reload(&mut self);

    /// Attach the surface to the host window, making it visible and
    /// input-receiving. Callers go through the registry, which enforces the
    /// single-active invariant.
    fn attach(&mut self);
    fn detach(&mut self);
    fn is_attached(&self) -> bool;
    fn set_bounds(&mut self, bounds: SurfaceRect);

    fn zoom_factor(&self) -> f64;
    fn set_zoom(&mut self, factor: f64);

    fn scroll_metrics(&self) -> Result<ScrollMetrics, SurfaceError>;

    /// Block-level anchor candidates (paragraphs, headings, list items,
    /// articles, sections) in document order.
    fn block_elements(&self) -> Result<Vec<BlockElementProbe>, SurfaceError>;

    fn form_fields(&self) -> Result<Vec<FormFieldProbe>, SurfaceError>;

    /// Search the loaded document for an element of `tag` (falling back to
    /// the other common block tags) whose text contains `fragment`; return
    /// the first match's document-relative top.
    fn anchor_match_offset(&self, tag: &str, fragment: &str)
    -> Result<Option<f64>, SurfaceError>;

    fn scroll_to(&mut self, x: f64, y: f64) -> Result<(), SurfaceError>;

    /// Assign values to form controls looked up by id-or-name. Missing
    /// fields are skipped silently.
    fn apply_form_values(&mut self, values: &BTreeMap<String, String>)
    -> Result<(), SurfaceError>;

    fn capture_html(&self) -> Result<String, SurfaceError>;
    fn capture_screenshot(&self) -> Result<Vec<u8>, SurfaceError>;
    fn toggle_devtools(&mut self);
}

/// Allocates rendering surfaces and host-window resources.
pub trait SurfaceFactory {
    /// Create a surface with `request_hook` installed in its network layer
    /// and begin navigating it to `url`. The hook must run before any
    /// connection is made, so a blocked request never fetches.
    fn create_surface(
        &self,
        url: &str,
        request_hook: Arc<dyn RequestInterceptor>,
    ) -> Box<dyn RenderSurface>;

    /// Open `url` as a real separate native window. Reserved for the
    /// identity-provider popups that refuse to run flattened.
    fn open_native_window(&self, url: &str);

    /// Current inner bounds of the host window (fullscreen expansion target).
    fn window_bounds(&self) -> SurfaceRect;
}
