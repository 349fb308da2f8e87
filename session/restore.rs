/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The cascading restoration state machine.
//!
//! One machine per pending restore, driven by discrete inputs: frame
//! signals (layout settling) and event-loop ticks (retry pacing). The
//! strategies run in fixed priority order with independent success
//! criteria; every strategy is fallible and non-fatal, and the machine
//! always terminates because the pixel retry loop is bounded.

use std::time::{Duration, Instant};

use log::debug;

use crate::blocker::rules::hostname_of;
use crate::session::capture::char_prefix;
use crate::session::{CapturedPageState, PageAnchor, RestoreMethod, RestoreOutcome};
use crate::surface::RenderSurface;

/// Frames to wait after load-finish before the first attempt, so layout has
/// stabilized (the double animation-frame convention).
const SETTLE_FRAMES: u8 = 2;
/// How much of the captured anchor text the reloaded document is searched
/// for. Shorter than the captured 120 chars to survive trailing edits.
const ANCHOR_QUERY_PREFIX_CHARS: usize = 72;
/// A ratio restore counts only if the page actually reached the computed
/// offset; a page still streaming in will fall short by more than this.
const RATIO_SUCCESS_TOLERANCE_PX: f64 = 100.0;
const PIXEL_SUCCESS_TOLERANCE_PX: f64 = 50.0;
pub const PIXEL_RESTORE_MAX_RETRIES: u8 = 5;
pub const PIXEL_RESTORE_RETRY_DELAY: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestorePhase {
    AwaitingFrames { remaining: u8 },
    RedirectGuard,
    Anchor,
    Ratio,
    Pixel { retries_used: u8, deferred: bool },
    Done,
}

/// Restoration driver for one pending captured state.
pub struct RestoreMachine {
    state: CapturedPageState,
    origin_url: String,
    phase: RestorePhase,
    next_pixel_attempt_at: Option<Instant>,
}

impl RestoreMachine {
    pub fn new(state: CapturedPageState, origin_url: String) -> Self {
        Self {
            state,
            origin_url,
            phase: RestorePhase::AwaitingFrames {
                remaining: SETTLE_FRAMES,
            },
            next_pixel_attempt_at: None,
        }
    }

    /// A frame was presented for this surface. Two of these unlock the
    /// first restoration attempt.
    pub fn on_frame(&mut self) {
        if let RestorePhase::AwaitingFrames { remaining } = self.phase {
            let remaining = remaining.saturating_sub(1);
            self.phase = if remaining == 0 {
                RestorePhase::RedirectGuard
            } else {
                RestorePhase::AwaitingFrames { remaining }
            };
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase == RestorePhase::Done
    }

    /// Advance the cascade. Returns the final outcome exactly once; `None`
    /// means "still waiting" (frames, or a scheduled pixel retry).
    pub fn poll(
        &mut self,
        surface: &mut dyn RenderSurface,
        now: Instant,
    ) -> Option<RestoreOutcome> {
        loop {
            match self.phase {
                RestorePhase::AwaitingFrames { .. } | RestorePhase::Done => return None,
                RestorePhase::RedirectGuard => {
                    if self.redirected(surface) {
                        // A different page entirely: restoring a position
                        // here would be meaningless. No scroll calls, no
                        // zoom or form replay.
                        self.phase = RestorePhase::Done;
                        return Some(RestoreOutcome {
                            method: RestoreMethod::None,
                            success: false,
                            message: Some("Page redirected".into()),
                        });
                    }
                    self.phase = RestorePhase::Anchor;
                },
                RestorePhase::Anchor => {
                    if let Some(anchor) = self.state.anchor.clone()
                        && self.attempt_anchor(surface, &anchor)
                    {
                        return Some(self.finish(surface, RestoreMethod::Anchor, true, None));
                    }
                    self.phase = RestorePhase::Ratio;
                },
                RestorePhase::Ratio => {
                    if let Some(ratio) = self.state.scroll_ratio.filter(|ratio| *ratio > 0.0)
                        && self.attempt_ratio(surface, ratio)
                    {
                        return Some(self.finish(surface, RestoreMethod::Ratio, true, None));
                    }
                    self.phase = RestorePhase::Pixel {
                        retries_used: 0,
                        deferred: false,
                    };
                    self.next_pixel_attempt_at = None;
                },
                RestorePhase::Pixel {
                    retries_used,
                    deferred,
                } => {
                    if deferred
                        && let Some(at) = self.next_pixel_attempt_at
                        && now < at
                    {
                        return None;
                    }
                    if self.attempt_pixel(surface) {
                        return Some(self.finish(surface, RestoreMethod::Pixel, true, None));
                    }
                    if retries_used >= PIXEL_RESTORE_MAX_RETRIES {
                        // Deliberate, visible "we tried": the page stays at
                        // whatever position it naturally loaded at.
                        return Some(self.finish(
                            surface,
                            RestoreMethod::Top,
                            false,
                            Some("Could not restore scroll position".into()),
                        ));
                    }
                    self.phase = RestorePhase::Pixel {
                        retries_used: retries_used + 1,
                        deferred: true,
                    };
                    self.next_pixel_attempt_at = Some(now + PIXEL_RESTORE_RETRY_DELAY);
                    return None;
                },
            }
        }
    }

    fn redirected(&self, surface: &dyn RenderSurface) -> bool {
        match (
            hostname_of(&surface.current_url()),
            hostname_of(&self.origin_url),
        ) {
            (Some(current), Some(origin)) => current != origin,
            // Hostless URLs (about:blank and friends) skip the guard.
            _ => false,
        }
    }

    fn attempt_anchor(&mut self, surface: &mut dyn RenderSurface, anchor: &PageAnchor) -> bool {
        let fragment = char_prefix(anchor.text.trim(), ANCHOR_QUERY_PREFIX_CHARS);
        if fragment.is_empty() {
            return false;
        }
        match surface.anchor_match_offset(&anchor.tag, &fragment) {
            Ok(Some(element_top)) => {
                let target_y = (element_top + anchor.offset).max(0.0);
                surface.scroll_to(self.state.scroll_x, target_y).is_ok()
            },
            Ok(None) => false,
            Err(e) => {
                debug!("anchor restore attempt failed: {e}");
                false
            },
        }
    }

    fn attempt_ratio(&mut self, surface: &mut dyn RenderSurface, ratio: f64) -> bool {
        let Ok(metrics) = surface.scroll_metrics() else {
            return false;
        };
        let target_y = (ratio * metrics.document_height).round();
        if surface.scroll_to(self.state.scroll_x, target_y).is_err() {
            return false;
        }
        let Ok(after) = surface.scroll_metrics() else {
            return false;
        };
        (after.scroll_y - target_y).abs() <= RATIO_SUCCESS_TOLERANCE_PX
    }

    fn attempt_pixel(&mut self, surface: &mut dyn RenderSurface) -> bool {
        let (target_x, target_y) = (self.state.scroll_x, self.state.scroll_y);
        if surface.scroll_to(target_x, target_y).is_err() {
            return false;
        }
        let Ok(after) = surface.scroll_metrics() else {
            return false;
        };
        // Trivial target: the page starts at the origin anyway.
        if target_x == 0.0 && target_y == 0.0 && after.scroll_x == 0.0 && after.scroll_y == 0.0 {
            return true;
        }
        if (after.scroll_x - target_x).abs() <= PIXEL_SUCCESS_TOLERANCE_PX
            && (after.scroll_y - target_y).abs() <= PIXEL_SUCCESS_TOLERANCE_PX
        {
            return true;
        }
        // The page is shorter than when captured and we are pinned at its
        // bottom; waiting longer can not get closer.
        (after.scroll_y - after.max_scroll_y).abs() <= 1.0 && target_y > after.max_scroll_y
    }

    /// Apply the scroll-independent residuals (zoom always, form values
    /// best-effort), seal the machine, and build the outcome.
    fn finish(
        &mut self,
        surface: &mut dyn RenderSurface,
        method: RestoreMethod,
        success: bool,
        message: Option<String>,
    ) -> RestoreOutcome {
        if let Some(zoom) = self.state.zoom_factor {
            surface.set_zoom(zoom);
        }
        if let Some(form) = &self.state.form_data
            && let Err(e) = surface.apply_form_values(form)
        {
            debug!("form value restore skipped: {e}");
        }
        self.phase = RestorePhase::Done;
        RestoreOutcome {
            method,
            success,
            message,
        }
    }
}
