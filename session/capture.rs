/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Best-effort extraction of a page's reading position from a live surface.
//!
//! Capture runs synchronously right before a page loses visibility. It must
//! never block or fail navigation: any surface round-trip error degrades to
//! "no capture" and is logged at debug level.

use std::collections::BTreeMap;

use log::debug;

use crate::session::{CapturedPageState, PageAnchor};
use crate::surface::{RenderSurface, ScrollMetrics};

/// Anchor candidates must start inside the top slice of the viewport.
const ANCHOR_VIEWPORT_FRACTION: f64 = 0.3;
/// Candidates with this much visible text or less are skipped (nav crumbs,
/// timestamps, single-word headings).
const ANCHOR_MIN_TEXT_CHARS: usize = 20;
/// How much of the anchor text is recorded.
pub(crate) const ANCHOR_MAX_TEXT_CHARS: usize = 120;

/// Snapshot scroll position, reading anchor, form drafts and zoom from a
/// live surface. Returns `None` when the page can not be queried at all.
pub fn capture(surface: &dyn RenderSurface) -> Option<CapturedPageState> {
    let metrics = match surface.scroll_metrics() {
        Ok(metrics) => metrics,
        Err(e) => {
            debug!("page state capture skipped: {e}");
            return None;
        },
    };

    let ratio = if metrics.document_height > 0.0 {
        metrics.scroll_y / metrics.document_height
    } else {
        0.0
    };

    Some(CapturedPageState {
        scroll_x: metrics.scroll_x,
        scroll_y: metrics.scroll_y,
        scroll_ratio: (ratio > 0.0).then_some(ratio),
        zoom_factor: Some(surface.zoom_factor()),
        form_data: capture_form_data(surface),
        anchor: select_anchor(surface, &metrics),
    })
}

/// First block-level element whose top sits in `[0, 0.3 x viewport)` with
/// enough visible text to be findable again after a reflow.
fn select_anchor(surface: &dyn RenderSurface, metrics: &ScrollMetrics) -> Option<PageAnchor> {
    let elements = match surface.block_elements() {
        Ok(elements) => elements,
        Err(e) => {
            debug!("anchor scan failed: {e}");
            return None;
        },
    };
    let top_limit = metrics.viewport_height * ANCHOR_VIEWPORT_FRACTION;
    elements
        .iter()
        .find(|el| {
            el.bounding_top >= 0.0
                && el.bounding_top < top_limit
                && el.text.trim().chars().count() > ANCHOR_MIN_TEXT_CHARS
        })
        .map(|el| PageAnchor {
            text: char_prefix(el.text.trim(), ANCHOR_MAX_TEXT_CHARS),
            tag: el.tag.to_ascii_uppercase(),
            offset: metrics.scroll_y - el.offset_top,
        })
}

/// Non-empty form control values keyed by id, or name when the id is
/// missing. Controls with neither are dropped; an all-empty form yields
/// `None` so the field is omitted from the persisted shape entirely.
fn capture_form_data(surface: &dyn RenderSurface) -> Option<BTreeMap<String, String>> {
    let fields = match surface.form_fields() {
        Ok(fields) => fields,
        Err(e) => {
            debug!("form field scan failed: {e}");
            return None;
        },
    };
    let mut values = BTreeMap::new();
    for field in fields {
        if field.value.is_empty() {
            continue;
        }
        let key = field
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or(field.name.as_deref().filter(|name| !name.is_empty()))
            .map(str::to_string);
        if let Some(key) = key {
            values.insert(key, field.value);
        }
    }
    (!values.is_empty()).then_some(values)
}

/// Character-boundary-safe prefix.
pub(crate) fn char_prefix(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
