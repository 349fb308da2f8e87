/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Reading-position capture and restoration.
//!
//! [`CapturedPageState`] is the JSON shape attached to a page record by the
//! persistence collaborator; this crate produces it on demand and consumes
//! it once, on the next load of that page, through [`restore::RestoreMachine`].

pub mod capture;
pub mod restore;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Text-and-position fingerprint of the content the user was reading.
/// Survives layout changes better than any raw offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAnchor {
    /// Leading text of the anchor element, at most 120 characters.
    pub text: String,
    /// Upper-cased tag name of the anchor element.
    pub tag: String,
    /// Scroll position relative to the element's document top at capture
    /// time. Negative when the user had scrolled slightly above it.
    pub offset: f64,
}

/// Snapshot of a page's reading position, form drafts and zoom.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedPageState {
    #[serde(default)]
    pub scroll_x: f64,
    #[serde(default)]
    pub scroll_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_data: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<PageAnchor>,
}

/// A captured state queued for restoration on the next load of its page,
/// together with the page URL recorded when it was attached. The restore
/// pipeline compares that origin against the URL actually loaded to catch
/// redirects.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRestore {
    pub state: CapturedPageState,
    pub origin_url: String,
}

/// Which strategy ended the restoration cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreMethod {
    Anchor,
    Ratio,
    Pixel,
    /// Every strategy failed; the page stayed wherever it loaded.
    Top,
    /// Restoration never ran (redirect, or nothing to restore).
    None,
}

/// Result of one restoration run, for UI toast feedback only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOutcome {
    pub method: RestoreMethod,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
