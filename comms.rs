/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The typed boundary between this core and its UI collaborator.
//!
//! Transport-agnostic: the host serializes these however it likes (JSON
//! over IPC in practice). Tagged enums keep the payloads self-describing,
//! and a malformed payload fails deserialization at the boundary instead of
//! reaching the controller.

use serde::{Deserialize, Serialize};

use crate::blocker::engine::BlockerStatus;
use crate::registry::{PageId, WorkspaceId};
use crate::session::{CapturedPageState, RestoreMethod};
use crate::surface::SurfaceRect;

/// Flat bounds rectangle as it crosses the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl From<Bounds> for SurfaceRect {
    fn from(bounds: Bounds) -> Self {
        SurfaceRect::new(
            euclid::default::Point2D::new(bounds.x, bounds.y),
            euclid::default::Size2D::new(bounds.width, bounds.height),
        )
    }
}

impl From<SurfaceRect> for Bounds {
    fn from(rect: SurfaceRect) -> Self {
        Bounds {
            x: rect.origin.x,
            y: rect.origin.y,
            width: rect.size.width,
            height: rect.size.height,
        }
    }
}

/// Requests from the UI collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum UiCommand {
    #[serde(rename_all = "camelCase")]
    CreateView {
        workspace_id: WorkspaceId,
        page_id: PageId,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<CapturedPageState>,
    },
    #[serde(rename_all = "camelCase")]
    SelectView {
        workspace_id: WorkspaceId,
        /// `None` shows the workspace overview: deactivate only.
        #[serde(default)]
        page_id: Option<PageId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<CapturedPageState>,
    },
    #[serde(rename_all = "camelCase")]
    ResizeView {
        bounds: Bounds,
        #[serde(default)]
        workspace_id: Option<WorkspaceId>,
        #[serde(default)]
        page_id: Option<PageId>,
    },
    #[serde(rename_all = "camelCase")]
    RemoveView {
        workspace_id: WorkspaceId,
        page_id: PageId,
    },
    #[serde(rename_all = "camelCase")]
    RemoveWorkspaceViews { workspace_id: WorkspaceId },
    #[serde(rename_all = "camelCase")]
    CaptureState {
        workspace_id: WorkspaceId,
        page_id: PageId,
    },
    #[serde(rename_all = "camelCase")]
    RestoreState {
        workspace_id: WorkspaceId,
        page_id: PageId,
        state: CapturedPageState,
    },
    GetBlockerStatus,
    ToggleBlocker,
    /// Navigation passthroughs; all act on the active view.
    Back,
    Forward,
    Reload,
    CaptureScreenshot,
    GetHtml,
    ToggleDevtools,
    /// Interstitial resolution: retry the page over plain http.
    #[serde(rename_all = "camelCase")]
    AllowInsecure {
        workspace_id: WorkspaceId,
        page_id: PageId,
    },
    /// Interstitial resolution: go back to the previous page.
    #[serde(rename_all = "camelCase")]
    DismissInterstitial {
        workspace_id: WorkspaceId,
        page_id: PageId,
    },
}

/// Synchronous answers to the query-shaped commands. Commands that only
/// mutate produce no reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "camelCase")]
pub enum UiReply {
    #[serde(rename_all = "camelCase")]
    CapturedState { state: Option<CapturedPageState> },
    #[serde(rename_all = "camelCase")]
    BlockerStatus { status: BlockerStatus },
    #[serde(rename_all = "camelCase")]
    BlockerEnabled { is_enabled: bool },
    #[serde(rename_all = "camelCase")]
    Html { html: Option<String> },
    #[serde(rename_all = "camelCase")]
    Screenshot { png: Option<Vec<u8>> },
}

/// Notifications pushed to the UI collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum UiEvent {
    #[serde(rename_all = "camelCase")]
    ViewUrlUpdated {
        workspace_id: WorkspaceId,
        page_id: PageId,
        url: String,
    },
    #[serde(rename_all = "camelCase")]
    ViewTitleUpdated {
        workspace_id: WorkspaceId,
        page_id: PageId,
        title: String,
    },
    #[serde(rename_all = "camelCase")]
    RestoreResult {
        page_id: PageId,
        method: RestoreMethod,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    LoadInterstitial {
        url: String,
        error: String,
        original_url: String,
    },
    #[serde(rename_all = "camelCase")]
    FullscreenChanged {
        page_id: PageId,
        is_fullscreen: bool,
    },
}
