/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Flowdeck: the view-orchestration core of a workspace browser.
//!
//! Pages are grouped into task-oriented workspaces ("flows"); each open page
//! is backed by one embedded rendering surface. This crate owns:
//!
//! - the view registry (at most one surface attached and input-receiving at
//!   any instant, switched via an explicit deactivate-then-activate path),
//! - the reading-position capture/restore pipeline (a cascading strategy
//!   chain: text anchor, scroll ratio, pixel offset, give-up-at-top),
//! - the request/popup blocking decision engine backed by a hosts-format
//!   domain rule set,
//! - the lifecycle controller that ties surface events (load finish/failure,
//!   popups, fullscreen) to the above.
//!
//! The embeddable browser engine itself is not a dependency. It sits behind
//! the [`surface::RenderSurface`] and [`surface::SurfaceFactory`] traits;
//! every "ask the live page something" call is a fallible round-trip that
//! callers tolerate failing (the page may have navigated away or died).

pub mod blocker;
pub mod comms;
pub mod prefs;
pub mod registry;
pub mod session;
pub mod shell;
pub mod surface;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use blocker::engine::{BlockDecisionEngine, BlockerStatus};
pub use blocker::rules::DomainBlockRules;
pub use comms::{Bounds, UiCommand, UiEvent, UiReply};
pub use registry::{PageId, ViewKey, ViewRegistry, WorkspaceId};
pub use session::{CapturedPageState, PageAnchor, RestoreMethod, RestoreOutcome};
pub use shell::controller::ViewLifecycleController;
pub use surface::{RenderSurface, SurfaceFactory, SurfaceRect};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
