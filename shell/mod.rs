/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The lifecycle controller tying surface events, UI commands, the view
//! registry and the restore pipeline together.

pub mod controller;

use log::info;

/// Escape hatch to the host operating system: some identity providers
/// refuse to authenticate inside an embedded surface, and the only working
/// answer is the user's real default browser.
pub trait SystemHandoff {
    fn open_in_default_browser(&self, url: &str);
}

/// Headless default: logs the handoff instead of opening anything. Hosts
/// with a windowing system install a platform opener.
pub struct LoggingHandoff;

impl SystemHandoff for LoggingHandoff {
    fn open_in_default_browser(&self, url: &str) {
        info!("handing off to system default browser: {url}");
    }
}
