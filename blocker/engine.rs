/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The per-request block/allow decision engine.
//!
//! One engine instance is shared (as the [`RequestInterceptor`] hook) by
//! every surface's network layer, so its state is atomics plus the shared
//! rule set. Decisions fail open: a URL we can not parse is allowed, never
//! assumed malicious.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::blocker::rules::BlockRuleSet;
use crate::surface::RequestInterceptor;

/// Blocker state as shown in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockerStatus {
    pub is_enabled: bool,
    /// Blocked requests since process start. Monotonic, never persisted.
    pub blocked_count: u64,
}

pub struct BlockDecisionEngine {
    rules: Arc<RwLock<BlockRuleSet>>,
    enabled: AtomicBool,
    blocked_count: AtomicU64,
}

impl BlockDecisionEngine {
    pub fn new(rules: Arc<RwLock<BlockRuleSet>>, enabled: bool) -> Self {
        Self {
            rules,
            enabled: AtomicBool::new(enabled),
            blocked_count: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> BlockerStatus {
        BlockerStatus {
            is_enabled: self.is_enabled(),
            blocked_count: self.blocked_count.load(Ordering::Relaxed),
        }
    }

    /// Decide whether a network request should be cancelled. Malformed or
    /// host-less URLs are allowed.
    pub fn should_block_request(&self, url: &str) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let Ok(parsed) = Url::parse(url) else {
            debug!("allowing unparseable request url: {url}");
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        if self.rules.read().matches_host(host) {
            self.record_block(host);
            return true;
        }
        false
    }

    /// Decide whether a popup/new-window request should be denied. An empty
    /// or `about:blank` target is denied unconditionally, before any URL
    /// parsing: windowless popups are a common evasion shape.
    pub fn should_block_popup(&self, target_url: &str) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let target = target_url.trim();
        if target.is_empty() || target == "about:blank" {
            self.record_block("about:blank");
            return true;
        }
        self.should_block_request(target)
    }

    pub fn enable(&self) {
        if !self.enabled.swap(true, Ordering::Relaxed) {
            info!("content blocker enabled");
        }
    }

    pub fn disable(&self) {
        if self.enabled.swap(false, Ordering::Relaxed) {
            info!("content blocker disabled");
        }
    }

    /// Flip the enabled flag and return the new state.
    pub fn toggle(&self) -> bool {
        if self.is_enabled() {
            self.disable();
            false
        } else {
            self.enable();
            true
        }
    }

    fn record_block(&self, host: &str) {
        let count = self.blocked_count.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("blocked request to {host} (total {count})");
    }
}

impl RequestInterceptor for BlockDecisionEngine {
    fn should_block(&self, url: &str) -> bool {
        self.should_block_request(url)
    }
}
