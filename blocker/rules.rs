/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The blocked-domain rule set: bundled fallback list, hosts-format cache
//! file, and the fire-and-forget remote refresh.
//!
//! The set only grows during a session. Bootstrap seeds it synchronously so
//! the very first network requests are already covered before any file or
//! network I/O completes; the cache merge and the remote refresh are both
//! best-effort on top of that.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::RwLock;
use thiserror::Error;
use url::Url;

/// Bundled fallback rules. Small on purpose: enough to cover the dominant
/// ad and analytics networks until the full remote list lands.
pub const FALLBACK_BLOCKLIST: &[&str] = &[
    "doubleclick.net",
    "googlesyndication.com",
    "googleadservices.com",
    "googletagmanager.com",
    "googletagservices.com",
    "google-analytics.com",
    "adservice.google.com",
    "scorecardresearch.com",
    "quantserve.com",
    "outbrain.com",
    "taboola.com",
    "criteo.com",
    "criteo.net",
    "adnxs.com",
    "rubiconproject.com",
    "pubmatic.com",
    "openx.net",
    "casalemedia.com",
    "moatads.com",
    "chartbeat.com",
    "hotjar.com",
    "mouseflow.com",
    "amazon-adsystem.com",
    "adsafeprotected.com",
    "smartadserver.com",
    "zedo.com",
];

/// Hosts-file entries that name the local machine, never a tracker.
const EXCLUDED_HOSTS: &[&str] = &["localhost", "broadcasthost"];

const REMOTE_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum BlocklistError {
    #[error("blocklist fetch failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("blocklist cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Set of normalized lowercase blocked domain suffixes.
#[derive(Debug, Default)]
pub struct BlockRuleSet {
    domains: HashSet<String>,
}

impl BlockRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Insert a rule, normalizing case and a trailing dot. Returns whether
    /// the rule was new.
    pub fn insert(&mut self, domain: &str) -> bool {
        let normalized = normalize_domain(domain);
        if normalized.is_empty() {
            return false;
        }
        self.domains.insert(normalized)
    }

    /// Whole-label suffix match: `h` matches iff some suffix of `h` obtained
    /// by repeatedly dropping the leftmost label is a known rule. A bare TLD
    /// is never tested, so a rule like `com` can not blanket-block.
    pub fn matches_host(&self, host: &str) -> bool {
        let normalized = normalize_domain(host);
        let mut rest = normalized.as_str();
        loop {
            let Some(dot) = rest.find('.') else {
                // One label left: a bare TLD, never tested.
                return false;
            };
            if self.domains.contains(rest) {
                return true;
            }
            rest = &rest[dot + 1..];
        }
    }

    /// Merge newline-delimited hosts-format text (`<ip> <domain>` per line,
    /// `#` comments and blank lines skipped). Returns how many rules were
    /// newly added.
    pub fn merge_hosts_format(&mut self, text: &str) -> usize {
        let mut added = 0;
        for line in text.lines() {
            if let Some(domain) = parse_hosts_line(line)
                && self.insert(domain)
            {
                added += 1;
            }
        }
        added
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Extract the domain field from one hosts-file line, or `None` when the
/// line carries no rule.
fn parse_hosts_line(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut fields = line.split_whitespace();
    let _ip = fields.next()?;
    let domain = fields.next()?;
    // Tolerate an inline comment glued to the domain field.
    let domain = domain.split('#').next().unwrap_or("");
    if domain.is_empty()
        || EXCLUDED_HOSTS
            .iter()
            .any(|host| domain.eq_ignore_ascii_case(host))
    {
        return None;
    }
    Some(domain)
}

/// Lowercased hostname of a URL, when it parses and has one.
pub(crate) fn hostname_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_ascii_lowercase))
}

/// Suffix-walk a hostname against a fixed list of domains. Shared by the
/// popup allow-list and the auth-handoff host checks.
pub(crate) fn host_matches_any(host: &str, domains: &[&str]) -> bool {
    let normalized = normalize_domain(host);
    let mut rest = normalized.as_str();
    loop {
        let Some(dot) = rest.find('.') else {
            return false;
        };
        if domains.contains(&rest) {
            return true;
        }
        rest = &rest[dot + 1..];
    }
}

/// The process-wide blocked-domain store: a shared rule set plus the cache
/// file and remote source it is fed from.
pub struct DomainBlockRules {
    rules: Arc<RwLock<BlockRuleSet>>,
    cache_path: PathBuf,
    remote_url: String,
}

impl DomainBlockRules {
    pub fn new(cache_path: PathBuf, remote_url: String) -> Self {
        Self {
            rules: Arc::new(RwLock::new(BlockRuleSet::new())),
            cache_path,
            remote_url,
        }
    }

    /// Shared handle for readers (the per-surface request hooks).
    pub fn shared(&self) -> Arc<RwLock<BlockRuleSet>> {
        self.rules.clone()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.read().len()
    }

    /// Seed the bundled fallback rules. Synchronous and infallible, so the
    /// first requests of the session are already protected.
    pub fn bootstrap(&self) {
        let mut rules = self.rules.write();
        for domain in FALLBACK_BLOCKLIST {
            rules.insert(domain);
        }
        debug!("blocklist bootstrapped with {} fallback rules", rules.len());
    }

    /// Merge the persisted cache file, if one exists. Read or parse trouble
    /// is logged and ignored; the fallback rules still protect the user.
    pub fn load_cache(&self) {
        match std::fs::read_to_string(&self.cache_path) {
            Ok(text) => {
                let added = self.rules.write().merge_hosts_format(&text);
                info!(
                    "blocklist cache merged: {added} rules added from {}",
                    self.cache_path.display()
                );
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no blocklist cache at {}", self.cache_path.display());
            },
            Err(e) => {
                warn!(
                    "failed to read blocklist cache {}: {e}",
                    self.cache_path.display()
                );
            },
        }
    }

    /// Fetch the remote hosts list on a background thread, merge it and
    /// overwrite the cache file wholesale. Fire-and-forget: every failure
    /// path logs and leaves the existing set untouched.
    pub fn spawn_refresh(&self) {
        let rules = self.rules.clone();
        let url = self.remote_url.clone();
        let cache_path = self.cache_path.clone();
        let spawned = std::thread::Builder::new()
            .name("blocklist-refresh".into())
            .spawn(move || match fetch_remote(&url) {
                Ok(body) => {
                    let added = rules.write().merge_hosts_format(&body);
                    info!("blocklist refreshed: {added} rules added from {url}");
                    if let Err(e) = write_cache(&cache_path, &body) {
                        warn!("failed to write blocklist cache: {e}");
                    }
                },
                Err(e) => {
                    warn!("blocklist refresh failed, keeping existing rules: {e}");
                },
            });
        if let Err(e) = spawned {
            warn!("failed to spawn blocklist refresh thread: {e}");
        }
    }
}

fn fetch_remote(url: &str) -> Result<String, BlocklistError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(REMOTE_REFRESH_TIMEOUT)
        .build()?;
    let response = client.get(url).send()?.error_for_status()?;
    Ok(response.text()?)
}

fn write_cache(path: &Path, body: &str) -> Result<(), BlocklistError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // Raw remote content, overwritten wholesale on each successful refresh.
    std::fs::write(path, body)?;
    Ok(())
}
