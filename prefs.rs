/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Application preferences for the view core.
//!
//! Loaded once at startup from `prefs.toml` in the data directory, with
//! environment overrides for the knobs that matter in development. Missing
//! file, missing keys and parse trouble all fall back to defaults; prefs
//! must never keep the browser from starting.

use std::path::PathBuf;

use log::warn;
use serde::{Deserialize, Serialize};

const PREFS_FILE: &str = "prefs.toml";
const BLOCKLIST_CACHE_FILE: &str = "blocklist-cache.txt";
const DEFAULT_BLOCKLIST_URL: &str =
    "https://raw.githubusercontent.com/StevenBlack/hosts/master/hosts";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AppPreferences {
    /// Application-private data directory (blocklist cache lives here).
    pub data_dir: PathBuf,
    /// Remote hosts-format blocklist source.
    pub blocklist_url: String,
    /// Whether the blocker starts enabled.
    pub blocker_enabled: bool,
    /// Whether to kick off the fire-and-forget blocklist refresh at startup.
    pub refresh_blocklist_on_startup: bool,
}

impl Default for AppPreferences {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            blocklist_url: DEFAULT_BLOCKLIST_URL.to_string(),
            blocker_enabled: true,
            refresh_blocklist_on_startup: true,
        }
    }
}

impl AppPreferences {
    /// Load preferences from the default data directory, honoring the
    /// `FLOWDECK_DATA_DIR` and `FLOWDECK_BLOCKLIST_URL` overrides.
    pub fn load() -> Self {
        let data_dir = std::env::var_os("FLOWDECK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let mut prefs = Self::load_from(data_dir);
        if let Some(url) = std::env::var_os("FLOWDECK_BLOCKLIST_URL") {
            prefs.blocklist_url = url.to_string_lossy().into_owned();
        }
        prefs
    }

    /// Load `prefs.toml` from `data_dir`, defaulting on any failure.
    pub fn load_from(data_dir: PathBuf) -> Self {
        let path = data_dir.join(PREFS_FILE);
        let mut prefs = match std::fs::read_to_string(&path) {
            Ok(text) => match toml::from_str::<AppPreferences>(&text) {
                Ok(prefs) => prefs,
                Err(e) => {
                    warn!("ignoring malformed {}: {e}", path.display());
                    Self::default()
                },
            },
            Err(_) => Self::default(),
        };
        prefs.data_dir = data_dir;
        prefs
    }

    pub fn blocklist_cache_path(&self) -> PathBuf {
        self.data_dir.join(BLOCKLIST_CACHE_FILE)
    }

    /// Preferences for tests: tempdir-backed, no startup network refresh.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            blocklist_url: "http://blocklist.invalid/hosts".to_string(),
            blocker_enabled: true,
            refresh_blocklist_on_startup: false,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("flowdeck")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_prefs_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let prefs = AppPreferences::load_from(dir.path().to_path_buf());
        assert!(prefs.blocker_enabled);
        assert!(prefs.refresh_blocklist_on_startup);
        assert_eq!(prefs.blocklist_url, DEFAULT_BLOCKLIST_URL);
        assert_eq!(prefs.data_dir, dir.path());
    }

    #[test]
    fn test_partial_prefs_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(PREFS_FILE),
            "blocker-enabled = false\n",
        )
        .expect("write prefs");
        let prefs = AppPreferences::load_from(dir.path().to_path_buf());
        assert!(!prefs.blocker_enabled);
        assert!(prefs.refresh_blocklist_on_startup);
    }

    #[test]
    fn test_malformed_prefs_file_is_nonfatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(PREFS_FILE), "not [valid toml").expect("write prefs");
        let prefs = AppPreferences::load_from(dir.path().to_path_buf());
        assert!(prefs.blocker_enabled);
    }

    #[test]
    fn test_cache_path_is_under_data_dir() {
        let prefs = AppPreferences::for_testing(PathBuf::from("/tmp/fd-test"));
        assert_eq!(
            prefs.blocklist_cache_path(),
            PathBuf::from("/tmp/fd-test/blocklist-cache.txt")
        );
    }
}
