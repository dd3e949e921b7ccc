//! Feature flags configuration
//!
//! Feature flags for optional modules (opt-out: default enabled).

use serde::Deserialize;

/// Feature flags for optional modules (opt-out: default enabled)
#[derive(Debug, Clone)]
pub struct Features {
    /// Live feed: SSE stream re-rendering the home feed on new content
    pub live_updates: bool,

    /// Featured cache: answer 304 when the featured fragment is unchanged
    pub featured_cache: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            live_updates: true,
            featured_cache: true,
        }
    }
}

/// Feature flags as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileFeatures {
    pub live_updates: Option<bool>,
    pub featured_cache: Option<bool>,
}

impl Features {
    /// Create from file config with defaults
    pub fn from_file(file: Option<FileFeatures>) -> Self {
        let file = file.unwrap_or_default();

        Self {
            live_updates: file.live_updates.unwrap_or(true),
            featured_cache: file.featured_cache.unwrap_or(true),
        }
    }
}
