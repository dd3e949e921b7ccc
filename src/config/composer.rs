//! Question composer limits and draft lifetime

use crate::composer::Rules;
use serde::Deserialize;

/// Composer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ComposerConfig {
    /// Drafts older than this are discarded instead of restored
    pub draft_ttl_hours: u32,
    /// Maximum tags per question
    pub max_tags: usize,
    /// Minimum trimmed title length, in characters
    pub min_title_chars: usize,
    /// Minimum trimmed body length, in characters
    pub min_body_chars: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        let rules = Rules::default();
        Self {
            draft_ttl_hours: 24,
            max_tags: rules.max_tags,
            min_title_chars: rules.min_title_chars,
            min_body_chars: rules.min_body_chars,
        }
    }
}

/// Composer settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileComposer {
    pub draft_ttl_hours: Option<u32>,
    pub max_tags: Option<usize>,
    pub min_title_chars: Option<usize>,
    pub min_body_chars: Option<usize>,
}

impl ComposerConfig {
    /// Create from file config with defaults
    pub fn from_file(file: Option<FileComposer>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            draft_ttl_hours: file.draft_ttl_hours.unwrap_or(defaults.draft_ttl_hours),
            // A question needs at least one tag, so the cap can't be zero
            max_tags: file
                .max_tags
                .filter(|&n| n > 0)
                .unwrap_or(defaults.max_tags),
            min_title_chars: file.min_title_chars.unwrap_or(defaults.min_title_chars),
            min_body_chars: file.min_body_chars.unwrap_or(defaults.min_body_chars),
        }
    }

    pub fn rules(&self) -> Rules {
        Rules {
            max_tags: self.max_tags,
            min_title_chars: self.min_title_chars,
            min_body_chars: self.min_body_chars,
        }
    }

    pub fn draft_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.draft_ttl_hours))
    }
}
