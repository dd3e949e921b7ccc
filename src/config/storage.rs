//! Storage configuration: content backend and client store
//!
//! - Backend: embedded SQLite file, or a hosted PostgREST endpoint
//! - Store: SQLite file holding per-client preferences and drafts

use serde::Deserialize;
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Backend Selection
// ─────────────────────────────────────────────────────────────────────────────

/// Which backend implementation serves content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// Embedded SQLite database (default)
    #[default]
    Sqlite,
    /// Hosted database behind a PostgREST-style API
    Rest,
}

impl BackendKind {
    /// Parse kind from config; unknown values fall back to sqlite
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "rest" | "postgrest" => Self::Rest,
            _ => Self::Sqlite,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Rest => "rest",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// SQLite database file (kind = "sqlite")
    pub db_path: PathBuf,
    /// Base URL of the hosted service (kind = "rest")
    pub rest_url: Option<String>,
    /// API key sent as `apikey` and bearer token (kind = "rest")
    pub rest_api_key: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Sqlite,
            db_path: PathBuf::from("./data/physics-qa.db"),
            rest_url: None,
            rest_api_key: None,
        }
    }
}

/// Backend settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileBackend {
    pub kind: Option<String>,
    pub db_path: Option<String>,
    pub rest_url: Option<String>,
    pub rest_api_key: Option<String>,
}

impl BackendConfig {
    /// Create from file config; env values take precedence over the file
    pub fn from_file(
        file: Option<FileBackend>,
        env_kind: Option<String>,
        env_url: Option<String>,
        env_key: Option<String>,
    ) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            kind: env_kind
                .or(file.kind)
                .map(|s| BackendKind::parse(&s))
                .unwrap_or(defaults.kind),
            db_path: file.db_path.map(PathBuf::from).unwrap_or(defaults.db_path),
            rest_url: env_url.or(file.rest_url).filter(|s| !s.trim().is_empty()),
            rest_api_key: env_key.or(file.rest_api_key).filter(|s| !s.is_empty()),
        }
    }

    /// Human-readable target for the startup banner (never shows the key)
    pub fn describe(&self) -> String {
        match self.kind {
            BackendKind::Sqlite => format!("sqlite ({})", self.db_path.display()),
            BackendKind::Rest => format!(
                "rest ({})",
                self.rest_url.as_deref().unwrap_or("<rest_url not set>")
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client Store Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// SQLite file for per-client state
    pub db_path: PathBuf,
    /// Clients with no writes for this many days are pruned; 0 keeps everyone
    pub retain_days: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/client-state.db"),
            retain_days: 90,
        }
    }
}

/// Store settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileStore {
    pub db_path: Option<String>,
    pub retain_days: Option<u32>,
}

impl StoreConfig {
    pub fn from_file(file: Option<FileStore>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();
        Self {
            db_path: file.db_path.map(PathBuf::from).unwrap_or(defaults.db_path),
            retain_days: file.retain_days.unwrap_or(defaults.retain_days),
        }
    }

    /// How long an untouched client keeps its stored state
    pub fn retention(&self) -> Option<chrono::Duration> {
        (self.retain_days > 0).then(|| chrono::Duration::days(i64::from(self.retain_days)))
    }
}
