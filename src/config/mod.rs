//! Configuration for the Q&A server
//!
//! Configuration is loaded in order of precedence:
//! 1. Environment variables (highest priority)
//! 2. Config file (~/.config/physics-qa/config.toml)
//! 3. Built-in defaults (lowest priority)

use anyhow::Context;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Submodules
// ─────────────────────────────────────────────────────────────────────────────

mod auth;
mod composer;
mod features;
mod observability;
mod serialization;
mod storage;


// ─────────────────────────────────────────────────────────────────────────────
// Re-exports
// ─────────────────────────────────────────────────────────────────────────────

pub use auth::{AuthConfig, FileAuth};
pub use composer::{ComposerConfig, FileComposer};
pub use features::{Features, FileFeatures};
pub use observability::{FileLogging, LogFileConfig, LogFormat, LogRotation, LoggingConfig};
pub use storage::{BackendConfig, BackendKind, FileBackend, FileStore, StoreConfig};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory name under ~/.config
pub const APP_NAME: &str = "physics-qa";

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_SITE_NAME: &str = "পদার্থবিজ্ঞান প্রশ্নোত্তর";

/// Upper bound for `page_size` and `featured_limit`
pub const MAX_LIST_LIMIT: usize = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Application Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,

    /// Name shown in the page header and title
    pub site_name: String,

    /// Rows per page on the home feed and user index
    pub page_size: usize,

    /// Number of questions in the featured list
    pub featured_limit: usize,

    /// Content backend selection and connection settings
    pub backend: BackendConfig,

    /// Per-client key/value store
    pub store: StoreConfig,

    /// Composer limits and draft lifetime
    pub composer: ComposerConfig,

    /// Session notifications and the sign-in link
    pub auth: AuthConfig,

    /// Feature flags for optional modules
    pub features: Features,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            site_name: DEFAULT_SITE_NAME.to_string(),
            page_size: 20,
            featured_limit: 5,
            backend: BackendConfig::default(),
            store: StoreConfig::default(),
            composer: ComposerConfig::default(),
            auth: AuthConfig::default(),
            features: Features::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────────

/// Config file structure
#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileConfig {
    pub bind_addr: Option<String>,
    pub site_name: Option<String>,
    pub page_size: Option<usize>,
    pub featured_limit: Option<usize>,

    /// Optional [backend] section
    pub backend: Option<FileBackend>,

    /// Optional [store] section
    pub store: Option<FileStore>,

    /// Optional [composer] section
    pub composer: Option<FileComposer>,

    /// Optional [auth] section
    pub auth: Option<FileAuth>,

    /// Optional [features] section
    pub features: Option<FileFeatures>,

    /// Optional [logging] section
    pub logging: Option<FileLogging>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Loading
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Get the config file path: ~/.config/physics-qa/config.toml
    /// Uses Unix-style ~/.config on all platforms for consistency
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join(APP_NAME).join("config.toml"))
    }

    /// Create config file with defaults if it doesn't exist
    pub fn ensure_config_exists() {
        let Some(path) = Self::config_path() else {
            return;
        };

        if path.exists() {
            return;
        }

        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return; // Config is optional
            }
        }

        let _ = std::fs::write(&path, Self::default().to_toml());
    }

    /// Load file config if it exists
    ///
    /// A config file that exists but cannot be parsed is fatal: the process
    /// exits with a message pointing at the file instead of silently running
    /// on defaults.
    fn load_file_config() -> FileConfig {
        let Some(path) = Self::config_path() else {
            return FileConfig::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("\n╔══════════════════════════════════════════════════════════════╗");
                    eprintln!("║  CONFIG ERROR - Failed to parse configuration file          ║");
                    eprintln!("╚══════════════════════════════════════════════════════════════╝\n");
                    eprintln!("  File: {}\n", path.display());
                    eprintln!("  Error: {}\n", e);
                    eprintln!("  Tip: Check for:\n");
                    eprintln!("    - Missing quotes around string values");
                    eprintln!("    - Invalid boolean values (use true/false)");
                    eprintln!("    - Typos in section names\n");
                    eprintln!("  To reset, run `physics-qa config --reset`.\n");
                    std::process::exit(1);
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileConfig::default(),
            Err(e) => {
                eprintln!("\n╔══════════════════════════════════════════════════════════════╗");
                eprintln!("║  CONFIG ERROR - Cannot read configuration file              ║");
                eprintln!("╚══════════════════════════════════════════════════════════════╝\n");
                eprintln!("  File: {}\n", path.display());
                eprintln!("  Error: {}\n", e);
                std::process::exit(1);
            }
        }
    }

    /// Load configuration: env vars > file > defaults
    pub fn from_env() -> anyhow::Result<Self> {
        Self::resolve(Self::load_file_config(), |key| std::env::var(key).ok())
    }

    /// Merge a parsed file config with environment lookups
    pub(crate) fn resolve(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let defaults = Self::default();

        // Bind address: env > file > default
        let bind_raw = env("PHYSICS_QA_BIND")
            .or(file.bind_addr)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind_raw
            .parse()
            .with_context(|| format!("Invalid bind address: {}", bind_raw))?;

        let site_name = file.site_name.unwrap_or(defaults.site_name);

        // Zero would make every page empty
        let page_size = file
            .page_size
            .filter(|&n| n > 0)
            .map_or(defaults.page_size, |n| n.min(MAX_LIST_LIMIT));
        let featured_limit = file
            .featured_limit
            .filter(|&n| n > 0)
            .map_or(defaults.featured_limit, |n| n.min(MAX_LIST_LIMIT));

        let backend = BackendConfig::from_file(
            file.backend,
            env("PHYSICS_QA_BACKEND"),
            env("PHYSICS_QA_REST_URL"),
            env("PHYSICS_QA_REST_KEY"),
        );
        let store = StoreConfig::from_file(file.store);
        let composer = ComposerConfig::from_file(file.composer);
        let auth = AuthConfig::from_file(file.auth, env("PHYSICS_QA_SESSION_SECRET"));
        let features = Features::from_file(file.features);
        let logging = LoggingConfig::from_file(file.logging);

        Ok(Self {
            bind_addr,
            site_name,
            page_size,
            featured_limit,
            backend,
            store,
            composer,
            auth,
            features,
            logging,
        })
    }
}
