//! Config serialization to TOML
//!
//! Single source of truth for config file format.

use super::{BackendKind, Config};

/// Quote a value as a TOML string (escapes quotes, backslashes, control chars)
fn toml_str(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}

impl Config {
    /// Serialize the [backend] section; REST settings are commented out until set
    fn backend_to_toml(&self) -> String {
        let backend = &self.backend;
        let mut output = String::from("[backend]\n");
        output.push_str(&format!(
            "kind = \"{}\"  # sqlite, rest (PHYSICS_QA_BACKEND overrides)\n",
            backend.kind.as_str()
        ));
        output.push_str(&format!(
            "db_path = {}\n",
            toml_str(&backend.db_path.display().to_string())
        ));

        match &backend.rest_url {
            Some(url) => output.push_str(&format!("rest_url = {}\n", toml_str(url))),
            None => output.push_str("# rest_url = \"https://your-project.example.co\"\n"),
        }
        match &backend.rest_api_key {
            Some(key) => output.push_str(&format!("rest_api_key = {}\n", toml_str(key))),
            None if backend.kind == BackendKind::Rest => output.push_str(
                "# rest_api_key = \"...\"  # or set PHYSICS_QA_REST_KEY\n",
            ),
            None => output.push_str("# rest_api_key = \"...\"\n"),
        }
        output
    }

    /// Serialize the [auth] section; unset values stay commented out
    fn auth_to_toml(&self) -> String {
        let auth = &self.auth;
        let mut output = String::from("[auth]\n");
        match &auth.session_secret {
            Some(secret) => output.push_str(&format!("session_secret = {}\n", toml_str(secret))),
            None => output.push_str(
                "# session_secret = \"...\"  # or set PHYSICS_QA_SESSION_SECRET\n",
            ),
        }
        match &auth.sign_in_url {
            Some(url) => output.push_str(&format!("sign_in_url = {}\n", toml_str(url))),
            None => output.push_str("# sign_in_url = \"https://auth.example.com/login\"\n"),
        }
        output
    }

    /// Serialize config to TOML string (single source of truth for format)
    pub fn to_toml(&self) -> String {
        // File settings are written even when disabled, as a template
        let log_file = self.logging.file.clone().unwrap_or_default();
        format!(
            r#"# physics-qa configuration

# HTTP bind address (PHYSICS_QA_BIND overrides)
bind_addr = "{bind}"

# Name shown in the page header
site_name = {site_name}

# Questions per page on the home feed
page_size = {page_size}

# Questions in the featured list
featured_limit = {featured_limit}

# ─────────────────────────────────────────────────────────────────────────────
# CONTENT BACKEND
# ─────────────────────────────────────────────────────────────────────────────
# "sqlite" keeps everything in a local file. "rest" talks to a hosted
# Postgres through its PostgREST API (set rest_url and rest_api_key).

{backend_section}
# Per-client state: theme, question drafts, featured fragment
[store]
db_path = {store_db_path}
retain_days = {store_retain_days}  # 0 keeps idle clients forever

# Ask-a-question form
[composer]
draft_ttl_hours = {draft_ttl}
max_tags = {max_tags}
min_title_chars = {min_title}
min_body_chars = {min_body}

# ─────────────────────────────────────────────────────────────────────────────
# SIGN-IN
# ─────────────────────────────────────────────────────────────────────────────
# The identity service POSTs session changes to /auth/session with
# X-Session-Signature: hex(HMAC-SHA256(session_secret, body)).
# Without a secret every session notification is refused.

{auth_section}
# Feature flags
[features]
live_updates = {live_updates}
featured_cache = {featured_cache}

# Logging configuration (RUST_LOG env var overrides)
[logging]
level = "{log_level}"
format = "{log_format}"  # full, compact, pretty, json
access_log = {access_log}
# JSON file logging (in addition to stdout)
file_enabled = {log_file_enabled}
file_dir = {log_file_dir}
file_rotation = "{log_file_rotation}"  # hourly, daily, never
file_prefix = {log_file_prefix}
file_max_files = {log_file_max}  # 0 keeps every file
"#,
            bind = self.bind_addr,
            site_name = toml_str(&self.site_name),
            page_size = self.page_size,
            featured_limit = self.featured_limit,
            backend_section = self.backend_to_toml(),
            store_db_path = toml_str(&self.store.db_path.display().to_string()),
            store_retain_days = self.store.retain_days,
            auth_section = self.auth_to_toml(),
            draft_ttl = self.composer.draft_ttl_hours,
            max_tags = self.composer.max_tags,
            min_title = self.composer.min_title_chars,
            min_body = self.composer.min_body_chars,
            live_updates = self.features.live_updates,
            featured_cache = self.features.featured_cache,
            log_level = self.logging.level,
            log_format = self.logging.format.as_str(),
            access_log = self.logging.access_log,
            log_file_enabled = self.logging.file.is_some(),
            log_file_dir = toml_str(&log_file.dir.display().to_string()),
            log_file_rotation = log_file.rotation.as_str(),
            log_file_prefix = toml_str(&log_file.prefix),
            log_file_max = log_file.max_files,
        )
    }

    /// Save current configuration to file
    pub fn save(&self) -> Result<(), std::io::Error> {
        let Some(path) = Self::config_path() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config path",
            ));
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&path, self.to_toml())
    }
}
