//! Sign-in integration with the external identity service
//!
//! The identity service tells us about session changes by POSTing to
//! `/auth/session`. Those requests are signed with a shared secret; with no
//! secret configured every notification is refused.

use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthConfig {
    /// HMAC-SHA256 key for `X-Session-Signature`
    pub session_secret: Option<String>,
    /// Target of the header's "Sign in" link; the link is hidden when unset
    pub sign_in_url: Option<String>,
}

/// Auth settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileAuth {
    pub session_secret: Option<String>,
    pub sign_in_url: Option<String>,
}

impl AuthConfig {
    /// Create from file config; the env secret takes precedence
    pub fn from_file(file: Option<FileAuth>, env_secret: Option<String>) -> Self {
        let file = file.unwrap_or_default();
        Self {
            session_secret: env_secret.or(file.session_secret).filter(|s| !s.is_empty()),
            sign_in_url: file.sign_in_url.filter(|s| !s.trim().is_empty()),
        }
    }
}
