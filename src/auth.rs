// Auth controller - per-client session state and profile provisioning
//
// Transitions are driven by session-change notifications from the auth
// service (POST /auth/session, POST /auth/signout); nothing polls.
//
//   SignedOut ──session(identity)──→ SignedIn(identity) ──signout──→ SignedOut
//
// Entering SignedIn makes sure a profile row exists for the identity.
// A session notification is only trusted when it carries
// hex(HMAC-SHA256(secret, body)) in `SESSION_SIGNATURE_HEADER`.

use crate::backend::{Backend, BackendError};
use crate::model::{Identity, NewProfile, Profile, UserId};
use serde::Serialize;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Request header carrying the session notification signature
pub const SESSION_SIGNATURE_HEADER: &str = "x-session-signature";

const USERNAME_STEM_MAX: usize = 15;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum AuthState {
    #[default]
    SignedOut,
    SignedIn(Identity),
}

/// Which header controls are visible
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderView {
    pub show_sign_in: bool,
    pub show_sign_out: bool,
    pub show_ask: bool,
    /// Username for the "my profile" link, once a profile is known
    pub profile_username: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AuthController {
    state: AuthState,
    profile: Option<Profile>,
}

impl AuthController {
    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            AuthState::SignedIn(identity) => Some(identity),
            AuthState::SignedOut => None,
        }
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.identity().map(|i| &i.user_id)
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// Replace the cached profile after an edit
    pub fn set_profile(&mut self, profile: Profile) {
        if self.user_id() == Some(&profile.id) {
            self.profile = Some(profile);
        }
    }

    /// Apply a session-change notification
    pub async fn on_session_change(&mut self, backend: &dyn Backend, session: Option<Identity>) {
        match session {
            None => {
                if let Some(user) = self.user_id() {
                    tracing::info!(user = %user, "Signed out");
                }
                self.state = AuthState::SignedOut;
                self.profile = None;
            }
            Some(identity) => {
                let same = self.user_id() == Some(&identity.user_id);
                if !same {
                    tracing::info!(user = %identity.user_id, "Signed in");
                    self.profile = None;
                }
                self.profile = ensure_profile(backend, &identity).await.or(self.profile.take());
                self.state = AuthState::SignedIn(identity);
            }
        }
    }

    pub fn header_view(&self) -> HeaderView {
        match &self.state {
            AuthState::SignedOut => HeaderView {
                show_sign_in: true,
                show_sign_out: false,
                show_ask: false,
                profile_username: None,
                display_name: None,
            },
            AuthState::SignedIn(identity) => {
                let display_name = self
                    .profile
                    .as_ref()
                    .map(|p| p.shown_name().to_string())
                    .or_else(|| identity.display_name.clone())
                    .or_else(|| identity.email.clone());
                HeaderView {
                    show_sign_in: false,
                    show_sign_out: true,
                    show_ask: true,
                    profile_username: self.profile.as_ref().map(|p| p.username.clone()),
                    display_name,
                }
            }
        }
    }
}

/// Username for a first sign-in: e-mail local part plus a stable 4-hex suffix
pub fn derive_username(identity: &Identity) -> String {
    let local = identity
        .email
        .as_deref()
        .and_then(|e| e.split('@').next())
        .unwrap_or("");

    let mut stem: String = local
        .chars()
        .filter_map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => Some(c),
            'A'..='Z' => Some(c.to_ascii_lowercase()),
            '.' | '-' | '+' => Some('_'),
            _ => None,
        })
        .take(USERNAME_STEM_MAX)
        .collect();
    if stem.trim_matches('_').is_empty() {
        stem = "user".to_string();
    }

    let digest = Sha256::digest(identity.user_id.0.as_bytes());
    format!("{}_{:02x}{:02x}", stem, digest[0], digest[1])
}

/// Fetch the identity's profile, creating it on first sign-in
///
/// Failures other than "not found" are logged and swallowed; the next
/// session change tries again.
pub async fn ensure_profile(backend: &dyn Backend, identity: &Identity) -> Option<Profile> {
    match backend.get_profile(&identity.user_id).await {
        Ok(profile) => return Some(profile),
        Err(BackendError::NotFound) => {}
        Err(e) => {
            tracing::warn!(user = %identity.user_id, "Profile lookup failed: {}", e);
            return None;
        }
    }

    let username = derive_username(identity);
    let display_name = identity
        .display_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| username.clone());
    let new_profile = NewProfile {
        id: identity.user_id.clone(),
        username,
        display_name,
        avatar_url: identity.avatar_url.clone(),
    };

    match backend.insert_profile(&new_profile).await {
        Ok(profile) => {
            tracing::info!(user = %profile.id, username = %profile.username, "Profile created");
            Some(profile)
        }
        Err(e) => {
            tracing::warn!(user = %identity.user_id, "Profile creation failed: {}", e);
            None
        }
    }
}

/// Hex signature of a session notification body
pub fn sign_session(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a presented signature against the body
pub fn verify_session(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::RecordingBackend;
    use regex::Regex;

    fn identity(id: &str, email: &str) -> Identity {
        Identity {
            user_id: UserId(id.to_string()),
            email: Some(email.to_string()),
            display_name: Some("Karim Uddin".to_string()),
            avatar_url: None,
        }
    }

    #[test]
    fn test_signed_out_header() {
        let auth = AuthController::default();
        let header = auth.header_view();
        assert!(header.show_sign_in);
        assert!(!header.show_sign_out);
        assert!(!header.show_ask);
        assert_eq!(header.display_name, None);
    }

    #[test]
    fn test_derived_usernames_are_valid_and_stable() {
        let valid = Regex::new(r"^[a-z0-9_]{3,20}$").unwrap();
        let samples = [
            identity("u1", "Karim.Uddin+physics@example.com"),
            identity("u2", "a@example.com"),
            identity("u3", "ছাত্র@example.com"),
            identity("u4", &format!("{}@example.com", "x".repeat(40))),
        ];
        for id in &samples {
            let name = derive_username(id);
            assert!(valid.is_match(&name), "invalid username {name:?}");
            assert_eq!(derive_username(id), name);
        }
        assert!(derive_username(&samples[0]).starts_with("karim_uddin_phy"));
        assert!(derive_username(&samples[2]).starts_with("user_"));
        assert_ne!(
            derive_username(&identity("u5", "same@example.com")),
            derive_username(&identity("u6", "same@example.com"))
        );
    }

    #[tokio::test]
    async fn test_first_sign_in_creates_profile_once() {
        let backend = RecordingBackend::new();
        let mut auth = AuthController::default();
        let id = identity("user-1", "karim@example.com");

        auth.on_session_change(&backend, Some(id.clone())).await;
        assert_eq!(auth.state(), &AuthState::SignedIn(id.clone()));
        assert_eq!(backend.profile_insert_count(), 1);
        let profile = auth.profile().unwrap();
        assert_eq!(profile.display_name, "Karim Uddin");

        let header = auth.header_view();
        assert!(header.show_sign_out && header.show_ask && !header.show_sign_in);
        assert_eq!(header.profile_username.as_deref(), Some(profile.username.as_str()));

        // Same identity again: no second insert
        auth.on_session_change(&backend, Some(id)).await;
        assert_eq!(backend.profile_insert_count(), 1);

        auth.on_session_change(&backend, None).await;
        assert_eq!(auth.state(), &AuthState::SignedOut);
        assert!(auth.profile().is_none());
    }

    #[tokio::test]
    async fn test_lookup_failure_is_ignored() {
        let backend = RecordingBackend::new();
        *backend.fail_profile_read.lock().unwrap() =
            Some(BackendError::Unavailable("timeout".to_string()));

        let mut auth = AuthController::default();
        let id = identity("user-2", "rina@example.com");
        auth.on_session_change(&backend, Some(id.clone())).await;

        assert_eq!(auth.state(), &AuthState::SignedIn(id));
        assert_eq!(backend.profile_insert_count(), 0);
        assert!(auth.profile().is_none());
        // Header still reflects the session, using the identity's name
        assert_eq!(auth.header_view().display_name.as_deref(), Some("Karim Uddin"));
    }

    #[test]
    fn test_session_signature() {
        let body = br#"{"user_id":"u1"}"#;
        let signature = sign_session("secret", body);
        assert_eq!(signature.len(), 64);
        assert!(verify_session("secret", body, &signature));
        assert!(verify_session("secret", body, &signature.to_uppercase()));

        assert!(!verify_session("other", body, &signature));
        assert!(!verify_session("secret", br#"{"user_id":"u2"}"#, &signature));
        assert!(!verify_session("secret", body, "not-hex"));
        assert!(!verify_session("secret", body, ""));
    }
}
