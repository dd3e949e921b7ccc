// Light/dark theme preference
//
// Stored per client under the `theme` key and applied to every page shell
// as a `data-theme` attribute. Missing or unknown values read as light.

use crate::store::{ClientId, ClientStore, StoreError, THEME_KEY};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "dark" => Theme::Dark,
            _ => Theme::Light,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// Label for the toggle button (names the theme it switches to)
    pub fn toggle_label(&self) -> &'static str {
        match self {
            Theme::Light => "Dark mode",
            Theme::Dark => "Light mode",
        }
    }
}

pub fn load(store: &ClientStore, client: &ClientId) -> Theme {
    match store.get(client, THEME_KEY) {
        Ok(value) => value.as_deref().map(Theme::parse).unwrap_or_default(),
        Err(e) => {
            tracing::warn!(client = %client, "Failed to read theme preference: {}", e);
            Theme::default()
        }
    }
}

/// Flip the stored preference and return the new theme
pub fn toggle(store: &ClientStore, client: &ClientId) -> Result<Theme, StoreError> {
    let next = load(store, client).toggled();
    store.set(client, THEME_KEY, next.as_str())?;
    Ok(next)
}
