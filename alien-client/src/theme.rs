//! Light/dark preference, persisted under `alien_theme`.

use alien_storage::{KeyValueStore, StorageResult, THEME_KEY};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().trim_matches('"') {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads and writes the stored theme as a bare `light`/`dark` string.
#[derive(Clone)]
pub struct ThemePreference {
    store: Arc<dyn KeyValueStore>,
}

impl ThemePreference {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored theme, or light when unset or unrecognised.
    pub fn current(&self) -> StorageResult<Theme> {
        Ok(self
            .store
            .read(THEME_KEY)?
            .as_deref()
            .and_then(Theme::parse)
            .unwrap_or_default())
    }

    pub fn set(&self, theme: Theme) -> StorageResult<()> {
        self.store.write(THEME_KEY, theme.as_str())
    }

    pub fn toggle(&self) -> StorageResult<Theme> {
        let next = self.current()?.toggled();
        self.set(next)?;
        Ok(next)
    }
}
