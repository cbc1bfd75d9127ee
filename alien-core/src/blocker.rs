//! Blocker field codec.
//!
//! Projects store blockers as one string: `"Merchant, Internal | waiting on DNS"`.
//! `"-"` (or an empty value) means no blocker. Older rows hold either a bare
//! category name or free text with no separator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categories offered by the edit form.
pub const BLOCKER_CATEGORIES: [&str; 5] =
    ["Merchant", "Shopline", "3rd Parties", "Internal", "Other"];

const NONE_MARKERS: [&str; 2] = ["-", "None"];

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Blocker {
    pub categories: Vec<String>,
    pub description: String,
}

impl Blocker {
    pub fn parse(raw: Option<&str>) -> Self {
        let raw = raw.map(str::trim).unwrap_or_default();
        if raw.is_empty() || NONE_MARKERS.contains(&raw) {
            return Self::default();
        }
        if let Some((cats, desc)) = raw.split_once('|') {
            return Self {
                categories: cats
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect(),
                description: desc.trim().to_string(),
            };
        }
        if BLOCKER_CATEGORIES.contains(&raw) {
            return Self {
                categories: vec![raw.to_string()],
                description: String::new(),
            };
        }
        Self {
            categories: Vec::new(),
            description: raw.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.description.trim().is_empty()
    }

    /// Add the category if missing, remove it if present.
    pub fn toggle_category(&mut self, category: &str) {
        if let Some(pos) = self.categories.iter().position(|c| c == category) {
            self.categories.remove(pos);
        } else {
            self.categories.push(category.to_string());
        }
    }

    /// The string to write back to the project.
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("-");
        }
        write!(f, "{} | {}", self.categories.join(", "), self.description.trim())
    }
}
