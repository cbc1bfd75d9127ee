//! Identity types for portal users

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Identifier of a project record as issued by the server.
pub type ProjectId = String;

/// Portal role, ordered from most to least privileged.
///
/// Anything the server sends that is not one of the four known roles
/// deserializes to [`Role::Unknown`], which is never granted anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Top tier: admin screens, settings, user management.
    Superadmin,
    /// Agency staff: full visibility and edit rights.
    Internal,
    /// Platform partner staff.
    Shopline,
    /// Client user, restricted to assigned projects.
    Merchant,
    #[serde(other)]
    Unknown,
}

impl Role {
    /// Rank in the role hierarchy. Higher outranks lower.
    pub fn rank(self) -> u8 {
        match self {
            Role::Superadmin => 4,
            Role::Internal => 3,
            Role::Shopline => 2,
            Role::Merchant => 1,
            Role::Unknown => 0,
        }
    }

    /// Superadmin and internal users see and edit everything.
    pub fn is_elevated(self) -> bool {
        matches!(self, Role::Superadmin | Role::Internal)
    }

    /// Merchants only see projects they are assigned to.
    pub fn is_restricted(self) -> bool {
        matches!(self, Role::Merchant)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Internal => "internal",
            Role::Shopline => "shopline",
            Role::Merchant => "merchant",
            Role::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "superadmin" => Ok(Role::Superadmin),
            "internal" => Ok(Role::Internal),
            "shopline" => Ok(Role::Shopline),
            "merchant" => Ok(Role::Merchant),
            other => Err(ValidationError::InvalidValue {
                field: "role".to_string(),
                reason: format!("unknown role '{}'", other),
            }),
        }
    }
}

/// The signed-in user as returned by `/auth/me` and `/auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub role: Role,
    /// Projects a merchant may see. Ignored for other roles.
    #[serde(default, deserialize_with = "deserialize_assigned")]
    pub assigned_projects: BTreeSet<ProjectId>,
}

impl User {
    pub fn new(id: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            display_name: None,
            role,
            assigned_projects: BTreeSet::new(),
        }
    }

    pub fn with_assigned<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ProjectId>,
    {
        self.assigned_projects = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Lowercased domain part of the email, or `None` if the address has no `@`.
    pub fn email_domain(&self) -> Option<String> {
        email_domain(&self.email)
    }

    pub fn is_assigned(&self, project_id: &str) -> bool {
        self.assigned_projects.contains(project_id)
    }

    /// Name to show in headers: display name, else the email local part.
    pub fn label(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.email.split('@').next().unwrap_or(&self.email),
        }
    }
}

/// Lowercased text after the last `@`.
pub fn email_domain(email: &str) -> Option<String> {
    let (_, domain) = email.trim().rsplit_once('@')?;
    if domain.is_empty() {
        return None;
    }
    Some(domain.to_ascii_lowercase())
}

// The server stores `assigned_projects` as a nullable array.
fn deserialize_assigned<'de, D>(deserializer: D) -> Result<BTreeSet<ProjectId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let ids: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(ids
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| match value {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect())
}
