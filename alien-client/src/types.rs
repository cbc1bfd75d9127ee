//! Request and response bodies exchanged with the portal server.

use alien_core::{ProjectId, Role, User};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error body returned by the server on any non-2xx response.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerError {
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginUser {
    pub profile: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    pub session: Option<SessionTokens>,
    pub user: Option<LoginUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeResponse {
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub name: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateReportRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<&'a str>,
    pub updates: &'a Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncHistoryRequest<'a> {
    pub project_id: &'a str,
}

/// Which log stream of a project to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Internal,
    External,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Internal => "internal",
            Visibility::External => "external",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiStatus {
    #[serde(default)]
    pub initialized: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportType {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateReportRequest<'a> {
    pub report_type: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub report_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendToSlackRequest<'a> {
    pub content: &'a str,
    pub report_type: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingUpdate<'a> {
    pub value: &'a Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapChannelRequest<'a> {
    pub channel_id: &'a str,
    pub client_name: &'a str,
    pub role: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct IgnoreChannelRequest<'a> {
    pub channel_id: &'a str,
    pub channel_name: &'a str,
}

// ----------------------------------------------------------------------
// Users
// ----------------------------------------------------------------------

/// Changes to another user's account. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_projects: Option<Vec<ProjectId>>,
}

impl UserUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_assigned_projects<I, S>(mut self, projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ProjectId>,
    {
        self.assigned_projects = Some(projects.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.role.is_none() && self.display_name.is_none() && self.assigned_projects.is_none()
    }
}

// ----------------------------------------------------------------------
// Contacts
// ----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub slack_user_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Role preselected for a new contact.
pub const DEFAULT_CONTACT_ROLE: &str = "Merchant";

/// Contact fields to create or change. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContactDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slack_user_id: Option<String>,
}

impl ContactDraft {
    /// A new contact with the default role.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            role: Some(DEFAULT_CONTACT_ROLE.to_string()),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_slack_user(mut self, slack_user_id: impl Into<String>) -> Self {
        self.slack_user_id = Some(slack_user_id.into());
        self
    }

    /// True when `name` is missing or blank.
    pub fn lacks_name(&self) -> bool {
        self.name.as_deref().map_or(true, |name| name.trim().is_empty())
    }
}

// ----------------------------------------------------------------------
// Team
// ----------------------------------------------------------------------

/// Role a team member gets when none is given.
pub const DEFAULT_TEAM_ROLE: &str = "Both";

fn default_team_role() -> String {
    DEFAULT_TEAM_ROLE.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub name: String,
    #[serde(default = "default_team_role")]
    pub role: String,
}

// ----------------------------------------------------------------------
// Project creation
// ----------------------------------------------------------------------

/// Owner recorded when a project is created without one.
pub const UNASSIGNED_OWNER: &str = "Unassigned";

#[derive(Debug, Clone, Serialize)]
pub struct CreateProjectRequest<'a> {
    pub client_name: &'a str,
    pub owner: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CreateProjectResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    /// Names of the chat channels opened for the project.
    #[serde(default)]
    pub channels: Vec<String>,
}

// ----------------------------------------------------------------------
// Activity logs
// ----------------------------------------------------------------------

pub const DEFAULT_LOG_LIMIT: u32 = 100;
pub const MAX_LOG_LIMIT: u32 = 500;

/// Filters for the admin activity log. Dates are passed through as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityLogQuery {
    pub action_type: Option<String>,
    pub user_id: Option<String>,
    pub status: Option<String>,
    pub resource_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    limit: u32,
    pub offset: u32,
}

impl Default for ActivityLogQuery {
    fn default() -> Self {
        Self {
            action_type: None,
            user_id: None,
            status: None,
            resource_type: None,
            start_date: None,
            end_date: None,
            limit: DEFAULT_LOG_LIMIT,
            offset: 0,
        }
    }
}

impl ActivityLogQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Page size, kept within `1..=MAX_LOG_LIMIT`.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.clamp(1, MAX_LOG_LIMIT);
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_action_type(mut self, action_type: impl Into<String>) -> Self {
        self.action_type = Some(action_type.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn between(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_date = Some(start.into());
        self.end_date = Some(end.into());
        self
    }

    /// Query string pairs; unset filters are left out.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let filters = [
            ("action_type", &self.action_type),
            ("user_id", &self.user_id),
            ("status", &self.status),
            ("resource_type", &self.resource_type),
            ("start_date", &self.start_date),
            ("end_date", &self.end_date),
        ];
        let mut pairs: Vec<(&'static str, String)> = filters
            .into_iter()
            .filter_map(|(key, value)| value.clone().map(|value| (key, value)))
            .collect();
        pairs.push(("limit", self.limit.to_string()));
        pairs.push(("offset", self.offset.to_string()));
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub action_type: String,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub resource_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActivityLogPage {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub logs: Vec<ActivityLogEntry>,
    #[serde(default)]
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_update_sends_only_set_fields() {
        let update = UserUpdate::new()
            .with_role(Role::Merchant)
            .with_assigned_projects(["p1", "p2"]);
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"role": "merchant", "assigned_projects": ["p1", "p2"]})
        );
        assert!(!update.is_empty());
        assert!(UserUpdate::new().is_empty());
    }

    #[test]
    fn contact_draft_defaults_to_merchant_role() {
        let draft = ContactDraft::named("Ana").with_email("ana@shop.com");
        assert_eq!(
            serde_json::to_value(&draft).unwrap(),
            json!({"name": "Ana", "email": "ana@shop.com", "role": "Merchant"})
        );
        assert!(!draft.lacks_name());
        assert!(ContactDraft::named("  ").lacks_name());
        assert!(ContactDraft::default().with_notes("x").lacks_name());
    }

    #[test]
    fn team_member_role_defaults_to_both() {
        let member: TeamMember = serde_json::from_value(json!({"name": "Dana"})).unwrap();
        assert_eq!(member.role, DEFAULT_TEAM_ROLE);
    }

    #[test]
    fn log_limit_is_clamped() {
        assert_eq!(ActivityLogQuery::new().limit(), DEFAULT_LOG_LIMIT);
        assert_eq!(ActivityLogQuery::new().with_limit(0).limit(), 1);
        assert_eq!(ActivityLogQuery::new().with_limit(9000).limit(), MAX_LOG_LIMIT);
    }

    #[test]
    fn log_query_skips_unset_filters() {
        let query = ActivityLogQuery::new()
            .with_status("error")
            .between("2024-01-01", "2024-02-01")
            .with_offset(50);
        assert_eq!(
            query.to_query(),
            vec![
                ("status", "error".to_string()),
                ("start_date", "2024-01-01".to_string()),
                ("end_date", "2024-02-01".to_string()),
                ("limit", "100".to_string()),
                ("offset", "50".to_string()),
            ]
        );
    }
}
