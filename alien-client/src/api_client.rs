//! REST client for the portal server.

use crate::config::PortalConfig;
use crate::types::{
    ActivityLogPage, ActivityLogQuery, AiStatus, ChatRequest, ChatResponse, Contact, ContactDraft,
    CreateProjectRequest, CreateProjectResponse, GenerateReportRequest, IgnoreChannelRequest,
    LoginRequest, LoginResponse, MapChannelRequest, MeResponse, MessageResponse, Report,
    ReportType, SendToSlackRequest, ServerError, SettingUpdate, SignupRequest, SignupResponse,
    SyncHistoryRequest, TeamMember, UpdateReportRequest, UserUpdate, Visibility,
};
use alien_core::{ProjectRecord, User};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode, Url};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Not authenticated: {message}")]
    Unauthorized { message: String },
    #[error("Forbidden: {message}")]
    Forbidden { message: String },
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiClientError {
    /// Text suitable for a toast: the server's own message when it sent one.
    pub fn user_message(&self) -> String {
        match self {
            ApiClientError::Unauthorized { message }
            | ApiClientError::Forbidden { message }
            | ApiClientError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Bearer token plus a latch set whenever the server answers 401.
#[derive(Debug, Default)]
struct AuthState {
    bearer: RwLock<Option<String>>,
    expired: AtomicBool,
}

#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    auth: Arc<AuthState>,
}

impl RestClient {
    pub fn new(config: &PortalConfig) -> Result<Self, ApiClientError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        Self::with_base_url(&config.api_base_url, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, ApiClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth: Arc::new(AuthState::default()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_bearer(&self, token: impl Into<String>) {
        *self.auth.bearer.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
        self.auth.expired.store(false, Ordering::Release);
    }

    pub fn clear_bearer(&self) {
        *self.auth.bearer.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn has_bearer(&self) -> bool {
        self.auth
            .bearer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// True once, after any request was rejected with 401.
    pub fn take_expired(&self) -> bool {
        self.auth.expired.swap(false, Ordering::AcqRel)
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<LoginResponse, ApiClientError> {
        self.post_json("/auth/login", &LoginRequest { email, password })
            .await
    }

    pub async fn logout(&self) -> Result<Value, ApiClientError> {
        self.send_json::<Value, ()>(Method::POST, "/auth/logout", None).await
    }

    pub async fn me(&self) -> Result<User, ApiClientError> {
        let response: MeResponse = self.get_json("/auth/me").await?;
        Ok(response.user)
    }

    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<SignupResponse, ApiClientError> {
        self.post_json("/auth/signup", &SignupRequest { email, password, name })
            .await
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ApiClientError> {
        self.get_json("/auth/users").await
    }

    pub async fn update_user(
        &self,
        user_id: &str,
        update: &UserUpdate,
    ) -> Result<Value, ApiClientError> {
        let path = format!("/auth/users/{}", user_id);
        self.send_json(Method::PUT, &path, Some(update)).await
    }

    pub async fn approve_user(&self, user_id: &str) -> Result<Value, ApiClientError> {
        let path = format!("/auth/users/{}/approve", user_id);
        self.send_json::<Value, ()>(Method::POST, &path, None).await
    }

    pub async fn reject_user(&self, user_id: &str) -> Result<Value, ApiClientError> {
        let path = format!("/auth/users/{}/reject", user_id);
        self.send_json::<Value, ()>(Method::POST, &path, None).await
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<Value, ApiClientError> {
        let path = format!("/auth/users/{}", user_id);
        self.send_json::<Value, ()>(Method::DELETE, &path, None).await
    }

    pub async fn activity_logs(
        &self,
        query: &ActivityLogQuery,
    ) -> Result<ActivityLogPage, ApiClientError> {
        let request = self.request(Method::GET, "/logs").query(&query.to_query());
        self.execute(request).await
    }

    // ------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------

    pub async fn list_projects(&self) -> Result<Vec<ProjectRecord>, ApiClientError> {
        self.get_json("/projects").await
    }

    pub async fn list_partnerships(&self) -> Result<Vec<ProjectRecord>, ApiClientError> {
        self.get_json("/partnerships").await
    }

    pub async fn create_project(
        &self,
        client_name: &str,
        owner: &str,
    ) -> Result<CreateProjectResponse, ApiClientError> {
        self.post_json("/create-project", &CreateProjectRequest { client_name, owner })
            .await
    }

    pub async fn update_report(
        &self,
        project_id: &str,
        user_email: Option<&str>,
        updates: &Map<String, Value>,
    ) -> Result<Value, ApiClientError> {
        let path = format!("/projects/{}/update-report", project_id);
        self.post_json(&path, &UpdateReportRequest { user_email, updates })
            .await
    }

    pub async fn delete_project(&self, project_id: &str) -> Result<Value, ApiClientError> {
        let path = format!("/projects/{}", project_id);
        self.send_json::<Value, ()>(Method::DELETE, &path, None).await
    }

    pub async fn project_logs(
        &self,
        project_id: &str,
        visibility: Visibility,
    ) -> Result<Vec<Value>, ApiClientError> {
        let path = format!("/projects/{}/logs", project_id);
        let request = self
            .request(Method::GET, &path)
            .query(&[("visibility", visibility.as_str())]);
        self.execute(request).await
    }

    pub async fn project_emails(&self, project_id: &str) -> Result<Vec<Value>, ApiClientError> {
        let path = format!("/projects/{}/emails", project_id);
        self.get_json(&path).await
    }

    pub async fn sync_history(&self, project_id: &str) -> Result<Value, ApiClientError> {
        self.post_json("/sync-history", &SyncHistoryRequest { project_id })
            .await
    }

    pub async fn global_sync(&self) -> Result<Value, ApiClientError> {
        self.send_json::<Value, ()>(Method::POST, "/sync/global", None)
            .await
    }

    // ------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------

    pub async fn project_chat(
        &self,
        project_id: &str,
        message: &str,
        visibility: Visibility,
        thread_id: Option<&str>,
    ) -> Result<ChatResponse, ApiClientError> {
        let path = format!("/projects/{}/ai/chat", project_id);
        let body = ChatRequest {
            message,
            visibility: Some(visibility),
            thread_id,
        };
        self.post_json(&path, &body).await
    }

    pub async fn project_ai_status(&self, project_id: &str) -> Result<AiStatus, ApiClientError> {
        let path = format!("/projects/{}/ai/status", project_id);
        self.get_json(&path).await
    }

    pub async fn initialize_project_ai(
        &self,
        project_id: &str,
    ) -> Result<MessageResponse, ApiClientError> {
        let path = format!("/projects/{}/ai/initialize", project_id);
        self.send_json::<MessageResponse, ()>(Method::POST, &path, None).await
    }

    pub async fn sync_project_ai(
        &self,
        project_id: &str,
    ) -> Result<MessageResponse, ApiClientError> {
        let path = format!("/projects/{}/ai/sync", project_id);
        self.send_json::<MessageResponse, ()>(Method::POST, &path, None).await
    }

    pub async fn alien_gpt_chat(
        &self,
        message: &str,
        thread_id: Option<&str>,
    ) -> Result<ChatResponse, ApiClientError> {
        let body = ChatRequest {
            message,
            visibility: None,
            thread_id,
        };
        self.post_json("/alien-gpt/chat", &body).await
    }

    pub async fn global_chat(&self, message: &str) -> Result<ChatResponse, ApiClientError> {
        let body = ChatRequest {
            message,
            visibility: None,
            thread_id: None,
        };
        self.post_json("/ai/chat", &body).await
    }

    // ------------------------------------------------------------------
    // Reports
    // ------------------------------------------------------------------

    pub async fn report_types(&self) -> Result<Vec<ReportType>, ApiClientError> {
        self.get_json("/reports/types").await
    }

    pub async fn generate_report(&self, report_type: &str) -> Result<Report, ApiClientError> {
        self.post_json("/reports/generate", &GenerateReportRequest { report_type })
            .await
    }

    pub async fn send_report_to_slack(
        &self,
        content: &str,
        report_type: &str,
    ) -> Result<Value, ApiClientError> {
        let body = SendToSlackRequest {
            content,
            report_type,
        };
        self.post_json("/reports/send-to-slack", &body).await
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub async fn list_settings(&self) -> Result<Value, ApiClientError> {
        self.get_json("/settings/").await
    }

    pub async fn update_setting(&self, key: &str, value: &Value) -> Result<Value, ApiClientError> {
        let path = format!("/settings/{}", key);
        self.send_json(Method::PUT, &path, Some(&SettingUpdate { value }))
            .await
    }

    pub async fn delete_setting(&self, key: &str) -> Result<Value, ApiClientError> {
        let path = format!("/settings/{}", key);
        self.send_json::<Value, ()>(Method::DELETE, &path, None).await
    }

    pub async fn test_connection(&self, service: &str) -> Result<Value, ApiClientError> {
        let path = format!("/settings/test-connection/{}", service);
        self.send_json::<Value, ()>(Method::POST, &path, None).await
    }

    pub async fn team(&self) -> Result<Vec<TeamMember>, ApiClientError> {
        self.get_json("/settings/team").await
    }

    pub async fn add_team_member(&self, member: &TeamMember) -> Result<Value, ApiClientError> {
        self.post_json("/settings/team/add", member).await
    }

    /// Names may contain spaces, so they are sent as an encoded path segment.
    pub async fn remove_team_member(&self, name: &str) -> Result<Value, ApiClientError> {
        let request = self.request_segments(Method::DELETE, &["settings", "team", name])?;
        self.execute(request).await
    }

    // ------------------------------------------------------------------
    // Contacts
    // ------------------------------------------------------------------

    pub async fn list_contacts(&self) -> Result<Vec<Contact>, ApiClientError> {
        self.get_json("/contacts").await
    }

    pub async fn create_contact(&self, draft: &ContactDraft) -> Result<Value, ApiClientError> {
        self.post_json("/contacts", draft).await
    }

    pub async fn update_contact(
        &self,
        contact_id: &str,
        draft: &ContactDraft,
    ) -> Result<Value, ApiClientError> {
        let path = format!("/contacts/{}", contact_id);
        self.send_json(Method::PUT, &path, Some(draft)).await
    }

    pub async fn delete_contact(&self, contact_id: &str) -> Result<Value, ApiClientError> {
        let path = format!("/contacts/{}", contact_id);
        self.send_json::<Value, ()>(Method::DELETE, &path, None).await
    }

    // ------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------

    pub async fn scan_channels(&self) -> Result<Vec<Value>, ApiClientError> {
        self.get_json("/scan-channels").await
    }

    pub async fn map_channel(
        &self,
        channel_id: &str,
        client_name: &str,
        role: &str,
    ) -> Result<Value, ApiClientError> {
        let body = MapChannelRequest {
            channel_id,
            client_name,
            role,
        };
        self.post_json("/map-channel", &body).await
    }

    pub async fn ignore_channel(
        &self,
        channel_id: &str,
        channel_name: &str,
    ) -> Result<Value, ApiClientError> {
        let body = IgnoreChannelRequest {
            channel_id,
            channel_name,
        };
        self.post_json("/ignore-channel", &body).await
    }

    pub async fn mapped_channels(&self) -> Result<Vec<Value>, ApiClientError> {
        self.get_json("/mapped-channels").await
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.authorized(self.client.request(method, url))
    }

    /// Like `request`, but each segment is percent-encoded onto the base URL.
    fn request_segments(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<reqwest::RequestBuilder, ApiClientError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| ApiClientError::InvalidUrl(format!("{}: {}", self.base_url, err)))?;
        url.path_segments_mut()
            .map_err(|_| ApiClientError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(self.authorized(self.client.request(method, url)))
    }

    fn authorized(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let bearer = self
            .auth
            .bearer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(token) = bearer {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => request = request.header(AUTHORIZATION, value),
                Err(err) => warn!(error = %err, "Stored bearer token is not a valid header value"),
            }
        }
        request
    }

    async fn get_json<T>(&self, path: &str) -> Result<T, ApiClientError>
    where
        T: serde::de::DeserializeOwned,
    {
        self.execute(self.request(Method::GET, path)).await
    }

    async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiClientError>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        self.send_json(Method::POST, path, Some(body)).await
    }

    async fn send_json<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiClientError>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.execute(request).await
    }

    async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiClientError> {
        let response = request.send().await?;
        self.parse_response(response).await
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiClientError> {
        let status = response.status();
        let url = response.url().path().to_string();
        if status.is_success() {
            let text = response.text().await?;
            // Empty 2xx bodies decode as an empty object.
            let body = if text.trim().is_empty() { "{}" } else { text.as_str() };
            return serde_json::from_str::<T>(body)
                .map_err(|err| ApiClientError::InvalidResponse(format!("{}: {}", url, err)));
        }

        let text = response.text().await?;
        let message = serde_json::from_str::<ServerError>(&text)
            .map(|body| body.error)
            .unwrap_or_else(|_| {
                if text.trim().is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    text
                }
            });
        debug!(path = %url, status = status.as_u16(), %message, "Request rejected");

        match status {
            StatusCode::UNAUTHORIZED => {
                self.auth.expired.store(true, Ordering::Release);
                Err(ApiClientError::Unauthorized { message })
            }
            StatusCode::FORBIDDEN => Err(ApiClientError::Forbidden { message }),
            _ => Err(ApiClientError::Status {
                status: status.as_u16(),
                message,
            }),
        }
    }
}
