//! Project list and project edits.
//!
//! Reads go through the cached collection. Writes go to the server first and
//! are patched into the cache only once the server accepts them.

use std::collections::BTreeMap;
use std::sync::Arc;

use alien_core::{
    ensure_can_mutate, AccessError, Blocker, FilterState, NotificationCenter, PortalError,
    PortalResult, ProjectRecord, ValidationError, ViewPipeline,
};
use alien_storage::{CollectionFetcher, ProjectCache, Refreshed};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::api_client::{ApiClientError, RestClient};
use crate::confirm::{ConfirmBroker, ConfirmPrompt};
use crate::error::ClientResult;
use crate::session::Session;
use crate::types::{CreateProjectResponse, Visibility, UNASSIGNED_OWNER};

/// Loads `/projects` for the cache.
#[derive(Debug, Clone)]
pub struct ProjectFetcher {
    rest: RestClient,
}

impl ProjectFetcher {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl CollectionFetcher<ProjectRecord> for ProjectFetcher {
    async fn fetch_collection(&self) -> PortalResult<Vec<ProjectRecord>> {
        self.rest.list_projects().await.map_err(|err| match err {
            ApiClientError::Unauthorized { .. } => PortalError::from(AccessError::NotAuthenticated),
            other => PortalError::fetch(other.user_message()),
        })
    }
}

pub struct ProjectsService {
    rest: RestClient,
    session: Arc<Session>,
    cache: Arc<ProjectCache>,
    notifications: Arc<NotificationCenter>,
    pipeline: ViewPipeline,
}

impl ProjectsService {
    pub fn new(
        rest: RestClient,
        session: Arc<Session>,
        cache: Arc<ProjectCache>,
        notifications: Arc<NotificationCenter>,
        pipeline: ViewPipeline,
    ) -> Self {
        Self {
            rest,
            session,
            cache,
            notifications,
            pipeline,
        }
    }

    pub fn pipeline(&self) -> &ViewPipeline {
        &self.pipeline
    }

    /// Refresh the cached list, ending the session if the server said 401.
    pub async fn refresh(&self, force: bool) -> ClientResult<Refreshed<ProjectRecord>> {
        let refreshed = self.cache.refresh(force).await;
        self.session.sync_expiry().await?;
        Ok(refreshed)
    }

    /// Visible, filtered and sorted projects for the current user.
    pub async fn view(&self, filter: &FilterState) -> Vec<ProjectRecord> {
        let records = self.cache.records().await;
        let user = self.session.current_user();
        self.pipeline
            .project(&records, user.as_ref(), filter)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn find(&self, id: &str) -> Option<ProjectRecord> {
        let user = self.session.current_user();
        self.cache
            .records()
            .await
            .into_iter()
            .find(|record| {
                record.id == id && self.pipeline.policy().can_access(user.as_ref(), Some(record))
            })
    }

    pub async fn distinct_values(&self, field: &str) -> Vec<String> {
        let records = self.cache.records().await;
        let user = self.session.current_user();
        self.pipeline.distinct_values(&records, user.as_ref(), field)
    }

    pub async fn count_by(&self, field: &str) -> BTreeMap<String, usize> {
        let records = self.cache.records().await;
        let user = self.session.current_user();
        self.pipeline.count_by(&records, user.as_ref(), field)
    }

    /// Send field changes to the server and mirror them locally on success.
    ///
    /// A failure raises an error notification and leaves the cache as it was.
    pub async fn update_fields(&self, id: &str, updates: Map<String, Value>) -> ClientResult<()> {
        let user = self.session.current_user();
        ensure_can_mutate(user.as_ref())?;
        if updates.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "updates".to_string(),
            }
            .into());
        }

        let email = user.as_ref().map(|u| u.email.as_str());
        let result = self.rest.update_report(id, email, &updates).await;
        if let Err(err) = self.session.check(result).await {
            self.notifications.error(err.user_message());
            return Err(err);
        }

        let patched = self.cache.apply_local_patch(id, &updates).await?;
        debug!(id, patched, fields = updates.len(), "Project updated");
        self.notifications.success("Project updated");
        Ok(())
    }

    pub async fn update_field(
        &self,
        id: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> ClientResult<()> {
        let mut updates = Map::new();
        updates.insert(field.to_string(), value.into());
        self.update_fields(id, updates).await
    }

    pub async fn set_blocker(&self, id: &str, blocker: &Blocker) -> ClientResult<()> {
        self.update_field(id, "blocker", blocker.encode()).await
    }

    /// Create a project for a new client and reload the list.
    ///
    /// A blank owner is recorded as [`UNASSIGNED_OWNER`].
    pub async fn create_project(
        &self,
        client_name: &str,
        owner: Option<&str>,
    ) -> ClientResult<CreateProjectResponse> {
        ensure_can_mutate(self.session.current_user().as_ref())?;
        let client_name = client_name.trim();
        if client_name.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "client_name".to_string(),
            }
            .into());
        }
        let owner = owner
            .map(str::trim)
            .filter(|owner| !owner.is_empty())
            .unwrap_or(UNASSIGNED_OWNER);

        let result = self.rest.create_project(client_name, owner).await;
        let created = match self.session.check(result).await {
            Ok(created) => created,
            Err(err) => {
                self.notifications.error(err.user_message());
                return Err(err);
            }
        };
        info!(client_name, owner, project_id = ?created.project_id, "Project created");
        self.notifications.success("Project created");
        self.refresh(true).await?;
        Ok(created)
    }

    /// Delete after confirmation. Returns false if the user declined.
    pub async fn delete_project(&self, id: &str, confirm: &ConfirmBroker) -> ClientResult<bool> {
        ensure_can_mutate(self.session.current_user().as_ref())?;
        let prompt = ConfirmPrompt::new(
            "Delete project",
            format!("Delete project {}? This cannot be undone.", id),
        )
        .with_labels("Delete", "Cancel")
        .danger();
        if !confirm.confirm(prompt).await {
            debug!(id, "Delete declined");
            return Ok(false);
        }

        let result = self.rest.delete_project(id).await;
        if let Err(err) = self.session.check(result).await {
            self.notifications.error(err.user_message());
            return Err(err);
        }
        info!(id, "Project deleted");
        self.notifications.success("Project deleted");
        self.refresh(true).await?;
        Ok(true)
    }

    /// Partnership projects visible to the current user.
    pub async fn partnerships(&self) -> ClientResult<Vec<ProjectRecord>> {
        let result = self.rest.list_partnerships().await;
        let records = self.session.check(result).await?;
        let user = self.session.current_user();
        Ok(self
            .pipeline
            .visible(&records, user.as_ref())
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn logs(&self, id: &str, visibility: Visibility) -> ClientResult<Vec<Value>> {
        let result = self.rest.project_logs(id, visibility).await;
        self.session.check(result).await
    }

    pub async fn emails(&self, id: &str) -> ClientResult<Vec<Value>> {
        let result = self.rest.project_emails(id).await;
        self.session.check(result).await
    }

    /// Ask the server to re-import chat history for a project.
    pub async fn sync_history(&self, id: &str) -> ClientResult<()> {
        self.session.require_user()?;
        let result = self.rest.sync_history(id).await;
        match self.session.check(result).await {
            Ok(_) => {
                self.notifications.success("History synced");
                Ok(())
            }
            Err(err) => {
                self.notifications.error(err.user_message());
                Err(err)
            }
        }
    }
}
