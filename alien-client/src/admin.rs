//! Settings, users, team, activity logs and channel mapping.
//!
//! Role checks run before any request. Destructive actions ask for
//! confirmation first and report `false` when declined.

use std::sync::Arc;

use alien_core::{
    can_manage_users, ensure_admin, ensure_can_mutate, AccessError, NotificationCenter, Role,
    User, ValidationError,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::api_client::{ApiClientError, RestClient};
use crate::confirm::{ConfirmBroker, ConfirmPrompt};
use crate::error::ClientResult;
use crate::session::Session;
use crate::types::{ActivityLogPage, ActivityLogQuery, TeamMember, UserUpdate, DEFAULT_TEAM_ROLE};

pub struct AdminService {
    rest: RestClient,
    session: Arc<Session>,
    notifications: Arc<NotificationCenter>,
}

impl AdminService {
    pub fn new(
        rest: RestClient,
        session: Arc<Session>,
        notifications: Arc<NotificationCenter>,
    ) -> Self {
        Self {
            rest,
            session,
            notifications,
        }
    }

    fn require_admin(&self) -> Result<(), AccessError> {
        ensure_admin(self.session.current_user().as_ref())
    }

    fn require_editor(&self) -> Result<(), AccessError> {
        ensure_can_mutate(self.session.current_user().as_ref())
    }

    fn require_user_manager(&self) -> Result<User, AccessError> {
        match self.session.current_user() {
            Some(user) if can_manage_users(Some(&user)) => Ok(user),
            Some(user) => Err(AccessError::Forbidden {
                role: user.role,
                action: "manage users".to_string(),
            }),
            None => Err(AccessError::NotAuthenticated),
        }
    }

    /// Check the result and raise a toast either way.
    async fn announce<T>(
        &self,
        result: Result<T, ApiClientError>,
        done: impl Into<String>,
    ) -> ClientResult<T> {
        match self.session.check(result).await {
            Ok(value) => {
                self.notifications.success(done);
                Ok(value)
            }
            Err(err) => {
                self.notifications.error(err.user_message());
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub async fn settings(&self) -> ClientResult<Value> {
        self.require_admin()?;
        let result = self.rest.list_settings().await;
        self.session.check(result).await
    }

    pub async fn update_setting(&self, key: &str, value: &Value) -> ClientResult<Value> {
        self.require_admin()?;
        let result = self.rest.update_setting(key, value).await;
        self.session.check(result).await
    }

    pub async fn delete_setting(&self, key: &str) -> ClientResult<Value> {
        self.require_admin()?;
        let result = self.rest.delete_setting(key).await;
        self.session.check(result).await
    }

    pub async fn test_connection(&self, service: &str) -> ClientResult<Value> {
        self.require_admin()?;
        let result = self.rest.test_connection(service).await;
        self.session.check(result).await
    }

    // ------------------------------------------------------------------
    // Team
    // ------------------------------------------------------------------

    /// Team members, used as owner choices. Any signed-in user may read it.
    pub async fn team(&self) -> ClientResult<Vec<TeamMember>> {
        self.session.require_user()?;
        let result = self.rest.team().await;
        self.session.check(result).await
    }

    /// Add a team member. `role` defaults to [`DEFAULT_TEAM_ROLE`].
    pub async fn add_team_member(&self, name: &str, role: Option<&str>) -> ClientResult<()> {
        self.require_admin()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "name".to_string(),
            }
            .into());
        }
        let member = TeamMember {
            name: name.to_string(),
            role: role.unwrap_or(DEFAULT_TEAM_ROLE).to_string(),
        };
        let result = self.rest.add_team_member(&member).await;
        self.announce(result, format!("Added {} to team", name)).await?;
        info!(name, role = %member.role, "Team member added");
        Ok(())
    }

    pub async fn remove_team_member(
        &self,
        name: &str,
        confirm: &ConfirmBroker,
    ) -> ClientResult<bool> {
        self.require_admin()?;
        let message = format!("Remove {} from team?", name);
        let prompt = ConfirmPrompt::new("Remove team member", message)
            .with_labels("Remove", "Cancel")
            .danger();
        if !confirm.confirm(prompt).await {
            debug!(name, "Team removal declined");
            return Ok(false);
        }
        let result = self.rest.remove_team_member(name).await;
        self.announce(result, format!("Removed {} from team", name)).await?;
        info!(name, "Team member removed");
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub async fn users(&self) -> ClientResult<Vec<User>> {
        self.require_user_manager()?;
        let result = self.rest.list_users().await;
        self.session.check(result).await
    }

    pub async fn update_user(&self, user_id: &str, update: &UserUpdate) -> ClientResult<()> {
        self.require_user_manager()?;
        if update.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "updates".to_string(),
            }
            .into());
        }
        if update.role == Some(Role::Unknown) {
            return Err(ValidationError::InvalidValue {
                field: "role".to_string(),
                reason: "not a portal role".to_string(),
            }
            .into());
        }
        let result = self.rest.update_user(user_id, update).await;
        self.announce(result, "User updated").await?;
        info!(user_id, role = ?update.role, "User updated");
        Ok(())
    }

    /// Let a pending signup in.
    pub async fn approve_user(&self, user_id: &str) -> ClientResult<()> {
        self.require_user_manager()?;
        let result = self.rest.approve_user(user_id).await;
        self.announce(result, "User approved").await?;
        info!(user_id, "User approved");
        Ok(())
    }

    pub async fn reject_user(&self, user_id: &str, confirm: &ConfirmBroker) -> ClientResult<bool> {
        self.require_user_manager()?;
        let prompt = ConfirmPrompt::new(
            "Reject user",
            "Are you sure you want to reject this user?",
        )
        .with_labels("Reject", "Cancel")
        .danger();
        if !confirm.confirm(prompt).await {
            debug!(user_id, "Reject declined");
            return Ok(false);
        }
        let result = self.rest.reject_user(user_id).await;
        self.announce(result, "User rejected").await?;
        info!(user_id, "User rejected");
        Ok(true)
    }

    /// Delete another account. Deleting yourself is refused before asking.
    pub async fn delete_user(&self, user_id: &str, confirm: &ConfirmBroker) -> ClientResult<bool> {
        let me = self.require_user_manager()?;
        if me.id == user_id {
            return Err(ValidationError::InvalidValue {
                field: "user_id".to_string(),
                reason: "Cannot delete yourself".to_string(),
            }
            .into());
        }
        let prompt = ConfirmPrompt::new(
            "Delete user",
            "Are you sure you want to delete this user? This cannot be undone.",
        )
        .with_labels("Delete", "Cancel")
        .danger();
        if !confirm.confirm(prompt).await {
            debug!(user_id, "User delete declined");
            return Ok(false);
        }
        let result = self.rest.delete_user(user_id).await;
        self.announce(result, "User deleted").await?;
        info!(user_id, "User deleted");
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Activity and sync
    // ------------------------------------------------------------------

    pub async fn activity_logs(&self, query: &ActivityLogQuery) -> ClientResult<ActivityLogPage> {
        self.require_admin()?;
        let result = self.rest.activity_logs(query).await;
        let page = self.session.check(result).await?;
        debug!(count = page.count, offset = query.offset, "Activity logs loaded");
        Ok(page)
    }

    /// Ask the server to re-sync every mapped channel.
    pub async fn global_sync(&self) -> ClientResult<Value> {
        self.require_editor()?;
        let result = self.rest.global_sync().await;
        self.announce(result, "Global sync started").await
    }

    // ------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------

    pub async fn scan_channels(&self) -> ClientResult<Vec<Value>> {
        self.require_editor()?;
        let result = self.rest.scan_channels().await;
        self.session.check(result).await
    }

    pub async fn map_channel(
        &self,
        channel_id: &str,
        client_name: &str,
        role: &str,
    ) -> ClientResult<Value> {
        self.require_editor()?;
        let result = self.rest.map_channel(channel_id, client_name, role).await;
        self.session.check(result).await
    }

    pub async fn ignore_channel(
        &self,
        channel_id: &str,
        channel_name: &str,
    ) -> ClientResult<Value> {
        self.require_editor()?;
        let result = self.rest.ignore_channel(channel_id, channel_name).await;
        self.session.check(result).await
    }

    pub async fn mapped_channels(&self) -> ClientResult<Vec<Value>> {
        self.require_editor()?;
        let result = self.rest.mapped_channels().await;
        self.session.check(result).await
    }
}
