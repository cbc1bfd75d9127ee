//! Signed-in session: the current user, stored tokens and the bearer header.
//!
//! Ending a session, by logout or by a 401 from any request, removes both
//! tokens, drops the bearer header and clears the project cache.

use crate::api_client::{ApiClientError, RestClient};
use crate::error::ClientResult;
use alien_core::{AccessError, User};
use alien_storage::{KeyValueStore, ProjectCache, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

pub struct Session {
    rest: RestClient,
    store: Arc<dyn KeyValueStore>,
    projects: Arc<ProjectCache>,
    user: RwLock<Option<User>>,
}

impl Session {
    pub fn new(
        rest: RestClient,
        store: Arc<dyn KeyValueStore>,
        projects: Arc<ProjectCache>,
    ) -> Self {
        Self {
            rest,
            store,
            projects,
            user: RwLock::new(None),
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.user.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    pub fn require_user(&self) -> Result<User, AccessError> {
        self.current_user().ok_or(AccessError::NotAuthenticated)
    }

    /// Resume from a stored access token.
    ///
    /// A token the server rejects is removed; that is not an error.
    pub async fn restore(&self) -> ClientResult<Option<User>> {
        let Some(token) = self.store.read(ACCESS_TOKEN_KEY)? else {
            return Ok(None);
        };
        self.rest.set_bearer(token);
        match self.rest.me().await {
            Ok(user) => {
                info!(user = %user.email, role = %user.role, "Session restored");
                self.set_user(Some(user.clone()));
                Ok(Some(user))
            }
            Err(err) => {
                warn!(error = %err, "Stored session is no longer valid");
                self.end_local().await?;
                Ok(None)
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<User> {
        let response = self.rest.login(email, password).await?;
        if !response.success {
            return Err(ApiClientError::InvalidResponse("Login failed".to_string()).into());
        }
        let (Some(tokens), Some(user)) = (response.session, response.user) else {
            let reason = "login response missing session or user".to_string();
            return Err(ApiClientError::InvalidResponse(reason).into());
        };

        self.store.write(ACCESS_TOKEN_KEY, &tokens.access_token)?;
        self.store.write(REFRESH_TOKEN_KEY, &tokens.refresh_token)?;
        self.rest.set_bearer(tokens.access_token);
        let user = user.profile;
        info!(user = %user.email, role = %user.role, "Logged in");
        self.set_user(Some(user.clone()));
        Ok(user)
    }

    /// Create an account. Returns the server's confirmation message.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> ClientResult<Option<String>> {
        let response = self.rest.signup(email, password, name).await?;
        if !response.success {
            return Err(ApiClientError::InvalidResponse("Signup failed".to_string()).into());
        }
        info!(email, "Signed up");
        Ok(response.message)
    }

    /// Tell the server, then end the session locally whatever it answered.
    pub async fn logout(&self) -> ClientResult<()> {
        if let Err(err) = self.rest.logout().await {
            warn!(error = %err, "Server logout failed");
        }
        self.end_local().await?;
        info!("Logged out");
        Ok(())
    }

    /// End the session if any request since the last check got a 401.
    pub async fn sync_expiry(&self) -> ClientResult<bool> {
        if !self.rest.take_expired() {
            return Ok(false);
        }
        warn!("Server rejected the session; logging out");
        self.end_local().await?;
        Ok(true)
    }

    /// Pass a REST result through, ending the session on 401.
    pub async fn check<T>(&self, result: Result<T, ApiClientError>) -> ClientResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                self.sync_expiry().await?;
                Err(err.into())
            }
        }
    }

    async fn end_local(&self) -> ClientResult<()> {
        self.rest.clear_bearer();
        self.rest.take_expired();
        self.set_user(None);
        self.store.remove(ACCESS_TOKEN_KEY)?;
        self.store.remove(REFRESH_TOKEN_KEY)?;
        self.projects.clear().await?;
        Ok(())
    }

    fn set_user(&self, user: Option<User>) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = user;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.current_user().map(|u| u.email))
            .field("has_bearer", &self.rest.has_bearer())
            .finish()
    }
}
