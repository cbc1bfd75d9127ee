//! Alien Portal Client
//!
//! Talks to the portal server over REST and keeps the client-side state:
//! the signed-in session, the cached project list, notifications, theme and
//! chat transcripts. Admin, contact and report screens go through services
//! that check the user's role before calling the server. [`PortalClient`] wires these together.

pub mod admin;
pub mod api_client;
pub mod chat;
pub mod config;
pub mod confirm;
pub mod contacts;
pub mod error;
pub mod logging;
pub mod projects;
pub mod reports;
pub mod session;
pub mod theme;
pub mod types;

use std::sync::Arc;

use alien_core::{AccessPolicy, NotificationCenter, ViewPipeline};
use alien_storage::{FileStore, KeyValueStore, ProjectCache, PROJECTS_CACHE_KEY};

pub use admin::AdminService;
pub use api_client::{ApiClientError, RestClient};
pub use chat::{ChatEntry, ChatRole, ChatSession, ChatTarget, ChatTurn};
pub use config::{ConfigError, LogFormat, PortalConfig};
pub use confirm::{ConfirmBroker, ConfirmPrompt, ConfirmRequest};
pub use contacts::ContactsService;
pub use error::{ClientError, ClientResult};
pub use projects::{ProjectFetcher, ProjectsService};
pub use reports::ReportsService;
pub use session::Session;
pub use theme::{Theme, ThemePreference};
pub use types::{
    ActivityLogEntry, ActivityLogPage, ActivityLogQuery, Contact, ContactDraft,
    CreateProjectResponse, TeamMember, UserUpdate,
};

/// Everything a front end needs, sharing one REST client and one store.
pub struct PortalClient {
    rest: RestClient,
    store: Arc<dyn KeyValueStore>,
    notifications: Arc<NotificationCenter>,
    session: Arc<Session>,
    projects: ProjectsService,
    reports: ReportsService,
    admin: AdminService,
    contacts: ContactsService,
    theme: ThemePreference,
}

impl PortalClient {
    pub fn new(config: &PortalConfig) -> ClientResult<Self> {
        let rest = RestClient::new(config)?;
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.storage_dir)?);
        Ok(Self::with_parts(rest, store, config.access_policy()))
    }

    pub fn with_parts(
        rest: RestClient,
        store: Arc<dyn KeyValueStore>,
        policy: AccessPolicy,
    ) -> Self {
        let notifications = Arc::new(NotificationCenter::new());
        let cache = Arc::new(ProjectCache::new(
            PROJECTS_CACHE_KEY,
            store.clone(),
            Arc::new(ProjectFetcher::new(rest.clone())),
            notifications.clone(),
        ));
        let session = Arc::new(Session::new(rest.clone(), store.clone(), cache.clone()));
        let projects = ProjectsService::new(
            rest.clone(),
            session.clone(),
            cache,
            notifications.clone(),
            ViewPipeline::new(policy),
        );
        let reports = ReportsService::new(rest.clone(), session.clone(), notifications.clone());
        let admin = AdminService::new(rest.clone(), session.clone(), notifications.clone());
        let contacts = ContactsService::new(rest.clone(), session.clone(), notifications.clone());
        let theme = ThemePreference::new(store.clone());

        Self {
            rest,
            store,
            notifications,
            session,
            projects,
            reports,
            admin,
            contacts,
            theme,
        }
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn notifications(&self) -> &Arc<NotificationCenter> {
        &self.notifications
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn projects(&self) -> &ProjectsService {
        &self.projects
    }

    pub fn reports(&self) -> &ReportsService {
        &self.reports
    }

    pub fn admin(&self) -> &AdminService {
        &self.admin
    }

    pub fn contacts(&self) -> &ContactsService {
        &self.contacts
    }

    pub fn theme(&self) -> &ThemePreference {
        &self.theme
    }

    pub fn chat(&self, target: ChatTarget) -> ChatSession {
        ChatSession::new(
            self.rest.clone(),
            self.session.clone(),
            self.notifications.clone(),
            target,
        )
    }
}
