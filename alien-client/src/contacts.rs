//! Client contact book.
//!
//! Anyone signed in may read it. Creating, editing and deleting contacts
//! takes an elevated role.

use std::sync::Arc;

use alien_core::{ensure_can_mutate, NotificationCenter, ValidationError};
use tracing::{debug, info};

use crate::api_client::{ApiClientError, RestClient};
use crate::confirm::{ConfirmBroker, ConfirmPrompt};
use crate::error::{ClientError, ClientResult};
use crate::session::Session;
use crate::types::{Contact, ContactDraft};

pub struct ContactsService {
    rest: RestClient,
    session: Arc<Session>,
    notifications: Arc<NotificationCenter>,
}

impl ContactsService {
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

    pub async fn list(&self) -> ClientResult<Vec<Contact>> {
        self.session.require_user()?;
        let result = self.rest.list_contacts().await;
        let contacts = self.session.check(result).await;
        if contacts.is_err() {
            self.notifications.error("Failed to load contacts");
        }
        contacts
    }

    pub async fn create(&self, draft: &ContactDraft) -> ClientResult<()> {
        ensure_can_mutate(self.session.current_user().as_ref())?;
        require_name(draft)?;
        let result = self.rest.create_contact(draft).await;
        self.finish_save(result, "Contact created!").await
    }

    /// Change the fields set on `draft`. A name, if given, may not be blank.
    pub async fn update(&self, id: &str, draft: &ContactDraft) -> ClientResult<()> {
        ensure_can_mutate(self.session.current_user().as_ref())?;
        if draft.name.is_some() {
            require_name(draft)?;
        }
        let result = self.rest.update_contact(id, draft).await;
        self.finish_save(result, "Contact updated!").await
    }

    /// Delete after confirmation. Returns false if the user declined.
    pub async fn delete(&self, id: &str, confirm: &ConfirmBroker) -> ClientResult<bool> {
        ensure_can_mutate(self.session.current_user().as_ref())?;
        let prompt = ConfirmPrompt::new("Delete contact", "Delete this contact?")
            .with_labels("Delete", "Cancel")
            .danger();
        if !confirm.confirm(prompt).await {
            debug!(id, "Contact delete declined");
            return Ok(false);
        }

        let result = self.rest.delete_contact(id).await;
        match self.session.check(result).await {
            Ok(_) => {
                info!(id, "Contact deleted");
                self.notifications.success("Contact deleted");
                Ok(true)
            }
            Err(err) => {
                self.notifications.error("Failed to delete contact");
                Err(err)
            }
        }
    }

    async fn finish_save<T>(
        &self,
        result: Result<T, ApiClientError>,
        done: &str,
    ) -> ClientResult<()> {
        match self.session.check(result).await {
            Ok(_) => {
                self.notifications.success(done);
                Ok(())
            }
            Err(err) => {
                self.notifications.error(save_failure(&err));
                Err(err)
            }
        }
    }
}

fn require_name(draft: &ContactDraft) -> Result<(), ValidationError> {
    if draft.lacks_name() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "name".to_string(),
        });
    }
    Ok(())
}

fn save_failure(err: &ClientError) -> String {
    err.server_message()
        .unwrap_or("Failed to save contact")
        .to_string()
}
