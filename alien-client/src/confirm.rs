//! Confirmation prompts answered by whatever front end is attached.
//!
//! `confirm` suspends the caller until the receiving side answers. A request
//! that is dropped unanswered, or a broker with no receiver, counts as "no".

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub title: String,
    pub message: String,
    pub confirm_label: String,
    pub cancel_label: String,
    /// Marks destructive actions so the front end can style them.
    pub danger: bool,
}

impl ConfirmPrompt {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            confirm_label: "Confirm".to_string(),
            cancel_label: "Cancel".to_string(),
            danger: false,
        }
    }

    pub fn danger(mut self) -> Self {
        self.danger = true;
        self
    }

    pub fn with_labels(mut self, confirm: impl Into<String>, cancel: impl Into<String>) -> Self {
        self.confirm_label = confirm.into();
        self.cancel_label = cancel.into();
        self
    }
}

/// A pending prompt. Answer it with [`ConfirmRequest::respond`].
#[derive(Debug)]
pub struct ConfirmRequest {
    pub prompt: ConfirmPrompt,
    responder: oneshot::Sender<bool>,
}

impl ConfirmRequest {
    pub fn respond(self, accepted: bool) {
        // The asker may have gone away; nothing to do then.
        let _ = self.responder.send(accepted);
    }
}

#[derive(Debug, Clone)]
pub struct ConfirmBroker {
    requests: mpsc::Sender<ConfirmRequest>,
}

impl ConfirmBroker {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<ConfirmRequest>) {
        let (requests, receiver) = mpsc::channel(buffer.max(1));
        (Self { requests }, receiver)
    }

    pub async fn confirm(&self, prompt: ConfirmPrompt) -> bool {
        let (responder, answer) = oneshot::channel();
        let title = prompt.title.clone();
        if self
            .requests
            .send(ConfirmRequest { prompt, responder })
            .await
            .is_err()
        {
            debug!(%title, "No confirm handler attached");
            return false;
        }
        let accepted = answer.await.unwrap_or(false);
        debug!(%title, accepted, "Confirm answered");
        accepted
    }
}

/// Answers every prompt the same way. For non-interactive runs.
pub fn spawn_auto_responder(
    mut receiver: mpsc::Receiver<ConfirmRequest>,
    accept: bool,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = receiver.recv().await {
            request.respond(accept);
        }
    })
}
