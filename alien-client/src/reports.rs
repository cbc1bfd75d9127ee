//! Generated reports.

use std::sync::Arc;

use alien_core::{NotificationCenter, ValidationError};
use tracing::info;

use crate::api_client::RestClient;
use crate::error::ClientResult;
use crate::session::Session;
use crate::types::{Report, ReportType};

pub struct ReportsService {
    rest: RestClient,
    session: Arc<Session>,
    notifications: Arc<NotificationCenter>,
}

impl ReportsService {
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

    pub async fn types(&self) -> ClientResult<Vec<ReportType>> {
        let result = self.rest.report_types().await;
        self.session.check(result).await
    }

    pub async fn generate(&self, report_type: &str) -> ClientResult<Report> {
        if report_type.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "report_type".to_string(),
            }
            .into());
        }
        let result = self.rest.generate_report(report_type).await;
        let report = self.session.check(result).await?;
        info!(report_type, bytes = report.content.len(), "Report generated");
        Ok(report)
    }

    /// Post a generated report to the team's Slack channel.
    pub async fn send_to_slack(&self, report: &Report) -> ClientResult<()> {
        if report.content.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "content".to_string(),
            }
            .into());
        }
        let result = self
            .rest
            .send_report_to_slack(&report.content, &report.report_type)
            .await;
        match self.session.check(result).await {
            Ok(_) => {
                self.notifications.success("Report sent to Slack");
                Ok(())
            }
            Err(err) => {
                self.notifications.error(err.user_message());
                Err(err)
            }
        }
    }
}
