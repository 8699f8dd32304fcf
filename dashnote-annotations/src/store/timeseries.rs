use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashnote_core::notify::{Notification, Notifier};
use dashnote_core::SessionUser;
use dashnote_protocol::annotation::AnnotationEvent;
use tracing::{info, warn};

use super::line_protocol::{encode_event_line, AuthorFields, MEASUREMENT};
use super::{AnnotationStore, WriteOutcome};
use crate::datasource::{DatasourceResolver, WriteTarget};
use crate::error::AnnotationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Create,
    Replace,
}

/// Writes events into a time-series datasource keyed by the `id` tag.
///
/// Failures are reported through the returned [`WriteOutcome`] and the
/// notifier, never as an `Err`.
#[derive(Clone)]
pub struct TimeSeriesStoreAdapter {
    datasource: String,
    resolver: Arc<dyn DatasourceResolver>,
    http: reqwest::Client,
    session: SessionUser,
    notifier: Arc<dyn Notifier>,
}

impl TimeSeriesStoreAdapter {
    pub fn new(
        datasource: impl Into<String>,
        resolver: Arc<dyn DatasourceResolver>,
        http: reqwest::Client,
        session: SessionUser,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            datasource: datasource.into(),
            resolver,
            http,
            session,
            notifier,
        }
    }

    /// Permission gate shared by every write.
    fn permitted(&self, event: &AnnotationEvent) -> bool {
        if self.session.can_edit(event.user_id) {
            return true;
        }
        warn!(
            owner = ?event.user_id,
            user = self.session.id,
            datasource = %self.datasource,
            "annotation write denied"
        );
        self.notifier.notify(Notification::warning("Edit permission denied"));
        false
    }

    /// Resolved on every call so datasource edits take effect immediately.
    async fn target(&self) -> Result<WriteTarget, AnnotationError> {
        let datasource = self.resolver.resolve(&self.datasource).await?;
        datasource
            .write_target()
            .ok_or_else(|| AnnotationError::NotWritable(self.datasource.clone()))
    }

    async fn write(&self, event: &AnnotationEvent, mode: WriteMode) -> WriteOutcome {
        let (id, author) = match mode {
            WriteMode::Create => (
                Utc::now().timestamp_millis().to_string(),
                AuthorFields::from_session(&self.session),
            ),
            WriteMode::Replace => match &event.id {
                Some(id) => (id.to_string(), AuthorFields::from_event(event)),
                None => return self.failed("Annotation write failed", AnnotationError::MissingId),
            },
        };

        let line = encode_event_line(&id, event, &author);
        match self.post_line(line).await {
            Ok(()) => {
                info!(%id, datasource = %self.datasource, "annotation written to time-series store");
                let title = match mode {
                    WriteMode::Create => "Annotation added",
                    WriteMode::Replace => "Annotation updated",
                };
                self.notifier.notify(Notification::success(title));
                WriteOutcome::Applied
            }
            Err(err) => self.failed("Annotation write failed", err),
        }
    }

    async fn post_line(&self, line: String) -> Result<(), AnnotationError> {
        let target = self.target().await?;
        let url = target.endpoint("write")?;
        let response = self
            .http
            .post(url)
            .query(&[("db", target.database.as_str())])
            .body(line)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AnnotationError::Query(format!("status {}: {}", status.as_u16(), body.trim())))
        }
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), AnnotationError> {
        let target = self.target().await?;
        let url = target.endpoint("query")?;
        let statement = format!(
            "DELETE FROM {} WHERE \"id\" = '{}'",
            MEASUREMENT,
            id.replace('\\', "\\\\").replace('\'', "\\'")
        );
        let response = self
            .http
            .post(url)
            .query(&[("db", target.database.as_str()), ("q", statement.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AnnotationError::Query(format!("status {}: {}", status.as_u16(), body.trim())));
        }
        if let Ok(payload) = serde_json::from_str::<crate::datasource::QueryResponse>(&body) {
            if let Some(error) = payload.error() {
                return Err(AnnotationError::Query(error.to_string()));
            }
        }
        Ok(())
    }

    fn failed(&self, title: &str, err: AnnotationError) -> WriteOutcome {
        warn!(error = %err, datasource = %self.datasource, "{}", title);
        self.notifier
            .notify(Notification::warning(title).with_detail(err.notification_detail()));
        WriteOutcome::Failed(err.to_string())
    }
}

#[async_trait]
impl AnnotationStore for TimeSeriesStoreAdapter {
    async fn insert(&self, event: &AnnotationEvent) -> Result<WriteOutcome, AnnotationError> {
        if !self.permitted(event) {
            return Ok(WriteOutcome::Denied);
        }
        Ok(self.write(event, WriteMode::Create).await)
    }

    /// Delete then re-insert under the same id; the store has no update.
    async fn update(&self, event: &AnnotationEvent) -> Result<WriteOutcome, AnnotationError> {
        if !self.permitted(event) {
            return Ok(WriteOutcome::Denied);
        }
        let Some(id) = &event.id else {
            return Ok(self.failed("Annotation update failed", AnnotationError::MissingId));
        };
        if let Err(err) = self.delete_by_id(id.as_str()).await {
            return Ok(self.failed("Annotation update failed", err));
        }
        Ok(self.write(event, WriteMode::Replace).await)
    }

    async fn delete(&self, event: &AnnotationEvent) -> Result<WriteOutcome, AnnotationError> {
        if !self.permitted(event) {
            return Ok(WriteOutcome::Denied);
        }
        let Some(id) = &event.id else {
            return Ok(self.failed("Annotation delete failed", AnnotationError::MissingId));
        };
        match self.delete_by_id(id.as_str()).await {
            Ok(()) => {
                info!(%id, datasource = %self.datasource, "annotation deleted from time-series store");
                self.notifier.notify(Notification::success("Annotation deleted"));
                Ok(WriteOutcome::Applied)
            }
            Err(err) => Ok(self.failed("Annotation delete failed", err)),
        }
    }
}
