use async_trait::async_trait;
use dashnote_core::http::BackendClient;
use dashnote_protocol::annotation::AnnotationEvent;
use serde_json::Value;
use tracing::debug;

use super::{AnnotationQueryRequest, Datasource};
use crate::error::AnnotationError;

const DEFAULT_LIMIT: u64 = 100;

/// The first-party annotation store, queried through `/api/annotations`.
pub struct NativeDatasource {
    backend: BackendClient,
    name: String,
}

impl NativeDatasource {
    pub fn new(backend: BackendClient, name: impl Into<String>) -> Self {
        Self {
            backend,
            name: name.into(),
        }
    }
}

#[async_trait]
impl Datasource for NativeDatasource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn annotation_query(
        &self,
        request: &AnnotationQueryRequest,
    ) -> Result<Vec<AnnotationEvent>, AnnotationError> {
        let annotation = &request.annotation;
        let limit = annotation
            .extra
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_LIMIT);

        let mut params: Vec<(&str, String)> = vec![
            ("from", request.range.from_millis_value().to_string()),
            ("to", request.range.to_millis_value().to_string()),
            ("limit", limit.to_string()),
        ];

        if annotation.is_dashboard_scoped() {
            // Unsaved dashboards cannot own annotations yet.
            let Some(dashboard_id) = request.dashboard.id() else {
                return Ok(Vec::new());
            };
            params.push(("dashboardId", dashboard_id.to_string()));
        } else {
            let tags: Vec<&str> = annotation
                .extra
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| tags.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            if tags.is_empty() {
                return Ok(Vec::new());
            }
            params.extend(tags.into_iter().map(|tag| ("tags", tag.to_string())));
            if annotation.extra.get("matchAny").and_then(Value::as_bool) == Some(true) {
                params.push(("matchAny", "true".to_string()));
            }
        }

        let events: Vec<AnnotationEvent> = self.backend.get("/api/annotations", &params).await?;
        debug!(datasource = %self.name, count = events.len(), "native annotations fetched");
        Ok(events)
    }
}
