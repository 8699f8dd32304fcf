use async_trait::async_trait;
use dashnote_core::http::{BackendAck, BackendClient};
use dashnote_protocol::annotation::AnnotationEvent;
use tracing::info;

use super::{AnnotationStore, WriteOutcome};
use crate::error::AnnotationError;

/// Writes straight to the backend; authorization is enforced server side.
#[derive(Clone)]
pub struct NativeStoreAdapter {
    backend: BackendClient,
}

impl NativeStoreAdapter {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl AnnotationStore for NativeStoreAdapter {
    async fn insert(&self, event: &AnnotationEvent) -> Result<WriteOutcome, AnnotationError> {
        let ack: BackendAck = self.backend.post("/api/annotations", event).await?;
        info!(id = ?ack.id, "annotation saved to native store");
        Ok(WriteOutcome::Applied)
    }

    async fn update(&self, event: &AnnotationEvent) -> Result<WriteOutcome, AnnotationError> {
        let id = event.id.as_ref().ok_or(AnnotationError::MissingId)?;
        let _: BackendAck = self
            .backend
            .put(&format!("/api/annotations/{}", id), event)
            .await?;
        info!(%id, "annotation updated in native store");
        Ok(WriteOutcome::Applied)
    }

    async fn delete(&self, event: &AnnotationEvent) -> Result<WriteOutcome, AnnotationError> {
        let path = if event.is_region {
            let region = event.region_handle().ok_or(AnnotationError::MissingId)?;
            format!("/api/annotations/region/{}", region)
        } else {
            let id = event.id.as_ref().ok_or(AnnotationError::MissingId)?;
            format!("/api/annotations/{}", id)
        };
        let _: BackendAck = self.backend.delete(&path).await?;
        info!(%path, "annotation deleted from native store");
        Ok(WriteOutcome::Applied)
    }
}
