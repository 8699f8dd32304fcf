use async_trait::async_trait;
use dashnote_core::http::{encode_path_segment, BackendClient, BackendError};
use dashnote_protocol::dashboard::DashboardDto;

/// Source of dashboard documents.
#[async_trait]
pub trait DashboardLoader: Send + Sync {
    async fn home(&self) -> Result<DashboardDto, BackendError>;

    async fn by_uid(&self, uid: &str) -> Result<DashboardDto, BackendError>;

    /// Legacy lookup used to redirect old `/dashboard/db/<slug>` URLs.
    async fn by_slug(&self, slug: &str) -> Result<DashboardDto, BackendError>;

    async fn snapshot(&self, key: &str) -> Result<DashboardDto, BackendError>;
}

#[async_trait]
impl DashboardLoader for BackendClient {
    async fn home(&self) -> Result<DashboardDto, BackendError> {
        self.get("/api/dashboards/home", &[]).await
    }

    async fn by_uid(&self, uid: &str) -> Result<DashboardDto, BackendError> {
        self.get(&format!("/api/dashboards/uid/{}", encode_path_segment(uid)), &[])
            .await
    }

    async fn by_slug(&self, slug: &str) -> Result<DashboardDto, BackendError> {
        self.get(&format!("/api/dashboards/db/{}", encode_path_segment(slug)), &[])
            .await
    }

    async fn snapshot(&self, key: &str) -> Result<DashboardDto, BackendError> {
        self.get(&format!("/api/snapshots/{}", encode_path_segment(key)), &[])
            .await
    }
}
