//! Datasources able to answer annotation queries, and their lookup by name.

mod influx;
mod native;

use std::sync::Arc;

use async_trait::async_trait;
use dashnote_core::http::{encode_path_segment, BackendClient};
use dashnote_core::DashboardModel;
use dashnote_protocol::annotation::{AnnotationEvent, AnnotationQueryDefinition};
use dashnote_protocol::time::TimeRange;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::AnnotationError;

pub use influx::InfluxDatasource;
pub(crate) use influx::QueryResponse;
pub use native::NativeDatasource;

/// Inputs for one annotation query against one datasource.
#[derive(Clone)]
pub struct AnnotationQueryRequest {
    pub range: TimeRange,
    pub annotation: AnnotationQueryDefinition,
    pub dashboard: Arc<DashboardModel>,
}

/// Line-protocol write endpoint exposed by a time-series datasource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteTarget {
    pub url: Url,
    pub database: String,
}

impl WriteTarget {
    pub fn endpoint(&self, path: &str) -> Result<Url, AnnotationError> {
        join_path(&self.url, path)
    }
}

#[async_trait]
pub trait Datasource: Send + Sync {
    fn name(&self) -> &str;

    async fn annotation_query(
        &self,
        request: &AnnotationQueryRequest,
    ) -> Result<Vec<AnnotationEvent>, AnnotationError>;

    /// Where events can be written, for datasources backed by a writable store.
    fn write_target(&self) -> Option<WriteTarget> {
        None
    }
}

#[async_trait]
pub trait DatasourceResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<Arc<dyn Datasource>, AnnotationError>;
}

/// Datasource settings as returned by `/api/datasources/name/{name}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceSettings {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub json_data: Value,
}

/// Looks datasources up on the backend by name.
///
/// The reserved native name never leaves the process.
#[derive(Clone)]
pub struct HttpDatasourceResolver {
    backend: BackendClient,
    native_datasource: String,
}

impl HttpDatasourceResolver {
    pub fn new(backend: BackendClient, native_datasource: impl Into<String>) -> Self {
        Self {
            backend,
            native_datasource: native_datasource.into(),
        }
    }

    fn native(&self, name: &str) -> Arc<dyn Datasource> {
        Arc::new(NativeDatasource::new(self.backend.clone(), name))
    }

    /// Datasources reached through the backend proxy carry a relative URL.
    fn store_url(&self, settings: &DatasourceSettings) -> Result<Url, AnnotationError> {
        match Url::parse(&settings.url) {
            Ok(url) => Ok(url),
            Err(_) => join_path(
                self.backend.base_url(),
                &format!("api/datasources/proxy/{}/", settings.id),
            ),
        }
    }
}

#[async_trait]
impl DatasourceResolver for HttpDatasourceResolver {
    async fn resolve(&self, name: &str) -> Result<Arc<dyn Datasource>, AnnotationError> {
        if name == self.native_datasource {
            return Ok(self.native(name));
        }

        let path = format!("/api/datasources/name/{}", encode_path_segment(name));
        let settings: DatasourceSettings = match self.backend.get(&path, &[]).await {
            Ok(settings) => settings,
            Err(err) if err.status() == Some(404) => {
                return Err(AnnotationError::UnknownDatasource(name.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        debug!(name, kind = %settings.kind, "resolved datasource");

        match settings.kind.as_str() {
            "grafana" => Ok(self.native(name)),
            "influxdb" => {
                let url = self.store_url(&settings)?;
                Ok(Arc::new(InfluxDatasource::new(
                    self.backend.http().clone(),
                    settings.name,
                    url,
                    settings.database,
                )))
            }
            other => Err(AnnotationError::UnsupportedDatasource {
                name: name.to_string(),
                kind: other.to_string(),
            }),
        }
    }
}

fn join_path(base: &Url, path: &str) -> Result<Url, AnnotationError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|err| AnnotationError::Transport(format!("invalid url {}{}: {}", base, path, err)))
}
