use async_trait::async_trait;
use dashnote_protocol::annotation::{AnnotationEvent, AnnotationId};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{AnnotationQueryRequest, Datasource, WriteTarget};
use crate::error::AnnotationError;

const DEFAULT_QUERY: &str = "SELECT * FROM \"events\" WHERE $timeFilter";

/// InfluxDB datasource used as the alternate annotation store.
pub struct InfluxDatasource {
    http: reqwest::Client,
    name: String,
    url: Url,
    database: String,
}

impl InfluxDatasource {
    pub fn new(http: reqwest::Client, name: impl Into<String>, url: Url, database: impl Into<String>) -> Self {
        Self {
            http,
            name: name.into(),
            url,
            database: database.into(),
        }
    }

    fn target(&self) -> WriteTarget {
        WriteTarget {
            url: self.url.clone(),
            database: self.database.clone(),
        }
    }
}

#[async_trait]
impl Datasource for InfluxDatasource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn annotation_query(
        &self,
        request: &AnnotationQueryRequest,
    ) -> Result<Vec<AnnotationEvent>, AnnotationError> {
        let time_filter = format!(
            "time >= {}ms and time <= {}ms",
            request.range.from_millis_value(),
            request.range.to_millis_value()
        );
        let query = request
            .annotation
            .extra
            .get("query")
            .and_then(Value::as_str)
            .filter(|query| !query.trim().is_empty())
            .unwrap_or(DEFAULT_QUERY)
            .replace("$timeFilter", &time_filter);

        let url = self.target().endpoint("query")?;
        let response = self
            .http
            .get(url)
            .query(&[("db", self.database.as_str()), ("q", query.as_str()), ("epoch", "ms")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnnotationError::Query(format!("status {}: {}", status.as_u16(), body)));
        }

        let payload: QueryResponse = response
            .json()
            .await
            .map_err(|err| AnnotationError::Decode(err.to_string()))?;
        let events = payload.into_events()?;
        debug!(datasource = %self.name, count = events.len(), "time-series annotations fetched");
        Ok(events)
    }

    fn write_target(&self) -> Option<WriteTarget> {
        Some(self.target())
    }
}

/// Body returned by the time-series `/query` endpoint.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub results: Vec<StatementResult>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StatementResult {
    #[serde(default)]
    pub series: Vec<Series>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Series {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

impl QueryResponse {
    /// First error reported by the server, at top level or per statement.
    pub(crate) fn error(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or_else(|| self.results.iter().find_map(|result| result.error.as_deref()))
    }

    fn into_events(self) -> Result<Vec<AnnotationEvent>, AnnotationError> {
        if let Some(error) = self.error() {
            return Err(AnnotationError::Query(error.to_string()));
        }

        Ok(self
            .results
            .into_iter()
            .flat_map(|result| result.series)
            .flat_map(|series| {
                let columns = series.columns;
                series
                    .values
                    .into_iter()
                    .map(move |row| row_to_event(&columns, row))
            })
            .collect())
    }
}

fn row_to_event(columns: &[String], row: Vec<Value>) -> AnnotationEvent {
    let mut event = AnnotationEvent::default();
    for (column, value) in columns.iter().zip(row) {
        match column.as_str() {
            "time" => event.time = as_i64(&value).unwrap_or_default(),
            "timeEnd" => event.time_end = as_i64(&value),
            "id" => event.id = as_id(&value),
            "text" => event.text = as_string(value).unwrap_or_default(),
            "tags" => {
                event.tags = as_string(value)
                    .map(|tags| {
                        tags.split(',')
                            .map(str::trim)
                            .filter(|tag| !tag.is_empty())
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default()
            }
            "panelId" => event.panel_id = as_i64(&value),
            "dashboardId" => event.dashboard_id = as_i64(&value),
            "userId" => event.user_id = as_i64(&value),
            "login" => event.login = as_string(value),
            "email" => event.email = as_string(value),
            "avatarUrl" => event.avatar_url = as_string(value),
            _ => {}
        }
    }
    event
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| number.as_f64().map(|f| f as i64)),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

fn as_string(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn as_id(value: &Value) -> Option<AnnotationId> {
    match value {
        Value::String(text) => Some(AnnotationId::new(text.as_str())),
        Value::Number(number) => number.as_i64().map(AnnotationId::from),
        _ => None,
    }
}
