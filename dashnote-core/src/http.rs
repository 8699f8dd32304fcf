use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::CoreConfig;

/// Typed JSON client for the first-party backend API.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl BackendClient {
    /// Creates a new client bound to the provided base URL.
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        Self::with_http(base_url, reqwest::Client::new())
    }

    /// Builds a client honouring the configured token and request timeout.
    pub fn from_config(config: &CoreConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| BackendError::Http(err.to_string()))?;
        let mut client = Self::with_http(&config.backend_url, http)?;
        client.token = config.api_token.clone();
        Ok(client)
    }

    pub fn with_http(base_url: &str, http: reqwest::Client) -> Result<Self, BackendError> {
        let mut url = Url::parse(base_url).map_err(|err| BackendError::InvalidUrl {
            url: base_url.to_string(),
            message: err.to_string(),
        })?;

        if !url.path().ends_with('/') {
            let mut path = url.path().trim_end_matches('/').to_string();
            path.push('/');
            url.set_path(&path);
        }

        Ok(Self {
            http,
            base_url: url,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Underlying transport, shared with datasource calls that leave the backend.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, BackendError> {
        let url = self.endpoint(path)?;
        debug!(%url, "backend GET");
        self.send(self.http.get(url).query(query)).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "backend POST");
        self.send(self.http.post(url).json(body)).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "backend PUT");
        self.send(self.http.put(url).json(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let url = self.endpoint(path)?;
        debug!(%url, "backend DELETE");
        self.send(self.http.delete(url)).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| BackendError::InvalidUrl {
                url: format!("{}{}", self.base_url, path),
                message: err.to_string(),
            })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|err| BackendError::Http(err.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| BackendError::Http(err.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .and_then(|body| body.message);
            return Err(BackendError::UnexpectedStatus {
                status: status.as_u16(),
                message,
            });
        }

        let decoded = if body.is_empty() {
            serde_json::from_value(serde_json::Value::Null)
        } else {
            serde_json::from_slice(&body)
        };
        decoded.map_err(|err| BackendError::Decode(err.to_string()))
    }
}

pub fn encode_path_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes()).collect()
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Acknowledgement body returned by write endpoints (`{"message": ..., "id": ...}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendAck {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("invalid backend url {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("backend HTTP request failed: {0}")]
    Http(String),
    #[error("backend returned unexpected status {status}")]
    UnexpectedStatus {
        status: u16,
        /// `message` field of the JSON error body, when the backend sent one.
        message: Option<String>,
    },
    #[error("failed to decode backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Message the backend attached to the failure, if any.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            BackendError::UnexpectedStatus { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    async fn spawn(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn decodes_json_and_sends_token() {
        let router = Router::new().route(
            "/api/user",
            get(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({ "auth": auth }))
            }),
        );
        let base = spawn(router).await;
        let client = BackendClient::new(&base).expect("client").with_token("secret");

        let body: Value = client.get("/api/user", &[]).await.expect("response");
        assert_eq!(body["auth"], "Bearer secret");
    }

    #[tokio::test]
    async fn surfaces_backend_error_message() {
        let router = Router::new().route(
            "/api/annotations",
            post(|| async {
                (
                    StatusCode::FORBIDDEN,
                    Json(json!({ "message": "Annotations are disabled" })),
                )
            }),
        );
        let base = spawn(router).await;
        let client = BackendClient::new(&base).expect("client");

        let err = client
            .post::<_, Value>("/api/annotations", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.backend_message(), Some("Annotations are disabled"));
    }

    #[test]
    fn keeps_base_path_when_joining() {
        let client = BackendClient::new("http://localhost:3000/grafana").expect("client");
        let url = client.endpoint("/api/annotations/7").expect("url");
        assert_eq!(url.as_str(), "http://localhost:3000/grafana/api/annotations/7");
    }
}
