use std::env;
use std::time::Duration;

use dashnote_protocol::annotation::DEFAULT_NATIVE_DATASOURCE;

use crate::errors::ConfigError;

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Runtime environment used by the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    fn from_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

/// Configuration shared by the annotation layer, the bootstrap and the CLI.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Base URL of the first-party backend.
    pub backend_url: String,
    pub api_token: Option<String>,
    /// Reserved datasource name designating the native annotation store.
    pub native_datasource: String,
    /// Sub-path the application is served under; stripped from redirect URLs.
    pub app_sub_url: String,
    pub request_timeout: Duration,
    pub environment: Environment,
    pub log_level: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            api_token: None,
            native_datasource: DEFAULT_NATIVE_DATASOURCE.to_string(),
            app_sub_url: String::new(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            environment: Environment::Development,
            log_level: "info".to_string(),
        }
    }
}

impl CoreConfig {
    /// Loads configuration from the process environment (`DASHNOTE_*`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env_with_prefix("DASHNOTE_")
    }

    /// Loads configuration from env vars prefixed with the provided value.
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        let key = |suffix: &str| format!("{}{}", prefix, suffix);
        let defaults = Self::default();

        let backend_url = env::var(key("BACKEND_URL")).unwrap_or(defaults.backend_url);
        if !backend_url.starts_with("http://") && !backend_url.starts_with("https://") {
            return Err(ConfigError::InvalidEnvVar {
                key: key("BACKEND_URL"),
                message: format!("expected an http(s) URL, got '{}'", backend_url),
            });
        }

        let api_token = env::var(key("API_TOKEN"))
            .ok()
            .filter(|token| !token.trim().is_empty());

        let native_datasource =
            env::var(key("NATIVE_DATASOURCE")).unwrap_or(defaults.native_datasource);

        let app_sub_url = env::var(key("APP_SUB_URL"))
            .map(|raw| raw.trim_end_matches('/').to_string())
            .unwrap_or_default();

        let timeout_key = key("REQUEST_TIMEOUT_SECS");
        let request_timeout = match env::var(&timeout_key) {
            Ok(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|err| ConfigError::InvalidEnvVar {
                    key: timeout_key.clone(),
                    message: err.to_string(),
                })?,
            Err(_) => defaults.request_timeout,
        };

        let environment = env::var(key("ENV"))
            .map(|raw| Environment::from_str(&raw))
            .unwrap_or_default();

        let log_level = env::var(key("LOG")).unwrap_or(defaults.log_level);

        Ok(Self {
            backend_url,
            api_token,
            native_datasource,
            app_sub_url,
            request_timeout,
            environment,
            log_level,
        })
    }

    /// Whether the process is running in production.
    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }

    /// Removes the configured sub-path from an absolute application URL.
    pub fn strip_base_from_url(&self, url: &str) -> String {
        let stripped = if !self.app_sub_url.is_empty() && url.starts_with(&self.app_sub_url) {
            &url[self.app_sub_url.len()..]
        } else {
            url
        };

        if stripped.is_empty() {
            "/".to_string()
        } else {
            stripped.to_string()
        }
    }
}
