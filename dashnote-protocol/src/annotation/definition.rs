use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::event::AnnotationEvent;
use crate::serde_helpers::{bool_or_int, null_as_default};

/// Reserved datasource name of the first-party annotation store.
pub const DEFAULT_NATIVE_DATASOURCE: &str = "-- Grafana --";

/// Query type restricting events to the panel they were created on.
pub const DASHBOARD_SCOPE: &str = "dashboard";

/// Dashboard-owned configuration naming a datasource that supplies
/// annotation events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationQueryDefinition {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub datasource: String,
    #[serde(default, deserialize_with = "bool_or_int")]
    pub enable: bool,
    #[serde(default, deserialize_with = "bool_or_int")]
    pub built_in: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_color: Option<String>,
    /// Frozen results embedded by a dashboard snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_data: Option<Vec<AnnotationEvent>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnnotationQueryDefinition {
    pub fn new(name: impl Into<String>, datasource: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            datasource: datasource.into(),
            enable: true,
            ..Self::default()
        }
    }

    /// The "Annotations & Alerts" definition every dashboard carries.
    pub fn built_in_default(native_datasource: &str) -> Self {
        let mut extra = Map::new();
        extra.insert("hide".into(), Value::Bool(true));
        Self {
            name: "Annotations & Alerts".into(),
            datasource: native_datasource.to_string(),
            enable: true,
            built_in: true,
            kind: Some(DASHBOARD_SCOPE.into()),
            icon_color: Some("rgba(0, 211, 255, 1)".into()),
            snapshot_data: None,
            extra,
        }
    }

    pub fn dashboard_scoped(mut self) -> Self {
        self.kind = Some(DASHBOARD_SCOPE.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enable = false;
        self
    }

    /// Events from dashboard-scoped definitions only show on their own panel.
    pub fn is_dashboard_scoped(&self) -> bool {
        self.kind.as_deref() == Some(DASHBOARD_SCOPE)
    }

    /// Key used to tell definitions apart when merging their results.
    pub fn identity(&self) -> (&str, &str) {
        (self.name.as_str(), self.datasource.as_str())
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot_data.is_some()
    }

    /// Copy of the definition with any embedded snapshot payload removed.
    pub fn without_snapshot(&self) -> Self {
        Self {
            snapshot_data: None,
            ..self.clone()
        }
    }
}
