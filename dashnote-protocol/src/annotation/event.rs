use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::definition::AnnotationQueryDefinition;
use crate::serde_helpers::null_as_default;

/// Store-assigned identifier of an annotation event.
///
/// The native store hands out integers while the time-series store keys
/// events by a string tag, so both shapes are accepted on the wire and kept
/// as text internally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationId(String);

impl AnnotationId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for AnnotationId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for AnnotationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AnnotationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Serialize for AnnotationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_i64() {
            Some(number) => serializer.serialize_i64(number),
            None => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for AnnotationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Float(f64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(value) => AnnotationId(value.to_string()),
            RawId::Float(value) if value.fract() == 0.0 => AnnotationId((value as i64).to_string()),
            RawId::Float(value) => AnnotationId(value.to_string()),
            RawId::Text(value) => AnnotationId(value),
        })
    }
}

/// A point or interval overlay on a panel's time axis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AnnotationId>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_end: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_uid: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<AnnotationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_state: Option<String>,
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_region: bool,
    /// Query definition that produced this event. Stamped by the merge stage,
    /// never sent to a store.
    #[serde(skip)]
    pub source: Option<Arc<AnnotationQueryDefinition>>,
}

impl AnnotationEvent {
    /// Creates an unsaved point event.
    pub fn new(time: i64, text: impl Into<String>) -> Self {
        Self {
            time,
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<AnnotationId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_time_end(mut self, time_end: i64) -> Self {
        self.time_end = Some(time_end);
        self
    }

    pub fn with_panel(mut self, panel_id: i64) -> Self {
        self.panel_id = Some(panel_id);
        self
    }

    pub fn with_dashboard(mut self, dashboard_id: i64) -> Self {
        self.dashboard_id = Some(dashboard_id);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_source(mut self, source: Arc<AnnotationQueryDefinition>) -> Self {
        self.source = Some(source);
        self
    }

    /// Panel scope of the event. The native store reports `0` for events
    /// that are not bound to a panel.
    pub fn scoped_panel_id(&self) -> Option<i64> {
        self.panel_id.filter(|id| *id != 0)
    }

    /// Whether the event spans an interval rather than a single instant.
    pub fn spans_interval(&self) -> bool {
        matches!(self.time_end, Some(end) if end != self.time)
    }

    /// Datasource name of the query definition that produced the event.
    pub fn source_datasource(&self) -> Option<&str> {
        self.source.as_deref().map(|source| source.datasource.as_str())
    }

    /// Handle used by the native store for region deletes.
    pub fn region_handle(&self) -> Option<&AnnotationId> {
        self.region_id.as_ref().or(self.id.as_ref())
    }
}
