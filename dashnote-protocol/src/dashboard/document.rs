use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::annotation::AnnotationQueryDefinition;
use crate::serde_helpers::null_as_default;

/// Typed view over the parts of a dashboard document this layer reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub annotations: AnnotationList,
    #[serde(default, deserialize_with = "null_as_default")]
    pub panels: Vec<PanelDocument>,
    /// Present while the dashboard is being captured as a snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub list: Vec<AnnotationQueryDefinition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelDocument {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    /// Alert rule attached to the panel, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_pos: Option<GridPos>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PanelDocument {
    pub fn has_alert(&self) -> bool {
        matches!(&self.alert, Some(alert) if !alert.is_null())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPos {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}
