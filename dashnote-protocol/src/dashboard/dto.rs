use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope returned by the dashboard endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardDto {
    /// Raw dashboard document; decoded into a model during bootstrap.
    #[serde(default)]
    pub dashboard: Value,
    #[serde(default)]
    pub meta: DashboardMeta,
    /// Set by the home endpoint when the user picked a custom home dashboard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
}

/// Permissions and location metadata attached to a dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMeta {
    #[serde(default)]
    pub can_save: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_share: bool,
    #[serde(default)]
    pub can_star: bool,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub is_snapshot: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default)]
    pub folder_id: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DashboardMeta {
    /// Home dashboards are read-only from the user's point of view.
    pub fn lock_for_home(&mut self) {
        self.can_save = false;
        self.can_share = false;
        self.can_star = false;
    }
}
