use serde::{Deserialize, Serialize};

/// Alert status for one panel, as reported by `/api/alerts/states-for-dashboard`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertState {
    pub id: i64,
    #[serde(default)]
    pub dashboard_id: i64,
    pub panel_id: i64,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_state_date: Option<String>,
}

impl AlertState {
    pub fn is_alerting(&self) -> bool {
        self.state == "alerting"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_backend_payload() {
        let raw = r#"[{"id":3,"dashboardId":9,"panelId":2,"state":"alerting","newStateDate":"2019-01-01T00:00:00Z"}]"#;
        let states: Vec<AlertState> = serde_json::from_str(raw).expect("decode");
        assert_eq!(states[0].panel_id, 2);
        assert!(states[0].is_alerting());
    }
}
