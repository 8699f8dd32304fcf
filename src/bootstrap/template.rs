use dashnote_protocol::dashboard::{DashboardDto, DashboardMeta};
use serde_json::json;

/// Document shown for `/dashboard/new`.
pub fn new_dashboard(folder_id: Option<&str>) -> DashboardDto {
    let folder_id = folder_id
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .unwrap_or(0);

    DashboardDto {
        dashboard: json!({
            "title": "New dashboard",
            "panels": [{
                "type": "add-panel",
                "gridPos": {"x": 0, "y": 0, "w": 12, "h": 9},
                "title": "Panel Title"
            }]
        }),
        meta: DashboardMeta {
            can_star: false,
            can_share: false,
            is_new: true,
            folder_id,
            ..DashboardMeta::default()
        },
        redirect_uri: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_folder_id() {
        assert_eq!(new_dashboard(Some("12")).meta.folder_id, 12);
        assert_eq!(new_dashboard(Some("abc")).meta.folder_id, 0);
        assert!(new_dashboard(None).meta.is_new);
    }
}
