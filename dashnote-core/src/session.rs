use serde::{Deserialize, Serialize};

use crate::http::{BackendClient, BackendError};

/// The signed-in user, as reported by `/api/user`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: i64,
    #[serde(default)]
    pub login: String,
    #[serde(default, alias = "avatarUrl")]
    pub gravatar_url: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_grafana_admin: bool,
    #[serde(default)]
    pub org_id: i64,
}

impl SessionUser {
    /// Whether this user may modify an event authored by `owner_id`.
    ///
    /// Events without an author are system events and always editable.
    pub fn can_edit(&self, owner_id: Option<i64>) -> bool {
        match owner_id {
            Some(owner) => owner == self.id || self.is_grafana_admin,
            None => true,
        }
    }

    pub async fn fetch(client: &BackendClient) -> Result<Self, BackendError> {
        client.get("/api/user", &[]).await
    }
}
