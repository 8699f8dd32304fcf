use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardRoute {
    Home,
    Normal,
    New,
}

/// Parameters of the route that asked for a dashboard.
#[derive(Debug, Clone)]
pub struct InitDashboardArgs {
    pub route: DashboardRoute,
    pub uid: Option<String>,
    pub slug: Option<String>,
    /// `db` for legacy slug URLs, `snapshot` for snapshot keys.
    pub url_type: Option<String>,
    pub folder_id: Option<String>,
    /// Redirect to the canonical URL when the current path differs.
    pub fix_url: bool,
    pub path: String,
    pub query: BTreeMap<String, String>,
}

impl InitDashboardArgs {
    pub fn new(route: DashboardRoute, path: impl Into<String>) -> Self {
        Self {
            route,
            uid: None,
            slug: None,
            url_type: None,
            folder_id: None,
            fix_url: false,
            path: path.into(),
            query: BTreeMap::new(),
        }
    }

    pub fn home() -> Self {
        Self::new(DashboardRoute::Home, "/")
    }

    pub fn by_uid(uid: impl Into<String>, path: impl Into<String>) -> Self {
        let mut args = Self::new(DashboardRoute::Normal, path);
        args.uid = Some(uid.into());
        args.fix_url = true;
        args
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub(crate) fn is_solo(&self) -> bool {
        self.path.contains("dashboard-solo") || self.path.starts_with("/d-solo/")
    }
}

/// Navigation the caller should apply, replacing the current history entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationUpdate {
    pub path: Option<String>,
    pub query: BTreeMap<String, String>,
    /// Merge into the current location rather than replacing it.
    pub partial: bool,
    pub replace: bool,
}

impl LocationUpdate {
    pub fn redirect(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            query: BTreeMap::new(),
            partial: true,
            replace: true,
        }
    }

    pub fn query_param(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut query = BTreeMap::new();
        query.insert(key.into(), value.into());
        Self {
            path: None,
            query,
            partial: true,
            replace: true,
        }
    }
}
