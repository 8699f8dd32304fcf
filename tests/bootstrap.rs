use std::sync::Arc;

use async_trait::async_trait;
use dashnote::bootstrap::{
    BootstrapOutcome, DashboardBootstrap, DashboardLoader, DashboardRoute, DashboardServices,
    InitDashboardArgs, InitPhase, LocationUpdate,
};
use dashnote::BootstrapError;
use dashnote_annotations::{AnnotationsCoordinator, HttpDatasourceResolver};
use dashnote_core::http::BackendError;
use dashnote_core::notify::{Notification, NotificationHub};
use dashnote_core::{BackendClient, CoreConfig, DashboardModel, SessionUser};
use dashnote_protocol::annotation::DEFAULT_NATIVE_DATASOURCE;
use dashnote_protocol::dashboard::{DashboardDto, DashboardMeta};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::broadcast;

struct FakeLoader {
    response: Result<DashboardDto, BackendError>,
    calls: Mutex<Vec<String>>,
}

impl FakeLoader {
    fn returning(response: Result<DashboardDto, BackendError>) -> Arc<Self> {
        Arc::new(Self {
            response,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn respond(&self, call: String) -> Result<DashboardDto, BackendError> {
        self.calls.lock().push(call);
        self.response.clone()
    }
}

#[async_trait]
impl DashboardLoader for FakeLoader {
    async fn home(&self) -> Result<DashboardDto, BackendError> {
        self.respond("home".into())
    }

    async fn by_uid(&self, uid: &str) -> Result<DashboardDto, BackendError> {
        self.respond(format!("uid:{}", uid))
    }

    async fn by_slug(&self, slug: &str) -> Result<DashboardDto, BackendError> {
        self.respond(format!("slug:{}", slug))
    }

    async fn snapshot(&self, key: &str) -> Result<DashboardDto, BackendError> {
        self.respond(format!("snapshot:{}", key))
    }
}

#[derive(Default)]
struct RecordingServices {
    fail_variables: bool,
    fail_repeats: bool,
    calls: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl DashboardServices for RecordingServices {
    fn init_time(&self, _dashboard: &Arc<DashboardModel>) {
        self.calls.lock().push("time");
    }

    async fn init_variables(&self, _dashboard: &Arc<DashboardModel>) -> anyhow::Result<()> {
        self.calls.lock().push("variables");
        if self.fail_variables {
            anyhow::bail!("variable $env has no options");
        }
        Ok(())
    }

    fn process_repeats(&self, _dashboard: &Arc<DashboardModel>) -> anyhow::Result<()> {
        self.calls.lock().push("repeats");
        if self.fail_repeats {
            anyhow::bail!("repeat panel missing");
        }
        Ok(())
    }

    fn auto_fit_panels(&self, _dashboard: &Arc<DashboardModel>, _kiosk: Option<&str>) -> anyhow::Result<()> {
        self.calls.lock().push("autofit");
        Ok(())
    }

    fn setup_keybindings(&self, _dashboard: &Arc<DashboardModel>) -> anyhow::Result<()> {
        self.calls.lock().push("keybindings");
        Ok(())
    }

    fn set_current(&self, _dashboard: &Arc<DashboardModel>) {
        self.calls.lock().push("current");
    }
}

struct Setup {
    bootstrap: DashboardBootstrap,
    loader: Arc<FakeLoader>,
    services: Arc<RecordingServices>,
    notifications: broadcast::Receiver<Notification>,
}

fn setup(response: Result<DashboardDto, BackendError>, services: RecordingServices) -> Setup {
    let client = BackendClient::new("http://127.0.0.1:9").expect("client");
    let hub = NotificationHub::default();
    let notifications = hub.subscribe();
    let notifier = Arc::new(hub);
    let session = SessionUser {
        id: 1,
        org_id: 3,
        ..SessionUser::default()
    };
    let coordinator = Arc::new(AnnotationsCoordinator::new(
        client.clone(),
        Arc::new(HttpDatasourceResolver::new(client, DEFAULT_NATIVE_DATASOURCE)),
        notifier.clone(),
        session.clone(),
    ));
    let config = CoreConfig {
        app_sub_url: "/grafana".into(),
        ..CoreConfig::default()
    };

    let loader = FakeLoader::returning(response);
    let services = Arc::new(services);
    let bootstrap = DashboardBootstrap::new(
        loader.clone(),
        coordinator,
        services.clone(),
        notifier,
        session,
        config,
    );
    Setup {
        bootstrap,
        loader,
        services,
        notifications,
    }
}

fn dto(dashboard: Value, meta: DashboardMeta) -> DashboardDto {
    DashboardDto {
        dashboard,
        meta,
        redirect_uri: None,
    }
}

fn ops_dashboard(url: &str) -> DashboardDto {
    dto(
        json!({"id": 9, "uid": "abc", "title": "Ops", "panels": [{"id": 1, "type": "graph"}]}),
        DashboardMeta {
            can_save: true,
            can_share: true,
            can_star: true,
            url: Some(url.to_string()),
            ..DashboardMeta::default()
        },
    )
}

#[tokio::test]
async fn home_redirect_strips_sub_url() {
    let mut home = ops_dashboard("/grafana/d/abc/ops");
    home.redirect_uri = Some("/grafana/d/abc/ops".into());
    let setup = setup(Ok(home), RecordingServices::default());

    let outcome = setup.bootstrap.init_dashboard(&InitDashboardArgs::home()).await;

    match outcome {
        BootstrapOutcome::Redirect(location) => {
            assert_eq!(location.path.as_deref(), Some("/d/abc/ops"));
            assert!(location.replace);
        }
        other => panic!("expected redirect, got {:?}", other),
    }
    assert!(setup.services.calls.lock().is_empty());
}

#[tokio::test]
async fn home_dashboard_is_locked_and_gets_org_id() {
    let setup = setup(Ok(ops_dashboard("/d/abc/ops")), RecordingServices::default());
    let state = setup.bootstrap.loading_state();

    let outcome = setup.bootstrap.init_dashboard(&InitDashboardArgs::home()).await;

    let BootstrapOutcome::Ready { dashboard, location } = outcome else {
        panic!("expected ready dashboard");
    };
    assert!(!dashboard.meta().can_save);
    assert!(!dashboard.meta().can_share);
    assert!(!dashboard.meta().can_star);
    assert_eq!(location, Some(LocationUpdate::query_param("orgId", "3")));
    assert_eq!(state.borrow().phase, InitPhase::Ready);
    assert!(setup.bootstrap.coordinator().built_in_route().is_ok());
    assert_eq!(
        *setup.services.calls.lock(),
        vec!["time", "variables", "repeats", "keybindings", "current"]
    );
}

#[tokio::test]
async fn legacy_slug_urls_redirect() {
    let setup = setup(Ok(ops_dashboard("/grafana/d/abc/ops")), RecordingServices::default());
    let mut args = InitDashboardArgs::new(DashboardRoute::Normal, "/dashboard/db/ops");
    args.url_type = Some("db".into());
    args.slug = Some("ops".into());

    let outcome = setup.bootstrap.init_dashboard(&args).await;
    assert!(matches!(
        outcome,
        BootstrapOutcome::Redirect(LocationUpdate { path: Some(ref path), .. }) if path == "/d/abc/ops"
    ));

    args.path = "/dashboard-solo/db/ops".into();
    let outcome = setup.bootstrap.init_dashboard(&args).await;
    assert!(matches!(
        outcome,
        BootstrapOutcome::Redirect(LocationUpdate { path: Some(ref path), .. }) if path == "/d-solo/abc/ops"
    ));
    assert_eq!(*setup.loader.calls.lock(), vec!["slug:ops", "slug:ops"]);
}

#[tokio::test]
async fn legacy_slug_without_url_fails() {
    let mut dashboard = ops_dashboard("/d/abc/ops");
    dashboard.meta.url = None;
    let mut setup = setup(Ok(dashboard), RecordingServices::default());
    let mut args = InitDashboardArgs::new(DashboardRoute::Normal, "/dashboard/db/ops");
    args.url_type = Some("db".into());
    args.slug = Some("ops".into());

    let outcome = setup.bootstrap.init_dashboard(&args).await;

    assert!(matches!(outcome, BootstrapOutcome::Failed(BootstrapError::Fetch(_))));
    let notification = setup.notifications.recv().await.expect("notification");
    assert_eq!(notification.title, "Dashboard fetch failed");
}

#[tokio::test]
async fn renamed_dashboards_redirect_to_canonical_url() {
    let setup = setup(Ok(ops_dashboard("/grafana/d/abc/ops-renamed")), RecordingServices::default());

    let outcome = setup
        .bootstrap
        .init_dashboard(&InitDashboardArgs::by_uid("abc", "/d/abc/ops"))
        .await;

    assert!(matches!(
        outcome,
        BootstrapOutcome::Redirect(LocationUpdate { path: Some(ref path), .. }) if path == "/d/abc/ops-renamed"
    ));

    let outcome = setup
        .bootstrap
        .init_dashboard(&InitDashboardArgs::by_uid("abc", "/d/abc/ops-renamed").with_query("orgId", "3"))
        .await;
    let BootstrapOutcome::Ready { location, .. } = outcome else {
        panic!("expected ready dashboard");
    };
    assert!(location.is_none());
}

#[tokio::test]
async fn variable_failure_does_not_abort() {
    let services = RecordingServices {
        fail_variables: true,
        ..RecordingServices::default()
    };
    let mut setup = setup(Ok(ops_dashboard("/d/abc/ops")), services);
    let args = InitDashboardArgs::by_uid("abc", "/d/abc/ops").with_query("autofitpanels", "");

    let outcome = setup.bootstrap.init_dashboard(&args).await;

    assert!(outcome.dashboard().is_some());
    let notification = setup.notifications.recv().await.expect("notification");
    assert_eq!(notification.title, "Templating init failed");
    assert_eq!(notification.detail.as_deref(), Some("variable $env has no options"));
    assert_eq!(
        *setup.services.calls.lock(),
        vec!["time", "variables", "repeats", "autofit", "keybindings", "current"]
    );
}

#[tokio::test]
async fn panel_setup_failure_is_reported_and_continues() {
    let services = RecordingServices {
        fail_repeats: true,
        ..RecordingServices::default()
    };
    let mut setup = setup(Ok(ops_dashboard("/d/abc/ops")), services);

    let outcome = setup
        .bootstrap
        .init_dashboard(&InitDashboardArgs::by_uid("abc", "/d/abc/ops"))
        .await;

    assert!(outcome.dashboard().is_some());
    let notification = setup.notifications.recv().await.expect("notification");
    assert_eq!(notification.title, "Dashboard init failed");
    assert!(setup.services.calls.lock().contains(&"current"));
}

#[tokio::test]
async fn model_failure_aborts() {
    let broken = dto(json!({"title": "Broken", "panels": "not a list"}), DashboardMeta::default());
    let mut setup = setup(Ok(broken), RecordingServices::default());
    let state = setup.bootstrap.loading_state();

    let outcome = setup
        .bootstrap
        .init_dashboard(&InitDashboardArgs::by_uid("abc", "/d/abc/ops"))
        .await;

    assert!(matches!(outcome, BootstrapOutcome::Failed(BootstrapError::Model(_))));
    assert!(matches!(state.borrow().phase, InitPhase::Error(_)));
    let notification = setup.notifications.recv().await.expect("notification");
    assert_eq!(notification.title, "Dashboard model initializing failure");
    assert!(setup.services.calls.lock().is_empty());
    assert!(setup.bootstrap.coordinator().built_in_route().is_err());
}

#[tokio::test]
async fn fetch_failure_aborts() {
    let mut setup = setup(
        Err(BackendError::UnexpectedStatus {
            status: 404,
            message: Some("Dashboard not found".into()),
        }),
        RecordingServices::default(),
    );

    let outcome = setup
        .bootstrap
        .init_dashboard(&InitDashboardArgs::by_uid("missing", "/d/missing"))
        .await;

    assert!(matches!(outcome, BootstrapOutcome::Failed(BootstrapError::Fetch(_))));
    let notification = setup.notifications.recv().await.expect("notification");
    assert_eq!(notification.title, "Dashboard fetch failed");
}

#[tokio::test]
async fn new_dashboard_uses_folder_from_route() {
    let setup = setup(Ok(ops_dashboard("/unused")), RecordingServices::default());
    let mut args = InitDashboardArgs::new(DashboardRoute::New, "/dashboard/new");
    args.folder_id = Some("7".into());

    let outcome = setup.bootstrap.init_dashboard(&args).await;

    let dashboard = outcome.dashboard().expect("dashboard").clone();
    assert_eq!(dashboard.title(), "New dashboard");
    assert_eq!(dashboard.meta().folder_id, 7);
    assert!(dashboard.meta().is_new);
    assert_eq!(dashboard.panels()[0].kind, "add-panel");
    assert!(setup.loader.calls.lock().is_empty());
}
