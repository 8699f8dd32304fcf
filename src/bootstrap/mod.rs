//! Loads a dashboard for a route and wires up the services that depend on it.

mod loader;
mod route;
mod services;
mod state;
mod template;

use std::sync::Arc;

use dashnote_annotations::AnnotationsCoordinator;
use dashnote_core::notify::{Notification, Notifier};
use dashnote_core::{CoreConfig, DashboardModel, SessionUser};
use dashnote_protocol::dashboard::DashboardDto;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::BootstrapError;

pub use loader::DashboardLoader;
pub use route::{DashboardRoute, InitDashboardArgs, LocationUpdate};
pub use services::{DashboardServices, NoopServices};
pub use state::{InitPhase, LoadingState, SLOW_THRESHOLD};
pub use template::new_dashboard;

use state::LoadingTracker;

#[derive(Debug)]
pub enum BootstrapOutcome {
    /// The route points elsewhere; nothing was initialized.
    Redirect(LocationUpdate),
    Ready {
        dashboard: Arc<DashboardModel>,
        /// Location fix-up to apply alongside the loaded dashboard.
        location: Option<LocationUpdate>,
    },
    Failed(BootstrapError),
}

impl BootstrapOutcome {
    pub fn dashboard(&self) -> Option<&Arc<DashboardModel>> {
        match self {
            BootstrapOutcome::Ready { dashboard, .. } => Some(dashboard),
            _ => None,
        }
    }
}

enum Fetched {
    Dashboard(DashboardDto),
    Redirect(LocationUpdate),
}

pub struct DashboardBootstrap {
    loader: Arc<dyn DashboardLoader>,
    coordinator: Arc<AnnotationsCoordinator>,
    services: Arc<dyn DashboardServices>,
    notifier: Arc<dyn Notifier>,
    session: SessionUser,
    config: CoreConfig,
    tracker: LoadingTracker,
}

impl DashboardBootstrap {
    pub fn new(
        loader: Arc<dyn DashboardLoader>,
        coordinator: Arc<AnnotationsCoordinator>,
        services: Arc<dyn DashboardServices>,
        notifier: Arc<dyn Notifier>,
        session: SessionUser,
        config: CoreConfig,
    ) -> Self {
        Self {
            loader,
            coordinator,
            services,
            notifier,
            session,
            config,
            tracker: LoadingTracker::new(),
        }
    }

    pub fn loading_state(&self) -> watch::Receiver<LoadingState> {
        self.tracker.subscribe()
    }

    pub fn coordinator(&self) -> &Arc<AnnotationsCoordinator> {
        &self.coordinator
    }

    pub async fn init_dashboard(&self, args: &InitDashboardArgs) -> BootstrapOutcome {
        self.tracker.set(InitPhase::Fetching);
        let slow_timer = self.tracker.watch_slow(SLOW_THRESHOLD);
        let outcome = self.run(args).await;
        slow_timer.abort();
        outcome
    }

    async fn run(&self, args: &InitDashboardArgs) -> BootstrapOutcome {
        let dto = match self.fetch(args).await {
            Ok(Fetched::Dashboard(dto)) => dto,
            Ok(Fetched::Redirect(location)) => {
                info!(path = ?location.path, "dashboard route redirected");
                return BootstrapOutcome::Redirect(location);
            }
            Err(err) => {
                return self.fail("Dashboard fetch failed", err);
            }
        };

        self.tracker.set(InitPhase::Initializing);

        let dashboard = match DashboardModel::from_dto(&dto, &self.config.native_datasource) {
            Ok(model) => Arc::new(model),
            Err(err) => {
                return self.fail(
                    "Dashboard model initializing failure",
                    BootstrapError::Model(err.to_string()),
                );
            }
        };

        let location = if args.query.contains_key("orgId") {
            None
        } else {
            Some(LocationUpdate::query_param(
                "orgId",
                self.session.org_id.to_string(),
            ))
        };

        self.services.init_time(&dashboard);
        self.coordinator.init(dashboard.clone());

        if let Err(err) = self.services.init_variables(&dashboard).await {
            warn!(error = %err, "template variable init failed");
            self.notifier
                .notify(Notification::error("Templating init failed").with_detail(err.to_string()));
        }

        if let Err(err) = self.init_panels(&dashboard, args) {
            error!(error = %err, "dashboard init failed");
            self.notifier
                .notify(Notification::error("Dashboard init failed").with_detail(err.to_string()));
        }

        self.services.set_current(&dashboard);
        self.tracker.set(InitPhase::Ready);
        info!(title = %dashboard.title(), uid = ?dashboard.uid(), "dashboard ready");

        BootstrapOutcome::Ready {
            dashboard,
            location,
        }
    }

    fn init_panels(
        &self,
        dashboard: &Arc<DashboardModel>,
        args: &InitDashboardArgs,
    ) -> anyhow::Result<()> {
        self.services.process_repeats(dashboard)?;
        self.services.update_submenu_visibility(dashboard)?;
        if args.query.contains_key("autofitpanels") {
            self.services
                .auto_fit_panels(dashboard, args.query.get("kiosk").map(String::as_str))?;
        }
        self.services.track_unsaved_changes(dashboard)?;
        self.services.setup_keybindings(dashboard)?;
        Ok(())
    }

    async fn fetch(&self, args: &InitDashboardArgs) -> Result<Fetched, BootstrapError> {
        let fetch_err = |err: dashnote_core::BackendError| BootstrapError::Fetch(err.to_string());

        match args.route {
            DashboardRoute::Home => {
                let mut dto = self.loader.home().await.map_err(fetch_err)?;
                if let Some(redirect) = &dto.redirect_uri {
                    let path = self.config.strip_base_from_url(redirect);
                    return Ok(Fetched::Redirect(LocationUpdate {
                        partial: false,
                        ..LocationUpdate::redirect(path)
                    }));
                }
                dto.meta.lock_for_home();
                Ok(Fetched::Dashboard(dto))
            }
            DashboardRoute::Normal => {
                if args.url_type.as_deref() == Some("db") {
                    let slug = args
                        .slug
                        .as_deref()
                        .ok_or(BootstrapError::MissingParameter("slug"))?;
                    let dto = self.loader.by_slug(slug).await.map_err(fetch_err)?;
                    let mut url = dto.meta.url.clone().ok_or_else(|| {
                        BootstrapError::Fetch(format!("dashboard '{}' has no url", slug))
                    })?;
                    if args.is_solo() {
                        url = url.replace("/d/", "/d-solo/");
                    }
                    let path = self.config.strip_base_from_url(&url);
                    return Ok(Fetched::Redirect(LocationUpdate::redirect(path)));
                }

                let dto = if args.url_type.as_deref() == Some("snapshot") {
                    let key = args
                        .slug
                        .as_deref()
                        .ok_or(BootstrapError::MissingParameter("slug"))?;
                    self.loader.snapshot(key).await.map_err(fetch_err)?
                } else {
                    let uid = args
                        .uid
                        .as_deref()
                        .ok_or(BootstrapError::MissingParameter("uid"))?;
                    self.loader.by_uid(uid).await.map_err(fetch_err)?
                };

                if args.fix_url {
                    if let Some(url) = &dto.meta.url {
                        let canonical = self.config.strip_base_from_url(url);
                        if canonical != args.path {
                            return Ok(Fetched::Redirect(LocationUpdate::redirect(canonical)));
                        }
                    }
                }
                Ok(Fetched::Dashboard(dto))
            }
            DashboardRoute::New => Ok(Fetched::Dashboard(new_dashboard(args.folder_id.as_deref()))),
        }
    }

    fn fail(&self, title: &str, err: BootstrapError) -> BootstrapOutcome {
        error!(error = %err, "{}", title);
        self.tracker.set(InitPhase::Error(err.to_string()));
        self.notifier
            .notify(Notification::error(title).with_detail(err.to_string()));
        BootstrapOutcome::Failed(err)
    }
}
