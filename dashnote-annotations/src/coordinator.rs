//! Per-dashboard annotation fetch, merge and write routing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashnote_core::http::BackendClient;
use dashnote_core::notify::{Notification, Notifier};
use dashnote_core::{DashboardModel, RefreshHookId, SessionUser};
use dashnote_protocol::annotation::{
    AlertState, AnnotationEvent, AnnotationQueryDefinition, DEFAULT_NATIVE_DATASOURCE,
};
use dashnote_protocol::dashboard::PanelDocument;
use dashnote_protocol::time::TimeRange;
use futures::future::{try_join_all, BoxFuture, FutureExt};
use parking_lot::RwLock;
use tracing::{debug, error, info};

use crate::datasource::{AnnotationQueryRequest, Datasource, DatasourceResolver};
use crate::error::AnnotationError;
use crate::merge::{dedup, filter_for_panel, flag_regions};
use crate::slot::{FetchSlot, KeyedSlots};
use crate::store::{
    AnnotationStore, NativeStoreAdapter, StoreRoute, TimeSeriesStoreAdapter, WriteOutcome,
};

/// Panel asking for annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PanelRef {
    pub id: i64,
    pub has_alert: bool,
}

impl PanelRef {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            has_alert: false,
        }
    }

    pub fn with_alert(mut self) -> Self {
        self.has_alert = true;
        self
    }
}

impl From<&PanelDocument> for PanelRef {
    fn from(panel: &PanelDocument) -> Self {
        Self {
            id: panel.id,
            has_alert: panel.has_alert(),
        }
    }
}

#[derive(Clone)]
pub struct AnnotationOptions {
    pub dashboard: Arc<DashboardModel>,
    pub panel: PanelRef,
    pub range: TimeRange,
}

#[derive(Debug, Clone, Default)]
pub struct AnnotationsResult {
    pub annotations: Vec<AnnotationEvent>,
    pub alert_state: Option<AlertState>,
}

/// Results per enabled query definition, in definition order.
type SourceResults = Vec<Vec<AnnotationEvent>>;

struct CacheState {
    epoch: AtomicU64,
    global: FetchSlot<SourceResults>,
    alert_states: FetchSlot<Vec<AlertState>>,
    datasources: KeyedSlots<Arc<dyn Datasource>>,
}

impl CacheState {
    fn reset(&self) {
        self.global.reset();
        self.alert_states.reset();
        self.datasources.clear();
    }

    fn invalidate_reads(&self) {
        self.global.reset();
        self.alert_states.reset();
    }
}

struct BoundDashboard {
    dashboard: Arc<DashboardModel>,
    hook: RefreshHookId,
}

/// Fetches, merges and caches annotations for the bound dashboard and routes
/// writes to the store each event belongs to.
pub struct AnnotationsCoordinator {
    backend: BackendClient,
    resolver: Arc<dyn DatasourceResolver>,
    notifier: Arc<dyn Notifier>,
    session: SessionUser,
    native_datasource: String,
    route: RwLock<Option<StoreRoute>>,
    bound: RwLock<Option<BoundDashboard>>,
    cache: Arc<CacheState>,
}

impl AnnotationsCoordinator {
    pub fn new(
        backend: BackendClient,
        resolver: Arc<dyn DatasourceResolver>,
        notifier: Arc<dyn Notifier>,
        session: SessionUser,
    ) -> Self {
        Self {
            backend,
            resolver,
            notifier,
            session,
            native_datasource: DEFAULT_NATIVE_DATASOURCE.to_string(),
            route: RwLock::new(None),
            bound: RwLock::new(None),
            cache: Arc::new(CacheState {
                epoch: AtomicU64::new(0),
                global: FetchSlot::new(),
                alert_states: FetchSlot::new(),
                datasources: KeyedSlots::default(),
            }),
        }
    }

    pub fn with_native_datasource(mut self, name: impl Into<String>) -> Self {
        self.native_datasource = name.into();
        self
    }

    /// Binds the coordinator to `dashboard`, clearing every cached read.
    pub fn init(&self, dashboard: Arc<DashboardModel>) {
        self.cache.reset();

        let built_in = dashboard
            .built_in_definition()
            .map(|definition| definition.datasource)
            .unwrap_or_else(|| self.native_datasource.clone());
        let route = StoreRoute::for_datasource(&built_in, &self.native_datasource);

        let epoch = self.cache.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let cache: Weak<CacheState> = Arc::downgrade(&self.cache);
        let hook = dashboard.on_refresh(move || {
            if let Some(cache) = cache.upgrade() {
                if cache.epoch.load(Ordering::Acquire) == epoch {
                    cache.reset();
                }
            }
        });

        info!(dashboard = %dashboard.title(), ?route, "annotations coordinator initialized");
        *self.route.write() = Some(route);
        let previous = self.bound.write().replace(BoundDashboard { dashboard, hook });
        if let Some(previous) = previous {
            previous.dashboard.remove_refresh_hook(previous.hook);
        }
    }

    /// Dashboard bound by the last `init`.
    pub fn dashboard(&self) -> Option<Arc<DashboardModel>> {
        self.bound.read().as_ref().map(|bound| bound.dashboard.clone())
    }

    /// Store targeted by new events.
    pub fn built_in_route(&self) -> Result<StoreRoute, AnnotationError> {
        self.route.read().clone().ok_or(AnnotationError::NotInitialized)
    }

    /// Merged annotations and alert state for one panel.
    ///
    /// Failures are logged and notified; the caller gets an empty result.
    pub async fn get_annotations(&self, options: &AnnotationOptions) -> AnnotationsResult {
        match self.query_annotations(options).await {
            Ok(result) => result,
            Err(err) => {
                error!(error = %err, panel = options.panel.id, "annotation query failed");
                self.notifier.notify(
                    Notification::error("Annotation Query Failed").with_detail(err.notification_detail()),
                );
                AnnotationsResult::default()
            }
        }
    }

    async fn query_annotations(
        &self,
        options: &AnnotationOptions,
    ) -> Result<AnnotationsResult, AnnotationError> {
        let (sources, alert_states) = futures::try_join!(
            self.get_global_annotations(options),
            self.get_alert_states(options)
        )?;

        let flattened: Vec<AnnotationEvent> = sources.into_iter().flatten().collect();
        let annotations = dedup(filter_for_panel(flattened, options.panel.id));
        let alert_state = alert_states
            .into_iter()
            .find(|state| state.panel_id == options.panel.id);

        debug!(
            panel = options.panel.id,
            count = annotations.len(),
            alerting = alert_state.is_some(),
            "annotations merged"
        );
        Ok(AnnotationsResult {
            annotations,
            alert_state,
        })
    }

    /// Alert states for the dashboard, cached while the range is live.
    pub async fn get_alert_states(
        &self,
        options: &AnnotationOptions,
    ) -> Result<Vec<AlertState>, AnnotationError> {
        self.built_in_route()?;

        let Some(dashboard_id) = options.dashboard.id() else {
            return Ok(Vec::new());
        };
        if !options.panel.has_alert || !options.range.is_live() {
            return Ok(Vec::new());
        }

        let backend = self.backend.clone();
        self.cache
            .alert_states
            .get_or_fetch(move || async move {
                let states: Vec<AlertState> = backend
                    .get(
                        "/api/alerts/states-for-dashboard",
                        &[("dashboardId", dashboard_id.to_string())],
                    )
                    .await?;
                Ok::<_, AnnotationError>(states)
            })
            .await
    }

    /// Raw results of every enabled definition, before panel filtering.
    pub async fn get_global_annotations(
        &self,
        options: &AnnotationOptions,
    ) -> Result<SourceResults, AnnotationError> {
        self.built_in_route()?;

        let options = options.clone();
        let resolver = self.resolver.clone();
        let cache = self.cache.clone();
        self.cache
            .global
            .get_or_fetch(move || fetch_all_sources(options, resolver, cache))
            .await
    }

    pub async fn save_annotation_event(
        &self,
        event: &AnnotationEvent,
    ) -> Result<WriteOutcome, AnnotationError> {
        self.cache.invalidate_reads();
        let route = self.built_in_route()?;
        debug!(?route, "saving annotation");
        self.store_for(&route).insert(event).await
    }

    pub async fn update_annotation_event(
        &self,
        event: &AnnotationEvent,
    ) -> Result<WriteOutcome, AnnotationError> {
        self.cache.invalidate_reads();
        let route = self.origin_route(event)?;
        debug!(?route, id = ?event.id, "updating annotation");
        self.store_for(&route).update(event).await
    }

    pub async fn delete_annotation_event(
        &self,
        event: &AnnotationEvent,
    ) -> Result<WriteOutcome, AnnotationError> {
        self.cache.invalidate_reads();
        let route = self.origin_route(event)?;
        debug!(?route, id = ?event.id, region = event.is_region, "deleting annotation");
        self.store_for(&route).delete(event).await
    }

    /// Updates and deletes go where the event came from.
    fn origin_route(&self, event: &AnnotationEvent) -> Result<StoreRoute, AnnotationError> {
        let built_in = self.built_in_route()?;
        Ok(match event.source_datasource() {
            Some(datasource) => StoreRoute::for_datasource(datasource, &self.native_datasource),
            None => built_in,
        })
    }

    fn store_for(&self, route: &StoreRoute) -> Box<dyn AnnotationStore> {
        match route {
            StoreRoute::Native => Box::new(NativeStoreAdapter::new(self.backend.clone())),
            StoreRoute::External { datasource } => Box::new(TimeSeriesStoreAdapter::new(
                datasource.clone(),
                self.resolver.clone(),
                self.backend.http().clone(),
                self.session.clone(),
                self.notifier.clone(),
            )),
        }
    }
}

/// Stamps each event with the definition that produced it and flags regions.
///
/// Embedded snapshot data is stripped from the stamped copy.
pub fn translate_query_result(
    annotation: &AnnotationQueryDefinition,
    results: Vec<AnnotationEvent>,
) -> Vec<AnnotationEvent> {
    let source = Arc::new(if annotation.has_snapshot() {
        annotation.without_snapshot()
    } else {
        annotation.clone()
    });

    let stamped = results
        .into_iter()
        .map(|mut event| {
            event.source = Some(source.clone());
            event
        })
        .collect();
    flag_regions(stamped)
}

async fn fetch_all_sources(
    options: AnnotationOptions,
    resolver: Arc<dyn DatasourceResolver>,
    cache: Arc<CacheState>,
) -> Result<SourceResults, AnnotationError> {
    let queries: Vec<BoxFuture<'static, Result<Vec<AnnotationEvent>, AnnotationError>>> = options
        .dashboard
        .annotation_definitions()
        .into_iter()
        .enumerate()
        .filter(|(_, definition)| definition.enable)
        .map(|(index, definition)| {
            fetch_source(index, definition, options.clone(), resolver.clone(), cache.clone()).boxed()
        })
        .collect();

    debug!(sources = queries.len(), "querying annotation sources");
    try_join_all(queries).await
}

async fn fetch_source(
    index: usize,
    definition: AnnotationQueryDefinition,
    options: AnnotationOptions,
    resolver: Arc<dyn DatasourceResolver>,
    cache: Arc<CacheState>,
) -> Result<Vec<AnnotationEvent>, AnnotationError> {
    if let Some(snapshot) = definition.snapshot_data.clone() {
        return Ok(translate_query_result(&definition, snapshot));
    }

    let name = definition.datasource.clone();
    let datasource = cache
        .datasources
        .get_or_fetch(&name, || {
            let name = name.clone();
            async move { resolver.resolve(&name).await }
        })
        .await?;

    let request = AnnotationQueryRequest {
        range: options.range.clone(),
        annotation: definition.clone(),
        dashboard: options.dashboard.clone(),
    };
    let results = datasource.annotation_query(&request).await?;

    if options.dashboard.is_snapshot() {
        options
            .dashboard
            .store_snapshot_data(index, &definition, results.clone());
    }

    Ok(translate_query_result(&definition, results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use dashnote_core::notify::{NotificationHub, NotificationKind};
    use dashnote_protocol::dashboard::{AnnotationList, DashboardDocument, DashboardMeta};

    struct StaticDatasource {
        name: String,
        events: Vec<AnnotationEvent>,
        queries: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Datasource for StaticDatasource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn annotation_query(
            &self,
            _request: &AnnotationQueryRequest,
        ) -> Result<Vec<AnnotationEvent>, AnnotationError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(self.events.clone())
        }
    }

    #[derive(Default)]
    struct StaticResolver {
        events: HashMap<String, Vec<AnnotationEvent>>,
        queries: Arc<AtomicUsize>,
        resolutions: AtomicUsize,
    }

    impl StaticResolver {
        fn with(mut self, name: &str, events: Vec<AnnotationEvent>) -> Self {
            self.events.insert(name.to_string(), events);
            self
        }
    }

    #[async_trait]
    impl DatasourceResolver for StaticResolver {
        async fn resolve(&self, name: &str) -> Result<Arc<dyn Datasource>, AnnotationError> {
            self.resolutions.fetch_add(1, Ordering::SeqCst);
            let events = self
                .events
                .get(name)
                .cloned()
                .ok_or_else(|| AnnotationError::UnknownDatasource(name.to_string()))?;
            Ok(Arc::new(StaticDatasource {
                name: name.to_string(),
                events,
                queries: self.queries.clone(),
            }))
        }
    }

    fn dashboard(definitions: Vec<AnnotationQueryDefinition>) -> Arc<DashboardModel> {
        let document = DashboardDocument {
            id: Some(1),
            title: "Ops".into(),
            annotations: AnnotationList { list: definitions },
            ..DashboardDocument::default()
        };
        Arc::new(DashboardModel::new(document, DashboardMeta::default(), DEFAULT_NATIVE_DATASOURCE))
    }

    fn coordinator(resolver: Arc<StaticResolver>, hub: &NotificationHub) -> AnnotationsCoordinator {
        AnnotationsCoordinator::new(
            BackendClient::new("http://127.0.0.1:9").expect("client"),
            resolver,
            Arc::new(hub.clone()),
            SessionUser::default(),
        )
    }

    fn options(dashboard: Arc<DashboardModel>, panel: i64) -> AnnotationOptions {
        AnnotationOptions {
            dashboard,
            panel: PanelRef::new(panel),
            range: TimeRange::from_millis(0, 1_000),
        }
    }

    #[tokio::test]
    async fn reads_before_init_fail() {
        let hub = NotificationHub::default();
        let coordinator = coordinator(Arc::new(StaticResolver::default()), &hub);
        let err = coordinator
            .get_global_annotations(&options(dashboard(vec![]), 1))
            .await
            .unwrap_err();
        assert_eq!(err, AnnotationError::NotInitialized);
    }

    #[tokio::test]
    async fn same_id_from_two_sources_survives_merge() {
        let event = AnnotationEvent::new(100, "a").with_id("a");
        let resolver = Arc::new(
            StaticResolver::default()
                .with(DEFAULT_NATIVE_DATASOURCE, vec![event.clone()])
                .with("influx", vec![event]),
        );
        let hub = NotificationHub::default();
        let coordinator = coordinator(resolver, &hub);
        let dashboard = dashboard(vec![AnnotationQueryDefinition::new("deploys", "influx")]);
        coordinator.init(dashboard.clone());

        let result = coordinator.get_annotations(&options(dashboard, 1)).await;
        assert_eq!(result.annotations.len(), 2);
        assert!(result.alert_state.is_none());
    }

    #[tokio::test]
    async fn concurrent_reads_share_source_queries() {
        let resolver = Arc::new(
            StaticResolver::default()
                .with(DEFAULT_NATIVE_DATASOURCE, vec![AnnotationEvent::new(1, "n")])
                .with("influx", vec![AnnotationEvent::new(2, "i")]),
        );
        let hub = NotificationHub::default();
        let coordinator = coordinator(resolver.clone(), &hub);
        let dashboard = dashboard(vec![
            AnnotationQueryDefinition::new("deploys", "influx"),
            AnnotationQueryDefinition::new("off", "influx").disabled(),
        ]);
        coordinator.init(dashboard.clone());
        let options = options(dashboard, 1);

        let (first, second) = tokio::join!(
            coordinator.get_global_annotations(&options),
            coordinator.get_global_annotations(&options)
        );

        assert_eq!(first.expect("first").len(), 2);
        assert_eq!(second.expect("second").len(), 2);
        assert_eq!(resolver.queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refresh_and_writes_force_a_new_fetch() {
        let resolver = Arc::new(
            StaticResolver::default().with(DEFAULT_NATIVE_DATASOURCE, vec![AnnotationEvent::new(1, "n")]),
        );
        let hub = NotificationHub::default();
        let coordinator = coordinator(resolver.clone(), &hub);
        let dashboard = dashboard(vec![]);
        coordinator.init(dashboard.clone());
        let options = options(dashboard.clone(), 1);

        coordinator.get_global_annotations(&options).await.expect("fetch");
        coordinator.get_global_annotations(&options).await.expect("cached");
        assert_eq!(resolver.queries.load(Ordering::SeqCst), 1);

        dashboard.refresh();
        coordinator.get_global_annotations(&options).await.expect("refetch");
        assert_eq!(resolver.queries.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.resolutions.load(Ordering::SeqCst), 2);

        // The native backend is unreachable; the write fails but still invalidates.
        coordinator
            .save_annotation_event(&AnnotationEvent::new(5, "new"))
            .await
            .unwrap_err();
        coordinator.get_global_annotations(&options).await.expect("refetch");
        assert_eq!(resolver.queries.load(Ordering::SeqCst), 3);

        let stored = AnnotationEvent::new(5, "edited").with_id(5i64);
        coordinator.update_annotation_event(&stored).await.unwrap_err();
        coordinator.get_global_annotations(&options).await.expect("refetch");
        assert_eq!(resolver.queries.load(Ordering::SeqCst), 4);

        coordinator.delete_annotation_event(&stored).await.unwrap_err();
        coordinator.get_global_annotations(&options).await.expect("refetch");
        assert_eq!(resolver.queries.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn unsaved_dashboards_skip_alert_states() {
        let hub = NotificationHub::default();
        let coordinator = coordinator(Arc::new(StaticResolver::default()), &hub);
        let document = DashboardDocument {
            id: Some(0),
            ..DashboardDocument::default()
        };
        let dashboard = Arc::new(DashboardModel::new(
            document,
            DashboardMeta::default(),
            DEFAULT_NATIVE_DATASOURCE,
        ));
        coordinator.init(dashboard.clone());

        let options = AnnotationOptions {
            dashboard,
            panel: PanelRef::new(1).with_alert(),
            range: TimeRange::parse("now-6h", "now").expect("range"),
        };
        let states = coordinator.get_alert_states(&options).await.expect("states");
        assert!(states.is_empty());
    }

    #[tokio::test]
    async fn hooks_from_previous_init_are_inert() {
        let resolver = Arc::new(
            StaticResolver::default().with(DEFAULT_NATIVE_DATASOURCE, vec![AnnotationEvent::new(1, "n")]),
        );
        let hub = NotificationHub::default();
        let coordinator = coordinator(resolver.clone(), &hub);
        let stale = dashboard(vec![]);
        let current = dashboard(vec![]);
        coordinator.init(stale.clone());
        coordinator.init(current.clone());

        let options = options(current, 1);
        coordinator.get_global_annotations(&options).await.expect("fetch");
        stale.refresh();
        coordinator.get_global_annotations(&options).await.expect("cached");
        assert_eq!(resolver.queries.load(Ordering::SeqCst), 1);
        assert_eq!(stale.refresh_hook_count(), 0);
    }

    #[tokio::test]
    async fn reinit_keeps_a_single_refresh_hook() {
        let hub = NotificationHub::default();
        let coordinator = coordinator(Arc::new(StaticResolver::default()), &hub);
        let dashboard = dashboard(vec![]);

        for _ in 0..5 {
            coordinator.init(dashboard.clone());
        }

        assert_eq!(dashboard.refresh_hook_count(), 1);
    }

    #[tokio::test]
    async fn snapshot_definitions_do_not_stop_other_sources() {
        let resolver = Arc::new(
            StaticResolver::default().with(DEFAULT_NATIVE_DATASOURCE, vec![AnnotationEvent::new(1, "live")]),
        );
        let hub = NotificationHub::default();
        let coordinator = coordinator(resolver.clone(), &hub);
        let mut frozen = AnnotationQueryDefinition::new("deploys", "influx");
        frozen.snapshot_data = Some(vec![AnnotationEvent::new(2, "frozen").with_time_end(3)]);
        let dashboard = dashboard(vec![frozen]);
        coordinator.init(dashboard.clone());

        let sources = coordinator
            .get_global_annotations(&options(dashboard, 1))
            .await
            .expect("fetch");

        let texts: Vec<&str> = sources.iter().flatten().map(|event| event.text.as_str()).collect();
        assert_eq!(texts, vec!["live", "frozen"]);
        let frozen = &sources[1][0];
        assert!(frozen.is_region);
        assert!(!frozen.source.as_deref().expect("source").has_snapshot());
    }

    #[tokio::test]
    async fn snapshot_dashboards_capture_raw_results() {
        let resolver = Arc::new(
            StaticResolver::default().with(DEFAULT_NATIVE_DATASOURCE, vec![AnnotationEvent::new(1, "n")]),
        );
        let hub = NotificationHub::default();
        let coordinator = coordinator(resolver, &hub);
        let dashboard = dashboard(vec![]);
        dashboard.set_snapshot(true);
        coordinator.init(dashboard.clone());

        coordinator
            .get_global_annotations(&options(dashboard.clone(), 1))
            .await
            .expect("fetch");

        let captured = dashboard.annotation_definitions()[0]
            .snapshot_data
            .clone()
            .expect("captured");
        assert_eq!(captured.len(), 1);
        assert!(captured[0].source.is_none());
    }

    #[tokio::test]
    async fn failures_are_notified_and_return_empty() {
        let hub = NotificationHub::default();
        let mut notifications = hub.subscribe();
        let coordinator = coordinator(Arc::new(StaticResolver::default()), &hub);
        let dashboard = dashboard(vec![]);
        coordinator.init(dashboard.clone());

        let result = coordinator.get_annotations(&options(dashboard, 1)).await;
        assert!(result.annotations.is_empty());

        let notification = notifications.recv().await.expect("notification");
        assert_eq!(notification.kind, NotificationKind::Error);
        assert_eq!(notification.title, "Annotation Query Failed");
        assert_eq!(
            notification.detail.as_deref(),
            Some("datasource not found: -- Grafana --")
        );
    }

    #[test]
    fn updates_route_by_event_origin() {
        let hub = NotificationHub::default();
        let coordinator = coordinator(Arc::new(StaticResolver::default()), &hub);
        coordinator.init(dashboard(vec![]));

        let from_influx = AnnotationEvent::new(1, "x")
            .with_source(Arc::new(AnnotationQueryDefinition::new("deploys", "influx")));
        assert_eq!(
            coordinator.origin_route(&from_influx).expect("route"),
            StoreRoute::External {
                datasource: "influx".into()
            }
        );
        assert_eq!(
            coordinator.origin_route(&AnnotationEvent::new(1, "y")).expect("route"),
            StoreRoute::Native
        );
    }
}
