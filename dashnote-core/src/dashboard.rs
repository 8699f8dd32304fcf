use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashnote_protocol::annotation::{AnnotationEvent, AnnotationQueryDefinition};
use dashnote_protocol::dashboard::{DashboardDocument, DashboardDto, DashboardMeta, PanelDocument};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::errors::Result;
use crate::serde_utils::from_json_value;

type RefreshHook = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`DashboardModel::on_refresh`], used to detach the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefreshHookId(u64);

/// In-memory dashboard shared by the annotation layer and the bootstrap.
pub struct DashboardModel {
    id: Option<i64>,
    uid: Option<String>,
    title: String,
    meta: DashboardMeta,
    snapshot: AtomicBool,
    panels: Vec<PanelDocument>,
    annotations: RwLock<Vec<AnnotationQueryDefinition>>,
    refresh_hooks: Mutex<Vec<(RefreshHookId, RefreshHook)>>,
    next_hook: AtomicU64,
}

impl DashboardModel {
    /// Builds the model, adding the built-in native definition when the
    /// document does not carry one.
    pub fn new(document: DashboardDocument, meta: DashboardMeta, native_datasource: &str) -> Self {
        let mut annotations = document.annotations.list;
        if !annotations.iter().any(|definition| definition.built_in) {
            annotations.insert(
                0,
                AnnotationQueryDefinition::built_in_default(native_datasource),
            );
        }

        let snapshot = document.snapshot.is_some();

        Self {
            id: document.id.filter(|id| *id != 0),
            uid: document.uid,
            title: document.title,
            meta,
            snapshot: AtomicBool::new(snapshot),
            panels: document.panels,
            annotations: RwLock::new(annotations),
            refresh_hooks: Mutex::new(Vec::new()),
            next_hook: AtomicU64::new(0),
        }
    }

    pub fn from_dto(dto: &DashboardDto, native_datasource: &str) -> Result<Self> {
        let document: DashboardDocument = from_json_value(&dto.dashboard)?;
        Ok(Self::new(document, dto.meta.clone(), native_datasource))
    }

    /// Persisted id; `None` until the dashboard has been saved.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn meta(&self) -> &DashboardMeta {
        &self.meta
    }

    pub fn panels(&self) -> &[PanelDocument] {
        &self.panels
    }

    pub fn panel(&self, panel_id: i64) -> Option<&PanelDocument> {
        self.panels.iter().find(|panel| panel.id == panel_id)
    }

    pub fn is_snapshot(&self) -> bool {
        self.snapshot.load(Ordering::Acquire)
    }

    /// Marks the dashboard as being captured into a snapshot.
    pub fn set_snapshot(&self, snapshot: bool) {
        self.snapshot.store(snapshot, Ordering::Release);
    }

    pub fn annotation_definitions(&self) -> Vec<AnnotationQueryDefinition> {
        self.annotations.read().clone()
    }

    /// First definition flagged as built-in.
    pub fn built_in_definition(&self) -> Option<AnnotationQueryDefinition> {
        self.annotations
            .read()
            .iter()
            .find(|definition| definition.built_in)
            .cloned()
    }

    /// Stores raw query results on the definition at `index`.
    ///
    /// Ignored when the list changed underneath and the slot now holds a
    /// different definition.
    pub fn store_snapshot_data(
        &self,
        index: usize,
        definition: &AnnotationQueryDefinition,
        events: Vec<AnnotationEvent>,
    ) -> bool {
        let mut annotations = self.annotations.write();
        match annotations.get_mut(index) {
            Some(slot) if slot.identity() == definition.identity() => {
                slot.snapshot_data = Some(events);
                true
            }
            _ => {
                debug!(index, name = %definition.name, "snapshot target moved, dropping results");
                false
            }
        }
    }

    /// Registers a callback run on every [`DashboardModel::refresh`].
    pub fn on_refresh<F>(&self, hook: F) -> RefreshHookId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = RefreshHookId(self.next_hook.fetch_add(1, Ordering::Relaxed));
        self.refresh_hooks.lock().push((id, Arc::new(hook)));
        id
    }

    /// Detaches a hook; returns false when it was already gone.
    pub fn remove_refresh_hook(&self, id: RefreshHookId) -> bool {
        let mut hooks = self.refresh_hooks.lock();
        let before = hooks.len();
        hooks.retain(|(hook_id, _)| *hook_id != id);
        hooks.len() != before
    }

    pub fn refresh_hook_count(&self) -> usize {
        self.refresh_hooks.lock().len()
    }

    /// Fires the refresh event.
    pub fn refresh(&self) {
        let hooks: Vec<RefreshHook> = self
            .refresh_hooks
            .lock()
            .iter()
            .map(|(_, hook)| hook.clone())
            .collect();
        debug!(hooks = hooks.len(), title = %self.title, "dashboard refresh");
        for hook in hooks {
            hook();
        }
    }
}

impl std::fmt::Debug for DashboardModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardModel")
            .field("id", &self.id)
            .field("uid", &self.uid)
            .field("title", &self.title)
            .field("snapshot", &self.is_snapshot())
            .field("panels", &self.panels.len())
            .finish()
    }
}
