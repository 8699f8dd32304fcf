//! Pure merge stage applied to events gathered from every annotation source.

use std::collections::HashSet;

use dashnote_protocol::annotation::{AnnotationEvent, AnnotationId};

type DedupKey = (AnnotationId, Option<(String, String)>);

/// Drops events already seen from the same query definition.
///
/// Two events collapse only when they share an id and their source
/// definitions have the same name and datasource. Events without an id are
/// always kept. The first occurrence wins and order is preserved.
pub fn dedup(events: Vec<AnnotationEvent>) -> Vec<AnnotationEvent> {
    let mut seen: HashSet<DedupKey> = HashSet::with_capacity(events.len());
    events
        .into_iter()
        .filter(|event| match dedup_key(event) {
            Some(key) => seen.insert(key),
            None => true,
        })
        .collect()
}

fn dedup_key(event: &AnnotationEvent) -> Option<DedupKey> {
    let id = event.id.clone()?;
    let source = event.source.as_deref().map(|source| {
        let (name, datasource) = source.identity();
        (name.to_string(), datasource.to_string())
    });
    Some((id, source))
}

/// Sets `is_region` on every event from its time bounds.
pub fn flag_regions(events: Vec<AnnotationEvent>) -> Vec<AnnotationEvent> {
    events
        .into_iter()
        .map(|mut event| {
            event.is_region = event.spans_interval();
            event
        })
        .collect()
}

/// Keeps events visible on `panel_id`.
///
/// Events bound to another panel are hidden only when they came from a
/// dashboard-scoped definition.
pub fn filter_for_panel(events: Vec<AnnotationEvent>, panel_id: i64) -> Vec<AnnotationEvent> {
    events
        .into_iter()
        .filter(|event| {
            let Some(event_panel) = event.scoped_panel_id() else {
                return true;
            };
            let dashboard_scoped = event
                .source
                .as_deref()
                .map(|source| source.is_dashboard_scoped())
                .unwrap_or(false);
            !dashboard_scoped || event_panel == panel_id
        })
        .collect()
}
