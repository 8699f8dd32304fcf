//! Write adapters for the two annotation stores.

mod line_protocol;
mod native;
mod timeseries;

use async_trait::async_trait;
use dashnote_protocol::annotation::AnnotationEvent;

use crate::error::AnnotationError;

pub use line_protocol::{encode_event_line, AuthorFields, MEASUREMENT};
pub use native::NativeStoreAdapter;
pub use timeseries::TimeSeriesStoreAdapter;

/// Which store a write goes to, decided from a datasource name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRoute {
    Native,
    External { datasource: String },
}

impl StoreRoute {
    pub fn for_datasource(datasource: &str, native_datasource: &str) -> Self {
        if datasource == native_datasource {
            StoreRoute::Native
        } else {
            StoreRoute::External {
                datasource: datasource.to_string(),
            }
        }
    }
}

/// Result of a write that does not propagate failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// Skipped locally by the permission gate.
    Denied,
    Failed(String),
}

impl WriteOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, WriteOutcome::Applied)
    }
}

/// A backing store that accepts annotation writes.
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    async fn insert(&self, event: &AnnotationEvent) -> Result<WriteOutcome, AnnotationError>;

    async fn update(&self, event: &AnnotationEvent) -> Result<WriteOutcome, AnnotationError>;

    async fn delete(&self, event: &AnnotationEvent) -> Result<WriteOutcome, AnnotationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_by_reserved_name() {
        assert_eq!(StoreRoute::for_datasource("-- Grafana --", "-- Grafana --"), StoreRoute::Native);
        assert_eq!(
            StoreRoute::for_datasource("influx", "-- Grafana --"),
            StoreRoute::External {
                datasource: "influx".into()
            }
        );
    }
}
