//! Dashnote annotations - fetch, merge and write routing for dashboard
//! annotation events.

pub mod coordinator;
pub mod datasource;
pub mod error;
pub mod merge;
pub mod slot;
pub mod store;

pub use coordinator::{AnnotationOptions, AnnotationsCoordinator, AnnotationsResult, PanelRef};
pub use datasource::{
    AnnotationQueryRequest, Datasource, DatasourceResolver, HttpDatasourceResolver, WriteTarget,
};
pub use error::AnnotationError;
pub use slot::FetchSlot;
pub use store::{AnnotationStore, StoreRoute, WriteOutcome};
