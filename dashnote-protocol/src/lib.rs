pub mod annotation;
pub mod dashboard;
mod serde_helpers;
pub mod time;

pub mod prelude {
    pub use crate::annotation::{
        AlertState, AnnotationEvent, AnnotationId, AnnotationQueryDefinition,
        DEFAULT_NATIVE_DATASOURCE,
    };
    pub use crate::dashboard::{DashboardDocument, DashboardDto, DashboardMeta, PanelDocument};
    pub use crate::time::{RawTimeRange, TimeRange};
}
