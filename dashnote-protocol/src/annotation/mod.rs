mod alert;
mod definition;
mod event;

pub use alert::AlertState;
pub use definition::{AnnotationQueryDefinition, DASHBOARD_SCOPE, DEFAULT_NATIVE_DATASOURCE};
pub use event::{AnnotationEvent, AnnotationId};
