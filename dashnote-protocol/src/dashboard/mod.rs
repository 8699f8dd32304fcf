mod document;
mod dto;

pub use document::{AnnotationList, DashboardDocument, GridPos, PanelDocument};
pub use dto::{DashboardDto, DashboardMeta};
