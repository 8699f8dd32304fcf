//! Core shared library for the dashnote workspace.
//!
//! This crate exposes the primitives the annotation layer and the dashboard
//! bootstrap depend on: common errors, configuration loading, logging setup,
//! the typed backend client, the notification hub, the session user and the
//! in-memory dashboard model.

pub mod config;
pub mod dashboard;
pub mod errors;
pub mod http;
pub mod logging;
pub mod notify;
pub mod serde_utils;
pub mod session;

pub use config::{CoreConfig, Environment};
pub use dashboard::{DashboardModel, RefreshHookId};
pub use errors::{DashnoteError, Result as CoreResult};
pub use http::{BackendClient, BackendError};
pub use notify::{Notification, NotificationHub, NotificationKind, Notifier};
pub use session::SessionUser;
