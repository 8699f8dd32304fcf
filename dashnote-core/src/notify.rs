use std::fmt;

use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Warning,
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        };
        f.write_str(label)
    }
}

/// A user-facing message raised by the annotation layer or the bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub detail: Option<String>,
}

impl Notification {
    pub fn success(title: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            title: title.into(),
            detail: None,
        }
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Warning,
            title: title.into(),
            detail: None,
        }
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            title: title.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Fire-and-forget sink for UI notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Broadcasts notifications to every subscriber and mirrors them into the log.
#[derive(Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Notifier for NotificationHub {
    fn notify(&self, notification: Notification) {
        let detail = notification.detail.as_deref().unwrap_or_default();
        match notification.kind {
            NotificationKind::Success => info!(title = %notification.title, detail, "notification"),
            NotificationKind::Warning => warn!(title = %notification.title, detail, "notification"),
            NotificationKind::Error => error!(title = %notification.title, detail, "notification"),
        }
        // No subscribers is not an error for a fire-and-forget sink.
        let _ = self.sender.send(notification);
    }
}
