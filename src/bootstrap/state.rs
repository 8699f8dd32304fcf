use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Loading is flagged slow when no model is ready after this long.
pub const SLOW_THRESHOLD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InitPhase {
    #[default]
    NotStarted,
    Fetching,
    Initializing,
    Error(String),
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadingState {
    pub phase: InitPhase,
    pub slow: bool,
}

impl LoadingState {
    pub fn is_loading(&self) -> bool {
        matches!(self.phase, InitPhase::Fetching | InitPhase::Initializing)
    }
}

#[derive(Clone)]
pub(crate) struct LoadingTracker {
    sender: Arc<watch::Sender<LoadingState>>,
}

impl LoadingTracker {
    pub(crate) fn new() -> Self {
        let (sender, _) = watch::channel(LoadingState::default());
        Self {
            sender: Arc::new(sender),
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<LoadingState> {
        self.sender.subscribe()
    }

    pub(crate) fn current(&self) -> LoadingState {
        self.sender.borrow().clone()
    }

    pub(crate) fn set(&self, phase: InitPhase) {
        self.sender.send_modify(|state| {
            if phase == InitPhase::Fetching {
                state.slow = false;
            }
            state.phase = phase;
        });
    }

    /// Raises the slow flag if still loading once the threshold passes.
    pub(crate) fn watch_slow(&self, threshold: Duration) -> JoinHandle<()> {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(threshold).await;
            sender.send_if_modified(|state| {
                if state.is_loading() && !state.slow {
                    state.slow = true;
                    true
                } else {
                    false
                }
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flags_slow_loads() {
        let tracker = LoadingTracker::new();
        let mut rx = tracker.subscribe();
        tracker.set(InitPhase::Fetching);

        let timer = tracker.watch_slow(Duration::from_millis(10));
        timer.await.expect("timer");

        rx.changed().await.expect("changed");
        assert!(rx.borrow().slow);
    }

    #[tokio::test]
    async fn finished_loads_are_not_slow() {
        let tracker = LoadingTracker::new();
        tracker.set(InitPhase::Fetching);
        tracker.set(InitPhase::Ready);

        tracker.watch_slow(Duration::from_millis(5)).await.expect("timer");
        assert!(!tracker.current().slow);
    }
}
