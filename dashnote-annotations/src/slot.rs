//! Memoized fetch slots with at most one in-flight request each.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::trace;

use crate::error::AnnotationError;

pub type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, AnnotationError>>>;

enum SlotState<T> {
    Empty,
    Pending(SharedFetch<T>),
    Ready(T),
}

/// Cache cell moving through `Empty -> Pending -> Ready`.
///
/// Concurrent readers of a pending slot await the same future. A reset
/// while a fetch is in flight leaves that fetch running for its awaiting
/// callers but its result is not written back.
pub struct FetchSlot<T> {
    state: Mutex<SlotState<T>>,
}

impl<T> Default for FetchSlot<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(SlotState::Empty),
        }
    }
}

impl<T> FetchSlot<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        *self.state.lock() = SlotState::Empty;
    }

    pub fn is_empty(&self) -> bool {
        matches!(*self.state.lock(), SlotState::Empty)
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.lock(), SlotState::Ready(_))
    }

    /// Returns the cached value, joins the pending fetch, or starts `fetch`.
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<T, AnnotationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AnnotationError>> + Send + 'static,
    {
        let pending = {
            let mut state = self.state.lock();
            match &*state {
                SlotState::Ready(value) => return Ok(value.clone()),
                SlotState::Pending(pending) => pending.clone(),
                SlotState::Empty => {
                    let pending = fetch().boxed().shared();
                    *state = SlotState::Pending(pending.clone());
                    pending
                }
            }
        };

        let result = pending.clone().await;

        let mut state = self.state.lock();
        let still_current = matches!(&*state, SlotState::Pending(current) if current.ptr_eq(&pending));
        if still_current {
            *state = match &result {
                Ok(value) => SlotState::Ready(value.clone()),
                Err(_) => SlotState::Empty,
            };
        } else {
            trace!("fetch superseded, result not cached");
        }

        result
    }
}

/// Fetch slots keyed by name, cleared as a whole.
pub struct KeyedSlots<T> {
    slots: Mutex<HashMap<String, Arc<FetchSlot<T>>>>,
}

impl<T> Default for KeyedSlots<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> KeyedSlots<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<T, AnnotationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AnnotationError>> + Send + 'static,
    {
        let slot = self
            .slots
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone();
        slot.get_or_fetch(fetch).await
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}
