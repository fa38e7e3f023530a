//! The display region as explicit state.
//!
//! Every dispatch claims a fresh [`RequestId`] and marks the region
//! [`DisplayState::Pending`]. A finished request only lands if it is still
//! the latest one, so a slow response can never overwrite a newer answer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Identifier handed out per dispatch, strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayState {
    Empty,
    Pending(RequestId),
    Success(RequestId, String),
    Failure(RequestId, String),
}

impl DisplayState {
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            DisplayState::Empty => None,
            DisplayState::Pending(id)
            | DisplayState::Success(id, _)
            | DisplayState::Failure(id, _) => Some(*id),
        }
    }

    /// The string the region currently shows.
    pub fn content(&self) -> &str {
        match self {
            DisplayState::Empty => "",
            DisplayState::Pending(_) => crate::render::LOADING,
            DisplayState::Success(_, html) => html,
            DisplayState::Failure(_, message) => message,
        }
    }
}

/// Shared display region.
#[derive(Debug)]
pub struct Display {
    next_id: AtomicU64,
    state: Mutex<DisplayState>,
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}

impl Display {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            state: Mutex::new(DisplayState::Empty),
        }
    }

    /// Starts a new request: allocates its id and shows the loading text.
    pub fn begin(&self) -> RequestId {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut state = self.lock();
        // Ids are taken before the lock, so two racing begins may arrive out of order.
        let newer_pending = matches!(state.request_id(), Some(current) if current > id);
        if !newer_pending {
            *state = DisplayState::Pending(id);
        }
        id
    }

    /// Applies a finished result. Returns `false` when `update` belongs to a
    /// request that has since been superseded.
    pub fn apply(&self, update: DisplayState) -> bool {
        let Some(id) = update.request_id() else {
            return false;
        };
        let mut state = self.lock();
        match *state {
            DisplayState::Pending(current) if current == id => {
                *state = update;
                true
            }
            _ => {
                tracing::debug!(request = %id, "discarding stale display update");
                false
            }
        }
    }

    pub fn snapshot(&self) -> DisplayState {
        self.lock().clone()
    }

    pub fn content(&self) -> String {
        self.lock().content().to_string()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DisplayState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
