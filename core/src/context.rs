//! Per-call cancellation and deadline.
//!
//! # Design
//! A `Context` is cheap to clone and carries an optional deadline plus an
//! optional cancellation flag shared with a `CancelHandle`. The client checks
//! it before sending, the transport turns the remaining time into a request
//! timeout, and body reads check it before every chunk.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Why a context is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Default)]
struct CancelState {
    canceled: Mutex<bool>,
    cond: Condvar,
}

impl CancelState {
    fn is_canceled(&self) -> bool {
        *self.canceled.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cancellation and deadline scope for one or more calls.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Option<Arc<CancelState>>,
}

/// Cancels the context it was created with, and every clone of it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

impl CancelHandle {
    /// Idempotent; wakes any thread blocked in `Context::wait`.
    pub fn cancel(&self) {
        let mut canceled = self
            .state
            .canceled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *canceled = true;
        self.state.cond.notify_all();
    }
}

impl Context {
    /// A context that never expires and cannot be cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: None,
        }
    }

    /// Derive a cancellable context that keeps this context's deadline.
    pub fn with_cancel(&self) -> (Context, CancelHandle) {
        let state = Arc::new(CancelState::default());
        let ctx = Context {
            deadline: self.deadline,
            cancel: Some(Arc::clone(&state)),
        };
        (ctx, CancelHandle { state })
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `None` means no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// `Some` once the context is done. Cancellation wins over the deadline.
    pub fn err(&self) -> Option<ContextError> {
        if self.cancel.as_ref().is_some_and(|c| c.is_canceled()) {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Block until the context is done or `max` elapses, whichever is first.
    ///
    /// Returns the context error if it finished, `None` on plain timeout.
    pub fn wait(&self, max: Duration) -> Option<ContextError> {
        let started = Instant::now();
        let mut until = started + max;
        if let Some(d) = self.deadline {
            until = until.min(d);
        }

        let Some(state) = &self.cancel else {
            std::thread::sleep(until.saturating_duration_since(Instant::now()));
            return self.err();
        };

        let mut canceled = state.canceled.lock().unwrap_or_else(PoisonError::into_inner);
        while !*canceled {
            let now = Instant::now();
            if now >= until {
                break;
            }
            let (guard, _) = state
                .cond
                .wait_timeout(canceled, until - now)
                .unwrap_or_else(PoisonError::into_inner);
            canceled = guard;
        }
        drop(canceled);
        self.err()
    }
}
