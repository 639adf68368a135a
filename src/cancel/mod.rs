//! Cooperative cancellation.
//!
//! Cancellation is a single shared flag, observed voluntarily. A
//! [`CancelSource`] can set it; any number of [`CancelToken`]s can watch it.
//! Setting is idempotent and monotonic: once requested, the flag stays set.
//! Nothing is preempted and no blocked system call is interrupted. Awaiters
//! that accept a token check it at their suspension and resumption
//! boundaries and fail with [`ErrorKind::Cancelled`] when it is set.
//!
//! [`ErrorKind::Cancelled`]: crate::error::ErrorKind::Cancelled

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
}

impl CancelState {
    fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Observer side of a cancellation pair.
///
/// A default-constructed token is not tied to any source: it reports
/// `can_cancel() == false` and never observes cancellation. Tokens keep the
/// shared state alive, so they remain valid after the source is dropped.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Option<Arc<CancelState>>,
}

impl CancelToken {
    /// Returns true if this token is tied to a source.
    #[must_use]
    pub fn can_cancel(&self) -> bool {
        self.state.is_some()
    }

    /// Returns true if cancellation has been requested.
    ///
    /// A detached token always returns false.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.as_ref().is_some_and(|st| st.is_cancelled())
    }
}

/// Owner side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancelSource {
    state: Arc<CancelState>,
}

impl CancelSource {
    /// Allocates fresh, non-cancelled shared state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(CancelState::default()),
        }
    }

    /// Produces an observer tied to this source's state.
    #[must_use]
    pub fn token(&self) -> CancelToken {
        CancelToken {
            state: Some(Arc::clone(&self.state)),
        }
    }

    /// Requests cancellation. Idempotent.
    pub fn request_cancel(&self) {
        self.state.request_cancel();
    }

    /// Returns true if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}
