//! The task type: a lazy, suspendable computation with one result slot and
//! one continuation slot.
//!
//! A [`Task`] does nothing until driven. Exactly one of two things happens
//! to it:
//!
//! - it is **awaited**, in which case the awaiter's waker becomes its single
//!   continuation and the result (value or failure) is handed to that
//!   awaiter exactly once; or
//! - it is **started** on a scheduler via [`Task::start`], which detaches
//!   it: a runner drives it on the loop thread and releases its storage at
//!   completion, swallowing (and logging) any failure.
//!
//! Dropping a task that was never awaited or started simply drops the
//! underlying future. Move semantics make the "at most one awaiter" rule a
//! compile-time property.

mod block_on;

pub use block_on::block_on;

use crate::error::Result;
use crate::runtime::Scheduler;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A handle to a suspendable computation producing a [`Result`].
///
/// Created from any compatible future with [`Task::new`]; functions that
/// build asynchronous operations return `Task<T>` the way the rest of the
/// runtime does ([`when_all`](crate::combinator::when_all),
/// [`sleep_for`](crate::time::Timer::sleep_for),
/// [`submit`](crate::runtime::ThreadPool::submit)).
pub struct Task<T> {
    future: Pin<Box<dyn Future<Output = Result<T>> + Send + 'static>>,
}

impl<T> Task<T> {
    /// Wraps a future into a task. Nothing runs until the task is driven.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            future: Box::pin(future),
        }
    }

    /// A task that completes immediately with the given value.
    #[must_use]
    pub fn ready(value: T) -> Self
    where
        T: Send + 'static,
    {
        Self::new(std::future::ready(Ok(value)))
    }

    /// Starts this task as a detached runner on the scheduler.
    ///
    /// Consumes the handle: the runner owns the computation from here on
    /// and frees it when it completes. The caller must not rely on
    /// completion ordering. A failure of the task is logged and dropped.
    pub fn start(self, scheduler: &Scheduler)
    where
        T: Send + 'static,
    {
        scheduler.spawn(async move {
            if let Err(error) = self.await {
                tracing::debug!(%error, "detached task failed");
            }
        });
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().future.as_mut().poll(cx)
    }
}

impl<T> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}
