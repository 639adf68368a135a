//! Detached task runners.
//!
//! A spawned future lives in a reference-counted cell together with a small
//! state machine. Its waker re-posts the cell's poll job onto the owning
//! scheduler, so every resumption goes through the queue and executes on
//! the loop thread. When the future completes, the cell drops it on the
//! spot: a detached runner releases its own storage, and no handle to it
//! exists anywhere.
//!
//! States: `IDLE` (no poll pending), `SCHEDULED` (poll job queued),
//! `RUNNING` (being polled), `NOTIFIED` (woken mid-poll), `COMPLETE`.
//! A wake landing mid-poll re-enqueues the job instead of re-polling
//! inline, so a self-yielding task goes to the back of the queue.

use crate::runtime::context::ExecutionContext;
use crate::runtime::scheduler::Scheduler;
use crate::task::Task;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Wake, Waker};

const IDLE: u8 = 0;
const SCHEDULED: u8 = 1;
const RUNNING: u8 = 2;
const NOTIFIED: u8 = 3;
const COMPLETE: u8 = 4;

struct SpawnedTask {
    scheduler: Scheduler,
    state: AtomicU8,
    future: Mutex<Option<Pin<Box<dyn Future<Output = ()> + Send + 'static>>>>,
}

impl SpawnedTask {
    /// Requests a poll. Coalesces with an already-queued poll; a wake that
    /// lands while the task is being polled is remembered and turned into a
    /// fresh enqueue once the current poll returns.
    fn schedule(self: Arc<Self>) {
        loop {
            match self.state.load(Ordering::Acquire) {
                IDLE => {
                    if self
                        .state
                        .compare_exchange(IDLE, SCHEDULED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        let scheduler = self.scheduler.clone();
                        scheduler.post_job(Box::new(move || self.poll_task()));
                        return;
                    }
                }
                RUNNING => {
                    if self
                        .state
                        .compare_exchange(RUNNING, NOTIFIED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return;
                    }
                }
                // SCHEDULED and NOTIFIED already imply a future poll;
                // COMPLETE makes the wake moot.
                _ => return,
            }
        }
    }

    /// The queued poll job. Runs only on the loop thread.
    fn poll_task(self: Arc<Self>) {
        self.state.store(RUNNING, Ordering::Release);
        let waker = Waker::from(Arc::clone(&self));
        let mut cx = Context::from_waker(&waker);

        let mut slot = self.future.lock();
        let Some(future) = slot.as_mut() else {
            self.state.store(COMPLETE, Ordering::Release);
            return;
        };

        if future.as_mut().poll(&mut cx).is_ready() {
            // Final suspension of a detached task: free the frame here.
            *slot = None;
            drop(slot);
            self.state.store(COMPLETE, Ordering::Release);
            return;
        }
        drop(slot);

        if self
            .state
            .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Woken while polling: hand the task back to the queue.
            self.state.store(SCHEDULED, Ordering::Release);
            let scheduler = self.scheduler.clone();
            scheduler.post_job(Box::new(move || self.poll_task()));
        }
    }
}

impl Wake for SpawnedTask {
    fn wake(self: Arc<Self>) {
        self.schedule();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        Arc::clone(self).schedule();
    }
}

impl Scheduler {
    /// Drives the future as a detached runner on this scheduler.
    ///
    /// The first poll is posted as a job; every wake re-posts. The future's
    /// storage is released the moment it completes.
    pub(crate) fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = Arc::new(SpawnedTask {
            scheduler: self.clone(),
            state: AtomicU8::new(IDLE),
            future: Mutex::new(Some(Box::pin(future))),
        });
        task.schedule();
    }
}

/// Starts the task as a detached runner on the context's scheduler.
///
/// After this call the caller holds no handle: the runner completes (or
/// fails) at its own pace, and nothing may be assumed about ordering
/// relative to other work. Failures of the task are logged and swallowed.
pub fn spawn_detached(ctx: &ExecutionContext, task: Task<()>) {
    task.start(ctx.scheduler());
}
