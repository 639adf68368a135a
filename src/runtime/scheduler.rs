//! The event loop: a thread-safe FIFO job queue and its blocking consumer.
//!
//! Jobs are type-erased one-shot callables. Any thread may [`post`] them;
//! exactly one thread consumes them by calling [`run`], which blocks until
//! [`stop`] is requested and the queue has drained. All user-task
//! resumptions funnel through this queue, which is what makes user code
//! single-threaded by construction: the thread inside `run` is the *loop
//! thread*, and everything the runtime resumes, it resumes there.
//!
//! [`post`]: Scheduler::post
//! [`run`]: Scheduler::run
//! [`stop`]: Scheduler::stop

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// A type-erased one-shot job owned by the queue until executed.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

struct QueueState {
    jobs: VecDeque<Job>,
    stop_requested: bool,
}

struct SchedulerInner {
    state: Mutex<QueueState>,
    cv: Condvar,
    running: AtomicBool,
}

/// Handle to the event loop's job queue.
///
/// Cloning is cheap and every clone addresses the same queue. The handle is
/// freely shared with worker threads (timer, thread pool) whose completions
/// are delivered by posting back here.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Scheduler")
            .field("pending", &state.jobs.len())
            .field("stop_requested", &state.stop_requested)
            .field("running", &self.inner.running.load(Ordering::Relaxed))
            .finish()
    }
}

impl Scheduler {
    /// Creates a new scheduler with an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                state: Mutex::new(QueueState {
                    jobs: VecDeque::new(),
                    stop_requested: false,
                }),
                cv: Condvar::new(),
                running: AtomicBool::new(false),
            }),
        }
    }

    /// Enqueues a job and signals the run loop.
    ///
    /// Posts from a single thread retain their order in the queue. Posting
    /// after [`stop`](Self::stop) is permitted; whether such a job runs
    /// depends on whether the loop has already observed the stop with an
    /// empty queue.
    pub fn post<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.post_job(Box::new(f));
    }

    pub(crate) fn post_job(&self, job: Job) {
        {
            let mut state = self.inner.state.lock();
            state.jobs.push_back(job);
        }
        self.inner.cv.notify_one();
    }

    /// Enqueues a job that invokes the waker.
    ///
    /// The resumption-posting entry point for collaborators that hold an
    /// awaiter's waker: the wake runs on the loop thread, in FIFO order
    /// with every other job.
    pub fn post_waker(&self, waker: Waker) {
        self.post_job(Box::new(move || waker.wake()));
    }

    /// Returns an awaiter that re-enqueues the current task and suspends.
    ///
    /// This is a hop, not a short-circuit: even when awaited on the loop
    /// thread, the continuation goes to the back of the queue, letting
    /// already-queued jobs run first.
    #[must_use]
    pub fn schedule(&self) -> ScheduleHop {
        ScheduleHop { yielded: false }
    }

    /// Blocks the calling thread and consumes jobs until stopped.
    ///
    /// One job is popped and executed outside the lock per iteration.
    /// Returns once [`stop`](Self::stop) has been requested *and* the queue
    /// is empty. A job that panics is a programming error; the panic
    /// propagates out of `run`.
    pub fn run(&self) {
        self.inner.running.store(true, Ordering::Release);
        tracing::debug!("event loop entered");

        loop {
            let job = {
                let mut state = self.inner.state.lock();
                loop {
                    if let Some(job) = state.jobs.pop_front() {
                        break Some(job);
                    }
                    if state.stop_requested {
                        break None;
                    }
                    self.inner.cv.wait(&mut state);
                }
            };

            match job {
                Some(job) => job(),
                None => break,
            }
        }

        self.inner.running.store(false, Ordering::Release);
        tracing::debug!("event loop exited");
    }

    /// Requests the run loop to exit. Does not drain the queue.
    ///
    /// The loop finishes the job it is executing, keeps popping while the
    /// queue is non-empty, and exits once it observes an empty queue.
    pub fn stop(&self) {
        {
            let mut state = self.inner.state.lock();
            state.stop_requested = true;
        }
        self.inner.cv.notify_all();
    }

    /// Number of jobs currently queued. Observational only.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.state.lock().jobs.len()
    }

    /// True from entry of [`run`](Self::run) until its natural exit.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Awaiter returned by [`Scheduler::schedule`].
///
/// The first poll wakes its own waker and suspends; for a task spawned on
/// the scheduler that wake posts the task's next poll to the back of the
/// queue, which is exactly "post the continuation and yield".
#[derive(Debug)]
pub struct ScheduleHop {
    yielded: bool,
}

impl Future for ScheduleHop {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
