//! CPU thread pool: run blocking callables off the loop thread.
//!
//! A fixed set of workers shares a FIFO of type-erased jobs. Work enters
//! either fire-and-forget ([`dispatch`](ThreadPool::dispatch)) or through
//! the submit-then-resume protocol ([`submit`](ThreadPool::submit)): the
//! returned task's awaiter enqueues a wrapper on first poll; the worker
//! checks the cancellation token, runs the callable capturing its value or
//! panic, and wakes the awaiter, whose resumption lands back on the loop
//! thread for tasks running there.
//!
//! Worker panics are contained; a panicking callable never takes the
//! process (or the worker) down. After [`stop`](ThreadPool::stop) no new
//! work is accepted, and workers drain what is queued and exit.

use crate::cancel::CancelToken;
use crate::error::{Error, ErrorKind, Result};
use crate::task::Task;
use crossbeam_queue::SegQueue;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread;

type PoolJob = Box<dyn FnOnce() + Send + 'static>;

struct PoolInner {
    queue: SegQueue<PoolJob>,
    stop: AtomicBool,
    mutex: Mutex<()>,
    cv: Condvar,
}

/// Pushes a job and wakes one parked worker. Refused after stop.
fn enqueue(inner: &PoolInner, job: PoolJob) -> bool {
    if inner.stop.load(Ordering::Acquire) {
        return false;
    }
    inner.queue.push(job);
    let _guard = inner.mutex.lock();
    inner.cv.notify_one();
    true
}

fn worker_loop(inner: &PoolInner) {
    loop {
        if let Some(job) = inner.queue.pop() {
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                tracing::warn!("thread pool job panicked; worker continues");
            }
            continue;
        }
        if inner.stop.load(Ordering::Acquire) {
            break;
        }
        let mut guard = inner.mutex.lock();
        // Re-check under the lock: a push-and-notify cannot slip between
        // the check and the wait because notification takes this mutex.
        if inner.queue.is_empty() && !inner.stop.load(Ordering::Acquire) {
            inner.cv.wait(&mut guard);
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Executes blocking or CPU-bound callables on dedicated worker threads.
pub struct ThreadPool {
    inner: Arc<PoolInner>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("workers", &self.workers.len())
            .field("pending", &self.inner.queue.len())
            .field("stopped", &self.inner.stop.load(Ordering::Relaxed))
            .finish()
    }
}

impl ThreadPool {
    /// Creates a pool with the given worker count.
    ///
    /// `threads == 0` selects the available hardware parallelism, with a
    /// minimum of one worker.
    #[must_use]
    pub fn new(threads: usize) -> Self {
        Self::with_thread_name(threads, "uniloop")
    }

    /// Creates a pool whose worker threads carry the given name prefix.
    #[must_use]
    pub fn with_thread_name(threads: usize, name_prefix: &str) -> Self {
        let threads = if threads == 0 {
            default_worker_count()
        } else {
            threads
        };

        let inner = Arc::new(PoolInner {
            queue: SegQueue::new(),
            stop: AtomicBool::new(false),
            mutex: Mutex::new(()),
            cv: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let worker_inner = Arc::clone(&inner);
            let handle = thread::Builder::new()
                .name(format!("{name_prefix}-pool-{i}"))
                .spawn(move || worker_loop(&worker_inner))
                .expect("failed to spawn pool thread");
            workers.push(handle);
        }

        Self { inner, workers }
    }

    /// Number of worker threads.
    #[must_use]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Fire-and-forget execution of `f` on a worker thread.
    ///
    /// Dropped silently if the pool is stopped. A panic in `f` is contained
    /// and logged; no result or failure is ever delivered.
    pub fn dispatch<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if !enqueue(&self.inner, Box::new(f)) {
            tracing::debug!("thread pool stopped; dropping dispatched job");
        }
    }

    /// Runs `f` on a worker and delivers its result to the awaiter.
    ///
    /// The work is enqueued when the returned task is first polled. The
    /// worker observes `token` before invoking `f`: a set token records a
    /// `Cancelled` failure without running the callable. A panic in `f` is
    /// captured as a `Panicked` failure. Submitting on a stopped pool
    /// fails with `Rejected`.
    pub fn submit<F, R>(&self, f: F, token: CancelToken) -> Task<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        Task::new(SubmitFuture {
            pool: Arc::clone(&self.inner),
            state: Arc::new(SubmitState {
                result: Mutex::new(None),
                waker: Mutex::new(None),
            }),
            work: Some(Box::new(f)),
            token,
            enqueued: false,
        })
    }

    /// Refuses new work and wakes all workers so they can drain and exit.
    pub fn stop(&self) {
        self.inner.stop.store(true, Ordering::Release);
        let _guard = self.inner.mutex.lock();
        self.inner.cv.notify_all();
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map_or(1, std::num::NonZeroUsize::get)
        .max(1)
}

struct SubmitState<R> {
    result: Mutex<Option<Result<R>>>,
    waker: Mutex<Option<Waker>>,
}

struct SubmitFuture<R> {
    pool: Arc<PoolInner>,
    state: Arc<SubmitState<R>>,
    work: Option<Box<dyn FnOnce() -> R + Send + 'static>>,
    token: CancelToken,
    enqueued: bool,
}

impl<R: Send + 'static> Future for SubmitFuture<R> {
    type Output = Result<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        // Publish the waker before inspecting the result so a worker
        // finishing concurrently is never missed.
        *this.state.waker.lock() = Some(cx.waker().clone());
        if let Some(result) = this.state.result.lock().take() {
            return Poll::Ready(result);
        }

        if !this.enqueued {
            this.enqueued = true;
            let work = this.work.take().expect("submit work already taken");
            let token = this.token.clone();
            let state = Arc::clone(&this.state);

            let wrapper: PoolJob = Box::new(move || {
                let outcome = if token.is_cancelled() {
                    Err(Error::cancelled())
                } else {
                    catch_unwind(AssertUnwindSafe(work)).map_err(|payload| {
                        Error::new(ErrorKind::Panicked).with_context(panic_message(&*payload))
                    })
                };
                *state.result.lock() = Some(outcome);
                if let Some(waker) = state.waker.lock().take() {
                    waker.wake();
                }
            });

            if !enqueue(&this.pool, wrapper) {
                return Poll::Ready(Err(
                    Error::new(ErrorKind::Rejected).with_context("thread pool stopped")
                ));
            }
        }
        Poll::Pending
    }
}
