//! The execution context: one scheduler plus its lazy auxiliary services.
//!
//! User code creates an [`ExecutionContext`], runs its loop on a thread of
//! its choosing, and reaches the timer and CPU pool through accessors that
//! construct the service on first use. References handed out stay valid for
//! the context's lifetime. Teardown happens in reverse dependency order:
//! timer first, then pool, then the scheduler, each service stopping and
//! joining its worker thread(s) as it goes.

use crate::runtime::config::ContextConfig;
use crate::runtime::scheduler::Scheduler;
use crate::runtime::thread_pool::ThreadPool;
use crate::time::Timer;
use std::fmt;
use std::sync::OnceLock;

/// Owns the scheduler and, lazily, the timer and CPU pool.
pub struct ExecutionContext {
    // Field order is teardown order: timer, pool, scheduler.
    timer: OnceLock<Timer>,
    pool: OnceLock<ThreadPool>,
    scheduler: Scheduler,
    config: ContextConfig,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("scheduler", &self.scheduler)
            .field("timer_started", &self.timer.get().is_some())
            .field("pool_started", &self.pool.get().is_some())
            .finish()
    }
}

impl ExecutionContext {
    /// Creates a context with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    /// Creates a context with the given configuration.
    #[must_use]
    pub fn with_config(mut config: ContextConfig) -> Self {
        config.normalize();
        Self {
            timer: OnceLock::new(),
            pool: OnceLock::new(),
            scheduler: Scheduler::new(),
            config,
        }
    }

    /// The scheduler this context owns.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The timer service, created on first access.
    pub fn timer(&self) -> &Timer {
        self.timer.get_or_init(|| {
            Timer::with_thread_name(
                &self.scheduler,
                &format!("{}-timer", self.config.thread_name_prefix),
            )
        })
    }

    /// The CPU thread pool, created on first access.
    pub fn cpu_pool(&self) -> &ThreadPool {
        self.pool.get_or_init(|| {
            ThreadPool::with_thread_name(self.config.pool_threads, &self.config.thread_name_prefix)
        })
    }

    /// Enqueues a job on the scheduler.
    pub fn post<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.scheduler.post(f);
    }

    /// Enqueues a resumption on the scheduler.
    pub fn post_waker(&self, waker: std::task::Waker) {
        self.scheduler.post_waker(waker);
    }

    /// Runs the event loop on the calling thread until stopped.
    pub fn run(&self) {
        self.scheduler.run();
    }

    /// Requests the event loop to exit.
    pub fn stop(&self) {
        self.scheduler.stop();
    }

    /// True while a thread is inside [`run`](Self::run).
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        // Services post to the scheduler; silence them before the queue
        // goes away. OnceLock drops fields in declaration order, which the
        // struct lays out as timer, pool, scheduler.
        if let Some(timer) = self.timer.get() {
            timer.stop();
        }
        if let Some(pool) = self.pool.get() {
            pool.stop();
        }
    }
}
