//! Uniloop: a small single-loop cooperative async runtime.
//!
//! # Overview
//!
//! Uniloop gives a program one user-facing event loop and keeps user code
//! single-threaded by construction. Tasks are lazy suspendable computations
//! with a single continuation slot; every resumption funnels through the
//! loop's FIFO job queue, so everything a task does happens on the thread
//! running the loop. Blocking and delayed work is offloaded to auxiliary
//! worker threads (a CPU pool and a deadline-ordered timer) which only
//! ever interact with user state by posting completions back to the loop.
//!
//! # Core pieces
//!
//! - [`ExecutionContext`]: owns the scheduler and lazily provides the
//!   timer and CPU pool
//! - [`Scheduler`]: the FIFO job queue, its blocking run loop, and the
//!   [`schedule`](Scheduler::schedule) hop
//! - [`Task`]: a suspendable computation; awaited once or started detached
//! - [`when_all`] / [`when_any`]: aggregate several tasks into one
//! - [`CancelSource`] / [`CancelToken`]: cooperative, sticky cancellation
//! - [`Timer`]: `after` callbacks and `sleep_for`, in deadline order
//! - [`ThreadPool`]: run blocking callables off-loop, resume on-loop
//! - [`block_on`]: drive a single task from outside the loop
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::thread;
//! use uniloop::{block_on, when_all, ExecutionContext, Task};
//!
//! let ctx = Arc::new(ExecutionContext::new());
//! let loop_ctx = Arc::clone(&ctx);
//! let loop_thread = thread::spawn(move || loop_ctx.run());
//!
//! let pair = block_on(when_all(
//!     ctx.scheduler(),
//!     (Task::ready(10), Task::ready(20)),
//! ))
//! .unwrap();
//! assert_eq!(pair, (10, 20));
//!
//! ctx.stop();
//! loop_thread.join().unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod cancel;
pub mod combinator;
pub mod error;
pub mod runtime;
pub mod task;
pub mod time;

pub use cancel::{CancelSource, CancelToken};
pub use combinator::{when_all, when_any};
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use runtime::{spawn_detached, ContextConfig, ExecutionContext, Scheduler, ThreadPool};
pub use task::{block_on, Task};
pub use time::Timer;
