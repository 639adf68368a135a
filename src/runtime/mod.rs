//! Runtime machinery: the scheduler, spawning, the CPU pool, and the
//! execution context.
//!
//! - [`scheduler`]: FIFO job queue and the blocking run loop
//! - [`spawn`]: detached task runners and [`spawn_detached`]
//! - [`thread_pool`]: CPU pool with the submit-then-resume protocol
//! - [`config`]: context configuration and environment overrides
//! - [`context`]: the execution context owning scheduler and services

pub mod config;
pub mod context;
pub mod scheduler;
pub mod spawn;
pub mod thread_pool;

pub use config::{ConfigError, ContextConfig};
pub use context::ExecutionContext;
pub use scheduler::{ScheduleHop, Scheduler};
pub use spawn::spawn_detached;
pub use thread_pool::ThreadPool;

pub(crate) use scheduler::Job;
