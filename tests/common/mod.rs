//! Shared helpers for the integration suites.

#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::thread::{self, JoinHandle, ThreadId};
use uniloop::ExecutionContext;

static INIT_LOGGING: Once = Once::new();

/// Install tracing output for tests. Safe to call repeatedly.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(true)
            .try_init();
    });
}

/// Runs an execution context's loop on a background thread and tears it
/// down (stop + join) on drop.
pub struct LoopRunner {
    ctx: Arc<ExecutionContext>,
    handle: Option<JoinHandle<()>>,
}

impl LoopRunner {
    pub fn start() -> Self {
        init_test_logging();
        let ctx = Arc::new(ExecutionContext::new());
        let loop_ctx = Arc::clone(&ctx);
        let handle = thread::spawn(move || loop_ctx.run());
        while !ctx.is_running() {
            thread::yield_now();
        }
        Self {
            ctx,
            handle: Some(handle),
        }
    }

    pub fn ctx(&self) -> &Arc<ExecutionContext> {
        &self.ctx
    }

    /// Thread id of the loop thread, probed through a posted job.
    pub fn loop_thread_id(&self) -> ThreadId {
        let (tx, rx) = std::sync::mpsc::channel();
        self.ctx.post(move || {
            let _ = tx.send(thread::current().id());
        });
        rx.recv().expect("loop did not answer the id probe")
    }
}

impl Drop for LoopRunner {
    fn drop(&mut self) {
        self.ctx.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
