//! Auxiliary service contracts: pool off-loop/on-loop, timer ordering.

mod common;

use common::LoopRunner;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use uniloop::{block_on, spawn_detached, CancelSource, CancelToken, Task};

#[test]
fn pool_callable_runs_off_loop_and_resumes_on_loop() {
    let runner = LoopRunner::start();
    let ctx = runner.ctx();
    let loop_id = runner.loop_thread_id();

    let (tx, rx) = mpsc::channel();
    let task_ctx = Arc::clone(ctx);
    spawn_detached(
        ctx,
        Task::new(async move {
            let worker_id = task_ctx
                .cpu_pool()
                .submit(|| thread::current().id(), CancelToken::default())
                .await?;
            let _ = tx.send((worker_id, thread::current().id()));
            Ok(())
        }),
    );

    let (worker_id, resume_id) = rx.recv().expect("pool round trip never finished");
    assert_ne!(worker_id, loop_id, "callable must not run on the loop thread");
    assert_eq!(resume_id, loop_id, "awaiter must resume on the loop thread");
}

#[test]
fn pool_failures_cross_back_to_the_awaiter() {
    let runner = LoopRunner::start();
    let pool = runner.ctx().cpu_pool();

    let err = block_on(pool.submit(|| -> u8 { panic!("worker exploded") }, CancelToken::default()))
        .expect_err("expected captured panic");
    assert_eq!(err.kind(), uniloop::ErrorKind::Panicked);
    assert!(err.to_string().contains("worker exploded"));
}

#[test]
fn cancelled_submission_is_never_invoked() {
    let runner = LoopRunner::start();
    let pool = runner.ctx().cpu_pool();
    let source = CancelSource::new();
    source.request_cancel();

    let (probe_tx, probe_rx) = mpsc::channel::<()>();
    let err = block_on(pool.submit(
        move || {
            let _ = probe_tx.send(());
        },
        source.token(),
    ))
    .expect_err("expected cancellation");

    assert!(err.is_cancelled());
    assert!(
        probe_rx.recv_timeout(Duration::from_millis(50)).is_err(),
        "cancelled callable must not run"
    );
}

#[test]
fn timer_callbacks_respect_deadline_order_across_magnitudes() {
    let runner = LoopRunner::start();
    let timer = runner.ctx().timer();
    let (tx, rx) = mpsc::channel();

    for (label, delay_ms) in [("c", 45u64), ("a", 5), ("b", 25)] {
        let tx = tx.clone();
        timer.after(
            Duration::from_millis(delay_ms),
            move || {
                let _ = tx.send(label);
            },
            CancelToken::default(),
        );
    }

    let fired: Vec<_> = (0..3).map(|_| rx.recv().expect("callback lost")).collect();
    assert_eq!(fired, ["a", "b", "c"]);
}

#[test]
fn sleep_then_submit_pipeline_stays_on_contract() {
    let runner = LoopRunner::start();
    let ctx = runner.ctx();

    // Delay on the timer, then offload to the pool, then come back: the
    // common shape of real workloads composed from both services.
    let task_ctx = Arc::clone(ctx);
    let result = block_on(Task::new(async move {
        task_ctx
            .timer()
            .sleep_for(Duration::from_millis(10), CancelToken::default())
            .await?;
        let doubled = task_ctx
            .cpu_pool()
            .submit(|| 21 * 2, CancelToken::default())
            .await?;
        Ok(doubled)
    }))
    .expect("pipeline failed");

    assert_eq!(result, 42);
}
