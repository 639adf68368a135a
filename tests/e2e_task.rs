//! Task lifecycle end-to-end: chaining, failure propagation, detachment.

mod common;

use common::{init_test_logging, LoopRunner};
use std::sync::mpsc;
use uniloop::{block_on, spawn_detached, CancelSource, CancelToken, Error, ErrorKind, Task};

#[test]
fn awaited_chain_produces_the_derived_value() {
    init_test_logging();
    let a = Task::ready(42);
    let b = Task::new(async move { Ok(a.await? + 1) });
    assert_eq!(block_on(b).expect("chain failed"), 43);
}

#[test]
fn failure_message_survives_to_the_awaiter() {
    init_test_logging();
    let t: Task<u32> = Task::new(async {
        Err(Error::new(ErrorKind::InvalidArgument).with_context("boom"))
    });
    let err = block_on(t).expect_err("expected failure");
    assert!(err.to_string().contains("boom"));
}

#[test]
fn cancellation_defaults_and_wiring() {
    let token = CancelToken::default();
    assert!(!token.can_cancel());
    assert!(!token.is_cancelled());

    let source = CancelSource::new();
    let token = source.token();
    source.request_cancel();
    assert!(source.is_cancelled());
    assert!(token.is_cancelled());
}

#[test]
fn detached_task_completes_on_the_loop() {
    let runner = LoopRunner::start();
    let loop_id = runner.loop_thread_id();

    let (tx, rx) = mpsc::channel();
    spawn_detached(
        runner.ctx(),
        Task::new(async move {
            let _ = tx.send(std::thread::current().id());
            Ok(())
        }),
    );

    assert_eq!(rx.recv().expect("detached task never ran"), loop_id);
}

#[test]
fn detached_failure_is_swallowed_and_the_loop_survives() {
    let runner = LoopRunner::start();

    spawn_detached(
        runner.ctx(),
        Task::new(async { Err(Error::new(ErrorKind::Closed).with_context("ignored")) }),
    );

    // The loop keeps serving afterwards.
    let (tx, rx) = mpsc::channel();
    runner.ctx().post(move || {
        let _ = tx.send(7);
    });
    assert_eq!(rx.recv().expect("loop stopped serving"), 7);
}

#[test]
fn block_on_drives_tasks_that_hop_through_the_loop() {
    let runner = LoopRunner::start();
    let sched = runner.ctx().scheduler().clone();

    let task = Task::new(async move {
        sched.schedule().await;
        Ok::<_, Error>(5)
    });
    assert_eq!(block_on(task).expect("hop task failed"), 5);
}
