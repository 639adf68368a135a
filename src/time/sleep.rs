//! The sleeping awaiter behind [`Timer::sleep_for`].
//!
//! [`Timer::sleep_for`]: super::Timer::sleep_for

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::task::Task;
use crate::time::timer::{Timer, TimerInner};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

/// Fired/waker cell shared between the sleeper and its timer job.
struct SleepShared {
    fired: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

/// Future that completes after a delay, or fails with `Cancelled`.
///
/// Registration happens lazily at the first poll (the suspension boundary);
/// the token is checked there and again at resumption. A zero delay
/// completes without touching the timer queue at all.
struct Sleep {
    timer: Arc<TimerInner>,
    delay: Duration,
    token: CancelToken,
    shared: Option<Arc<SleepShared>>,
}

impl Future for Sleep {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match &this.shared {
            None => {
                if this.token.is_cancelled() {
                    return Poll::Ready(Err(Error::cancelled()));
                }
                if this.delay.is_zero() {
                    return Poll::Ready(Ok(()));
                }

                let shared = Arc::new(SleepShared {
                    fired: AtomicBool::new(false),
                    waker: Mutex::new(Some(cx.waker().clone())),
                });
                let job_shared = Arc::clone(&shared);
                this.timer.schedule(
                    Instant::now() + this.delay,
                    Box::new(move || {
                        job_shared.fired.store(true, Ordering::Release);
                        if let Some(waker) = job_shared.waker.lock().take() {
                            waker.wake();
                        }
                    }),
                    this.token.clone(),
                );
                this.shared = Some(shared);
                Poll::Pending
            }
            Some(shared) => {
                *shared.waker.lock() = Some(cx.waker().clone());
                if !shared.fired.load(Ordering::Acquire) {
                    return Poll::Pending;
                }
                if this.token.is_cancelled() {
                    Poll::Ready(Err(Error::cancelled()))
                } else {
                    Poll::Ready(Ok(()))
                }
            }
        }
    }
}

impl Timer {
    /// Returns a task that completes after `delay`.
    ///
    /// A zero delay completes immediately without queueing. Cancellation is
    /// cooperative: a token observed set before the entry is dispatched
    /// suppresses the wakeup entirely, and one observed at resumption turns
    /// the sleep into a `Cancelled` failure. A pending sleep is never
    /// actively interrupted.
    #[must_use]
    pub fn sleep_for(&self, delay: Duration, token: CancelToken) -> Task<()> {
        Task::new(Sleep {
            timer: Arc::clone(self.inner()),
            delay,
            token,
            shared: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelSource;
    use crate::runtime::Scheduler;
    use crate::task::block_on;
    use std::thread;

    fn with_running_loop<R>(f: impl FnOnce(&Scheduler) -> R) -> R {
        let sched = Scheduler::new();
        let loop_sched = sched.clone();
        let handle = thread::spawn(move || loop_sched.run());
        let out = f(&sched);
        sched.stop();
        handle.join().expect("loop thread panicked");
        out
    }

    #[test]
    fn zero_delay_completes_without_queueing() {
        with_running_loop(|sched| {
            let timer = Timer::new(sched);
            block_on(timer.sleep_for(Duration::ZERO, CancelToken::default()))
                .expect("zero sleep failed");
            assert_eq!(timer.pending(), 0);
        });
    }

    #[test]
    fn sleep_elapses_at_least_its_delay() {
        with_running_loop(|sched| {
            let timer = Timer::new(sched);
            let started = Instant::now();
            block_on(timer.sleep_for(Duration::from_millis(30), CancelToken::default()))
                .expect("sleep failed");
            assert!(started.elapsed() >= Duration::from_millis(30));
        });
    }

    #[test]
    fn pre_cancelled_token_fails_at_the_suspension_boundary() {
        with_running_loop(|sched| {
            let timer = Timer::new(sched);
            let source = CancelSource::new();
            source.request_cancel();

            let err = block_on(timer.sleep_for(Duration::from_millis(50), source.token()))
                .expect_err("expected cancellation");
            assert!(err.is_cancelled());
            assert_eq!(timer.pending(), 0, "cancelled sleep must not be queued");
        });
    }

    #[test]
    fn zero_delay_still_observes_cancellation() {
        with_running_loop(|sched| {
            let timer = Timer::new(sched);
            let source = CancelSource::new();
            source.request_cancel();

            let err = block_on(timer.sleep_for(Duration::ZERO, source.token()))
                .expect_err("expected cancellation");
            assert!(err.is_cancelled());
        });
    }
}
