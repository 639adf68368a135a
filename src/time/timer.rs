//! Deadline-ordered timer service.
//!
//! One worker thread owns an ordered map of `(deadline, sequence)` entries.
//! The worker sleeps until the earliest deadline, then hands the entry's
//! job to the scheduler, so timer callbacks always run on the loop thread.
//! The sequence number is assigned under the timer mutex and breaks
//! deadline ties in insertion order. An entry whose cancellation token is
//! observed set before dispatch is discarded silently: no callback, no
//! error.

use crate::cancel::CancelToken;
use crate::runtime::{Job, Scheduler};
use parking_lot::{Condvar, Mutex};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

struct TimerEntry {
    token: CancelToken,
    job: Job,
}

struct TimerState {
    queue: BTreeMap<(Instant, u64), TimerEntry>,
    next_seq: u64,
    stop: bool,
}

pub(crate) struct TimerInner {
    scheduler: Scheduler,
    state: Mutex<TimerState>,
    cv: Condvar,
}

impl TimerInner {
    /// Inserts an entry; ignored after stop.
    pub(crate) fn schedule(&self, when: Instant, job: Job, token: CancelToken) {
        {
            let mut state = self.state.lock();
            if state.stop {
                return;
            }
            state.next_seq += 1;
            let seq = state.next_seq;
            state.queue.insert((when, seq), TimerEntry { token, job });
        }
        self.cv.notify_all();
    }
}

/// Schedules callables to run on the loop thread after a delay.
///
/// Owns a dedicated worker thread, joined on drop. See
/// [`after`](Timer::after) and [`sleep_for`](Timer::sleep_for).
pub struct Timer {
    inner: Arc<TimerInner>,
    worker: Option<thread::JoinHandle<()>>,
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Timer")
            .field("pending", &state.queue.len())
            .field("stopped", &state.stop)
            .finish()
    }
}

impl Timer {
    /// Creates a timer delivering to the given scheduler.
    #[must_use]
    pub fn new(scheduler: &Scheduler) -> Self {
        Self::with_thread_name(scheduler, "uniloop-timer")
    }

    /// Creates a timer with a custom worker thread name.
    #[must_use]
    pub fn with_thread_name(scheduler: &Scheduler, name: &str) -> Self {
        let inner = Arc::new(TimerInner {
            scheduler: scheduler.clone(),
            state: Mutex::new(TimerState {
                queue: BTreeMap::new(),
                next_seq: 0,
                stop: false,
            }),
            cv: Condvar::new(),
        });

        let worker_inner = Arc::clone(&inner);
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(&worker_inner))
            .expect("failed to spawn timer thread");

        Self {
            inner,
            worker: Some(worker),
        }
    }

    pub(crate) fn inner(&self) -> &Arc<TimerInner> {
        &self.inner
    }

    /// Runs `f` on the loop thread after `delay`, unless the token is
    /// observed cancelled before dispatch (then the entry is dropped
    /// silently).
    pub fn after<F>(&self, delay: Duration, f: F, token: CancelToken)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner
            .schedule(Instant::now() + delay, Box::new(f), token);
    }

    /// Number of entries waiting to fire. Observational only.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Stops the worker and drops all pending entries without invocation.
    pub fn stop(&self) {
        {
            let mut state = self.inner.state.lock();
            state.stop = true;
            state.queue.clear();
        }
        self.inner.cv.notify_all();
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(inner: &Arc<TimerInner>) {
    loop {
        let entry = {
            let mut state = inner.state.lock();
            loop {
                if state.stop {
                    return;
                }
                match state.queue.keys().next().copied() {
                    None => inner.cv.wait(&mut state),
                    Some((when, _seq)) => {
                        if when <= Instant::now() {
                            let (_, entry) =
                                state.queue.pop_first().expect("peeked timer entry vanished");
                            break entry;
                        }
                        // A new earlier entry wakes this wait; the loop
                        // re-reads the minimum on every pass.
                        let _ = inner.cv.wait_until(&mut state, when);
                    }
                }
            }
        };

        if entry.token.is_cancelled() {
            tracing::trace!("timer entry cancelled before dispatch");
            continue;
        }
        inner.scheduler.post_job(entry.job);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
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
    fn callbacks_fire_in_deadline_order() {
        with_running_loop(|sched| {
            let timer = Timer::new(sched);
            let (tx, rx) = mpsc::channel();

            let tx_late = tx.clone();
            timer.after(
                Duration::from_millis(60),
                move || {
                    let _ = tx_late.send("late");
                },
                CancelToken::default(),
            );
            timer.after(
                Duration::from_millis(10),
                move || {
                    let _ = tx.send("early");
                },
                CancelToken::default(),
            );

            assert_eq!(rx.recv().expect("no callback"), "early");
            assert_eq!(rx.recv().expect("no callback"), "late");
        });
    }

    #[test]
    fn deadline_ties_fire_in_insertion_order() {
        with_running_loop(|sched| {
            let timer = Timer::new(sched);
            let (tx, rx) = mpsc::channel();
            let when = Instant::now() + Duration::from_millis(20);

            for label in ["a", "b", "c"] {
                let tx = tx.clone();
                timer.inner.schedule(
                    when,
                    Box::new(move || {
                        let _ = tx.send(label);
                    }),
                    CancelToken::default(),
                );
            }

            let seen: Vec<_> = (0..3).map(|_| rx.recv().expect("no callback")).collect();
            assert_eq!(seen, ["a", "b", "c"]);
        });
    }

    #[test]
    fn callbacks_run_on_the_loop_thread() {
        with_running_loop(|sched| {
            let timer = Timer::new(sched);
            let (loop_tx, loop_rx) = mpsc::channel();
            sched.post(move || {
                let _ = loop_tx.send(thread::current().id());
            });
            let loop_id = loop_rx.recv().expect("loop id probe failed");

            let (tx, rx) = mpsc::channel();
            timer.after(
                Duration::from_millis(5),
                move || {
                    let _ = tx.send(thread::current().id());
                },
                CancelToken::default(),
            );
            assert_eq!(rx.recv().expect("no callback"), loop_id);
        });
    }

    #[test]
    fn cancelled_entry_is_discarded_silently() {
        with_running_loop(|sched| {
            let timer = Timer::new(sched);
            let source = crate::cancel::CancelSource::new();
            let (tx, rx) = mpsc::channel::<()>();

            timer.after(
                Duration::from_millis(20),
                move || {
                    let _ = tx.send(());
                },
                source.token(),
            );
            source.request_cancel();

            assert!(
                rx.recv_timeout(Duration::from_millis(120)).is_err(),
                "cancelled callback must not be invoked"
            );
        });
    }

    #[test]
    fn earlier_arrival_preempts_a_waiting_deadline() {
        with_running_loop(|sched| {
            let timer = Timer::new(sched);
            let (tx, rx) = mpsc::channel();

            let tx_far = tx.clone();
            timer.after(
                Duration::from_millis(150),
                move || {
                    let _ = tx_far.send("far");
                },
                CancelToken::default(),
            );
            // The worker is already waiting on the 150 ms deadline; this
            // nearer entry must still fire first.
            thread::sleep(Duration::from_millis(10));
            timer.after(
                Duration::from_millis(10),
                move || {
                    let _ = tx.send("near");
                },
                CancelToken::default(),
            );

            assert_eq!(rx.recv().expect("no callback"), "near");
            assert_eq!(rx.recv().expect("no callback"), "far");
        });
    }

    #[test]
    fn stop_drops_pending_entries() {
        with_running_loop(|sched| {
            let timer = Timer::new(sched);
            let (tx, rx) = mpsc::channel::<()>();
            timer.after(
                Duration::from_millis(30),
                move || {
                    let _ = tx.send(());
                },
                CancelToken::default(),
            );
            assert_eq!(timer.pending(), 1);

            timer.stop();
            assert_eq!(timer.pending(), 0);
            assert!(
                rx.recv_timeout(Duration::from_millis(100)).is_err(),
                "entries cleared by stop must not fire"
            );

            // Scheduling after stop is a no-op.
            timer.after(Duration::from_millis(1), || {}, CancelToken::default());
            assert_eq!(timer.pending(), 0);
        });
    }
}
