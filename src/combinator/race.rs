//! `when_any`: await several tasks, produce the first finisher.
//!
//! Same skeleton as [`when_all`](super::join::when_all): hop to the
//! scheduler, start each child as a detached runner, suspend on shared
//! state. The aggregation rule differs: a single atomic flag decides the
//! race, and the first runner to flip it records its index as the winner.
//! Runners finishing later still write their slot but cannot change the
//! recorded index.
//!
//! The winner decides the outcome. If the deciding runner failed, that
//! failure is re-raised; failures of losing runners are logged and dropped,
//! and never override a winning success. Loser slots may still be empty at
//! resumption, so the slot tuple carries `Option`s.

use crate::error::{Error, Result};
use crate::runtime::Scheduler;
use crate::task::Task;
use parking_lot::Mutex;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// Shared aggregation state for one `when_any`.
///
/// `S` is the tuple of per-child `Option` slots.
pub struct RaceState<S> {
    slots: Mutex<S>,
    /// Flipped exactly once by the winning runner; the linearization point.
    decided: AtomicBool,
    /// Set by the winner once its index (and failure, if any) are written.
    /// The combinator only reads the decision after observing this.
    published: AtomicBool,
    winner: AtomicUsize,
    failure: Mutex<Option<Error>>,
    waker: Mutex<Option<Waker>>,
}

impl<S> RaceState<S> {
    fn new(slots: S) -> Self {
        Self {
            slots: Mutex::new(slots),
            decided: AtomicBool::new(false),
            published: AtomicBool::new(false),
            winner: AtomicUsize::new(usize::MAX),
            failure: Mutex::new(None),
            waker: Mutex::new(None),
        }
    }

    /// Attempts to decide the race in favor of `index`.
    ///
    /// The flag flip is the linearization point; exactly one runner wins
    /// and records its index. The decision is not visible to the
    /// combinator until [`publish`](Self::publish).
    fn claim(&self, index: usize) -> bool {
        if self
            .decided
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.winner.store(index, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Makes the winner's decision visible and resumes the combinator.
    fn publish(&self) {
        self.published.store(true, Ordering::Release);
        if let Some(waker) = self.waker.lock().take() {
            waker.wake();
        }
    }
}

/// A non-empty tuple of tasks that `when_any` can race.
///
/// Implemented for tuples of [`Task`] from one to eight elements.
pub trait RacePack: Send + 'static {
    /// Per-child `Option` slots, in input order.
    type Slots: Send + 'static;
    /// Number of children in the pack.
    const LEN: usize;

    #[doc(hidden)]
    fn empty_slots() -> Self::Slots;
    #[doc(hidden)]
    fn start(self, scheduler: &Scheduler, state: &Arc<RaceState<Self::Slots>>);
}

macro_rules! impl_race_pack {
    ($(($T:ident, $idx:tt)),+) => {
        impl<$($T),+> RacePack for ($(Task<$T>,)+)
        where
            $($T: Send + 'static,)+
        {
            type Slots = ($(Option<$T>,)+);
            const LEN: usize = 0 $(+ { let _ = stringify!($T); 1 })+;

            fn empty_slots() -> Self::Slots {
                ($(None::<$T>,)+)
            }

            fn start(self, scheduler: &Scheduler, state: &Arc<RaceState<Self::Slots>>) {
                $(
                    {
                        let state = Arc::clone(state);
                        let task = self.$idx;
                        scheduler.spawn(async move {
                            match task.await {
                                Ok(value) => {
                                    state.slots.lock().$idx = Some(value);
                                    if state.claim($idx) {
                                        state.publish();
                                    }
                                }
                                Err(error) => {
                                    if state.claim($idx) {
                                        *state.failure.lock() = Some(error);
                                        state.publish();
                                    } else {
                                        tracing::debug!(
                                            index = $idx,
                                            %error,
                                            "race loser failed after the race was decided"
                                        );
                                    }
                                }
                            }
                        });
                    }
                )+
            }
        }
    };
}

impl_race_pack!((T0, 0));
impl_race_pack!((T0, 0), (T1, 1));
impl_race_pack!((T0, 0), (T1, 1), (T2, 2));
impl_race_pack!((T0, 0), (T1, 1), (T2, 2), (T3, 3));
impl_race_pack!((T0, 0), (T1, 1), (T2, 2), (T3, 3), (T4, 4));
impl_race_pack!((T0, 0), (T1, 1), (T2, 2), (T3, 3), (T4, 4), (T5, 5));
impl_race_pack!((T0, 0), (T1, 1), (T2, 2), (T3, 3), (T4, 4), (T5, 5), (T6, 6));
impl_race_pack!(
    (T0, 0),
    (T1, 1),
    (T2, 2),
    (T3, 3),
    (T4, 4),
    (T5, 5),
    (T6, 6),
    (T7, 7)
);

struct RaceWait<P: RacePack> {
    state: Arc<RaceState<P::Slots>>,
    _pack: PhantomData<fn() -> P>,
}

impl<P: RacePack> Future for RaceWait<P> {
    type Output = Result<(usize, P::Slots)>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let state = &self.state;
        *state.waker.lock() = Some(cx.waker().clone());

        if !state.published.load(Ordering::Acquire) {
            return Poll::Pending;
        }
        if let Some(error) = state.failure.lock().take() {
            return Poll::Ready(Err(error));
        }
        let winner = state.winner.load(Ordering::Relaxed);
        let slots = std::mem::replace(&mut *state.slots.lock(), P::empty_slots());
        Poll::Ready(Ok((winner, slots)))
    }
}

/// Races every task in the pack; yields the winner's index and the slots.
///
/// Children are started as detached runners on `scheduler`. The returned
/// task completes as soon as the first child finishes; its index is the
/// recorded winner and later finishers cannot change it. Slots are
/// `Option`s in input order: the winner's slot is filled on success,
/// loser slots hold whatever had completed by then.
pub fn when_any<P: RacePack>(scheduler: &Scheduler, tasks: P) -> Task<(usize, P::Slots)> {
    let scheduler = scheduler.clone();
    Task::new(async move {
        scheduler.schedule().await;
        let state = Arc::new(RaceState::new(P::empty_slots()));
        tasks.start(&scheduler, &state);
        RaceWait::<P> {
            state,
            _pack: PhantomData,
        }
        .await
    })
}
