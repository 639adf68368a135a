//! `when_all`: await several tasks, produce every result.
//!
//! The combinator is itself a [`Task`]. It hops onto the scheduler, starts
//! each child as a detached runner there, and suspends until the last
//! runner checks in. Results land in per-child slots and are materialized
//! as a tuple in input order, whatever the completion order was. The first
//! failure (by completion order) wins: it is re-raised at the awaiter and
//! no partial results are exposed; later failures are dropped.
//!
//! Aggregation state is shared: every runner holds a reference, plus the
//! combinator's own awaiter. An atomic countdown is the linearization
//! point; the runner that takes it to zero wakes the combinator.

use crate::error::{Error, Result};
use crate::runtime::Scheduler;
use crate::task::Task;
use parking_lot::Mutex;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// Shared aggregation state for one `when_all`.
///
/// `S` is the tuple of per-child `Option` slots.
pub struct JoinState<S> {
    slots: Mutex<S>,
    remaining: AtomicUsize,
    failure: Mutex<Option<Error>>,
    waker: Mutex<Option<Waker>>,
}

impl<S> JoinState<S> {
    fn new(children: usize, slots: S) -> Self {
        Self {
            slots: Mutex::new(slots),
            remaining: AtomicUsize::new(children),
            failure: Mutex::new(None),
            waker: Mutex::new(None),
        }
    }

    /// Keeps the first failure only.
    fn record_failure(&self, error: Error) {
        let mut slot = self.failure.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    /// Marks one child finished; the last one wakes the combinator.
    fn complete_one(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            if let Some(waker) = self.waker.lock().take() {
                waker.wake();
            }
        }
    }
}

/// A tuple of tasks that `when_all` can aggregate.
///
/// Implemented for tuples of [`Task`] up to eight elements, and for the
/// empty tuple (whose product is `()`).
pub trait JoinPack: Send + 'static {
    /// Per-child `Option` slots, in input order.
    type Slots: Send + 'static;
    /// Product of the child values, in input order.
    type Output: Send + 'static;
    /// Number of children in the pack.
    const LEN: usize;

    #[doc(hidden)]
    fn empty_slots() -> Self::Slots;
    #[doc(hidden)]
    fn start(self, scheduler: &Scheduler, state: &Arc<JoinState<Self::Slots>>);
    #[doc(hidden)]
    fn collect(slots: Self::Slots) -> Self::Output;
}

impl JoinPack for () {
    type Slots = ();
    type Output = ();
    const LEN: usize = 0;

    fn empty_slots() -> Self::Slots {}

    fn start(self, _scheduler: &Scheduler, _state: &Arc<JoinState<()>>) {}

    fn collect(_slots: Self::Slots) -> Self::Output {}
}

macro_rules! impl_join_pack {
    ($(($T:ident, $idx:tt)),+) => {
        impl<$($T),+> JoinPack for ($(Task<$T>,)+)
        where
            $($T: Send + 'static,)+
        {
            type Slots = ($(Option<$T>,)+);
            type Output = ($($T,)+);
            const LEN: usize = 0 $(+ { let _ = stringify!($T); 1 })+;

            fn empty_slots() -> Self::Slots {
                ($(None::<$T>,)+)
            }

            fn start(self, scheduler: &Scheduler, state: &Arc<JoinState<Self::Slots>>) {
                $(
                    {
                        let state = Arc::clone(state);
                        let task = self.$idx;
                        scheduler.spawn(async move {
                            match task.await {
                                Ok(value) => state.slots.lock().$idx = Some(value),
                                Err(error) => state.record_failure(error),
                            }
                            state.complete_one();
                        });
                    }
                )+
            }

            fn collect(slots: Self::Slots) -> Self::Output {
                ($(slots.$idx.expect("when_all slot missing at completion"),)+)
            }
        }
    };
}

impl_join_pack!((T0, 0));
impl_join_pack!((T0, 0), (T1, 1));
impl_join_pack!((T0, 0), (T1, 1), (T2, 2));
impl_join_pack!((T0, 0), (T1, 1), (T2, 2), (T3, 3));
impl_join_pack!((T0, 0), (T1, 1), (T2, 2), (T3, 3), (T4, 4));
impl_join_pack!((T0, 0), (T1, 1), (T2, 2), (T3, 3), (T4, 4), (T5, 5));
impl_join_pack!((T0, 0), (T1, 1), (T2, 2), (T3, 3), (T4, 4), (T5, 5), (T6, 6));
impl_join_pack!(
    (T0, 0),
    (T1, 1),
    (T2, 2),
    (T3, 3),
    (T4, 4),
    (T5, 5),
    (T6, 6),
    (T7, 7)
);

struct JoinWait<P: JoinPack> {
    state: Arc<JoinState<P::Slots>>,
    _pack: PhantomData<fn() -> P>,
}

impl<P: JoinPack> Future for JoinWait<P> {
    type Output = Result<P::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let state = &self.state;
        // Publish the waker before checking, so a runner finishing in
        // between cannot be missed.
        *state.waker.lock() = Some(cx.waker().clone());

        if state.remaining.load(Ordering::Acquire) != 0 {
            return Poll::Pending;
        }
        if let Some(error) = state.failure.lock().take() {
            return Poll::Ready(Err(error));
        }
        let slots = std::mem::replace(&mut *state.slots.lock(), P::empty_slots());
        Poll::Ready(Ok(P::collect(slots)))
    }
}

/// Awaits every task in the pack and yields all results in input order.
///
/// Children are started as detached runners on `scheduler`; the returned
/// task completes once all of them have finished, successfully or not. On
/// mixed outcomes the first failure by completion order is re-raised and
/// the remaining results are discarded. An empty pack yields `()` after a
/// single scheduler hop.
pub fn when_all<P: JoinPack>(scheduler: &Scheduler, tasks: P) -> Task<P::Output> {
    let scheduler = scheduler.clone();
    Task::new(async move {
        scheduler.schedule().await;
        let state = Arc::new(JoinState::new(P::LEN, P::empty_slots()));
        tasks.start(&scheduler, &state);
        JoinWait::<P> {
            state,
            _pack: PhantomData,
        }
        .await
    })
}
