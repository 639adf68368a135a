//! Time primitives: the timer service and its sleeping awaiter.
//!
//! [`Timer`] owns a worker thread and a deadline-ordered queue; callbacks
//! registered through [`Timer::after`] and sleeps created with
//! [`Timer::sleep_for`] are delivered onto the loop thread in
//! `(deadline, sequence)` order. There is no timeout combinator here:
//! compose one by racing an operation against a sleep with
//! [`when_any`](crate::combinator::when_any).

pub mod sleep;
pub mod timer;

pub use timer::Timer;
