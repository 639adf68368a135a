//! Combinators that compose several tasks into one.
//!
//! - [`join`]: `when_all`, wait for every child and produce all results
//! - [`race`]: `when_any`, wait for the first child and record its index
//!
//! Both share the same skeleton: the combinator hops onto the scheduler,
//! starts each child as a detached runner, and is resumed through shared
//! aggregation state once its rule (countdown vs. first-flip) fires.
//! Timeouts are composed from these and the timer: race the operation
//! against [`sleep_for`](crate::time::Timer::sleep_for).

pub mod join;
pub mod race;

pub use join::{when_all, JoinPack, JoinState};
pub use race::{when_any, RacePack, RaceState};
