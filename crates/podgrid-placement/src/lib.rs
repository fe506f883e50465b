//! podgrid-placement: choose a hosting node for a pod.
//!
//! Placement is a pure function of registry state. It does not mutate
//! anything; callers hold the registry lock while deciding and while
//! applying the decision, so the answer cannot go stale in between.

pub mod placer;

pub use placer::{fits, first_fit, first_fit_excluding};
