//! Service layer: cycle orchestration and scheduling.
//!
//! [`TrackerService`] wires the source registry, the reconciler, and the
//! store into one serial fetch → diff → persist loop.

pub mod tracker;

pub use tracker::TrackerService;
