//! podgrid-health: node liveness monitoring for PodGrid.
//!
//! A single background loop inspects every registered node through the
//! execution backend on a fixed interval.
//!
//! # Architecture
//!
//! ```text
//! LivenessMonitor
//!   └── every interval:
//!       ├── lock → collect (node_id, handle) in registration order → unlock
//!       ├── per node: backend.inspect(handle) with timeout (no lock held)
//!       └── lock → apply status → migrate_pods() if Unreachable → unlock
//! ```
//!
//! Node state machine: `Running ⇄ Unreachable`. The monitor never removes
//! a node and never touches nodes a stop-node call has marked `Removed`.
//! While a node stays unreachable, every cycle re-attempts migration of
//! the pods still pointing at it.

pub mod monitor;

pub use monitor::{CycleReport, LivenessMonitor};
