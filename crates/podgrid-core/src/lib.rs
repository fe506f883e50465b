//! podgrid-core: shared configuration for the PodGrid control plane.

pub mod config;

pub use config::{BackendConfig, BackendKind, LivenessConfig, PodgridConfig, ServerConfig, parse_duration};
