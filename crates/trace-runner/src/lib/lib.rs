//! Conformance trace driver (C8): replays pre-state/block/post-state
//! fixtures through `jam_stf_core::importer` and reports any divergence.

pub mod env;
pub mod trace;
pub mod tracing;

pub use trace::{run, Trace, TraceError};
