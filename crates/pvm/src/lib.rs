//! PVM instruction codec and the gas-metered accumulation/on-transfer sandbox.
//! `jam_stf_core::accumulate::PvmEngine` is the seam this crate implements; `jam-stf-core`
//! itself only depends on that trait, not on this crate.

pub mod engine;
pub mod host;
pub mod isa;

pub use engine::Interpreter13;
