//! The named JAM state components and their lifecycles.

pub mod components;
pub mod delta;
pub mod service;

pub use components::*;
pub use delta::{ServiceDeltaSnapshot, StateOverlay};
pub use service::{PreimageLookupKey, PreimageStatus, ServiceAccount, ServiceTable};
