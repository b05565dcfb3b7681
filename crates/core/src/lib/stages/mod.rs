//! STF stages, applied in a fixed order: disputes, safrole, assurances, reports, preimages,
//! accumulation, statistics.

pub mod accumulation;
pub mod assurances;
pub mod disputes;
pub mod preimages;
pub mod reports;
pub mod safrole;
pub mod statistics;
