//! Protocol configuration constants. These are not hardcoded into the
//! stages because conformance vectors commonly exercise a scaled-down
//! "tiny" parameter set (short epochs, few cores) alongside the full-size
//! configuration; every stage takes a `&ProtocolConfig` explicitly rather
//! than reading global constants.

/// Mirrors the constant table a JAM client parameterises itself with.
/// Values below are the commonly used "full" defaults; a conformance
/// driver may override them per trace (see `jam-stf-trace-runner`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub epoch_length: u32,
    pub num_cores: u32,
    pub num_validators: u32,
    pub max_recent_blocks: usize,
    pub report_timeout_slots: u32,
    pub availability_threshold_numerator: u32,
    pub availability_threshold_denominator: u32,
    pub max_accumulated_ring: usize,
    pub base_deposit: Balance,
    pub item_deposit: Balance,
    pub byte_deposit: Balance,
}

use crate::types::Balance;

impl ProtocolConfig {
    /// Matches the "tiny" JAM test-vector configuration commonly used by
    /// conformance suites (short epochs, few cores/validators).
    pub const fn tiny() -> Self {
        Self {
            epoch_length: 12,
            num_cores: 2,
            num_validators: 6,
            max_recent_blocks: 8,
            report_timeout_slots: 5,
            availability_threshold_numerator: 2,
            availability_threshold_denominator: 3,
            max_accumulated_ring: 8,
            base_deposit: 100,
            item_deposit: 10,
            byte_deposit: 1,
        }
    }

    /// The full-size JAM protocol configuration.
    pub const fn full() -> Self {
        Self {
            epoch_length: 600,
            num_cores: 341,
            num_validators: 1023,
            max_recent_blocks: 8,
            report_timeout_slots: 5,
            availability_threshold_numerator: 2,
            availability_threshold_denominator: 3,
            max_accumulated_ring: 24,
            base_deposit: 100,
            item_deposit: 10,
            byte_deposit: 1,
        }
    }

    pub fn epoch_of(&self, slot: u32) -> u32 {
        slot / self.epoch_length
    }

    pub fn slot_in_epoch(&self, slot: u32) -> u32 {
        slot % self.epoch_length
    }

    /// Minimum balance a service must maintain given its item/byte footprint (grounded on the
    /// `minbalance` computation in the accumulation `transfer` host call).
    pub fn min_balance(&self, item_count: u64, byte_count: u64) -> Balance {
        self.base_deposit
            .saturating_add(self.item_deposit.saturating_mul(item_count))
            .saturating_add(self.byte_deposit.saturating_mul(byte_count))
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self::full()
    }
}
