//! Service accounts: the `δ` component.

use std::collections::BTreeMap;

use jam_stf_codec_derive::Codec;

use crate::types::{Balance, Gas, Hash, ServiceId, TimeSlot};

/// The availability schedule attached to a `(hash, length)` preimage-lookup entry. A preimage
/// moves `Requested → Available(slot)` when the preimages stage inserts its blob.
#[derive(Debug, Clone, PartialEq, Eq, Codec)]
pub enum PreimageStatus {
    /// Requested but not yet supplied.
    Requested,
    /// Supplied at the given slot; still counted towards the account's
    /// footprint until explicitly forgotten.
    Available(TimeSlot),
    /// Forgotten after being available; retained until `unavailable_since`
    /// ages out so a late preimage extrinsic can still be rejected cleanly.
    Unavailable(TimeSlot),
    /// Re-requested after having been available and then forgotten.
    Reavailable(TimeSlot, TimeSlot),
}

/// Key identifying a preimage-lookup entry: the preimage hash and its declared byte length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Codec)]
pub struct PreimageLookupKey {
    pub hash: Hash,
    pub length: u32,
}

/// One service's full persistent state.
#[derive(Debug, Clone, PartialEq, Eq, Codec)]
pub struct ServiceAccount {
    pub code_hash: Hash,
    pub balance: Balance,
    pub min_gas_accumulate: Gas,
    pub min_gas_on_transfer: Gas,
    pub storage: BTreeMap<Hash, Vec<u8>>,
    pub preimages: BTreeMap<Hash, Vec<u8>>,
    pub preimage_lookup: BTreeMap<PreimageLookupKey, PreimageStatus>,
}

impl ServiceAccount {
    pub fn new(code_hash: Hash, balance: Balance, min_gas_accumulate: Gas, min_gas_on_transfer: Gas) -> Self {
        Self {
            code_hash,
            balance,
            min_gas_accumulate,
            min_gas_on_transfer,
            storage: BTreeMap::new(),
            preimages: BTreeMap::new(),
            preimage_lookup: BTreeMap::new(),
        }
    }

    /// Number of storage + preimage items, used for the minimum-balance deposit computation
    /// (see `ProtocolConfig::min_balance`).
    pub fn item_count(&self) -> u64 {
        (self.storage.len() + self.preimages.len() + self.preimage_lookup.len()) as u64
    }

    /// Total bytes held across storage and preimage blobs.
    pub fn byte_count(&self) -> u64 {
        let storage_bytes: u64 = self.storage.values().map(|v| v.len() as u64).sum();
        let preimage_bytes: u64 = self.preimages.values().map(|v| v.len() as u64).sum();
        storage_bytes + preimage_bytes
    }
}

/// Mapping of service ids to accounts: the `δ` component itself.
pub type ServiceTable = BTreeMap<ServiceId, ServiceAccount>;
