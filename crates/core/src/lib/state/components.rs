//! The fifteen non-service state components plus the `JamState` aggregate that owns all
//! sixteen.

use std::collections::{BTreeMap, BTreeSet};

use jam_stf_codec_derive::Codec;

use crate::block::{TicketBody, WorkReport};
use crate::types::{
    BandersnatchKey, Balance, Ed25519Key, Entropy, Gas, Hash, ServiceId, TimeSlot, ValidatorKey,
};

use super::service::ServiceTable;

/// α — per-core pool of authorizer hashes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Codec)]
pub struct AuthPools {
    pub pools: Vec<Vec<Hash>>,
}

/// φ — per-core queue of authorizers awaiting rotation into α.
#[derive(Debug, Clone, PartialEq, Eq, Default, Codec)]
pub struct AuthQueues {
    pub queues: Vec<Vec<Hash>>,
}

/// One entry of β: everything recorded about a recently imported block.
#[derive(Debug, Clone, PartialEq, Eq, Codec)]
pub struct RecentBlockEntry {
    pub header_hash: Hash,
    pub parent_state_root: Hash,
    pub accumulate_root: Hash,
    pub reported_packages: Vec<Hash>,
}

/// β — bounded ordered list of recent blocks plus the Merkle-Mountain-Range of accumulate
/// roots.
#[derive(Debug, Clone, PartialEq, Eq, Default, Codec)]
pub struct RecentBlocks {
    pub entries: Vec<RecentBlockEntry>,
    /// MMR peaks, one optional hash per level; `None` marks an absent peak
    /// at that level (standard MMR append).
    pub mmr_peaks: Vec<Option<Hash>>,
}

/// γ — Safrole working state: ring commitment, current epoch's sealing-key
/// sequence, the in-progress ticket accumulator, and the validator set
/// queued for next-next epoch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Codec)]
pub struct SafroleState {
    pub ring_commitment: Hash,
    pub sealing_keys: Vec<BandersnatchKey>,
    pub ticket_accumulator: Vec<TicketBody>,
    pub next_validators: Vec<ValidatorKey>,
}

/// ψ — disputes state: the three disjoint judged-hash sets plus the offender key set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Codec)]
pub struct DisputesState {
    pub good: BTreeSet<Hash>,
    pub bad: BTreeSet<Hash>,
    pub wonky: BTreeSet<Hash>,
    pub offenders: BTreeSet<Ed25519Key>,
}

impl DisputesState {
    pub fn is_disjoint(&self) -> bool {
        self.good.is_disjoint(&self.bad) && self.good.is_disjoint(&self.wonky) && self.bad.is_disjoint(&self.wonky)
    }
}

/// ρ entry: a pending work report awaiting availability.
#[derive(Debug, Clone, PartialEq, Eq, Codec)]
pub struct AvailabilityAssignment {
    pub report: WorkReport,
    pub timeout: TimeSlot,
    pub availability_bitfield: Vec<u8>,
}

/// χ — privileged service ids and per-service privileged gas budgets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Codec)]
pub struct Privileges {
    pub manager: ServiceId,
    pub assign: ServiceId,
    pub designate: ServiceId,
    pub gas_budgets: BTreeMap<ServiceId, Gas>,
}

/// Per-validator counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Codec)]
pub struct ValidatorStats {
    pub blocks_produced: u64,
    pub tickets_published: u64,
    pub preimages_served: u64,
    pub reports_guaranteed: u64,
    pub gas_used: Gas,
}

/// Per-service counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Codec)]
pub struct ServiceStats {
    pub preimages_served: u64,
    pub gas_used: Gas,
}

/// π — statistics, reset every epoch and incremented every block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Codec)]
pub struct Statistics {
    pub validators: Vec<ValidatorStats>,
    pub services: BTreeMap<ServiceId, ServiceStats>,
}

/// θ — work reports awaiting accumulation, organised by the slot at which they became ready.
#[derive(Debug, Clone, PartialEq, Eq, Default, Codec)]
pub struct ReadyReports {
    pub by_slot: BTreeMap<TimeSlot, Vec<WorkReport>>,
}

/// ξ — ring of recently accumulated work-package hashes, one set per epoch slot, used to reject
/// replays.
#[derive(Debug, Clone, PartialEq, Eq, Default, Codec)]
pub struct AccumulatedRing {
    pub epochs: Vec<BTreeSet<Hash>>,
}

impl AccumulatedRing {
    pub fn contains(&self, package_hash: &Hash) -> bool {
        self.epochs.iter().any(|set| set.contains(package_hash))
    }
}

/// The complete JAM state: every component keyed by its stable id. Field order here has no
/// bearing on the dictionary projection, which is keyed by component id, not struct order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Codec)]
pub struct JamState {
    pub auth_pools: AuthPools,
    pub auth_queues: AuthQueues,
    pub recent_blocks: RecentBlocks,
    pub safrole: SafroleState,
    pub disputes: DisputesState,
    pub entropy: Entropy,
    pub incoming_validators: Vec<ValidatorKey>,
    pub active_validators: Vec<ValidatorKey>,
    pub archived_validators: Vec<ValidatorKey>,
    pub pending_reports: Vec<Option<AvailabilityAssignment>>,
    pub last_slot: TimeSlot,
    pub privileges: Privileges,
    pub statistics: Statistics,
    pub ready_reports: ReadyReports,
    pub accumulated: AccumulatedRing,
    pub services: ServiceTable,
}

impl JamState {
    pub fn service_balance(&self, id: ServiceId) -> Option<Balance> {
        self.services.get(&id).map(|s| s.balance)
    }
}
