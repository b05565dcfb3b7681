//! The narrow PVM collaborator boundary: the accumulation stage calls into a `PvmEngine` trait
//! object rather than depending on `jam-stf-pvm` directly, so the stage can be exercised with a
//! stub implementation. `jam-stf-pvm` is the real implementation of this trait.

use crate::state::delta::ServiceDeltaSnapshot;
use crate::types::{Balance, Gas, Hash, ServiceId, TimeSlot};

/// `2^32 − 2^9`, the modulus of the service-id collision-avoidance walk.
const SERVICE_ID_MODULUS: u32 = 0u32.wrapping_sub(0x200);

/// Outcome of one PVM invocation. `Halt`/`Panic` carry the gas actually spent so the statistics
/// stage can attribute it to the invoking service; `OutOfGas` always spends the full budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PvmOutcome {
    Halt { output: Vec<u8>, gas_used: Gas },
    Panic { gas_used: Gas },
    OutOfGas,
}

/// An intra-block value movement queued during accumulation, applied by
/// the on-transfer invocation before the block commits (GLOSSARY).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredTransfer {
    pub sender: ServiceId,
    pub dest: ServiceId,
    pub amount: Balance,
    pub memo: [u8; 128],
    pub gas: Gas,
}

/// Owned by the accumulation host-call dispatch for the duration of one service's invocation:
/// the service-delta snapshot, queued transfers, an optional accumulation output hash, and the
/// pseudo-random service-id generator state.
pub struct AccumulationContext<'a> {
    pub caller: ServiceId,
    pub slot: TimeSlot,
    pub entropy: Hash,
    pub base_services: &'a crate::state::service::ServiceTable,
    pub delta: ServiceDeltaSnapshot,
    pub deferred_transfers: Vec<DeferredTransfer>,
    pub output: Option<Hash>,
    next_service_id_cursor: u32,
}

impl<'a> AccumulationContext<'a> {
    pub fn new(
        caller: ServiceId,
        slot: TimeSlot,
        entropy: Hash,
        base_services: &'a crate::state::service::ServiceTable,
    ) -> Self {
        let mut buf = Vec::with_capacity(4 + 32 + 4);
        buf.extend_from_slice(&caller.to_le_bytes());
        buf.extend_from_slice(&entropy);
        buf.extend_from_slice(&slot.to_le_bytes());
        let seed = crate::crypto::blake2b_256(&buf);
        let start = u32::from_le_bytes([seed[0], seed[1], seed[2], seed[3]]);
        Self {
            caller,
            slot,
            entropy,
            base_services,
            delta: ServiceDeltaSnapshot::new(),
            deferred_transfers: Vec::new(),
            output: None,
            next_service_id_cursor: 0x100u32.wrapping_add(start % SERVICE_ID_MODULUS),
        }
    }

    /// Generates the next candidate service id, applying the collision-avoidance walk `id ←
    /// 0x100 + ((id − 0x100 + 1) mod (2^32 − 2^9))` until an id not already in use is found.
    pub fn next_service_id(&mut self) -> ServiceId {
        const LOW: u32 = 0x100;
        loop {
            let candidate = self.next_service_id_cursor;
            self.next_service_id_cursor =
                LOW.wrapping_add((candidate.wrapping_sub(LOW).wrapping_add(1)) % SERVICE_ID_MODULUS);
            if self.delta.get(self.base_services, candidate).is_none() {
                return candidate;
            }
        }
    }
}

/// The restricted on-transfer context: `gas`, `fetch`, `lookup`, `read`, `write`, `info`,
/// `log`.
pub struct OnTransferContext<'a> {
    pub dest: ServiceId,
    pub slot: TimeSlot,
    pub entropy: Hash,
    pub transfers: &'a [DeferredTransfer],
    pub base_services: &'a crate::state::service::ServiceTable,
    pub delta: ServiceDeltaSnapshot,
}

/// The abstract PVM contract the accumulation stage depends on: `run(code, entry, gas, args,
/// dispatch) → PvmResult`. Each method corresponds to one of the two host-call contexts.
pub trait PvmEngine: Send + Sync {
    fn run_accumulate(
        &self,
        code: &[u8],
        gas_limit: Gas,
        args: &[u8],
        ctx: &mut AccumulationContext<'_>,
    ) -> PvmOutcome;

    fn run_on_transfer(&self, code: &[u8], gas_limit: Gas, ctx: &mut OnTransferContext<'_>) -> PvmOutcome;
}

/// A stub engine that halts immediately with an empty return value and spends no gas, useful
/// for exercising the accumulation stage's bookkeeping without a real PVM.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPvm;

impl PvmEngine for NoopPvm {
    fn run_accumulate(&self, _code: &[u8], _gas_limit: Gas, _args: &[u8], _ctx: &mut AccumulationContext<'_>) -> PvmOutcome {
        PvmOutcome::Halt { output: Vec::new(), gas_used: 0 }
    }

    fn run_on_transfer(&self, _code: &[u8], _gas_limit: Gas, _ctx: &mut OnTransferContext<'_>) -> PvmOutcome {
        PvmOutcome::Halt { output: Vec::new(), gas_used: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_service_id_is_within_bounds() {
        let services = crate::state::service::ServiceTable::new();
        let mut ctx = AccumulationContext::new(7, 1, [0u8; 32], &services);
        let id = ctx.next_service_id();
        assert!(id >= 0x100);
        assert!(id < u32::MAX - 0x100);
    }
}
