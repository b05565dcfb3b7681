//! Reports (guarantees) stage.

use crate::block::ReportGuarantee;
use crate::config::ProtocolConfig;
use crate::crypto::ed25519_verify;
use crate::error::AssurancesReportsError;
use crate::state::components::{AvailabilityAssignment, JamState};
use crate::types::TimeSlot;

/// Validates and admits guarantees into `ρ`.
pub fn apply(
    state: &mut JamState,
    guarantees: &[ReportGuarantee],
    current_slot: TimeSlot,
    config: &ProtocolConfig,
) -> Result<(), AssurancesReportsError> {
    let num_cores = config.num_cores as usize;
    if state.pending_reports.len() < num_cores {
        state.pending_reports.resize(num_cores, None);
    }

    for guarantee in guarantees {
        let core = guarantee.report.core_index as usize;
        if core >= num_cores {
            return Err(AssurancesReportsError::UnknownCore);
        }

        // Slot window: a guarantee must be gathered no earlier than the
        // current epoch's start and no later than the current slot.
        let epoch_start = (config.epoch_of(current_slot)) * config.epoch_length;
        if guarantee.slot < epoch_start || guarantee.slot > current_slot {
            return Err(AssurancesReportsError::UnknownAnchor);
        }

        if !state.auth_pools.pools.get(core).map(|p| p.contains(&guarantee.report.authorizer_hash)).unwrap_or(false) {
            return Err(AssurancesReportsError::BadGuarantorKey);
        }

        let anchor_known = state
            .recent_blocks
            .entries
            .iter()
            .any(|entry| entry.header_hash == guarantee.report.anchor);
        if !anchor_known && !state.recent_blocks.entries.is_empty() {
            return Err(AssurancesReportsError::UnknownAnchor);
        }

        if state.accumulated.contains(&guarantee.report.package_hash)
            || guarantee.report.prerequisites.iter().any(|p| state.accumulated.contains(p))
        {
            return Err(AssurancesReportsError::UnknownAnchor);
        }

        for sig in &guarantee.signatures {
            let validator = state
                .active_validators
                .get(sig.validator_index as usize)
                .ok_or(AssurancesReportsError::BadGuarantorKey)?;
            if !ed25519_verify(&validator.ed25519, &guarantee.report.package_hash, &sig.signature) {
                return Err(AssurancesReportsError::BadGuarantorKey);
            }
        }

        if state.pending_reports[core].is_some() {
            return Err(AssurancesReportsError::ReportAlreadyPending);
        }

        state.pending_reports[core] = Some(AvailabilityAssignment {
            report: guarantee.report.clone(),
            timeout: current_slot + config.report_timeout_slots,
            availability_bitfield: vec![0u8; num_cores.div_ceil(8)],
        });
    }

    Ok(())
}
