//! Assurances stage.

use crate::block::Assurance;
use crate::config::ProtocolConfig;
use crate::crypto::ed25519_verify;
use crate::error::AssurancesReportsError;
use crate::state::components::JamState;
use crate::types::TimeSlot;

fn bit_set(bitfield: &[u8], core: usize) -> bool {
    let byte = core / 8;
    let bit = core % 8;
    bitfield.get(byte).map(|b| (b >> bit) & 1 == 1).unwrap_or(false)
}

/// Verifies each assurance, aggregates per-core bitfields, and moves any core that reaches the
/// availability threshold from `ρ` into `θ`. Reports that time out in `ρ` are discarded.
pub fn apply(
    state: &mut JamState,
    assurances: &[Assurance],
    parent_hash: &[u8; 32],
    current_slot: TimeSlot,
    config: &ProtocolConfig,
) -> Result<(), AssurancesReportsError> {
    let num_cores = config.num_cores as usize;
    let mut assured_count = vec![0u32; num_cores];

    for assurance in assurances {
        if assurance.anchor != *parent_hash {
            return Err(AssurancesReportsError::UnknownAnchor);
        }
        let validator = state
            .active_validators
            .get(assurance.validator_index as usize)
            .ok_or(AssurancesReportsError::BadAuditorKey)?;

        let mut msg = Vec::with_capacity(32 + assurance.bitfield.len());
        msg.extend_from_slice(&assurance.anchor);
        msg.extend_from_slice(&assurance.bitfield);
        if !ed25519_verify(&validator.ed25519, &msg, &assurance.signature) {
            return Err(AssurancesReportsError::BadAuditorKey);
        }

        for (core, count) in assured_count.iter_mut().enumerate() {
            if bit_set(&assurance.bitfield, core) {
                *count += 1;
            }
        }
    }

    let threshold_num = config.availability_threshold_numerator as u64;
    let threshold_den = config.availability_threshold_denominator as u64;
    let validator_count = state.active_validators.len() as u64;

    if state.pending_reports.len() < num_cores {
        state.pending_reports.resize(num_cores, None);
    }

    for core in 0..num_cores {
        let Some(assignment) = state.pending_reports[core].clone() else {
            continue;
        };

        if current_slot >= assignment.timeout {
            state.pending_reports[core] = None;
            continue;
        }

        let count = assured_count[core] as u64;
        if count * threshold_den >= validator_count * threshold_num {
            state
                .ready_reports
                .by_slot
                .entry(current_slot)
                .or_default()
                .push(assignment.report);
            state.pending_reports[core] = None;
        }
    }

    Ok(())
}
