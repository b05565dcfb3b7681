//! Accumulation stage.

use std::collections::BTreeSet;

use crate::accumulate::{AccumulationContext, DeferredTransfer, OnTransferContext, PvmEngine, PvmOutcome};
use crate::config::ProtocolConfig;
use crate::crypto::blake2b_256;
use crate::error::AccumulationError;
use crate::state::components::JamState;
use crate::types::{Hash, TimeSlot, ZERO_HASH};

/// Runs every due report in `θ` through the PVM's accumulate entry point, then drains the
/// resulting deferred transfers through the on-transfer entry point. Returns the block's
/// accumulate root.
pub fn apply(
    state: &mut JamState,
    current_slot: TimeSlot,
    config: &ProtocolConfig,
    pvm: &dyn PvmEngine,
) -> Result<Hash, AccumulationError> {
    let crosses_epoch = state.accumulated.epochs.is_empty()
        || config.epoch_of(state.last_slot) != config.epoch_of(current_slot);
    if crosses_epoch {
        state.accumulated.epochs.push(BTreeSet::new());
    }

    let due_slots: Vec<TimeSlot> = state
        .ready_reports
        .by_slot
        .range(..=current_slot)
        .map(|(&slot, _)| slot)
        .collect();

    let mut outcomes: Vec<(Hash, Option<Hash>)> = Vec::new();
    let mut all_transfers: Vec<DeferredTransfer> = Vec::new();

    for slot in due_slots {
        let Some(reports) = state.ready_reports.by_slot.remove(&slot) else {
            continue;
        };
        for report in reports {
            let account = state
                .services
                .get(&report.service_id)
                .ok_or(AccumulationError::ServiceNotFound)?;
            let code_hash = account.code_hash;
            if code_hash == ZERO_HASH {
                return Err(AccumulationError::ServiceCodeUnavailable);
            }
            let code = account
                .preimages
                .get(&code_hash)
                .cloned()
                .ok_or(AccumulationError::ServiceCodeUnavailable)?;

            let mut ctx = AccumulationContext::new(report.service_id, current_slot, state.entropy[0], &state.services);
            let outcome = pvm.run_accumulate(&code, report.gas_limit, &report.refine_output, &mut ctx);
            // Destructure to drop `ctx`'s borrow of `state.services` before
            // we need to borrow it mutably below.
            let AccumulationContext {
                delta,
                deferred_transfers,
                output,
                ..
            } = ctx;

            let gas_used = match &outcome {
                PvmOutcome::Halt { gas_used, .. } | PvmOutcome::Panic { gas_used } => *gas_used,
                PvmOutcome::OutOfGas => report.gas_limit,
            };
            state.statistics.services.entry(report.service_id).or_default().gas_used += gas_used;

            match outcome {
                PvmOutcome::Halt { .. } => {
                    delta.merge_into(&mut state.services);
                    all_transfers.extend(deferred_transfers);
                    outcomes.push((report.package_hash, output));
                }
                PvmOutcome::Panic { .. } => outcomes.push((report.package_hash, None)),
                PvmOutcome::OutOfGas => outcomes.push((report.package_hash, None)),
            }

            if let Some(set) = state.accumulated.epochs.last_mut() {
                set.insert(report.package_hash);
            }
        }
    }

    for transfer in all_transfers {
        let Some(dest_account) = state.services.get(&transfer.dest) else {
            continue;
        };
        let code_hash = dest_account.code_hash;
        let Some(code) = dest_account.preimages.get(&code_hash).cloned() else {
            continue;
        };

        let transfers_slice = [transfer.clone()];
        let mut ctx = OnTransferContext {
            dest: transfer.dest,
            slot: current_slot,
            entropy: state.entropy[0],
            transfers: &transfers_slice,
            base_services: &state.services,
            delta: crate::state::delta::ServiceDeltaSnapshot::new(),
        };
        let outcome = pvm.run_on_transfer(&code, transfer.gas, &mut ctx);
        // Destructure to drop `ctx`'s borrow of `state.services` before we
        // need to borrow it mutably below.
        let OnTransferContext { delta, .. } = ctx;

        let gas_used = match &outcome {
            PvmOutcome::Halt { gas_used, .. } | PvmOutcome::Panic { gas_used } => *gas_used,
            PvmOutcome::OutOfGas => transfer.gas,
        };
        state.statistics.services.entry(transfer.dest).or_default().gas_used += gas_used;

        if !matches!(outcome, PvmOutcome::Panic { .. } | PvmOutcome::OutOfGas) {
            delta.merge_into(&mut state.services);
            if let Some(dest) = state.services.get_mut(&transfer.dest) {
                dest.balance = dest.balance.saturating_add(transfer.amount);
            }
        }
    }

    outcomes.sort_by_key(|(hash, _)| *hash);
    let mut buf = Vec::new();
    for (package_hash, output) in &outcomes {
        buf.extend_from_slice(package_hash);
        buf.extend_from_slice(output.as_ref().unwrap_or(&ZERO_HASH));
    }
    let accumulate_root = blake2b_256(&buf);

    if state.accumulated.epochs.len() > config.max_accumulated_ring {
        state.accumulated.epochs.remove(0);
    }

    Ok(accumulate_root)
}
