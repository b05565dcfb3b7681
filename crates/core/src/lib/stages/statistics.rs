//! Statistics stage.

use crate::block::ReportGuarantee;
use crate::state::components::JamState;

fn ensure_validator_slot(state: &mut JamState, index: u16) {
    let needed = index as usize + 1;
    if state.statistics.validators.len() < needed {
        state.statistics.validators.resize(needed, Default::default());
    }
}

/// Increments per-validator and per-service counters: the author's block and ticket counts, and
/// every guarantor's signed-report count for the guarantees carried in this block.
pub fn apply(state: &mut JamState, author_index: u16, tickets_published: u64, guarantees: &[ReportGuarantee]) {
    ensure_validator_slot(state, author_index);
    if let Some(stats) = state.statistics.validators.get_mut(author_index as usize) {
        stats.blocks_produced += 1;
        stats.tickets_published += tickets_published;
    }

    for guarantee in guarantees {
        for signature in &guarantee.signatures {
            ensure_validator_slot(state, signature.validator_index);
            if let Some(stats) = state.statistics.validators.get_mut(signature.validator_index as usize) {
                stats.reports_guaranteed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_block_producer_counter() {
        let mut state = JamState::default();
        apply(&mut state, 2, 0, &[]);
        assert_eq!(state.statistics.validators[2].blocks_produced, 1);
    }

    #[test]
    fn increments_reports_guaranteed_per_signer() {
        use crate::block::{GuarantorSignature, WorkReport};
        use crate::types::ZERO_HASH;

        let mut state = JamState::default();
        let report = WorkReport {
            package_hash: ZERO_HASH,
            core_index: 0,
            service_id: 1,
            authorizer_hash: ZERO_HASH,
            anchor: ZERO_HASH,
            prerequisites: vec![],
            refine_output: vec![],
            gas_limit: 0,
        };
        let guarantees = vec![ReportGuarantee {
            report,
            slot: 0,
            signatures: vec![
                GuarantorSignature {
                    validator_index: 0,
                    signature: [0u8; 64],
                },
                GuarantorSignature {
                    validator_index: 3,
                    signature: [0u8; 64],
                },
            ],
        }];

        apply(&mut state, 0, 0, &guarantees);

        assert_eq!(state.statistics.validators[0].reports_guaranteed, 1);
        assert_eq!(state.statistics.validators[3].reports_guaranteed, 1);
    }
}
