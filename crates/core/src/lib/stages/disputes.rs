//! Disputes stage.

use crate::block::DisputesExtrinsic;
use crate::config::ProtocolConfig;
use crate::crypto::ed25519_verify;
use crate::error::DisputesError;
use crate::state::components::JamState;
use crate::types::{Ed25519Key, Hash, TimeSlot, ValidatorKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VoteSplit {
    Good,
    Bad,
    Wonky,
}

fn classify_split(yes: usize, total: usize) -> Option<VoteSplit> {
    let super_majority = total * 2 / 3 + 1;
    if yes >= super_majority {
        Some(VoteSplit::Good)
    } else if total - yes >= super_majority {
        Some(VoteSplit::Bad)
    } else if yes * 3 == total || (total - yes) * 3 == total {
        // A "legal wonky split" is defined here as an even third/two-thirds split that is
        // neither a super-majority nor its complement, the only other split this code treats as
        // legal.
        Some(VoteSplit::Wonky)
    } else {
        None
    }
}

fn epoch_validators<'a>(state: &'a JamState, age: u32, current_epoch: u32) -> Option<&'a [ValidatorKey]> {
    if age == current_epoch {
        Some(&state.active_validators)
    } else if age + 1 == current_epoch {
        Some(&state.archived_validators)
    } else {
        None
    }
}

fn verdict_message(target: &Hash, age: u32) -> Vec<u8> {
    let mut msg = Vec::with_capacity(36);
    msg.extend_from_slice(target);
    msg.extend_from_slice(&age.to_le_bytes());
    msg
}

/// Applies the disputes extrinsic to the overlay. On success, offending targets join
/// `good`/`bad`/`wonky` and offender keys join `offenders`; any pending report on a core whose
/// report hash was just marked `bad` is cleared.
pub fn apply(
    state: &mut JamState,
    extrinsic: &DisputesExtrinsic,
    config: &ProtocolConfig,
    current_slot: TimeSlot,
) -> Result<(), DisputesError> {
    let current_epoch = config.epoch_of(current_slot);

    if !is_sorted_unique_by(&extrinsic.verdicts, |v| v.target) {
        return Err(DisputesError::VerdictsNotSortedUnique);
    }
    if !is_sorted_unique_by(&extrinsic.culprits, |c| c.target) {
        return Err(DisputesError::CulpritsNotSortedUnique);
    }
    if !is_sorted_unique_by(&extrinsic.faults, |f| f.target) {
        return Err(DisputesError::FaultsNotSortedUnique);
    }

    for verdict in &extrinsic.verdicts {
        if state.disputes.good.contains(&verdict.target)
            || state.disputes.bad.contains(&verdict.target)
            || state.disputes.wonky.contains(&verdict.target)
        {
            return Err(DisputesError::AlreadyJudged);
        }

        if !is_sorted_unique_by(&verdict.judgements, |j| j.validator_index) {
            return Err(DisputesError::JudgementsNotSortedUnique);
        }

        let validators = epoch_validators(state, verdict.age, current_epoch).ok_or(DisputesError::BadJudgementAge)?;

        let msg = verdict_message(&verdict.target, verdict.age);
        let mut yes = 0usize;
        for judgement in &verdict.judgements {
            let validator = validators
                .get(judgement.validator_index as usize)
                .ok_or(DisputesError::BadValidatorIndex)?;
            if !ed25519_verify(&validator.ed25519, &msg, &judgement.signature) {
                return Err(DisputesError::BadSignature);
            }
            if judgement.vote {
                yes += 1;
            }
        }

        let split = classify_split(yes, verdict.judgements.len()).ok_or(DisputesError::BadVoteSplit)?;

        match split {
            VoteSplit::Bad => {
                let has_culprit = extrinsic.culprits.iter().any(|c| c.target == verdict.target);
                if !has_culprit {
                    return Err(DisputesError::NotEnoughCulprits);
                }
                state.disputes.bad.insert(verdict.target);
                clear_pending_report_for(state, &verdict.target);
            }
            VoteSplit::Good => {
                let fault_count = extrinsic.faults.iter().filter(|f| f.target == verdict.target).count();
                if fault_count < 2 {
                    return Err(DisputesError::NotEnoughFaults);
                }
                state.disputes.good.insert(verdict.target);
            }
            VoteSplit::Wonky => {
                state.disputes.wonky.insert(verdict.target);
            }
        }
    }

    for culprit in &extrinsic.culprits {
        if !state.disputes.bad.contains(&culprit.target) {
            return Err(DisputesError::CulpritsVerdictNotBad);
        }
        if !ed25519_verify(&culprit.key, &culprit.target, &culprit.signature) {
            return Err(DisputesError::BadSignature);
        }
        report_offender(state, culprit.key)?;
    }

    for fault in &extrinsic.faults {
        let judged_good = state.disputes.good.contains(&fault.target);
        // A fault alleges the opposite of the recorded verdict; the fault's
        // own vote must therefore disagree with the verdict that won.
        if judged_good == fault.vote {
            return Err(DisputesError::FaultVerdictWrong);
        }
        if !ed25519_verify(&fault.key, &fault.target, &fault.signature) {
            return Err(DisputesError::BadSignature);
        }
        report_offender(state, fault.key)?;
    }

    debug_assert!(state.disputes.is_disjoint());
    let _ = config;
    Ok(())
}

fn report_offender(state: &mut JamState, key: Ed25519Key) -> Result<(), DisputesError> {
    if state.disputes.offenders.contains(&key) {
        return Err(DisputesError::OffenderAlreadyReported);
    }
    state.disputes.offenders.insert(key);
    Ok(())
}

fn clear_pending_report_for(state: &mut JamState, bad_report_hash: &Hash) {
    for slot in state.pending_reports.iter_mut() {
        let clear = matches!(slot, Some(assignment) if assignment.report.package_hash == *bad_report_hash);
        if clear {
            *slot = None;
        }
    }
}

fn is_sorted_unique_by<T, K: Ord, F: Fn(&T) -> K>(items: &[T], key: F) -> bool {
    items.windows(2).all(|pair| key(&pair[0]) < key(&pair[1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Verdict;

    #[test]
    fn duplicate_verdict_targets_are_rejected() {
        let mut state = JamState::default();
        let config = ProtocolConfig::tiny();
        let extrinsic = DisputesExtrinsic {
            verdicts: vec![
                Verdict {
                    target: [0u8; 32],
                    age: 0,
                    judgements: vec![],
                },
                Verdict {
                    target: [0u8; 32],
                    age: 0,
                    judgements: vec![],
                },
            ],
            culprits: vec![],
            faults: vec![],
        };
        let err = apply(&mut state, &extrinsic, &config, 1).unwrap_err();
        assert_eq!(err, DisputesError::VerdictsNotSortedUnique);
    }

    #[test]
    fn empty_extrinsic_is_a_no_op() {
        let mut state = JamState::default();
        let config = ProtocolConfig::tiny();
        let before = state.clone();
        apply(&mut state, &DisputesExtrinsic::default(), &config, 1).unwrap();
        assert_eq!(state, before);
    }

    #[test]
    fn classify_split_recognises_super_majority_good() {
        assert_eq!(classify_split(5, 6), Some(VoteSplit::Good));
        assert_eq!(classify_split(1, 6), Some(VoteSplit::Bad));
        assert_eq!(classify_split(3, 3), Some(VoteSplit::Good));
        assert_eq!(classify_split(2, 3), Some(VoteSplit::Wonky));
    }
}
