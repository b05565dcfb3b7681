//! Safrole stage: epoch rotation, seal verification, ticket publication.

use crate::block::{EpochMark, Header, TicketBody};
use crate::config::ProtocolConfig;
use crate::crypto::{blake2b_256, BandersnatchVerifier};
use crate::error::SafroleError;
use crate::state::components::JamState;
use crate::types::TimeSlot;

/// Picks the sealing key for `slot_in_epoch` out of `η1` when no ticket is known for this slot,
/// an entropy-ranked fallback.
fn entropy_rank(entropy_snapshot: &[u8; 32], slot_in_epoch: u32, validator_count: usize) -> usize {
    if validator_count == 0 {
        return 0;
    }
    let mut buf = Vec::with_capacity(36);
    buf.extend_from_slice(entropy_snapshot);
    buf.extend_from_slice(&slot_in_epoch.to_le_bytes());
    let ranked = blake2b_256(&buf);
    let idx = u32::from_le_bytes([ranked[0], ranked[1], ranked[2], ranked[3]]);
    (idx as usize) % validator_count
}

fn is_epoch_boundary(old_slot: TimeSlot, new_slot: TimeSlot, config: &ProtocolConfig) -> bool {
    config.epoch_of(old_slot) != config.epoch_of(new_slot)
}

/// Advances γ/κ/λ/ι/η across an epoch boundary, verifies the block seal, and folds newly
/// published tickets into `γ.a`.
pub fn apply(
    state: &mut JamState,
    header: &Header,
    tickets: &[crate::block::TicketEnvelope],
    config: &ProtocolConfig,
    vrf: &dyn BandersnatchVerifier,
) -> Result<(), SafroleError> {
    let old_slot = state.last_slot;
    let new_slot = header.slot;

    if is_epoch_boundary(old_slot, new_slot, config) {
        state.archived_validators = std::mem::take(&mut state.active_validators);
        state.active_validators = std::mem::take(&mut state.incoming_validators);
        state.incoming_validators = std::mem::take(&mut state.safrole.next_validators);

        state.entropy[3] = state.entropy[2];
        state.entropy[2] = state.entropy[1];
        state.entropy[1] = state.entropy[0];

        let expected_tickets_mark = expected_tickets_mark(state, config);
        state.safrole.sealing_keys = next_sealing_sequence(state, config);
        state.safrole.ticket_accumulator.clear();

        validate_epoch_mark(state, header)?;
        validate_tickets_mark(header, expected_tickets_mark.as_deref())?;
    } else if header.epoch_mark.is_some() {
        return Err(SafroleError::BadEpochMark);
    } else if header.tickets_mark.is_some() {
        return Err(SafroleError::BadTicketsMark);
    }

    verify_seal(state, header, config, vrf)?;

    // η0 absorbs the block's entropy-source VRF output every block: it is rotated atomically at
    // an epoch boundary and re-seeded from the VRF output otherwise.
    let outcome = vrf.vrf_verify(&active_key_for(state, header.author_index), &[], &header.entropy_source);
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&state.entropy[0]);
    buf.extend_from_slice(&outcome.output);
    state.entropy[0] = blake2b_256(&buf);

    apply_tickets(state, tickets, vrf)?;

    Ok(())
}

fn active_key_for(state: &JamState, author_index: u16) -> crate::types::BandersnatchKey {
    state
        .active_validators
        .get(author_index as usize)
        .map(|v| v.bandersnatch)
        .unwrap_or([0u8; 32])
}

fn verify_seal(
    state: &JamState,
    header: &Header,
    config: &ProtocolConfig,
    vrf: &dyn BandersnatchVerifier,
) -> Result<(), SafroleError> {
    let slot_in_epoch = config.slot_in_epoch(header.slot);
    let msg = header.slot.to_le_bytes();

    let expected_key = if let Some(ticket) = state.safrole.sealing_keys.get(slot_in_epoch as usize) {
        *ticket
    } else {
        let idx = entropy_rank(&state.entropy[1], slot_in_epoch, state.active_validators.len());
        state
            .active_validators
            .get(idx)
            .map(|v| v.bandersnatch)
            .unwrap_or([0u8; 32])
    };

    let outcome = vrf.vrf_verify(&expected_key, &msg, &header.seal);
    if !outcome.valid {
        return Err(SafroleError::BadSeal);
    }
    Ok(())
}

fn next_sealing_sequence(state: &JamState, config: &ProtocolConfig) -> Vec<crate::types::BandersnatchKey> {
    // Derived from the accumulated tickets, ranked by their VRF-output
    // ticket id, padded/truncated to the epoch length.
    let mut tickets = state.safrole.ticket_accumulator.clone();
    tickets.sort_by_key(|t| t.id);
    let validators = &state.incoming_validators;
    (0..config.epoch_length as usize)
        .map(|i| {
            tickets
                .get(i % tickets.len().max(1))
                .and_then(|_| validators.get(i % validators.len().max(1)))
                .map(|v| v.bandersnatch)
                .unwrap_or([0u8; 32])
        })
        .collect()
}

/// The epoch mark a boundary block must carry: the incoming epoch's entropy, the entropy used
/// to rank its tickets, and the Bandersnatch keys of the validator set two epochs out (the set
/// `apply` just rotated into `incoming_validators`).
fn validate_epoch_mark(state: &JamState, header: &Header) -> Result<(), SafroleError> {
    let expected = EpochMark {
        entropy: state.entropy[1],
        tickets_entropy: state.entropy[2],
        validators: state.incoming_validators.iter().map(|v| v.bandersnatch).collect(),
    };
    match &header.epoch_mark {
        Some(mark) if *mark == expected => Ok(()),
        _ => Err(SafroleError::BadEpochMark),
    }
}

/// The sealing-key sequence is only publishable as a tickets mark once the accumulator holds a
/// full epoch's worth of tickets; short of that the epoch falls back to entropy-ranked sealing
/// keys and no tickets mark is published.
fn expected_tickets_mark(state: &JamState, config: &ProtocolConfig) -> Option<Vec<TicketBody>> {
    if state.safrole.ticket_accumulator.len() < config.epoch_length as usize {
        return None;
    }
    let mut tickets = state.safrole.ticket_accumulator.clone();
    tickets.sort();
    tickets.truncate(config.epoch_length as usize);
    Some(tickets)
}

fn validate_tickets_mark(header: &Header, expected: Option<&[TicketBody]>) -> Result<(), SafroleError> {
    match (&header.tickets_mark, expected) {
        (None, None) => Ok(()),
        (Some(actual), Some(expected)) if actual.as_slice() == expected => Ok(()),
        _ => Err(SafroleError::BadTicketsMark),
    }
}

fn apply_tickets(
    state: &mut JamState,
    tickets: &[crate::block::TicketEnvelope],
    vrf: &dyn BandersnatchVerifier,
) -> Result<(), SafroleError> {
    let mut seen: Vec<TicketBody> = Vec::new();
    for envelope in tickets {
        let msg = [envelope.attempt];
        let valid = vrf.ring_verify(&state.safrole.ring_commitment, &msg, &envelope.signature);
        if !valid {
            return Err(SafroleError::BadTicketSignature);
        }
        let outcome = vrf.vrf_verify(&[0u8; 32], &msg, &envelope.signature);
        let body = TicketBody {
            id: outcome.output,
            attempt: envelope.attempt,
        };
        if seen.contains(&body) || state.safrole.ticket_accumulator.contains(&body) {
            return Err(SafroleError::DuplicateTicket);
        }
        seen.push(body);
    }
    state.safrole.ticket_accumulator.extend(seen);
    state.safrole.ticket_accumulator.sort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::MockBandersnatch;

    #[test]
    fn non_epoch_boundary_block_does_not_rotate_validators() {
        let mut state = JamState::default();
        state.last_slot = 0;
        let active_before = state.active_validators.clone();

        let header = Header {
            parent: [0; 32],
            parent_state_root: [0; 32],
            extrinsic_hash: [0; 32],
            slot: 1,
            epoch_mark: None,
            tickets_mark: None,
            offenders_mark: vec![],
            author_index: 0,
            entropy_source: crate::types::BandersnatchVrfSignature([1u8; 96]),
            seal: crate::types::BandersnatchVrfSignature([1u8; 96]),
        };
        let config = ProtocolConfig::tiny();
        let vrf = MockBandersnatch;
        apply(&mut state, &header, &[], &config, &vrf).unwrap();
        assert_eq!(state.active_validators, active_before);
    }

    #[test]
    fn zero_first_byte_seal_is_rejected() {
        let mut state = JamState::default();
        let header = Header {
            parent: [0; 32],
            parent_state_root: [0; 32],
            extrinsic_hash: [0; 32],
            slot: 1,
            epoch_mark: None,
            tickets_mark: None,
            offenders_mark: vec![],
            author_index: 0,
            entropy_source: crate::types::BandersnatchVrfSignature([1u8; 96]),
            seal: crate::types::BandersnatchVrfSignature([0u8; 96]),
        };
        let config = ProtocolConfig::tiny();
        let vrf = MockBandersnatch;
        let err = apply(&mut state, &header, &[], &config, &vrf).unwrap_err();
        assert_eq!(err, SafroleError::BadSeal);
    }

    #[test]
    fn epoch_boundary_block_without_epoch_mark_is_rejected() {
        let mut state = JamState::default();
        state.last_slot = 0;
        let header = Header {
            parent: [0; 32],
            parent_state_root: [0; 32],
            extrinsic_hash: [0; 32],
            slot: 12,
            epoch_mark: None,
            tickets_mark: None,
            offenders_mark: vec![],
            author_index: 0,
            entropy_source: crate::types::BandersnatchVrfSignature([1u8; 96]),
            seal: crate::types::BandersnatchVrfSignature([1u8; 96]),
        };
        let config = ProtocolConfig::tiny();
        let vrf = MockBandersnatch;
        let err = apply(&mut state, &header, &[], &config, &vrf).unwrap_err();
        assert_eq!(err, SafroleError::BadEpochMark);
    }

    #[test]
    fn epoch_boundary_block_with_correct_epoch_mark_is_accepted() {
        let mut state = JamState::default();
        state.last_slot = 0;
        let header = Header {
            parent: [0; 32],
            parent_state_root: [0; 32],
            extrinsic_hash: [0; 32],
            slot: 12,
            epoch_mark: Some(EpochMark {
                entropy: [0u8; 32],
                tickets_entropy: [0u8; 32],
                validators: vec![],
            }),
            tickets_mark: None,
            offenders_mark: vec![],
            author_index: 0,
            entropy_source: crate::types::BandersnatchVrfSignature([1u8; 96]),
            seal: crate::types::BandersnatchVrfSignature([1u8; 96]),
        };
        let config = ProtocolConfig::tiny();
        let vrf = MockBandersnatch;
        apply(&mut state, &header, &[], &config, &vrf).unwrap();
    }

    #[test]
    fn non_epoch_boundary_block_with_epoch_mark_is_rejected() {
        let mut state = JamState::default();
        state.last_slot = 0;
        let header = Header {
            parent: [0; 32],
            parent_state_root: [0; 32],
            extrinsic_hash: [0; 32],
            slot: 1,
            epoch_mark: Some(EpochMark {
                entropy: [0u8; 32],
                tickets_entropy: [0u8; 32],
                validators: vec![],
            }),
            tickets_mark: None,
            offenders_mark: vec![],
            author_index: 0,
            entropy_source: crate::types::BandersnatchVrfSignature([1u8; 96]),
            seal: crate::types::BandersnatchVrfSignature([1u8; 96]),
        };
        let config = ProtocolConfig::tiny();
        let vrf = MockBandersnatch;
        let err = apply(&mut state, &header, &[], &config, &vrf).unwrap_err();
        assert_eq!(err, SafroleError::BadEpochMark);
    }
}
