//! Preimages stage: resolves requested preimages against their lookup entries.

use crate::block::PreimageExtrinsicEntry;
use crate::crypto::blake2b_256;
use crate::error::CoreError;
use crate::state::components::JamState;
use crate::state::service::{PreimageLookupKey, PreimageStatus};
use crate::types::TimeSlot;

/// For each `{requester, blob}` entry: confirms the requester has a `Requested` lookup entry
/// for `(H(blob), len(blob))`, inserts the blob into `preimages`, and transitions the lookup
/// entry to `Available(slot)`.
pub fn apply(
    state: &mut JamState,
    preimages: &[PreimageExtrinsicEntry],
    current_slot: TimeSlot,
) -> Result<(), CoreError> {
    for entry in preimages {
        let hash = blake2b_256(&entry.blob);
        let length = entry.blob.len() as u32;
        let key = PreimageLookupKey { hash, length };

        let account = state
            .services
            .get_mut(&entry.requester)
            .ok_or_else(|| CoreError::Preimage(format!("unknown requester {}", entry.requester)))?;

        match account.preimage_lookup.get(&key) {
            Some(PreimageStatus::Requested) => {}
            _ => {
                return Err(CoreError::Preimage(format!(
                    "no pending preimage-lookup request for requester {} hash {:02x?}",
                    entry.requester, hash
                )))
            }
        }

        account.preimages.insert(hash, entry.blob.clone());
        account
            .preimage_lookup
            .insert(key, PreimageStatus::Available(current_slot));

        let stats = state.statistics.services.entry(entry.requester).or_default();
        stats.preimages_served += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::service::ServiceAccount;
    use crate::types::ZERO_HASH;

    #[test]
    fn inserts_preimage_when_requested() {
        let mut state = JamState::default();
        let mut account = ServiceAccount::new(ZERO_HASH, 0, 0, 0);
        let hash = blake2b_256(b"hello");
        account
            .preimage_lookup
            .insert(PreimageLookupKey { hash, length: 5 }, PreimageStatus::Requested);
        state.services.insert(42, account);

        let entries = vec![PreimageExtrinsicEntry {
            requester: 42,
            blob: b"hello".to_vec(),
        }];
        apply(&mut state, &entries, 10).unwrap();

        let account = &state.services[&42];
        assert_eq!(account.preimages.get(&hash), Some(&b"hello".to_vec()));
        assert_eq!(
            account.preimage_lookup.get(&PreimageLookupKey { hash, length: 5 }),
            Some(&PreimageStatus::Available(10))
        );
        assert_eq!(state.statistics.services[&42].preimages_served, 1);
    }

    #[test]
    fn rejects_preimage_without_pending_request() {
        let mut state = JamState::default();
        state.services.insert(42, ServiceAccount::new(ZERO_HASH, 0, 0, 0));
        let entries = vec![PreimageExtrinsicEntry {
            requester: 42,
            blob: b"hello".to_vec(),
        }];
        assert!(apply(&mut state, &entries, 10).is_err());
    }
}
