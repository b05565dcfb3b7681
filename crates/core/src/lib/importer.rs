//! Block importer: orchestrates the seven stages against a state-transition overlay and
//! produces the post-state root.

use crate::accumulate::PvmEngine;
use crate::block::Block;
use crate::config::ProtocolConfig;
use crate::crypto::{blake2b_256, keccak_256, BandersnatchVerifier};
use crate::dictionary::{project, reconstruct};
use crate::error::{BlockError, CoreError};
use crate::merkle;
use crate::state::components::{JamState, RecentBlockEntry};
use crate::state::delta::StateOverlay;
use crate::stages::{accumulation, assurances, disputes, preimages, reports, safrole, statistics};
use crate::types::Hash;

pub struct ImportResult {
    pub post_state: JamState,
    pub post_state_root: Hash,
}

fn header_hash(block: &Block) -> Hash {
    use crate::codec::Codec;
    blake2b_256(&block.header.encode_to_vec())
}

fn extrinsic_hash(block: &Block) -> Hash {
    use crate::codec::Codec;
    blake2b_256(&block.extrinsic.encode_to_vec())
}

fn append_mmr(peaks: &mut Vec<Option<Hash>>, leaf: Hash) {
    let mut carry = leaf;
    for peak in peaks.iter_mut() {
        match peak.take() {
            None => {
                *peak = Some(carry);
                return;
            }
            Some(existing) => {
                let mut buf = Vec::with_capacity(64);
                buf.extend_from_slice(&existing);
                buf.extend_from_slice(&carry);
                carry = keccak_256(&buf);
            }
        }
    }
    peaks.push(Some(carry));
}

/// Imports one block against `base_state`: verifies the header's parent linkage and pre-state
/// root, runs stages 1-7 against an overlay, appends to β and its MMR, and returns the
/// committed post-state and its root.
pub fn import_block(
    base_state: &JamState,
    tip_hash: &Hash,
    block: &Block,
    config: &ProtocolConfig,
    vrf: &dyn BandersnatchVerifier,
    pvm: &dyn PvmEngine,
) -> Result<ImportResult, CoreError> {
    if block.header.parent != *tip_hash {
        return Err(BlockError::ParentMismatch.into());
    }

    let pre_dict = project(base_state);
    let pre_root = merkle::root(&pre_dict);
    if block.header.parent_state_root != pre_root {
        return Err(BlockError::PreStateRootMismatch.into());
    }

    if block.header.extrinsic_hash != extrinsic_hash(block) {
        return Err(BlockError::ExtrinsicHashMismatch.into());
    }

    let mut overlay = StateOverlay::new(base_state);
    let current_slot = block.header.slot;

    let run = || -> Result<Hash, CoreError> {
        let state = overlay.current_mut();

        disputes::apply(state, &block.extrinsic.disputes, config, current_slot)?;

        safrole::apply(state, &block.header, &block.extrinsic.tickets, config, vrf)?;

        assurances::apply(
            state,
            &block.extrinsic.assurances,
            &block.header.parent,
            current_slot,
            config,
        )?;

        reports::apply(state, &block.extrinsic.guarantees, current_slot, config)?;

        preimages::apply(state, &block.extrinsic.preimages, current_slot)?;

        let accumulate_root = accumulation::apply(state, current_slot, config, pvm)?;

        statistics::apply(
            state,
            block.header.author_index,
            block.extrinsic.tickets.len() as u64,
            &block.extrinsic.guarantees,
        );

        state.last_slot = current_slot;

        Ok(accumulate_root)
    };

    let accumulate_root = match run() {
        Ok(root) => root,
        Err(err) => {
            overlay.rollback();
            return Err(err);
        }
    };

    let header_hash = header_hash(block);
    let reported: Vec<Hash> = block.extrinsic.guarantees.iter().map(|g| g.report.package_hash).collect();

    let mut post_state = overlay.commit();

    post_state.recent_blocks.entries.push(RecentBlockEntry {
        header_hash,
        parent_state_root: block.header.parent_state_root,
        accumulate_root,
        reported_packages: reported,
    });
    if post_state.recent_blocks.entries.len() > config.max_recent_blocks {
        post_state.recent_blocks.entries.remove(0);
    }
    append_mmr(&mut post_state.recent_blocks.mmr_peaks, accumulate_root);

    let post_dict = project(&post_state);
    let post_state_root = merkle::root(&post_dict);

    Ok(ImportResult {
        post_state,
        post_state_root,
    })
}

/// Reconstructs a pre-state from its dictionary, asserts its root matches `expected_root`, and
/// returns it.
pub fn load_pre_state(dict: &crate::dictionary::Dictionary, expected_root: &Hash) -> Result<JamState, CoreError> {
    let root = merkle::root(dict);
    if root != *expected_root {
        return Err(BlockError::PreStateRootMismatch.into());
    }
    Ok(reconstruct(dict)?)
}
