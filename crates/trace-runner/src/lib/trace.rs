//! Conformance trace replay: a trace pins a pre-state, a block, and the expected
//! post-state/root, all encoded through the core's own wire codec so a trace is exactly what
//! `jam-stf-core` would itself produce or consume.

use jam_stf_core::accumulate::PvmEngine;
use jam_stf_core::block::Block;
use jam_stf_core::codec::Codec;
use jam_stf_core::config::ProtocolConfig;
use jam_stf_core::crypto::BandersnatchVerifier;
use jam_stf_core::dictionary::{self, Dictionary};
use jam_stf_core::importer;
use jam_stf_core::merkle;
use jam_stf_core::state::components::JamState;
use jam_stf_core::types::Hash;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One conformance trace: a hex-encoded pre-state dictionary, a hex-encoded block, and the
/// hex-encoded post-state dictionary/root the importer is expected to produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub pre_state: Vec<DictEntry>,
    pub pre_root: String,
    pub tip_hash: String,
    pub block: String,
    pub post_state: Vec<DictEntry>,
    pub post_root: String,
}

/// A single `(key, value)` pair of a hex-encoded state dictionary, with the sidecar metadata a
/// service-data key needs to be told apart from a component/service-base key on reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictEntry {
    pub key: String,
    pub value: String,
    pub sidecar: Option<SidecarEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarEntry {
    pub service_id: u32,
    pub full_hash: String,
    pub kind: SidecarKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SidecarKind {
    Storage,
    Preimage,
    PreimageLookup { length: u32 },
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("invalid hex in trace: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("trace key/value is not 32 bytes: {0}")]
    BadKeyLength(usize),
    #[error("core error: {0}")]
    Core(#[from] jam_stf_core::error::CoreError),
    #[error("pre-state root mismatch: trace claims {expected} but the dictionary hashes to {actual}")]
    PreRootMismatch { expected: String, actual: String },
    #[error("post-state root mismatch: expected {expected}, importer produced {actual}")]
    PostRootMismatch { expected: String, actual: String },
    #[error("post-state dictionary mismatch: {0} entries differ from the trace's expectation")]
    PostStateMismatch(usize),
}

fn parse_hash(hex_str: &str) -> Result<Hash, TraceError> {
    let bytes = hex::decode(hex_str)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| TraceError::BadKeyLength(len))
}

fn dict_from_entries(entries: &[DictEntry]) -> Result<Dictionary, TraceError> {
    let mut dict = Dictionary::new();
    for entry in entries {
        let key = parse_hash(&entry.key)?;
        let value = hex::decode(&entry.value)?;
        dict.entries.insert(key, value);
        if let Some(sidecar) = &entry.sidecar {
            let full_hash = parse_hash(&sidecar.full_hash)?;
            let kind = match sidecar.kind {
                SidecarKind::Storage => dictionary::ServiceDataKind::Storage,
                SidecarKind::Preimage => dictionary::ServiceDataKind::Preimage,
                SidecarKind::PreimageLookup { length } => dictionary::ServiceDataKind::PreimageLookup(length),
            };
            dict.sidecar.insert(
                key,
                dictionary::ServiceDataSidecar {
                    service_id: sidecar.service_id,
                    full_hash,
                    kind,
                },
            );
        }
    }
    Ok(dict)
}

fn entries_from_dict(dict: &Dictionary) -> Vec<DictEntry> {
    dict.entries
        .iter()
        .map(|(key, value)| {
            let sidecar = dict.sidecar.get(key).map(|s| SidecarEntry {
                service_id: s.service_id,
                full_hash: hex::encode(s.full_hash),
                kind: match s.kind {
                    dictionary::ServiceDataKind::Storage => SidecarKind::Storage,
                    dictionary::ServiceDataKind::Preimage => SidecarKind::Preimage,
                    dictionary::ServiceDataKind::PreimageLookup(length) => SidecarKind::PreimageLookup { length },
                },
            });
            DictEntry {
                key: hex::encode(key),
                value: hex::encode(value),
                sidecar,
            }
        })
        .collect()
}

/// Builds a trace from a concrete pre-state/block/post-state triple, the
/// inverse of [`run`]. Used by `write_trace`-style tooling and by this
/// crate's own tests to produce fixtures without depending on an external
/// vector format.
pub fn build(pre_state: &JamState, tip_hash: Hash, block: &Block, post_state: &JamState) -> Trace {
    let pre_dict = dictionary::project(pre_state);
    let post_dict = dictionary::project(post_state);
    Trace {
        pre_state: entries_from_dict(&pre_dict),
        pre_root: hex::encode(merkle::root(&pre_dict)),
        tip_hash: hex::encode(tip_hash),
        block: hex::encode(block.encode_to_vec()),
        post_state: entries_from_dict(&post_dict),
        post_root: hex::encode(merkle::root(&post_dict)),
    }
}

/// Replays one trace: reconstructs the pre-state, asserts its root, runs the importer, and
/// asserts the resulting state/root match the trace's expectation.
pub fn run(trace: &Trace, config: &ProtocolConfig, vrf: &dyn BandersnatchVerifier, pvm: &dyn PvmEngine) -> Result<(), TraceError> {
    let pre_dict = dict_from_entries(&trace.pre_state)?;
    let pre_root = parse_hash(&trace.pre_root)?;
    let pre_state = importer::load_pre_state(&pre_dict, &pre_root).map_err(|e| match e {
        jam_stf_core::error::CoreError::Block(_) => TraceError::PreRootMismatch {
            expected: trace.pre_root.clone(),
            actual: hex::encode(merkle::root(&pre_dict)),
        },
        other => TraceError::Core(other),
    })?;

    let tip_hash = parse_hash(&trace.tip_hash)?;
    let block_bytes = hex::decode(&trace.block)?;
    let block = Block::decode_from_slice(&block_bytes).map_err(jam_stf_core::error::CoreError::from)?;

    let result = importer::import_block(&pre_state, &tip_hash, &block, config, vrf, pvm)?;

    let expected_post_root = parse_hash(&trace.post_root)?;
    if result.post_state_root != expected_post_root {
        return Err(TraceError::PostRootMismatch {
            expected: trace.post_root.clone(),
            actual: hex::encode(result.post_state_root),
        });
    }

    let expected_post_dict = dict_from_entries(&trace.post_state)?;
    let actual_post_dict = dictionary::project(&result.post_state);
    if actual_post_dict.entries != expected_post_dict.entries {
        let differing = actual_post_dict
            .entries
            .iter()
            .filter(|(k, v)| expected_post_dict.entries.get(*k) != Some(*v))
            .count();
        return Err(TraceError::PostStateMismatch(differing));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jam_stf_core::accumulate::NoopPvm;
    use jam_stf_core::block::{Block, Extrinsic, Header};
    use jam_stf_core::crypto::MockBandersnatch;
    use jam_stf_core::state::components::JamState;
    use jam_stf_core::types::{BandersnatchVrfSignature, ZERO_HASH};

    fn empty_block(parent: Hash, parent_state_root: Hash) -> Block {
        let extrinsic = Extrinsic::default();
        let header = Header {
            parent,
            parent_state_root,
            extrinsic_hash: jam_stf_core::crypto::blake2b_256(&extrinsic.encode_to_vec()),
            slot: 1,
            epoch_mark: None,
            tickets_mark: None,
            offenders_mark: Vec::new(),
            author_index: 0,
            entropy_source: BandersnatchVrfSignature([0u8; 96]),
            seal: BandersnatchVrfSignature([0u8; 96]),
        };
        Block { header, extrinsic }
    }

    #[test]
    fn a_trace_built_from_a_trivial_block_round_trips_through_run() {
        let pre_state = JamState::default();
        let pre_dict = dictionary::project(&pre_state);
        let pre_root = merkle::root(&pre_dict);
        let block = empty_block(ZERO_HASH, pre_root);

        let config = ProtocolConfig::tiny();
        let vrf = MockBandersnatch;
        let pvm = NoopPvm;

        let result = importer::import_block(&pre_state, &ZERO_HASH, &block, &config, &vrf, &pvm).unwrap();
        let trace = build(&pre_state, ZERO_HASH, &block, &result.post_state);

        run(&trace, &config, &vrf, &pvm).expect("a self-consistent trace must replay cleanly");
    }

    #[test]
    fn a_tampered_post_root_is_rejected() {
        let pre_state = JamState::default();
        let pre_dict = dictionary::project(&pre_state);
        let pre_root = merkle::root(&pre_dict);
        let block = empty_block(ZERO_HASH, pre_root);

        let config = ProtocolConfig::tiny();
        let vrf = MockBandersnatch;
        let pvm = NoopPvm;

        let result = importer::import_block(&pre_state, &ZERO_HASH, &block, &config, &vrf, &pvm).unwrap();
        let mut trace = build(&pre_state, ZERO_HASH, &block, &result.post_state);
        trace.post_root = hex::encode([0xFFu8; 32]);

        assert!(matches!(run(&trace, &config, &vrf, &pvm), Err(TraceError::PostRootMismatch { .. })));
    }
}
