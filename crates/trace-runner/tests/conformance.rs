use jam_stf_core::accumulate::NoopPvm;
use jam_stf_core::block::{Block, Extrinsic, Header, PreimageExtrinsicEntry};
use jam_stf_core::codec::Codec;
use jam_stf_core::config::ProtocolConfig;
use jam_stf_core::crypto::{blake2b_256, MockBandersnatch};
use jam_stf_core::dictionary;
use jam_stf_core::importer;
use jam_stf_core::merkle;
use jam_stf_core::state::components::JamState;
use jam_stf_core::state::service::{PreimageLookupKey, PreimageStatus, ServiceAccount};
use jam_stf_core::types::{BandersnatchVrfSignature, ZERO_HASH};

use jam_stf_trace_runner::trace::build;
use jam_stf_trace_runner::{run, TraceError};

fn signed_header(parent: ZeroHash, parent_state_root: ZeroHash, extrinsic: &Extrinsic, slot: u32) -> Header {
    Header {
        parent,
        parent_state_root,
        extrinsic_hash: blake2b_256(&extrinsic.encode_to_vec()),
        slot,
        epoch_mark: None,
        tickets_mark: None,
        offenders_mark: Vec::new(),
        author_index: 0,
        entropy_source: BandersnatchVrfSignature([0u8; 96]),
        seal: BandersnatchVrfSignature([0u8; 96]),
    }
}

type ZeroHash = [u8; 32];

#[test]
fn a_trace_covering_a_preimage_submission_replays_cleanly() {
    let mut pre_state = JamState::default();
    let mut account = ServiceAccount::new(ZERO_HASH, 1_000, 0, 0);
    let hash = blake2b_256(b"conformance");
    account
        .preimage_lookup
        .insert(PreimageLookupKey { hash, length: 11 }, PreimageStatus::Requested);
    pre_state.services.insert(7, account);

    let pre_dict = dictionary::project(&pre_state);
    let pre_root = merkle::root(&pre_dict);

    let extrinsic = Extrinsic {
        preimages: vec![PreimageExtrinsicEntry {
            requester: 7,
            blob: b"conformance".to_vec(),
        }],
        ..Default::default()
    };
    let header = signed_header(ZERO_HASH, pre_root, &extrinsic, 3);
    let block = Block { header, extrinsic };

    let config = ProtocolConfig::tiny();
    let vrf = MockBandersnatch;
    let pvm = NoopPvm;

    let result = importer::import_block(&pre_state, &ZERO_HASH, &block, &config, &vrf, &pvm).expect("import succeeds");
    assert_eq!(
        result.post_state.services[&7].preimage_lookup[&PreimageLookupKey { hash, length: 11 }],
        PreimageStatus::Available(3)
    );

    let trace = build(&pre_state, ZERO_HASH, &block, &result.post_state);
    run(&trace, &config, &vrf, &pvm).expect("a self-consistent trace replays cleanly");
}

#[test]
fn a_trace_whose_pre_root_does_not_match_its_dictionary_is_rejected() {
    let pre_state = JamState::default();
    let pre_dict = dictionary::project(&pre_state);
    let pre_root = merkle::root(&pre_dict);
    let extrinsic = Extrinsic::default();
    let header = signed_header(ZERO_HASH, pre_root, &extrinsic, 1);
    let block = Block { header, extrinsic };

    let config = ProtocolConfig::tiny();
    let vrf = MockBandersnatch;
    let pvm = NoopPvm;

    let result = importer::import_block(&pre_state, &ZERO_HASH, &block, &config, &vrf, &pvm).unwrap();
    let mut trace = build(&pre_state, ZERO_HASH, &block, &result.post_state);
    trace.pre_root = hex::encode([0x11u8; 32]);

    assert!(matches!(run(&trace, &config, &vrf, &pvm), Err(TraceError::PreRootMismatch { .. })));
}
