//! Block wire format: header, the five extrinsic streams, and the work report/guarantee types
//! they carry.

use jam_stf_codec_derive::Codec;

use crate::types::{BandersnatchKey, BandersnatchVrfSignature, Ed25519Key, Gas, Hash, ServiceId, TimeSlot};

/// Published at an epoch boundary: the incoming epoch's entropy and
/// Bandersnatch key set, allowing light clients to track validator set
/// changes without replaying accumulation.
#[derive(Debug, Clone, PartialEq, Eq, Codec)]
pub struct EpochMark {
    pub entropy: Hash,
    pub tickets_entropy: Hash,
    pub validators: Vec<BandersnatchKey>,
}

/// One entry of a sealing-key sequence: a ticket identifier (the VRF output
/// that ranked it) and the attempt number that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Codec)]
pub struct TicketBody {
    pub id: Hash,
    pub attempt: u8,
}

/// A ticket published in the `Tickets` extrinsic, prior to ring-signature verification.
#[derive(Debug, Clone, PartialEq, Eq, Codec)]
pub struct TicketEnvelope {
    pub attempt: u8,
    pub signature: BandersnatchVrfSignature,
}

#[derive(Debug, Clone, PartialEq, Eq, Codec)]
pub struct Header {
    pub parent: Hash,
    pub parent_state_root: Hash,
    pub extrinsic_hash: Hash,
    pub slot: TimeSlot,
    pub epoch_mark: Option<EpochMark>,
    pub tickets_mark: Option<Vec<TicketBody>>,
    pub offenders_mark: Vec<Ed25519Key>,
    pub author_index: u16,
    pub entropy_source: BandersnatchVrfSignature,
    pub seal: BandersnatchVrfSignature,
}

/// A single validator's vote on a disputed work-report target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Codec)]
pub struct Judgement {
    pub vote: bool,
    pub validator_index: u16,
    pub signature: [u8; 64],
}

#[derive(Debug, Clone, PartialEq, Eq, Codec)]
pub struct Verdict {
    pub target: Hash,
    pub age: u32,
    pub judgements: Vec<Judgement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Codec)]
pub struct Culprit {
    pub target: Hash,
    pub key: Ed25519Key,
    pub signature: [u8; 64],
}

#[derive(Debug, Clone, PartialEq, Eq, Codec)]
pub struct Fault {
    pub target: Hash,
    pub vote: bool,
    pub key: Ed25519Key,
    pub signature: [u8; 64],
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Codec)]
pub struct DisputesExtrinsic {
    pub verdicts: Vec<Verdict>,
    pub culprits: Vec<Culprit>,
    pub faults: Vec<Fault>,
}

#[derive(Debug, Clone, PartialEq, Eq, Codec)]
pub struct PreimageExtrinsicEntry {
    pub requester: ServiceId,
    pub blob: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Codec)]
pub struct Assurance {
    pub anchor: Hash,
    pub bitfield: Vec<u8>,
    pub validator_index: u16,
    pub signature: [u8; 64],
}

/// The outcome of a work package's refinement: what a guarantor claims is
/// available on a core, and what accumulation will later consume.
#[derive(Debug, Clone, PartialEq, Eq, Codec)]
pub struct WorkReport {
    pub package_hash: Hash,
    pub core_index: u16,
    pub service_id: ServiceId,
    pub authorizer_hash: Hash,
    pub anchor: Hash,
    pub prerequisites: Vec<Hash>,
    pub refine_output: Vec<u8>,
    pub gas_limit: Gas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Codec)]
pub struct GuarantorSignature {
    pub validator_index: u16,
    pub signature: [u8; 64],
}

#[derive(Debug, Clone, PartialEq, Eq, Codec)]
pub struct ReportGuarantee {
    pub report: WorkReport,
    pub slot: TimeSlot,
    pub signatures: Vec<GuarantorSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Codec)]
pub struct Extrinsic {
    pub tickets: Vec<TicketEnvelope>,
    pub disputes: DisputesExtrinsic,
    pub preimages: Vec<PreimageExtrinsicEntry>,
    pub assurances: Vec<Assurance>,
    pub guarantees: Vec<ReportGuarantee>,
}

#[derive(Debug, Clone, PartialEq, Eq, Codec)]
pub struct Block {
    pub header: Header,
    pub extrinsic: Extrinsic,
}
