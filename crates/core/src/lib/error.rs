//! Typed error taxonomy. Every stage returns its own narrow error enum; [`CoreError`] is the
//! aggregate returned by the block importer and the dictionary/merkle layer, the boundary the
//! host actually sees.

use thiserror::Error;

use crate::codec::CodecError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DictionaryError {
    #[error("dictionary keys are not sorted")]
    KeysNotSorted,
    #[error("duplicate dictionary key")]
    DuplicateKey,
    #[error("unknown state component id {0}")]
    UnknownStateComponent(u8),
    #[error("invalid state key")]
    InvalidKey,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("block header's parent does not match the chain tip")]
    ParentMismatch,
    #[error("block header's parent_state_root does not match root(dictionary(base_state))")]
    PreStateRootMismatch,
    #[error("computed post-state root does not match the expected post-state root")]
    PostStateRootMismatch,
    #[error("block header's extrinsic_hash does not match the extrinsic's hash")]
    ExtrinsicHashMismatch,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DisputesError {
    #[error("verdict target already judged")]
    AlreadyJudged,
    #[error("judgement vote count matches neither super-majority nor a legal wonky split")]
    BadVoteSplit,
    #[error("verdicts are not sorted and unique by target")]
    VerdictsNotSortedUnique,
    #[error("judgements within a verdict are not sorted and unique by validator index")]
    JudgementsNotSortedUnique,
    #[error("culprits are not sorted and unique")]
    CulpritsNotSortedUnique,
    #[error("faults are not sorted and unique")]
    FaultsNotSortedUnique,
    #[error("a bad verdict requires at least one culprit")]
    NotEnoughCulprits,
    #[error("a good verdict requires at least two faults")]
    NotEnoughFaults,
    #[error("a culprit's verdict was not judged bad")]
    CulpritsVerdictNotBad,
    #[error("a fault report's verdict disagreement is wrong")]
    FaultVerdictWrong,
    #[error("offender already reported")]
    OffenderAlreadyReported,
    #[error("judgement age matches neither the current nor the previous epoch")]
    BadJudgementAge,
    #[error("validator index out of range for the judging epoch's validator set")]
    BadValidatorIndex,
    #[error("signature verification failed")]
    BadSignature,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SafroleError {
    #[error("block seal is invalid")]
    BadSeal,
    #[error("ticket envelope signature is invalid")]
    BadTicketSignature,
    #[error("duplicate ticket in extrinsic")]
    DuplicateTicket,
    #[error("epoch mark does not match the expected epoch transition")]
    BadEpochMark,
    #[error("tickets mark does not match the derived sealing-key sequence")]
    BadTicketsMark,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssurancesReportsError {
    #[error("unknown core index")]
    UnknownCore,
    #[error("unknown anchor block")]
    UnknownAnchor,
    #[error("guarantor key verification failed")]
    BadGuarantorKey,
    #[error("auditor key verification failed")]
    BadAuditorKey,
    #[error("a report is already pending on this core")]
    ReportAlreadyPending,
    #[error("availability assignment timed out")]
    AvailabilityTimeout,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccumulationError {
    #[error("service not found")]
    ServiceNotFound,
    #[error("service code unavailable")]
    ServiceCodeUnavailable,
    #[error("out of gas")]
    OutOfGas,
    #[error("PVM panicked")]
    PvmPanic,
    #[error("invalid host call")]
    HostCallInvalid,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Dictionary(#[from] DictionaryError),
    #[error(transparent)]
    Block(#[from] BlockError),
    #[error(transparent)]
    Disputes(#[from] DisputesError),
    #[error(transparent)]
    Safrole(#[from] SafroleError),
    #[error(transparent)]
    AssurancesReports(#[from] AssurancesReportsError),
    #[error(transparent)]
    Accumulation(#[from] AccumulationError),
    #[error("value out of range: {0}")]
    ValueOutOfRange(String),
    #[error("preimage error: {0}")]
    Preimage(String),
}
