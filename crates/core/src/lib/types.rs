//! Fundamental scalar types shared by every state component.

use crate::codec::{Codec, CodecError, Scanner};
use jam_stf_codec_derive::Codec;

/// A 32-byte opaque identifier, normally the output of BLAKE2b-256.
pub type Hash = [u8; 32];

pub const ZERO_HASH: Hash = [0u8; 32];

/// Discrete time unit of the chain. `epoch(slot) = slot / epoch_length`.
pub type TimeSlot = u32;

/// Index into the service table.
pub type ServiceId = u32;

/// Gas is never negative; it is deducted and checked for exhaustion by the PVM gas meter.
pub type Gas = u64;

/// Balance saturates at zero only when explicitly deducted (see `Balance::saturating_sub`).
pub type Balance = u64;

pub type BandersnatchKey = [u8; 32];
pub type Ed25519Key = [u8; 32];
pub type BlsKey = [u8; 144];
pub type ValidatorMetadata = [u8; 128];

/// Four-slot entropy ring: index 0 is the live accumulator, 1..3 are archived epoch snapshots.
pub type Entropy = [Hash; 4];

/// `Entropy` is `[Hash; 4]`, i.e. `[[u8; 32]; 4]`: a distinct concrete type
/// from the blanket `[u8; N]` impl below (whose element type is `u8`), so it
/// gets its own impl rather than sharing one.
struct EntropyCodec;

impl EntropyCodec {
    fn encode(entropy: &Entropy, out: &mut Vec<u8>) {
        for slot in entropy {
            slot.encode(out);
        }
    }

    fn decode(scanner: &mut Scanner<'_>) -> Result<Entropy, CodecError> {
        let mut out: Entropy = [ZERO_HASH; 4];
        for slot in out.iter_mut() {
            *slot = Codec::decode(scanner)?;
        }
        Ok(out)
    }
}

impl Codec for Entropy {
    fn encode(&self, out: &mut Vec<u8>) {
        EntropyCodec::encode(self, out);
    }
    fn decode(scanner: &mut Scanner<'_>) -> Result<Self, CodecError> {
        EntropyCodec::decode(scanner)
    }
}

/// A validator's full public-key bundle, as carried in κ/λ/ι.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Codec)]
pub struct ValidatorKey {
    pub bandersnatch: BandersnatchKey,
    pub ed25519: Ed25519Key,
    pub bls: BlsKey,
    pub metadata: ValidatorMetadata,
}

/// A Bandersnatch VRF signature, fixed at 96 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandersnatchVrfSignature(pub [u8; 96]);

impl Codec for BandersnatchVrfSignature {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }
    fn decode(scanner: &mut Scanner<'_>) -> Result<Self, CodecError> {
        let bytes = scanner.read_bytes(96)?;
        let mut buf = [0u8; 96];
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }
}

/// Wraps `u32` lengths/counters used as raw 4-byte fixed fields (e.g. `slot`),
/// distinguishing them at the type level from varint-coded sequence lengths.
pub fn usize_to_u32(v: usize) -> Result<u32, crate::error::CoreError> {
    u32::try_from(v).map_err(|_| crate::error::CoreError::ValueOutOfRange(format!("{v} does not fit in u32")))
}

pub fn u32_to_usize(v: u32) -> usize {
    v as usize
}
