//! Narrow collaborator interfaces for the cryptographic primitives the core consumes but does
//! not implement. The core only ever calls these functions/traits; it never touches curve
//! arithmetic or a hash implementation directly, so a conformance driver can swap in alternate
//! implementations (e.g. a deterministic mock for Bandersnatch, for which no ecosystem crate
//! was available to depend on, see DESIGN.md).

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ed25519_dalek::{Signature, VerifyingKey};
use sha3::Keccak256;

use crate::types::{BandersnatchKey, BandersnatchVrfSignature, Ed25519Key, Hash};

type Blake2b256 = Blake2b<U32>;

/// `blake2b_256(bytes) → Hash`.
pub fn blake2b_256(bytes: &[u8]) -> Hash {
    let mut hasher = Blake2b256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// `keccak_256(bytes) → Hash`, used only for the β MMR of accumulate roots.
pub fn keccak_256(bytes: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// `ed25519_verify(key, msg, sig) → bool`. Never panics: a malformed key or signature is simply
/// treated as a failed verification.
pub fn ed25519_verify(key: &Ed25519Key, msg: &[u8], sig: &[u8; 64]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(key) else {
        return false;
    };
    let signature = Signature::from_bytes(sig);
    verifying_key.verify_strict(msg, &signature).is_ok()
}

/// Outcome of a Bandersnatch VRF verification: whether the signature is
/// valid, and, if so, the VRF output hash consumed by η and by ticket
/// ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VrfOutcome {
    pub valid: bool,
    pub output: Hash,
}

/// Bandersnatch is not available as a maintained crate in this dependency
/// stack (see DESIGN.md); the core depends only on this trait, so a real
/// curve implementation can be substituted by the host without touching
/// STF logic. `MockBandersnatch` below is a deterministic stand-in suitable
/// for conformance-vector replay, where the verification result is supplied
/// by the trace rather than recomputed.
pub trait BandersnatchVerifier: Send + Sync {
    fn vrf_verify(&self, key: &BandersnatchKey, msg: &[u8], sig: &BandersnatchVrfSignature) -> VrfOutcome;
    fn ring_verify(&self, ring_root: &Hash, msg: &[u8], sig: &BandersnatchVrfSignature) -> bool;
}

/// Deterministic placeholder: derives the VRF output from `blake2b_256(key
/// ∥ msg ∥ sig)` and treats the signature as valid whenever its first byte
/// is non-zero. Not cryptographically meaningful; exists only so the rest
/// of the STF can be exercised end to end without a production Bandersnatch
/// backend wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockBandersnatch;

impl BandersnatchVerifier for MockBandersnatch {
    fn vrf_verify(&self, key: &BandersnatchKey, msg: &[u8], sig: &BandersnatchVrfSignature) -> VrfOutcome {
        let mut buf = Vec::with_capacity(32 + msg.len() + 96);
        buf.extend_from_slice(key);
        buf.extend_from_slice(msg);
        buf.extend_from_slice(&sig.0);
        VrfOutcome {
            valid: sig.0[0] != 0,
            output: blake2b_256(&buf),
        }
    }

    fn ring_verify(&self, ring_root: &Hash, msg: &[u8], sig: &BandersnatchVrfSignature) -> bool {
        let mut buf = Vec::with_capacity(32 + msg.len() + 96);
        buf.extend_from_slice(ring_root);
        buf.extend_from_slice(msg);
        buf.extend_from_slice(&sig.0);
        sig.0[0] != 0 && !buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake2b_256_is_deterministic_and_32_bytes() {
        let a = blake2b_256(b"hello");
        let b = blake2b_256(b"hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_ne!(a, blake2b_256(b"world"));
    }

    #[test]
    fn keccak_256_differs_from_blake2b_256() {
        assert_ne!(keccak_256(b"hello"), blake2b_256(b"hello"));
    }

    #[test]
    fn ed25519_verify_rejects_malformed_key() {
        let bad_key = [0u8; 32];
        let sig = [0u8; 64];
        assert!(!ed25519_verify(&bad_key, b"msg", &sig));
    }
}
