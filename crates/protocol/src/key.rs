//! Secret key material for a pairing session.
//!
//! A [`SecretKey`] is a 256-bit value that is either drawn from the system's
//! secure random source, derived deterministically from a serializable seed,
//! or decoded from its base-58 textual form. Derivation serializes the seed
//! to MessagePack and hashes the bytes with Keccak-256, so equal seeds always
//! yield equal keys and a key's own bytes can seed a further derivation.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use sha3::{Digest, Keccak256};

use crate::error::{PairError, Result};

/// Length of a secret key in bytes (256-bit Keccak digest width).
pub const KEY_LENGTH: usize = 32;

/// A 256-bit secret used for frame encryption and identifier derivation.
///
/// The raw bytes never appear in log output; `Debug` redacts them. The value
/// is not zeroized on drop, matching the wire-compatible reference behavior;
/// callers with stricter requirements should wrap it themselves.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey([u8; KEY_LENGTH]);

impl SecretKey {
    /// Generates a new key from the operating system's secure random source.
    pub fn random() -> Self {
        let mut bytes = [0u8; KEY_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Derives a key from an arbitrary serializable seed.
    ///
    /// The seed is serialized to MessagePack and hashed with Keccak-256.
    /// Deterministic: equal seed serializations always yield equal keys.
    /// Safe to apply iteratively: pass a key's bytes back in via
    /// [`serde_bytes::Bytes`] to chain derivations.
    pub fn derive_from<S: Serialize + ?Sized>(seed: &S) -> Result<Self> {
        let encoded = rmp_serde::to_vec_named(seed)?;
        let digest = Keccak256::digest(&encoded);
        Ok(Self(digest.into()))
    }

    /// Creates a key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes of this key.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    /// Encodes the key as base-58 text.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Decodes a key from base-58 text.
    ///
    /// Fails with [`PairError::InvalidKey`] on non-base-58 input or when the
    /// decoded value is not exactly [`KEY_LENGTH`] bytes.
    pub fn from_base58(text: &str) -> Result<Self> {
        let decoded = bs58::decode(text).into_vec()?;
        let bytes: [u8; KEY_LENGTH] = decoded.try_into().map_err(|v: Vec<u8>| {
            PairError::InvalidKey(format!(
                "decoded length {} does not match expected {}",
                v.len(),
                KEY_LENGTH
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SecretKey").field(&"[REDACTED]").finish()
    }
}
