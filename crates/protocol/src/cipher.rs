//! Frame cipher: turns application values into encrypted wire frames.
//!
//! # Frame format
//!
//! Each frame consists of:
//! - 16 bytes: random IV (the AES-CTR counter seed)
//! - N×16 bytes: AES-256-CTR ciphertext of the padded plaintext
//!
//! The plaintext is the MessagePack encoding of one application value,
//! zero-padded to the next 16-byte boundary plus one extra full block, so at
//! least 16 zero bytes always follow the payload. On decrypt the padding is
//! re-read as MessagePack: zero bytes decode as integer `0` values, and any
//! trailing value that is not `0` fails the frame as tampered.
//!
//! The padding check is a corruption signal, not a MAC: a flip inside the
//! first plaintext block can still decode to a plausible wrong value without
//! touching the tail. The scheme is kept bit-exact for interoperability with
//! existing peers.

use aes::cipher::{KeyIvInit, StreamCipher};
use aes::Aes256;
use ctr::Ctr128BE;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PairError, Result};
use crate::key::SecretKey;

/// AES-256 in counter mode with a big-endian 128-bit counter.
type Aes256Ctr = Ctr128BE<Aes256>;

/// Length of the frame IV in bytes.
pub const IV_LENGTH: usize = 16;

/// Cipher block length; padded plaintexts are a multiple of this.
pub const BLOCK_LENGTH: usize = 16;

/// Number of trailing padding slots inspected on decrypt.
const PADDING_CHECK_SLOTS: usize = 16;

/// Encrypts and decrypts single application values as self-describing frames.
///
/// Binds to exactly one [`SecretKey`] for its lifetime. Stateless across
/// calls apart from drawing a fresh IV per encryption, so one cipher is
/// shared by every message of a session.
#[derive(Debug)]
pub struct PairCipher {
    key: SecretKey,
}

impl PairCipher {
    /// Creates a cipher bound to the given key.
    pub fn new(key: SecretKey) -> Self {
        Self { key }
    }

    /// Encrypts one value into an `IV || ciphertext` frame.
    ///
    /// The returned frame is always `16 + padded_len` bytes where
    /// `padded_len = 16 * (1 + ceil(serialized_len / 16))`; at least one
    /// full block of zero padding follows the serialized value.
    pub fn encrypt<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        let plaintext = rmp_serde::to_vec_named(value)?;

        let padded_len = BLOCK_LENGTH * (1 + plaintext.len().div_ceil(BLOCK_LENGTH));
        let mut padded = vec![0u8; padded_len];
        padded[..plaintext.len()].copy_from_slice(&plaintext);

        let mut iv = [0u8; IV_LENGTH];
        OsRng.fill_bytes(&mut iv);

        let mut cipher = Aes256Ctr::new(self.key.as_bytes().into(), (&iv).into());
        cipher.apply_keystream(&mut padded);

        let mut frame = Vec::with_capacity(IV_LENGTH + padded_len);
        frame.extend_from_slice(&iv);
        frame.extend_from_slice(&padded);
        Ok(frame)
    }

    /// Decrypts a frame back into an application value.
    ///
    /// Fails with [`PairError::Format`] when the frame is shorter than the
    /// IV, and with [`PairError::Integrity`] when any inspected padding slot
    /// holds something other than the integer `0`.
    pub fn decrypt<T: DeserializeOwned>(&self, frame: &[u8]) -> Result<T> {
        if frame.len() < IV_LENGTH {
            return Err(PairError::Format(format!(
                "frame of {} bytes is shorter than the {}-byte IV",
                frame.len(),
                IV_LENGTH
            )));
        }

        let (iv, ciphertext) = frame.split_at(IV_LENGTH);
        let mut plaintext = ciphertext.to_vec();

        let iv: [u8; IV_LENGTH] = iv.try_into().unwrap();
        let mut cipher = Aes256Ctr::new(self.key.as_bytes().into(), (&iv).into());
        cipher.apply_keystream(&mut plaintext);

        let mut reader = &plaintext[..];
        let payload = rmpv::decode::read_value(&mut reader)
            .map_err(|e| PairError::Deserialization(e.to_string()))?;

        for _ in 0..PADDING_CHECK_SLOTS {
            match rmpv::decode::read_value(&mut reader) {
                Ok(value) if value.as_i64() == Some(0) => {}
                // A slot that is present and not exactly zero, or garbage
                // that no longer parses, marks the frame as tampered.
                Ok(_) => return Err(PairError::Integrity),
                Err(e) if is_clean_eof(&e) => break,
                Err(_) => return Err(PairError::Integrity),
            }
        }

        rmpv::ext::from_value(payload).map_err(|e| PairError::Deserialization(e.to_string()))
    }
}

/// True when decoding stopped exactly at the end of the buffer, as opposed
/// to running out of bytes in the middle of a value.
fn is_clean_eof(err: &rmpv::decode::Error) -> bool {
    matches!(
        err,
        rmpv::decode::Error::InvalidMarkerRead(io)
            if io.kind() == std::io::ErrorKind::UnexpectedEof
    )
}
