//! # PairWire Protocol Library
//!
//! This crate provides the pure, I/O-free primitives of the PairWire
//! pairing protocol: key material, the frame cipher, and rendezvous
//! identifier derivation.
//!
//! ## Overview
//!
//! Two parties who share nothing but a short pairing code derive, without
//! communicating:
//!
//! - a symmetric 256-bit channel key,
//! - a pair of public discovery identifiers (one per role) that do not
//!   reveal the pairing code.
//!
//! Application values are exchanged as encrypted frames:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Application value              │  MessagePack-encoded
//! ├─────────────────────────────────────────┤
//! │     Zero padding (≥ 1 full block)       │  decodes as integer 0s
//! ├─────────────────────────────────────────┤
//! │         AES-256-CTR, fresh IV           │  IV(16) ‖ ciphertext(N×16)
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{PairCipher, Rendezvous, Role};
//!
//! let rendezvous = Rendezvous::derive("blue-otter-42")?;
//! assert!(rendezvous.local_id(Role::Initiator).ends_with("-initiator"));
//!
//! let cipher = PairCipher::new(rendezvous.key().clone());
//! let frame = cipher.encrypt("hello")?;
//! let decoded: String = cipher.decrypt(&frame)?;
//! assert_eq!(decoded, "hello");
//! # Ok::<(), protocol::PairError>(())
//! ```
//!
//! ## Modules
//!
//! - [`key`]: secret key generation, derivation, and base-58 codec
//! - [`cipher`]: value-to-frame encryption and padding check
//! - [`rendezvous`]: role and identifier derivation
//! - [`error`]: error types

pub mod cipher;
pub mod error;
pub mod key;
pub mod rendezvous;

pub use cipher::{PairCipher, BLOCK_LENGTH, IV_LENGTH};
pub use error::{PairError, Result};
pub use key::{SecretKey, KEY_LENGTH};
pub use rendezvous::{Rendezvous, Role};
