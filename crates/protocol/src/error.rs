//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering all possible failure modes.
#[derive(Debug, Error)]
pub enum PairError {
    // Serialization errors
    /// Failed to serialize a value.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Failed to deserialize a value.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    // Key errors
    /// Failed to decode key material from its textual form.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    // Rendezvous errors
    /// Failed to register the listening identity. Fatal to the session;
    /// the most likely cause is an identifier collision on the transport.
    #[error("rendezvous setup failed: {0}")]
    Setup(String),

    /// A provider-level connect, send, or channel failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The transport offered a channel without reliable, in-order delivery.
    /// The frame protocol cannot run over such a channel.
    #[error("transport contract violated: {0}")]
    Contract(String),

    // Frame errors
    /// An inbound frame was malformed (for example, shorter than the IV).
    #[error("malformed frame: {0}")]
    Format(String),

    /// The padding check failed on decrypt: a tampering or corruption signal.
    #[error("invalid ciphertext")]
    Integrity,

    // Usage errors
    /// A send was attempted with no open channel.
    #[error("connection not established")]
    NotConnected,
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, PairError>;

// Conversions from underlying crate errors

impl From<rmp_serde::encode::Error> for PairError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        PairError::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for PairError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        PairError::Deserialization(err.to_string())
    }
}

impl From<bs58::decode::Error> for PairError {
    fn from(err: bs58::decode::Error) -> Self {
        PairError::InvalidKey(err.to_string())
    }
}
