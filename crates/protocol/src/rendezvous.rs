//! Rendezvous identifier derivation.
//!
//! Both parties derive the same channel key and the same pair of discovery
//! identifiers from the pairing code alone, with no communication. The
//! public identifier prefix is the base-58 encoding of a re-hash of the
//! channel key, so the pairing code itself never reaches the transport's
//! discovery layer.

use serde_bytes::Bytes;

use crate::error::Result;
use crate::key::SecretKey;

/// Which side of the handshake this session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Listens for the paired channel and sends the wake-up connect.
    Initiator,
    /// Dials the initiator, retrying around discovery races.
    Responder,
}

impl Role {
    /// The identifier suffix for this role.
    pub fn suffix(&self) -> &'static str {
        match self {
            Role::Initiator => "initiator",
            Role::Responder => "responder",
        }
    }

    /// The opposite role.
    pub fn peer(&self) -> Role {
        match self {
            Role::Initiator => Role::Responder,
            Role::Responder => Role::Initiator,
        }
    }
}

/// The derived material of one pairing: channel key plus both discovery
/// identifiers. A pure function of the pairing code: two independent
/// processes given the same code always compute identical values.
#[derive(Debug, Clone)]
pub struct Rendezvous {
    key: SecretKey,
    initiator_id: String,
    responder_id: String,
}

impl Rendezvous {
    /// Derives the rendezvous material for a pairing code.
    pub fn derive(pairing_code: &str) -> Result<Self> {
        let key = SecretKey::derive_from(pairing_code)?;
        // Re-hash rather than reuse: discovery names must not let the
        // transport learn the channel key or the pairing code.
        let prefix = SecretKey::derive_from(Bytes::new(key.as_bytes()))?.to_base58();

        Ok(Self {
            key,
            initiator_id: format!("{}-{}", prefix, Role::Initiator.suffix()),
            responder_id: format!("{}-{}", prefix, Role::Responder.suffix()),
        })
    }

    /// The symmetric channel key shared by both parties.
    pub fn key(&self) -> &SecretKey {
        &self.key
    }

    /// The identifier the initiator listens under.
    pub fn initiator_id(&self) -> &str {
        &self.initiator_id
    }

    /// The identifier the responder listens under.
    pub fn responder_id(&self) -> &str {
        &self.responder_id
    }

    /// The identifier the given role listens under.
    pub fn local_id(&self, role: Role) -> &str {
        match role {
            Role::Initiator => &self.initiator_id,
            Role::Responder => &self.responder_id,
        }
    }

    /// The identifier of the given role's peer.
    pub fn remote_id(&self, role: Role) -> &str {
        self.local_id(role.peer())
    }
}
