//! # PairWire Session Library
//!
//! This crate turns a shared pairing code and a named-endpoint transport
//! into an encrypted, bidirectional message channel between exactly two
//! parties.
//!
//! ## Overview
//!
//! Neither party holds a certificate, a pre-shared key file, or a rendezvous
//! server account: trust derives entirely from possession of the pairing
//! code. From the code alone both sides derive:
//!
//! - the symmetric channel key,
//! - the discovery identifiers each role listens under.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Application values             │  your message type M
//! ├─────────────────────────────────────────┤
//! │          PairSocket session             │  handshake + event stream
//! ├─────────────────────────────────────────┤
//! │      PairCipher frame encryption        │  MessagePack + AES-256-CTR
//! ├─────────────────────────────────────────┤
//! │     Transport (named endpoints)         │  external provider
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use pairing::{MemoryTransport, PairSocket, Role, SocketEvent};
//!
//! #[tokio::main]
//! async fn main() -> protocol::Result<()> {
//!     let transport = Arc::new(MemoryTransport::new());
//!
//!     let socket = PairSocket::<String>::new("blue-otter-42", Role::Initiator, transport)?;
//!     let mut events = socket.events().expect("events taken once");
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             SocketEvent::Open => socket.send(&"hello".to_string()).await?,
//!             SocketEvent::Message(text) => println!("peer says: {text}"),
//!             SocketEvent::Error(err) => eprintln!("session error: {err}"),
//!             SocketEvent::Closed => break,
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`socket`]: the pairing session and its event stream
//! - [`transport`]: the transport provider interface and in-process fabric
//! - [`config`]: session configuration

pub mod config;
pub mod socket;
pub mod transport;

// Re-export protocol for convenience
pub use protocol;

// Re-export the protocol types that appear in this crate's API
pub use protocol::{PairCipher, PairError, Rendezvous, Result, Role, SecretKey};

pub use config::SocketConfig;
pub use socket::{PairSocket, SocketEvent};
pub use transport::{ChannelEvent, Listener, MemoryTransport, RawChannel, Transport};
