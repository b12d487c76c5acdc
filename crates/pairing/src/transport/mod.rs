//! Transport provider interface.
//!
//! The session layer consumes a peer-to-peer connection provider through the
//! traits in this module: any party can register a named listening identity
//! and anyone who knows the name can connect to it. The provider gives no
//! ordering guarantee between "start listening" and "attempt connect";
//! resolving that race is the session layer's job, not the transport's.
//!
//! Implementations exist out of tree for real providers; [`memory`] ships an
//! in-process fabric used by the test-suite.

pub mod memory;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use protocol::error::Result;
use tokio::sync::mpsc;

pub use memory::MemoryTransport;

/// An event delivered by a raw channel.
#[derive(Debug)]
pub enum ChannelEvent {
    /// A raw frame arrived from the peer.
    Data(Bytes),
    /// The channel failed.
    Error(String),
    /// The peer closed the channel.
    Closed,
}

/// A raw byte channel between two endpoints.
///
/// Delivery is ordered and lossless only when [`is_reliable`] reports
/// `true`; the session layer refuses to run its frame protocol over
/// anything else.
///
/// [`is_reliable`]: RawChannel::is_reliable
pub trait RawChannel: Send + Sync {
    /// Sends one raw frame to the peer.
    fn send(&self, data: Bytes) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Returns the channel's event stream.
    ///
    /// Returns `None` if the receiver has already been taken.
    fn events(&self) -> Option<mpsc::Receiver<ChannelEvent>>;

    /// Closes the channel. Idempotent.
    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    /// Whether the provider guarantees ordered, lossless delivery.
    fn is_reliable(&self) -> bool;
}

/// A named listening identity registered with the transport.
pub trait Listener: Send + Sync {
    /// Returns the stream of connections other parties open to this
    /// identity.
    ///
    /// Returns `None` if the receiver has already been taken.
    fn incoming(&self) -> Option<mpsc::UnboundedReceiver<Box<dyn RawChannel>>>;

    /// Opens an outbound channel to a named target.
    ///
    /// Resolves once the channel reports open. Dropping the returned future
    /// abandons the attempt; an abandoned attempt must not deliver a channel
    /// to the target.
    fn connect(
        &self,
        target: &str,
        reliable: bool,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn RawChannel>>> + Send + '_>>;

    /// Releases the listening identity. Idempotent.
    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// A peer-to-peer connection provider with named discovery.
pub trait Transport: Send + Sync {
    /// Registers a listening identity.
    ///
    /// Fails with [`PairError::Setup`](protocol::PairError::Setup) when the
    /// name is already taken or the provider is unavailable.
    fn open(
        &self,
        identity: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn Listener>>> + Send + '_>>;
}
