//! The pairing session: rendezvous handshake plus encrypted value channel.
//!
//! A [`PairSocket`] owns one pairing attempt. Construction derives the
//! rendezvous material and immediately starts the handshake in the
//! background; progress and traffic surface through the event stream
//! returned by [`events`](PairSocket::events).
//!
//! # Handshake
//!
//! Both parties register a listening identity derived from the pairing
//! code. The initiator then waits for an incoming connection, after poking
//! the responder's identity with a short-lived wake-up connect. The
//! responder dials the initiator's identity; if an incoming connection
//! arrives while that dial is still unresolved, the initiator was not
//! listening when an earlier dial landed. The responder discards the stray
//! connection and dials again, indefinitely. There is no retry limit and no
//! built-in timeout: a caller wanting a bounded handshake races the event
//! stream against its own deadline and calls [`close`](PairSocket::close).

use std::sync::Arc;

use bytes::Bytes;
use protocol::{PairCipher, PairError, Rendezvous, Result, Role};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex, RwLock};

use crate::config::SocketConfig;
use crate::transport::{ChannelEvent, Listener, RawChannel, Transport};

/// Events emitted by a [`PairSocket`].
#[derive(Debug)]
pub enum SocketEvent<M> {
    /// The handshake completed; the channel is ready for traffic.
    Open,
    /// A decrypted application value arrived from the peer.
    Message(M),
    /// Something failed. Frame-level failures (a malformed or tampered
    /// frame) leave the session open; handshake failures are followed by
    /// `Closed`.
    Error(PairError),
    /// The session closed. Emitted exactly once.
    Closed,
}

/// Connection phase of a session.
///
/// Promotion to `Open` and teardown contend on one lock, so a session that
/// closes mid-handshake can never end up owning a live channel.
enum Phase {
    /// Handshake in flight. Holds the listening identity once registered.
    Connecting { listener: Option<Arc<dyn Listener>> },
    /// Channel promoted and wired.
    Open {
        listener: Arc<dyn Listener>,
        channel: Arc<dyn RawChannel>,
    },
    /// Torn down. Terminal; never reverts.
    Closed,
}

struct Shared<M> {
    phase: Mutex<Phase>,
    cipher: PairCipher,
    event_tx: mpsc::Sender<SocketEvent<M>>,
}

impl<M> Shared<M> {
    async fn emit(&self, event: SocketEvent<M>) {
        if self.event_tx.send(event).await.is_err() {
            tracing::debug!("session event dropped - receiver is gone");
        }
    }

    async fn is_closed(&self) -> bool {
        matches!(*self.phase.lock().await, Phase::Closed)
    }

    /// Idempotent teardown: the first caller swaps the phase to `Closed`,
    /// releases the channel and the listening identity, and emits `Closed`.
    async fn shutdown(&self) {
        let previous = {
            let mut phase = self.phase.lock().await;
            std::mem::replace(&mut *phase, Phase::Closed)
        };
        match previous {
            Phase::Closed => return,
            Phase::Connecting { listener } => {
                if let Some(listener) = listener {
                    listener.close().await;
                }
            }
            Phase::Open { listener, channel } => {
                channel.close().await;
                listener.close().await;
            }
        }
        self.emit(SocketEvent::Closed).await;
    }
}

/// An encrypted bidirectional message channel bound to one pairing code.
///
/// Generic over the application message type `M`, which is serialized to
/// MessagePack and encrypted per frame. Both parties must agree on `M` (or
/// use a dynamic value type such as `rmpv::Value`).
///
/// Dropping the socket does not tear the session down; call
/// [`close`](PairSocket::close).
pub struct PairSocket<M> {
    shared: Arc<Shared<M>>,
    rendezvous: Rendezvous,
    role: Role,
    event_rx: RwLock<Option<mpsc::Receiver<SocketEvent<M>>>>,
}

impl<M> PairSocket<M>
where
    M: Serialize + DeserializeOwned + Send + 'static,
{
    /// Creates a session and immediately starts the handshake.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(pairing_code: &str, role: Role, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::with_config(pairing_code, role, transport, SocketConfig::default())
    }

    /// Creates a session with explicit configuration.
    pub fn with_config(
        pairing_code: &str,
        role: Role,
        transport: Arc<dyn Transport>,
        config: SocketConfig,
    ) -> Result<Self> {
        let rendezvous = Rendezvous::derive(pairing_code)?;
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity());

        let shared = Arc::new(Shared {
            phase: Mutex::new(Phase::Connecting { listener: None }),
            cipher: PairCipher::new(rendezvous.key().clone()),
            event_tx,
        });

        let task_shared = shared.clone();
        let task_rendezvous = rendezvous.clone();
        tokio::spawn(async move {
            run_handshake(task_shared, transport, task_rendezvous, role).await;
        });

        Ok(Self {
            shared,
            rendezvous,
            role,
            event_rx: RwLock::new(Some(event_rx)),
        })
    }

    /// Returns the session event stream.
    ///
    /// Returns `None` if the receiver has already been taken.
    pub fn events(&self) -> Option<mpsc::Receiver<SocketEvent<M>>> {
        match self.event_rx.try_write() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        }
    }

    /// This session's role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The derived rendezvous material (identifiers are public; the key is
    /// redacted from debug output).
    pub fn rendezvous(&self) -> &Rendezvous {
        &self.rendezvous
    }

    /// Encrypts and sends one value to the peer.
    ///
    /// Fails with [`PairError::NotConnected`] unless the session is open.
    pub async fn send(&self, value: &M) -> Result<()> {
        let channel = {
            let phase = self.shared.phase.lock().await;
            match &*phase {
                Phase::Open { channel, .. } => channel.clone(),
                Phase::Connecting { .. } | Phase::Closed => {
                    return Err(PairError::NotConnected)
                }
            }
        };

        let frame = self.shared.cipher.encrypt(value)?;
        channel.send(Bytes::from(frame)).await
    }

    /// Closes the session. Idempotent; safe to call in any state, including
    /// while the handshake is still in flight.
    pub async fn close(&self) {
        self.shared.shutdown().await;
    }
}

/// Drives one handshake attempt and reports its outcome on the session.
async fn run_handshake<M>(
    shared: Arc<Shared<M>>,
    transport: Arc<dyn Transport>,
    rendezvous: Rendezvous,
    role: Role,
) where
    M: DeserializeOwned + Send + 'static,
{
    if let Err(err) = establish(&shared, transport.as_ref(), &rendezvous, role).await {
        if shared.is_closed().await {
            // The session went away underneath us; nothing to report.
            tracing::debug!(error = %err, "handshake abandoned after close");
            return;
        }
        tracing::warn!(error = %err, role = ?role, "pairing handshake failed");
        shared.emit(SocketEvent::Error(err)).await;
        shared.shutdown().await;
    }
}

/// Runs the handshake to completion: returns `Ok(())` either once the
/// channel is promoted and wired, or once a concurrent close makes the
/// outcome irrelevant.
async fn establish<M>(
    shared: &Arc<Shared<M>>,
    transport: &dyn Transport,
    rendezvous: &Rendezvous,
    role: Role,
) -> Result<()>
where
    M: DeserializeOwned + Send + 'static,
{
    let local_id = rendezvous.local_id(role);
    let listener: Arc<dyn Listener> = transport
        .open(local_id)
        .await
        .map_err(|err| match err {
            err @ PairError::Setup(_) => err,
            other => PairError::Setup(other.to_string()),
        })?
        .into();
    tracing::debug!(identity = local_id, "listening identity registered");

    let mut incoming = match listener.incoming() {
        Some(receiver) => receiver,
        None => {
            listener.close().await;
            return Err(PairError::Transport(
                "incoming stream already taken".to_string(),
            ));
        }
    };

    // Record the listener so close() can release it, or stop right here if
    // the session closed while the identity was being registered.
    {
        let mut phase = shared.phase.lock().await;
        if matches!(*phase, Phase::Closed) {
            drop(phase);
            listener.close().await;
            return Ok(());
        }
        *phase = Phase::Connecting {
            listener: Some(listener.clone()),
        };
    }

    let channel = match role {
        Role::Initiator => initiate(&listener, &mut incoming, rendezvous).await?,
        Role::Responder => respond(&listener, &mut incoming, rendezvous).await?,
    };
    let channel: Arc<dyn RawChannel> = channel.into();

    // The frame protocol needs ordered, lossless delivery; anything less
    // would corrupt multi-frame decoding.
    if !channel.is_reliable() {
        channel.close().await;
        return Err(PairError::Contract(
            "transport delivered a channel without reliable ordered delivery".to_string(),
        ));
    }

    let events = match channel.events() {
        Some(receiver) => receiver,
        None => {
            channel.close().await;
            return Err(PairError::Transport(
                "channel event stream already taken".to_string(),
            ));
        }
    };

    // Promote, unless the session closed while the handshake was in
    // flight, in which case the fresh channel must not outlive it.
    {
        let mut phase = shared.phase.lock().await;
        if matches!(*phase, Phase::Closed) {
            drop(phase);
            channel.close().await;
            return Ok(());
        }
        *phase = Phase::Open {
            listener: listener.clone(),
            channel: channel.clone(),
        };
    }

    shared.emit(SocketEvent::Open).await;
    tracing::debug!(role = ?role, "pairing channel open");

    tokio::spawn(pump(shared.clone(), events));
    Ok(())
}

/// Initiator side: wait for the responder to connect, after poking its
/// identity so a responder stuck in an early dial knows to retry.
async fn initiate(
    listener: &Arc<dyn Listener>,
    incoming: &mut mpsc::UnboundedReceiver<Box<dyn RawChannel>>,
    rendezvous: &Rendezvous,
) -> Result<Box<dyn RawChannel>> {
    // Wake-up connect: open a channel to the responder identity and close
    // it the moment it opens. Arrival is the signal; no payload is sent.
    let notify_listener = listener.clone();
    let target = rendezvous.responder_id().to_string();
    tokio::spawn(async move {
        match notify_listener.connect(&target, false).await {
            Ok(channel) => channel.close().await,
            // Expected when the responder is not up yet; its own dial
            // covers that ordering.
            Err(err) => tracing::debug!(error = %err, "wake-up connect failed"),
        }
    });

    incoming.recv().await.ok_or_else(|| {
        PairError::Transport("listening identity released during handshake".to_string())
    })
}

/// Responder side: dial the initiator, discarding stray incoming
/// connections and retrying until the dial itself resolves.
async fn respond(
    listener: &Arc<dyn Listener>,
    incoming: &mut mpsc::UnboundedReceiver<Box<dyn RawChannel>>,
    rendezvous: &Rendezvous,
) -> Result<Box<dyn RawChannel>> {
    loop {
        let mut connect = listener.connect(rendezvous.initiator_id(), true);

        tokio::select! {
            // Prefer a dial that has already opened over treating a
            // simultaneous incoming connection as a stray.
            biased;

            opened = &mut connect => return opened,

            stray = incoming.recv() => match stray {
                Some(channel) => {
                    // Our dial landed before the initiator registered its
                    // waiter; the wake-up connect says it is listening now.
                    // Drop the unresolved dial and go again.
                    tracing::debug!("stray incoming connection, retrying dial");
                    channel.close().await;
                }
                None => {
                    return Err(PairError::Transport(
                        "listening identity released during handshake".to_string(),
                    ))
                }
            },
        }
    }
}

/// Drains channel events into session events until the channel goes away.
async fn pump<M>(shared: Arc<Shared<M>>, mut events: mpsc::Receiver<ChannelEvent>)
where
    M: DeserializeOwned + Send + 'static,
{
    loop {
        match events.recv().await {
            Some(ChannelEvent::Data(bytes)) => match shared.cipher.decrypt::<M>(&bytes) {
                Ok(value) => shared.emit(SocketEvent::Message(value)).await,
                // A tampered or malformed frame is reported, not fatal.
                Err(err) => shared.emit(SocketEvent::Error(err)).await,
            },
            Some(ChannelEvent::Error(message)) => {
                shared
                    .emit(SocketEvent::Error(PairError::Transport(message)))
                    .await;
            }
            Some(ChannelEvent::Closed) | None => {
                shared.shutdown().await;
                return;
            }
        }
    }
}
