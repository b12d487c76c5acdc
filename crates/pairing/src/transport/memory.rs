//! In-process transport fabric.
//!
//! Endpoints register under plain string names in a shared registry and
//! channels are linked queue pairs. Two behaviors mirror real discovery
//! providers and matter to the handshake:
//!
//! - `connect` to a name that is not registered yet does not fail, it waits
//!   until the name appears (discovery latency);
//! - an abandoned connect attempt delivers nothing to the target, because
//!   the channel pair is only created when the attempt resolves.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use protocol::error::{PairError, Result};
use tokio::sync::{mpsc, Mutex, Notify, RwLock};

use super::{ChannelEvent, Listener, RawChannel, Transport};

/// Capacity of each channel half's event queue.
const EVENT_QUEUE_CAPACITY: usize = 256;

type IncomingTx = mpsc::UnboundedSender<Box<dyn RawChannel>>;

#[derive(Default)]
struct Registry {
    endpoints: HashMap<String, IncomingTx>,
}

/// An in-process named-endpoint transport.
///
/// Clones share one namespace; hand the same instance (or clones of it) to
/// every party that should be able to reach the others.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    registry: Arc<Mutex<Registry>>,
    /// Pinged on every registration and release so pending dials re-check.
    changed: Arc<Notify>,
}

impl MemoryTransport {
    /// Creates an empty transport fabric.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for MemoryTransport {
    fn open(
        &self,
        identity: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn Listener>>> + Send + '_>> {
        let identity = identity.to_string();
        Box::pin(async move {
            let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
            {
                let mut registry = self.registry.lock().await;
                if registry.endpoints.contains_key(&identity) {
                    return Err(PairError::Setup(format!(
                        "identity {identity:?} is already taken"
                    )));
                }
                registry.endpoints.insert(identity.clone(), incoming_tx);
            }
            self.changed.notify_waiters();

            Ok(Box::new(MemoryListener {
                name: identity,
                transport: self.clone(),
                incoming_rx: RwLock::new(Some(incoming_rx)),
                closed: AtomicBool::new(false),
            }) as Box<dyn Listener>)
        })
    }
}

/// A registered listening identity on a [`MemoryTransport`].
pub struct MemoryListener {
    name: String,
    transport: MemoryTransport,
    incoming_rx: RwLock<Option<mpsc::UnboundedReceiver<Box<dyn RawChannel>>>>,
    closed: AtomicBool,
}

impl Listener for MemoryListener {
    fn incoming(&self) -> Option<mpsc::UnboundedReceiver<Box<dyn RawChannel>>> {
        match self.incoming_rx.try_write() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        }
    }

    fn connect(
        &self,
        target: &str,
        reliable: bool,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn RawChannel>>> + Send + '_>> {
        let target = target.to_string();
        Box::pin(async move {
            loop {
                // Arm the wakeup before checking, so a registration between
                // the check and the await is not missed.
                let changed = self.transport.changed.notified();
                {
                    if self.closed.load(Ordering::SeqCst) {
                        return Err(PairError::Transport(
                            "listening identity is closed".to_string(),
                        ));
                    }
                    let registry = self.transport.registry.lock().await;
                    if let Some(tx) = registry.endpoints.get(&target) {
                        let (local, remote) = MemoryChannel::pair(reliable);
                        return match tx.send(Box::new(remote)) {
                            Ok(()) => Ok(Box::new(local) as Box<dyn RawChannel>),
                            Err(_) => Err(PairError::Transport(format!(
                                "target {target:?} went away"
                            ))),
                        };
                    }
                }
                changed.await;
            }
        })
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if self.closed.swap(true, Ordering::SeqCst) {
                return;
            }
            {
                let mut registry = self.transport.registry.lock().await;
                registry.endpoints.remove(&self.name);
            }
            self.transport.changed.notify_waiters();
        })
    }
}

/// One half of a linked in-process channel pair.
pub struct MemoryChannel {
    peer_tx: mpsc::Sender<ChannelEvent>,
    events_rx: RwLock<Option<mpsc::Receiver<ChannelEvent>>>,
    reliable: bool,
    closed: AtomicBool,
}

impl MemoryChannel {
    /// Creates two linked halves; what one sends, the other receives.
    fn pair(reliable: bool) -> (MemoryChannel, MemoryChannel) {
        let (tx_a, rx_a) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (tx_b, rx_b) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let a = MemoryChannel {
            peer_tx: tx_b,
            events_rx: RwLock::new(Some(rx_a)),
            reliable,
            closed: AtomicBool::new(false),
        };
        let b = MemoryChannel {
            peer_tx: tx_a,
            events_rx: RwLock::new(Some(rx_b)),
            reliable,
            closed: AtomicBool::new(false),
        };
        (a, b)
    }
}

impl RawChannel for MemoryChannel {
    fn send(&self, data: Bytes) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.closed.load(Ordering::SeqCst) {
                return Err(PairError::Transport("channel is closed".to_string()));
            }
            self.peer_tx
                .send(ChannelEvent::Data(data))
                .await
                .map_err(|_| PairError::Transport("peer channel is gone".to_string()))
        })
    }

    fn events(&self) -> Option<mpsc::Receiver<ChannelEvent>> {
        match self.events_rx.try_write() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        }
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if self.closed.swap(true, Ordering::SeqCst) {
                return;
            }
            let _ = self.peer_tx.send(ChannelEvent::Closed).await;
        })
    }

    fn is_reliable(&self) -> bool {
        self.reliable
    }
}
