//! Session configuration.

/// Default capacity of the session event channel.
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Configuration for a [`PairSocket`](crate::PairSocket).
///
/// Deliberately carries no handshake timeout: the rendezvous protocol has no
/// bound of its own, and callers wanting one should race the event stream
/// against their own deadline and call `close()`.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Capacity of the event channel handed out by `events()`.
    event_capacity: usize,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SocketConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the capacity of the session event channel.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Returns the configured event channel capacity.
    pub fn event_capacity(&self) -> usize {
        self.event_capacity
    }
}
