//! Signal distribution
//!
//! Button objects publish their signals here; the power handler and any
//! other in-process subscriber receive them through a broadcast channel.

pub mod types;

pub use types::BusSignal;

use tokio::sync::broadcast;

/// Event channel capacity (ring buffer size)
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Broadcast bus for button signals
///
/// Signals are delivered to every active subscriber. A subscriber that falls
/// more than [`EVENT_CHANNEL_CAPACITY`] signals behind receives `Lagged`.
pub struct EventBus {
    tx: broadcast::Sender<BusSignal>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish a signal to all subscribers
    ///
    /// Signals with no subscriber are dropped.
    pub fn publish(&self, signal: BusSignal) {
        let _ = self.tx.send(signal);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusSignal> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
