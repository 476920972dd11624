//! Host Bridge
//!
//! Outbound path from the controller to the host. Sends are fire and
//! forget: nothing is awaited, nothing is retried, and a closed channel only
//! produces a debug log.

use std::cell::RefCell;
use std::rc::Rc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::network::protocol::HostEvent;

/// Where session results go.
pub trait HostBridge {
    /// Deliver an event. Must not block.
    fn send(&mut self, event: HostEvent);
}

/// Bridge over an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelBridge {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl ChannelBridge {
    /// Wrap an existing sender.
    pub fn new(tx: mpsc::UnboundedSender<HostEvent>) -> Self {
        Self { tx }
    }

    /// Create a bridge and the receiver that drains it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl HostBridge for ChannelBridge {
    fn send(&mut self, event: HostEvent) {
        if let Err(err) = self.tx.send(event) {
            debug!(action = err.0.action(), "host channel closed, dropping event");
        }
    }
}

/// Bridge that keeps every event in memory. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingBridge {
    sent: Rc<RefCell<Vec<HostEvent>>>,
}

impl RecordingBridge {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything sent so far.
    pub fn events(&self) -> Vec<HostEvent> {
        self.sent.borrow().clone()
    }

    /// Number of events sent.
    pub fn len(&self) -> usize {
        self.sent.borrow().len()
    }

    /// Whether nothing has been sent.
    pub fn is_empty(&self) -> bool {
        self.sent.borrow().is_empty()
    }
}

impl HostBridge for RecordingBridge {
    fn send(&mut self, event: HostEvent) {
        self.sent.borrow_mut().push(event);
    }
}
