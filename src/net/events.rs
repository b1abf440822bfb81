use std::net::IpAddr;
use tokio::sync::mpsc;

use crate::mqtt::ConnectStatus;

/// Completion delivered by a background I/O task.
#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent {
    /// Hostname lookup finished, `address` is `None` when it failed
    Resolved {
        host: String,
        address: Option<IpAddr>,
    },
    /// Broker session changed state
    Status(ConnectStatus),
}

pub type EventSender = mpsc::UnboundedSender<NetEvent>;

/// Queue between background I/O tasks and the poll loop.
///
/// Producers only push; the loop drains everything in its service step, so
/// handlers never run while channels are being evaluated.
pub struct EventQueue {
    sender: EventSender,
    receiver: mpsc::UnboundedReceiver<NetEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, receiver }
    }

    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Takes every event queued so far without waiting for new ones.
    pub fn drain(&mut self) -> Vec<NetEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
