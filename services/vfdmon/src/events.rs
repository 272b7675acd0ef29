//! Event channel between the drive side and its consumer
//!
//! Many producers (the poller, command tasks), one consumer. Sends never
//! block; once the consumer is gone events are dropped silently.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::trace;

use crate::drive::Snapshot;

/// Everything the consumer is told about
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Data(Snapshot),
    Fault {
        message: String,
        timestamp: DateTime<Utc>,
    },
    Log {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn fault(message: impl Into<String>) -> Self {
        Event::Fault {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn log(message: impl Into<String>) -> Self {
        Event::Log {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Producer handle
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSender {
    /// Returns false when the receiver has been dropped
    pub fn send(&self, event: Event) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(e) => {
                trace!("Event dropped, consumer gone: {:?}", e.0);
                false
            },
        }
    }

    pub fn data(&self, snapshot: Snapshot) -> bool {
        self.send(Event::Data(snapshot))
    }

    pub fn fault(&self, message: impl Into<String>) -> bool {
        self.send(Event::fault(message))
    }

    pub fn log(&self, message: impl Into<String>) -> bool {
        self.send(Event::log(message))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer handle
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventReceiver {
    /// Take every pending event, in arrival order, without waiting
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait for the next event; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}
