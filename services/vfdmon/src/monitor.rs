//! Console consumer of drive events
//!
//! Drains the event channel on a fixed tick, keeps the latest sample and a
//! bounded window of recent ones, and routes faults through [`FaultLog`].

use std::collections::VecDeque;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::drive::Snapshot;
use crate::events::{Event, EventReceiver};
use crate::faults::FaultLog;

/// One-line rendering of a sample
pub fn format_snapshot(snapshot: &Snapshot) -> String {
    let frequency = match snapshot.frequency {
        Some(hz) => format!("{hz:.2} Hz"),
        None => "-- Hz".to_string(),
    };
    format!(
        "freq={} bus={} out={} cur={} speed={}",
        frequency,
        snapshot.bus_voltage,
        snapshot.output_voltage,
        snapshot.output_current,
        snapshot.speed
    )
}

#[derive(Debug)]
pub struct Monitor {
    latest: Option<Snapshot>,
    window: VecDeque<Snapshot>,
    history_len: usize,
    faults: FaultLog,
    json: bool,
    log_lines: usize,
}

impl Monitor {
    pub fn new(history_len: usize) -> Self {
        Self {
            latest: None,
            window: VecDeque::with_capacity(history_len),
            history_len: history_len.max(1),
            faults: FaultLog::new(),
            json: false,
            log_lines: 0,
        }
    }

    /// Print samples as JSON lines on stdout instead of status log lines
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.latest.as_ref()
    }

    /// Retained samples, oldest first
    pub fn window(&self) -> impl Iterator<Item = &Snapshot> {
        self.window.iter()
    }

    /// Frequency trace of the window, NaN where the read failed
    pub fn frequency_series(&self) -> Vec<f64> {
        self.window.iter().map(Snapshot::frequency_or_nan).collect()
    }

    pub fn faults(&self) -> &FaultLog {
        &self.faults
    }

    /// Number of `Log` events shown so far
    pub fn log_lines(&self) -> usize {
        self.log_lines
    }

    pub fn handle(&mut self, event: Event) {
        match event {
            Event::Data(snapshot) => self.on_data(snapshot),
            Event::Fault { message, timestamp } => {
                if self.faults.record(timestamp, message.as_str()) {
                    error!("Fault: {}", message);
                } else {
                    debug!("Fault repeated: {}", message);
                }
            },
            Event::Log { message, .. } => {
                self.log_lines += 1;
                info!("{}", message);
            },
        }
    }

    fn on_data(&mut self, snapshot: Snapshot) {
        if self.json {
            match serde_json::to_string(&snapshot) {
                Ok(line) => println!("{line}"),
                Err(e) => error!("Sample encode failed: {}", e),
            }
        } else {
            info!("{}", format_snapshot(&snapshot));
        }

        if self.window.len() == self.history_len {
            self.window.pop_front();
        }
        self.window.push_back(snapshot.clone());
        self.latest = Some(snapshot);
    }

    /// Handle everything pending; returns how many events were taken
    pub fn drain(&mut self, events: &mut EventReceiver) -> usize {
        let pending = events.drain();
        let count = pending.len();
        for event in pending {
            self.handle(event);
        }
        count
    }

    /// Run on a background task; see [`MonitorHandle::shutdown`]
    pub fn spawn(self, events: EventReceiver, tick: Duration) -> MonitorHandle {
        let token = CancellationToken::new();
        let handle = tokio::spawn(self.run(events, tick, token.clone()));
        MonitorHandle { handle, token }
    }

    /// Drain on every `tick` until cancelled, then drain once more
    pub async fn run(
        mut self,
        mut events: EventReceiver,
        tick: Duration,
        token: CancellationToken,
    ) -> Self {
        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.drain(&mut events);
                },
            }
        }

        self.drain(&mut events);
        debug!("Monitor stopped, {} faults recorded", self.faults.len());
        self
    }
}

/// A [`Monitor`] running on its own task
#[derive(Debug)]
pub struct MonitorHandle {
    handle: JoinHandle<Monitor>,
    token: CancellationToken,
}

impl MonitorHandle {
    /// Stop draining after a final pass and hand the monitor back
    pub async fn shutdown(self) -> Result<Monitor, JoinError> {
        self.token.cancel();
        self.handle.await
    }
}
