//! Background telemetry polling
//!
//! One sampling task per scheduler. Each cycle reads a snapshot, publishes
//! `Data` or `Fault`, then sleeps for what is left of the interval so slow
//! transactions do not push the cadence back. Cancellation is checked
//! between cycles; a transaction in flight always runs to completion.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::drive::SnapshotSource;
use crate::events::EventSender;

/// Grace period for the loop to exit on stop
pub const STOP_GRACE: Duration = Duration::from_secs(1);

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Running,
    Stopping,
}

/// Sleep needed after a cycle that took `elapsed` to keep `interval` cadence
pub fn remaining_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

struct PollTask {
    handle: JoinHandle<()>,
    token: CancellationToken,
    interval: Duration,
}

struct Inner {
    state: PollState,
    task: Option<PollTask>,
}

/// Cancellable sampling loop over a [`SnapshotSource`]
pub struct PollScheduler {
    source: Arc<dyn SnapshotSource>,
    events: EventSender,
    inner: Mutex<Inner>,
    stop_grace: Duration,
}

impl fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollScheduler")
            .field("state", &self.state())
            .field("stop_grace", &self.stop_grace)
            .finish_non_exhaustive()
    }
}

impl PollScheduler {
    pub fn new(source: Arc<dyn SnapshotSource>, events: EventSender) -> Self {
        Self {
            source,
            events,
            inner: Mutex::new(Inner {
                state: PollState::Idle,
                task: None,
            }),
            stop_grace: STOP_GRACE,
        }
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn state(&self) -> PollState {
        self.inner.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == PollState::Running
    }

    /// Interval of the running loop
    pub fn interval(&self) -> Option<Duration> {
        self.inner.lock().task.as_ref().map(|t| t.interval)
    }

    /// Spawn the sampling loop. Returns false, doing nothing, unless idle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, interval: Duration) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            PollState::Running => {
                let finished = inner
                    .task
                    .as_ref()
                    .map_or(true, |task| task.handle.is_finished());
                if !finished {
                    debug!("Poller already running");
                    return false;
                }
                warn!("Poller task ended unexpectedly, restarting");
            },
            PollState::Stopping => {
                debug!("Poller is stopping, start ignored");
                return false;
            },
            PollState::Idle => {},
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(
            Arc::clone(&self.source),
            self.events.clone(),
            interval,
            token.clone(),
        ));

        inner.task = Some(PollTask {
            handle,
            token,
            interval,
        });
        inner.state = PollState::Running;
        info!("Polling started: every {} ms", interval.as_millis());
        true
    }

    /// Cancel the loop and wait up to the grace period for it to exit.
    ///
    /// A loop that overruns the grace period is detached and left to finish
    /// on its own. No-op when not running.
    pub async fn stop(&self) {
        let task = {
            let mut inner = self.inner.lock();
            if inner.state != PollState::Running {
                return;
            }
            inner.state = PollState::Stopping;
            inner.task.take()
        };

        // Dropping this future mid-wait still lands the scheduler in Idle
        let _idle = IdleOnDrop(&self.inner);

        if let Some(task) = task {
            task.token.cancel();
            match timeout(self.stop_grace, task.handle).await {
                Ok(Ok(())) => debug!("Poll loop joined"),
                Ok(Err(e)) => warn!("Poll loop ended abnormally: {}", e),
                Err(_) => warn!(
                    "Poll loop still busy after {} ms, detaching",
                    self.stop_grace.as_millis()
                ),
            }
        }

        info!("Polling stopped");
    }
}

/// Resets the scheduler to Idle when the stop path ends, however it ends
struct IdleOnDrop<'a>(&'a Mutex<Inner>);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.lock().state = PollState::Idle;
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.inner.get_mut().task.take() {
            task.token.cancel();
        }
    }
}

async fn poll_loop(
    source: Arc<dyn SnapshotSource>,
    events: EventSender,
    interval: Duration,
    token: CancellationToken,
) {
    while !token.is_cancelled() {
        let started = Instant::now();

        match source.read_snapshot().await {
            Ok(snapshot) => {
                events.data(snapshot);
            },
            Err(e) => {
                debug!("Poll cycle failed: {}", e);
                events.fault(e.to_string());
            },
        }

        let delay = remaining_delay(interval, started.elapsed());
        tokio::select! {
            () = token.cancelled() => break,
            () = sleep(delay) => {},
        }
    }
    debug!("Poll loop exit");
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::drive::Snapshot;
    use crate::events::event_channel;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;
    use vfd_modbus::Result;

    /// Source whose every read takes `delay`
    struct SlowSource {
        delay: Duration,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl SnapshotSource for SlowSource {
        async fn read_snapshot(&self) -> Result<Snapshot> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            sleep(self.delay).await;
            Ok(Snapshot {
                timestamp: chrono::Utc::now(),
                frequency: Some(1.0),
                bus_voltage: 1,
                output_voltage: 1,
                output_current: 1,
                speed: 1,
            })
        }
    }

    #[test]
    fn test_remaining_delay() {
        let interval = Duration::from_millis(500);
        assert_eq!(
            remaining_delay(interval, Duration::from_millis(150)),
            Duration::from_millis(350)
        );
        assert_eq!(remaining_delay(interval, Duration::ZERO), interval);
        assert_eq!(
            remaining_delay(interval, Duration::from_millis(800)),
            Duration::ZERO
        );
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_stop_detaches_after_grace() {
        let source = Arc::new(SlowSource {
            delay: Duration::from_secs(5),
            reads: AtomicUsize::new(0),
        });
        let (tx, mut rx) = event_channel();
        let poller = PollScheduler::new(source.clone(), tx);

        assert!(poller.start(Duration::from_millis(500)));
        sleep(Duration::from_millis(10)).await;

        let begin = Instant::now();
        poller.stop().await;
        let waited = begin.elapsed();

        assert_eq!(poller.state(), PollState::Idle);
        assert!(waited >= STOP_GRACE && waited < STOP_GRACE + Duration::from_millis(50));
        assert!(logs_contain("detaching"));

        // The detached cycle finishes on its own and then exits
        sleep(Duration::from_secs(6)).await;
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);
        assert_eq!(rx.drain().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_detached_stop() {
        let source = Arc::new(SlowSource {
            delay: Duration::from_secs(3),
            reads: AtomicUsize::new(0),
        });
        let (tx, _rx) = event_channel();
        let poller = PollScheduler::new(source.clone(), tx)
            .with_stop_grace(Duration::from_millis(100));

        poller.start(Duration::from_millis(500));
        sleep(Duration::from_millis(10)).await;
        poller.stop().await;

        assert!(poller.start(Duration::from_millis(500)));
        assert!(poller.is_running());
        poller.stop().await;
    }
}
