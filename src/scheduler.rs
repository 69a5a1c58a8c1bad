//! Periodic polling
//!
//! [`spawn_poller`] drives one refresh per tick on a background task and
//! publishes the outcome through a `watch` channel. Cycles never overlap:
//! the next tick is only awaited once the current refresh returned, and
//! ticks missed while a cycle ran long are skipped.
//!
//! The coordinator lock is only taken to fetch the cycle inputs and to
//! publish the result, never while the device is being read. Accepted
//! configuration updates restart the tick cadence with the new scan
//! interval and refresh immediately.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::coordinator::{run_cycle, Connector};
use crate::registry::SharedCoordinator;
use crate::snapshot::Snapshot;

/// What the host currently sees.
#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    /// No cycle has completed yet
    Pending,
    /// Latest data, possibly carried over from an earlier cycle
    Ready(Snapshot),
    /// The error window expired
    Failed { reason: String, failing_for: Duration },
}

impl PollState {
    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            PollState::Ready(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PollState::Failed { .. })
    }
}

/// Handle to a running poller. Dropping it stops the task.
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<PollState>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// New receiver for state updates
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.clone()
    }

    /// Latest published state
    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop polling and wait for an in-flight cycle to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

fn ticker(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Start polling `coordinator` at its configured scan interval.
///
/// The first cycle runs immediately.
pub fn spawn_poller<C>(coordinator: SharedCoordinator<C>) -> PollerHandle
where
    C: Connector + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let (state_tx, state_rx) = watch::channel(PollState::Pending);

    let task = tokio::spawn(async move {
        let (mut config_rx, mut period) = {
            let guard = coordinator.lock().await;
            (guard.subscribe_config(), guard.config().scan_interval)
        };
        let mut ticks = ticker(period);
        info!("Poller started, interval {:?}", period);

        loop {
            tokio::select! {
                biased;
                // Either an explicit stop or the handle was dropped
                _ = shutdown_rx.changed() => break,
                changed = config_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let updated = config_rx.borrow_and_update().scan_interval;
                    if updated != period {
                        info!("Poll interval changed from {:?} to {:?}", period, updated);
                        period = updated;
                    }
                    // First tick of the new cadence fires right away
                    ticks = ticker(period);
                    continue;
                }
                _ = ticks.tick() => {}
            }

            let (config, connector) = coordinator.lock().await.cycle_inputs();
            let result = run_cycle(&config, connector.as_ref()).await;
            let state = match coordinator.lock().await.apply_cycle(result) {
                Ok(snapshot) => {
                    debug!("Publishing snapshot with {} values", snapshot.len());
                    PollState::Ready(snapshot)
                }
                Err(e) => PollState::Failed {
                    reason: e.reason,
                    failing_for: e.failing_for,
                },
            };
            state_tx.send_replace(state);
        }

        info!("Poller stopped");
    });

    PollerHandle {
        shutdown: shutdown_tx,
        state: state_rx,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeatPumpConfig;
    use crate::registers::REGISTER_MAP;
    use crate::testing::{self, Device, MockConnector, SharedDevice};

    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tokio::time::{sleep, timeout, Instant};

    fn shared(
        config: HeatPumpConfig,
        device: Device,
    ) -> (SharedCoordinator<MockConnector>, SharedDevice) {
        let (coordinator, device) = testing::coordinator_with(config, device);
        (Arc::new(Mutex::new(coordinator)), device)
    }

    fn connects(device: &SharedDevice) -> u32 {
        device.lock().unwrap().connects
    }

    #[test]
    fn test_state_accessors() {
        assert!(PollState::Pending.snapshot().is_none());
        assert!(PollState::Ready(Snapshot::empty()).snapshot().is_some());
        assert!(PollState::Failed {
            reason: "x".into(),
            failing_for: Duration::ZERO
        }
        .is_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_surfaces_after_window() {
        let config = testing::config()
            .with_scan_interval(Duration::from_secs(10))
            .with_error_timeout(Duration::from_secs(60));
        let (coordinator, device) = shared(config, Device::default());
        let handle = spawn_poller(coordinator);
        let mut rx = handle.subscribe();
        assert_eq!(handle.state(), PollState::Pending);

        // First failure is hidden behind an empty snapshot
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().snapshot().map(Snapshot::len), Some(0));

        let failed = loop {
            rx.changed().await.unwrap();
            let state = rx.borrow_and_update().clone();
            if state.is_failed() {
                break state;
            }
        };
        match failed {
            PollState::Failed {
                reason,
                failing_for,
            } => {
                assert!(reason.contains("Unable to connect"));
                assert_eq!(failing_for, Duration::from_secs(60));
            }
            other => panic!("unexpected state {:?}", other),
        }
        // One attempt per tick from t=0 to t=60
        assert_eq!(connects(&device), 7);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_polling() {
        let config = testing::config().with_scan_interval(Duration::from_secs(10));
        let (coordinator, device) = shared(config, Device::default());
        let handle = spawn_poller(coordinator);
        let mut rx = handle.subscribe();
        rx.changed().await.unwrap();
        assert!(handle.is_running());

        handle.shutdown().await;
        let attempts = connects(&device);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(connects(&device), attempts);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_completes_while_poll_is_in_flight() {
        let mut device = Device::fully_populated();
        device.read_delay = Duration::from_secs(1);
        let (coordinator, device) = shared(testing::config(), device);
        let writer = coordinator.lock().await.writer();
        let handle = spawn_poller(coordinator.clone());

        // One second per register, so the first cycle is still reading
        sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.state(), PollState::Pending);

        let written = timeout(Duration::from_secs(1), writer.write_register(723, 215)).await;
        assert_eq!(written, Ok(true));
        assert_eq!(device.lock().unwrap().writes, vec![(723, 215)]);
        {
            let status = timeout(Duration::from_secs(1), coordinator.lock()).await;
            assert!(status.is_ok());
        }
        assert_eq!(handle.state(), PollState::Pending);

        let mut rx = handle.subscribe();
        rx.changed().await.unwrap();
        let len = rx.borrow().snapshot().map(Snapshot::len);
        assert_eq!(len, Some(REGISTER_MAP.len()));
        assert_eq!(connects(&device), 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_interval_update_reaches_running_poller() {
        let (coordinator, device) = shared(testing::config(), Device::fully_populated());
        let handle = spawn_poller(coordinator.clone());
        let mut rx = handle.subscribe();
        rx.changed().await.unwrap();
        assert_eq!(connects(&device), 1);

        let start = Instant::now();
        let slower = testing::config().with_scan_interval(Duration::from_secs(300));
        coordinator.lock().await.update_config(slower).unwrap();

        // Accepting the update refreshes right away
        rx.changed().await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(connects(&device), 2);

        // Nothing at the old 60 s cadence
        sleep(Duration::from_secs(299)).await;
        assert_eq!(connects(&device), 2);
        sleep(Duration::from_secs(2)).await;
        assert_eq!(connects(&device), 3);

        handle.shutdown().await;
    }
}
