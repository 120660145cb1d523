//! Background expiry sweeper.
//!
//! Periodically removes expired locks so abandoned ones do not pile up in
//! the store. The first pass runs immediately on start. A failed pass is
//! logged and the next one runs on schedule; the sweeper only stops when
//! shut down.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};

use crate::{config::LockConfig, coordinator::LockCoordinator, Error, Result};

/// Result of one sweep pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub swept: u64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ExpirySweeper {
    coordinator: LockCoordinator,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(coordinator: LockCoordinator, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::InvalidConfig(
                "sweep interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            coordinator,
            interval,
        })
    }

    pub fn from_config(coordinator: LockCoordinator, config: &LockConfig) -> Result<Self> {
        Self::new(coordinator, config.sweep_interval())
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a single sweep pass now.
    pub async fn run_once(&self) -> Result<SweepReport> {
        let at = self.coordinator.now();
        let swept = self.coordinator.sweep_expired(at).await?;
        if swept == 0 {
            tracing::debug!("No expired locks to clean up");
        }
        Ok(SweepReport { swept, at })
    }

    /// Start sweeping on a background task.
    #[must_use]
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (report_tx, report_rx) = watch::channel(None);

        tracing::info!(interval_secs = self.interval.as_secs(), "Starting expiry sweeper");
        let task = tokio::spawn(self.run(shutdown_rx, report_tx));

        SweeperHandle {
            shutdown_tx,
            reports: report_rx,
            task: Some(task),
        }
    }

    async fn run(
        self,
        mut shutdown_rx: broadcast::Receiver<()>,
        report_tx: watch::Sender<Option<SweepReport>>,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!("Expiry sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(report) => {
                            report_tx.send_replace(Some(report));
                        }
                        Err(e) => {
                            tracing::error!(
                                error = %e,
                                code = e.code(),
                                "Error cleaning up expired locks"
                            );
                        }
                    }
                }
            }
        }
    }
}

/// Handle to a running sweeper. Dropping it aborts the task.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown_tx: broadcast::Sender<()>,
    reports: watch::Receiver<Option<SweepReport>>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Most recent successful pass, if any.
    #[must_use]
    pub fn last_report(&self) -> Option<SweepReport> {
        *self.reports.borrow()
    }

    /// Receiver that observes every successful pass.
    #[must_use]
    pub fn reports(&self) -> watch::Receiver<Option<SweepReport>> {
        self.reports.clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the sweeper and wait for the in-flight pass to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Expiry sweeper task failed");
            }
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
