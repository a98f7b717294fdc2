//! Expiry Sweeper Task
//!
//! Background task that periodically deletes expired cache entries.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheEngine;
use crate::error::CacheError;

// == Sweeper State ==
/// Lifecycle of the sweeper task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweeperState {
    /// Waiting for the next cycle
    Idle,
    /// A sweep cycle is in progress
    Running,
    /// The task has exited; terminal
    Stopped,
}

impl SweeperState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SweeperState::Idle,
            1 => SweeperState::Running,
            _ => SweeperState::Stopped,
        }
    }
}

/// Sweeper state readable from outside the task.
#[derive(Debug)]
pub struct SweeperStatus(AtomicU8);

impl SweeperStatus {
    fn new() -> Self {
        Self(AtomicU8::new(SweeperState::Idle as u8))
    }

    pub fn get(&self) -> SweeperState {
        SweeperState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: SweeperState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

// == Sweeper Handle ==
/// Owner's handle on a running sweeper.
///
/// Dropping the handle without calling [`stop`](Self::stop) also ends the
/// task, after its current cycle.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
    status: Arc<SweeperStatus>,
}

impl SweeperHandle {
    pub fn status(&self) -> Arc<SweeperStatus> {
        self.status.clone()
    }

    /// Signals the task to stop and waits for it to exit.
    ///
    /// A cycle already in progress runs to completion first.
    pub async fn stop(self) {
        // Err only if the task already exited and dropped its receiver
        let _ = self.shutdown.send(true);

        if let Err(e) = self.handle.await {
            warn!("Sweeper task ended abnormally: {}", e);
        }
        self.status.set(SweeperState::Stopped);
    }
}

/// Spawns a background task that sweeps expired entries every `interval`.
///
/// Each cycle runs on tokio's blocking pool, since store deletions are
/// blocking I/O. Cycle failures are logged and never reach foreground callers.
///
/// Must be called from within a tokio runtime.
pub(crate) fn spawn_sweeper(engine: Arc<CacheEngine>, interval: Duration) -> SweeperHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);
    let status = Arc::new(SweeperStatus::new());
    let task_status = status.clone();

    let handle = tokio::spawn(async move {
        info!("Starting expiry sweeper with interval of {:?}", interval);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                // Fires on an explicit stop and when the handle is dropped
                _ = shutdown_rx.changed() => break,
            }

            task_status.set(SweeperState::Running);
            let cycle_engine = engine.clone();
            let outcome = tokio::task::spawn_blocking(move || cycle_engine.sweep()).await;
            task_status.set(SweeperState::Idle);

            match outcome {
                Ok(Ok(report)) if report.removed > 0 || report.failed > 0 => {
                    info!(
                        "Expiry sweep: removed {} expired entries, {} failures",
                        report.removed, report.failed
                    );
                }
                Ok(Ok(_)) => debug!("Expiry sweep: no expired entries found"),
                Ok(Err(CacheError::Closed)) => break,
                Ok(Err(e)) => warn!("Expiry sweep failed: {}", e),
                Err(e) => warn!("Expiry sweep task failed: {}", e),
            }
        }

        task_status.set(SweeperState::Stopped);
        info!("Expiry sweeper stopped");
    });

    SweeperHandle {
        shutdown,
        handle,
        status,
    }
}
