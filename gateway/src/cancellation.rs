//! Cancellation Monitor (base spec §4.8). A single daemon task per run polls run
//! status and flips an atomic flag the stream loop checks before every token;
//! grounded on `start_cancellation_listener` / `check_cancellation_flag` in the source
//! this spec was distilled from.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::storage::{RunStatus, StorageClient};

/// Cooperative cancellation flag shared between the monitor task and the stream loop.
/// Single writer (the monitor task); the stream loop only ever reads it, so no lock is
/// needed (base spec §5 "Shared resources").
#[derive(Clone)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl Default for CancellationFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Guards against starting a second monitor for a run already being watched (base spec
/// §8 round-trip property: "Re-starting the cancellation monitor for a run already
/// being monitored is a no-op").
pub struct CancellationMonitor {
    flag: CancellationFlag,
    started: Arc<AtomicBool>,
}

impl CancellationMonitor {
    pub fn new() -> Self {
        Self {
            flag: CancellationFlag::new(),
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn flag(&self) -> CancellationFlag {
        self.flag.clone()
    }

    /// Spawns the poll task if not already running for this monitor instance. Returns
    /// `false` without spawning if it was already started (idempotent start).
    pub fn start(&self, storage: Arc<dyn StorageClient>, run_id: String, poll_interval: Duration) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            return false;
        }
        let flag = self.flag.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(poll_interval).await;
                match storage.get_run_status(&run_id).await {
                    Ok(RunStatus::Cancelling) | Ok(RunStatus::Cancelled) => {
                        flag.set();
                        break;
                    }
                    Ok(RunStatus::Completed)
                    | Ok(RunStatus::Failed)
                    | Ok(RunStatus::Expired) => break,
                    _ => continue,
                }
            }
        });
        true
    }
}

impl Default for CancellationMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fake::FakeStorageClient;

    #[tokio::test]
    async fn starting_twice_is_a_no_op() {
        let monitor = CancellationMonitor::new();
        let storage: Arc<dyn StorageClient> = Arc::new(FakeStorageClient::new());
        assert!(monitor.start(storage.clone(), "run-1".to_string(), Duration::from_millis(10)));
        assert!(!monitor.start(storage, "run-1".to_string(), Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn flips_flag_when_run_is_cancelling() {
        let monitor = CancellationMonitor::new();
        let storage = Arc::new(FakeStorageClient::new());
        storage.set_run_status("run-1", RunStatus::Cancelling).await;
        let storage: Arc<dyn StorageClient> = storage;
        monitor.start(storage, "run-1".to_string(), Duration::from_millis(5));
        let flag = monitor.flag();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(flag.is_cancelled());
    }
}
