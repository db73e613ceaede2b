use crate::ProcessWorkerClient;
use squill_core::{
    ConnectionConfig, DbError, IdleScheduler, RemoteExecutor, StatementOutcome,
};
use log::{info, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const WARM_DELAY: Duration = Duration::from_millis(500);
const SHUTDOWN_JOB: &str = "worker-auto-shutdown";
const WARM_JOB: &str = "worker-warm";

/// Owns the worker client across its warm/lazy lifecycle.
///
/// - `warm_on_idle` spawns the worker from an idle callback so the first
///   query does not pay startup cost.
/// - a positive `auto_shutdown` arms a timer on every use; with no use
///   inside the window and no query running, the worker is closed.
/// - `close` tears everything down and clears the timers.
pub struct WorkerLifecycle {
    client: Mutex<Option<Arc<ProcessWorkerClient>>>,
    scheduler: Arc<IdleScheduler>,
    auto_shutdown: Mutex<Option<Duration>>,
}

impl WorkerLifecycle {
    pub fn new(scheduler: Arc<IdleScheduler>) -> Arc<Self> {
        Arc::new(Self {
            client: Mutex::new(None),
            scheduler,
            auto_shutdown: Mutex::new(None),
        })
    }

    pub fn set_auto_shutdown(&self, window: Option<Duration>) {
        *self.auto_shutdown.lock().expect("lifecycle poisoned") = window;
        if window.is_none() {
            self.scheduler.cancel(SHUTDOWN_JOB);
        }
    }

    /// Schedule a low-priority worker spawn so the first query is fast.
    pub fn warm_on_idle(self: &Arc<Self>) {
        let lifecycle = self.clone();
        self.scheduler.schedule(WARM_JOB, WARM_DELAY, move || {
            if let Err(e) = lifecycle.ensure_client() {
                warn!("worker warm-up failed: {}", e);
            }
        });
    }

    fn ensure_client(&self) -> Result<Arc<ProcessWorkerClient>, DbError> {
        let mut slot = self.client.lock().expect("lifecycle poisoned");
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let client = Arc::new(ProcessWorkerClient::spawn()?);
        info!("process worker spawned");
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Re-arm the idle shutdown timer after a use.
    fn touch(self: &Arc<Self>) {
        let Some(window) = *self.auto_shutdown.lock().expect("lifecycle poisoned") else {
            return;
        };

        let lifecycle = self.clone();
        self.scheduler.schedule(SHUTDOWN_JOB, window, move || {
            info!("worker idle for {:?}, shutting down", window);
            lifecycle.shutdown_worker();
        });
    }

    fn shutdown_worker(&self) {
        if let Some(client) = self.client.lock().expect("lifecycle poisoned").take() {
            client.close();
        }
    }

    /// Tear down the worker and all pending timers.
    pub fn close(&self) {
        self.scheduler.cancel(WARM_JOB);
        self.scheduler.cancel(SHUTDOWN_JOB);
        self.shutdown_worker();
    }
}

/// Wraps the lifecycle's `Arc` so `RemoteExecutor` (a foreign trait) can be
/// implemented for it without running afoul of the orphan rules.
pub struct RemoteWorker(pub Arc<WorkerLifecycle>);

impl RemoteExecutor for RemoteWorker {
    fn execute(
        &self,
        query: &str,
        config: &ConnectionConfig,
        max_rows: Option<usize>,
    ) -> Result<(StatementOutcome, Duration), DbError> {
        let client = self.0.ensure_client()?;
        let result = client.execute(query, config, max_rows);

        // A dead pipe means the worker is gone; drop the client so the next
        // call respawns instead of failing forever.
        if matches!(result, Err(DbError::WorkerUnavailable(_))) {
            self.0.shutdown_worker();
        }

        self.0.touch();
        result
    }

    fn cancel_current(&self) {
        if let Some(client) = self.0.client.lock().expect("lifecycle poisoned").as_ref() {
            client.cancel_current();
        }
    }
}
