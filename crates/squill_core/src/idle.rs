use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Low-priority deferred work: worker warm-up, idle auto-shutdown, schema
/// prefetch.
///
/// Each job has a name; scheduling a name that is already pending replaces
/// the previous job (the auto-shutdown timer re-arms this way on every use).
/// All pending jobs are dropped on `cancel_all` and on app exit.
pub struct IdleScheduler {
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
    debug: bool,
}

impl IdleScheduler {
    pub fn new(debug: bool) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            debug,
        }
    }

    /// Run `job` after `delay`, replacing any pending job with the same name.
    pub fn schedule<F>(&self, name: &str, delay: Duration, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.debug {
            log::debug!("idle: scheduling {:?} in {:?}", name, delay);
        }

        let debug = self.debug;
        let label = name.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if debug {
                log::debug!("idle: running {:?}", label);
            }
            job();
        });

        let mut jobs = self.jobs.lock().expect("idle scheduler poisoned");
        if let Some(previous) = jobs.insert(name.to_string(), handle) {
            previous.abort();
        }
    }

    /// Drop a pending job by name. No-op when nothing is pending.
    pub fn cancel(&self, name: &str) {
        let mut jobs = self.jobs.lock().expect("idle scheduler poisoned");
        if let Some(handle) = jobs.remove(name) {
            handle.abort();
            if self.debug {
                log::debug!("idle: cancelled {:?}", name);
            }
        }
    }

    pub fn cancel_all(&self) {
        let mut jobs = self.jobs.lock().expect("idle scheduler poisoned");
        for (_, handle) in jobs.drain() {
            handle.abort();
        }
    }
}

impl Drop for IdleScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn scheduled_job_runs_after_delay() {
        let scheduler = IdleScheduler::new(false);
        let ran = Arc::new(AtomicUsize::new(0));

        let counter = ran.clone();
        scheduler.schedule("warm", Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rescheduling_replaces_pending_job() {
        let scheduler = IdleScheduler::new(false);
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = ran.clone();
            scheduler.schedule("shutdown", Duration::from_millis(20), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_drops_pending_job() {
        let scheduler = IdleScheduler::new(false);
        let ran = Arc::new(AtomicUsize::new(0));

        let counter = ran.clone();
        scheduler.schedule("warm", Duration::from_millis(20), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.cancel("warm");

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
