use squill_ipc::framing;
use squill_ipc::protocol::{WorkerRequest, WorkerResponse};
use squill_core::{ConnectionConfig, DbError, RemoteExecutor, StatementOutcome, sql};
use interprocess::local_socket::traits::Stream as StreamTrait;
use interprocess::local_socket::Stream as IpcStream;
use log::{debug, info, warn};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

const CONNECT_RETRIES: usize = 40;
const RETRY_DELAY: Duration = Duration::from_millis(50);

static WORKER_NONCE: AtomicU64 = AtomicU64::new(1);

type RecvHalf = <IpcStream as StreamTrait>::RecvHalf;
type SendHalf = <IpcStream as StreamTrait>::SendHalf;

/// Client for the isolated worker process.
///
/// One worker, one in-flight query. `execute` serializes callers behind the
/// execute lock and blocks on the receive half, discarding frames whose id
/// does not match the current query (stale frames from a cancelled
/// predecessor). `cancel_current` goes through the separate send lock so it
/// works while `execute` is blocked reading.
pub struct ProcessWorkerClient {
    send: Mutex<SendHalf>,
    recv: Mutex<RecvHalf>,
    execute_lock: Mutex<()>,
    next_id: AtomicU64,
    /// 0 when idle; queries start at 1.
    current_id: AtomicU64,
    closed: AtomicBool,
    child: Mutex<Option<Child>>,
}

impl ProcessWorkerClient {
    /// Spawn the worker process and connect to it.
    ///
    /// The worker is this same executable in its hidden worker mode; if the
    /// executable path cannot be determined the worker simply is not
    /// available on this install.
    pub fn spawn() -> Result<Self, DbError> {
        let exe = std::env::current_exe().map_err(|e| {
            DbError::WorkerUnavailable(format!("cannot locate executable: {}", e))
        })?;

        let socket = squill_ipc::worker_socket_name(WORKER_NONCE.fetch_add(1, Ordering::SeqCst));

        let child = Command::new(exe)
            .arg("--worker-socket")
            .arg(&socket)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| DbError::WorkerUnavailable(format!("spawn failed: {}", e)))?;

        match Self::connect_with_retry(&socket) {
            Ok(stream) => {
                info!("process worker connected on {}", socket);
                let (recv, send) = stream.split();
                Ok(Self {
                    send: Mutex::new(send),
                    recv: Mutex::new(recv),
                    execute_lock: Mutex::new(()),
                    next_id: AtomicU64::new(1),
                    current_id: AtomicU64::new(0),
                    closed: AtomicBool::new(false),
                    child: Mutex::new(Some(child)),
                })
            }
            Err(e) => {
                let mut child = child;
                let _ = child.kill();
                let _ = child.wait();
                Err(e)
            }
        }
    }

    fn connect_with_retry(socket: &str) -> Result<IpcStream, DbError> {
        let mut last_error = None;
        for _ in 0..CONNECT_RETRIES {
            let name = squill_ipc::to_socket_name(socket)
                .map_err(|e| DbError::WorkerUnavailable(format!("bad socket name: {}", e)))?;
            match IpcStream::connect(name) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
            std::thread::sleep(RETRY_DELAY);
        }

        Err(DbError::WorkerUnavailable(format!(
            "worker did not come up: {}",
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".into())
        )))
    }

    /// Run one statement in the worker, blocking until its terminal frame.
    pub fn execute(
        &self,
        query: &str,
        config: &ConnectionConfig,
        max_rows: Option<usize>,
    ) -> Result<(StatementOutcome, Duration), DbError> {
        // The worker only runs single statements; scripts are the caller's
        // problem.
        if sql::split_statements(query).len() > 1 {
            return Err(DbError::MultiStatementInWorker);
        }

        let _guard = self.execute_lock.lock().expect("execute lock poisoned");

        if self.closed.load(Ordering::SeqCst) {
            return Err(DbError::WorkerUnavailable("worker is closed".into()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.current_id.store(id, Ordering::SeqCst);

        let request = WorkerRequest::Exec {
            id,
            query: query.to_string(),
            config: config.clone(),
            db_type: config.db_type.clone(),
            max_rows,
        };

        let result = self.exchange(id, &request);
        self.current_id.store(0, Ordering::SeqCst);
        result
    }

    fn exchange(
        &self,
        id: u64,
        request: &WorkerRequest,
    ) -> Result<(StatementOutcome, Duration), DbError> {
        self.send_frame(request)?;

        let mut recv = self.recv.lock().expect("recv lock poisoned");
        loop {
            let response: WorkerResponse = framing::recv_msg(&mut *recv).map_err(|e| {
                self.closed.store(true, Ordering::SeqCst);
                DbError::WorkerUnavailable(format!("worker connection closed: {}", e))
            })?;

            // Stale frames from a previous query id are dropped, never
            // surfaced to the caller.
            if response.id() != Some(id) {
                debug!("dropping stale worker frame: {:?}", response.id());
                continue;
            }

            return match response {
                WorkerResponse::Result {
                    outcome,
                    elapsed_ms,
                    ..
                } => Ok((outcome.into(), Duration::from_secs_f64(elapsed_ms / 1000.0))),
                WorkerResponse::Cancelled { .. } => Err(DbError::Cancelled),
                WorkerResponse::Error { message, .. } => {
                    if message == "Worker is busy." {
                        Err(DbError::WorkerBusy)
                    } else {
                        Err(DbError::query_failed(message))
                    }
                }
            };
        }
    }

    /// Send a cancel frame for the in-flight query, without waiting.
    pub fn cancel_current(&self) {
        let id = self.current_id.load(Ordering::SeqCst);
        if id == 0 {
            return;
        }

        if let Err(e) = self.send_frame(&WorkerRequest::Cancel { id }) {
            warn!("failed to send cancel to worker: {}", e);
        }
    }

    fn send_frame(&self, request: &WorkerRequest) -> Result<(), DbError> {
        let mut send = self.send.lock().expect("send lock poisoned");
        framing::send_msg(&mut *send, request).map_err(|e| {
            self.closed.store(true, Ordering::SeqCst);
            DbError::WorkerUnavailable(format!("worker pipe broken: {}", e))
        })
    }

    /// Shut the worker down: polite frame first, then the hammer.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Ok(mut send) = self.send.lock() {
            let _ = framing::send_msg(&mut *send, &WorkerRequest::Shutdown);
        }

        if let Some(mut child) = self.child.lock().expect("child lock poisoned").take() {
            for _ in 0..10 {
                match child.try_wait() {
                    Ok(Some(_)) => return,
                    Ok(None) => std::thread::sleep(Duration::from_millis(100)),
                    Err(_) => break,
                }
            }
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for ProcessWorkerClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl RemoteExecutor for ProcessWorkerClient {
    fn execute(
        &self,
        query: &str,
        config: &ConnectionConfig,
        max_rows: Option<usize>,
    ) -> Result<(StatementOutcome, Duration), DbError> {
        ProcessWorkerClient::execute(self, query, config, max_rows)
    }

    fn cancel_current(&self) {
        ProcessWorkerClient::cancel_current(self)
    }
}
