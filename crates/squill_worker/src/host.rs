use squill_ipc::framing;
use squill_ipc::protocol::{WorkerRequest, WorkerResponse};
use squill_core::{
    CancellableQuery, ConnectionConfig, ProviderRegistry, TunnelCache, TunnelFactory,
};
use log::{debug, info, warn};
use std::io::{Read, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared writer behind the send lock: the query thread and the main loop
/// both produce frames.
struct FrameSender<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> FrameSender<W> {
    fn send(&self, response: &WorkerResponse) {
        let mut writer = self.writer.lock().expect("worker send lock poisoned");
        if let Err(e) = framing::send_msg(&mut *writer, response) {
            // The client is gone; the main loop notices on its next read.
            debug!("worker failed to send frame: {}", e);
        }
    }
}

struct WorkerState<W: Write + Send + 'static> {
    sender: Arc<FrameSender<W>>,
    registry: Arc<ProviderRegistry>,
    tunnels: Option<TunnelCache>,
    current_id: Option<u64>,
    current_query: Option<Arc<CancellableQuery>>,
    current_thread: Option<JoinHandle<()>>,
}

impl<W: Write + Send + 'static> WorkerState<W> {
    fn busy(&self) -> bool {
        self.current_thread
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    fn cleanup_current(&mut self) {
        if let Some(thread) = &self.current_thread
            && thread.is_finished()
        {
            let _ = self.current_thread.take().map(JoinHandle::join);
            self.current_query = None;
            self.current_id = None;
        }
    }

    fn start_query(
        &mut self,
        id: u64,
        query: String,
        config: ConnectionConfig,
        db_type: String,
        max_rows: Option<usize>,
    ) {
        let db_type = if db_type.trim().is_empty() {
            config.db_type.clone()
        } else {
            db_type
        };

        if db_type.is_empty() {
            self.sender.send(&WorkerResponse::Error {
                id,
                message: "Missing database type for process worker.".into(),
            });
            return;
        }

        let provider = match self.registry.get(&db_type) {
            Ok(provider) => provider,
            Err(_) => {
                self.sender.send(&WorkerResponse::Error {
                    id,
                    message: format!("Unknown database type for process worker: {}", db_type),
                });
                return;
            }
        };

        // Only single statements run here; the client routes scripts locally.
        if provider.adapter.split_statements(&query).len() > 1 {
            self.sender.send(&WorkerResponse::Error {
                id,
                message: "Multi-statement queries are not supported in the process worker.".into(),
            });
            return;
        }

        let effective_config = match self.ensure_tunnel(&config) {
            Ok(config) => config,
            Err(message) => {
                self.sender.send(&WorkerResponse::Error { id, message });
                return;
            }
        };

        let cancellable = Arc::new(CancellableQuery::new(
            query,
            effective_config,
            provider.adapter.clone(),
        ));

        self.current_id = Some(id);
        self.current_query = Some(cancellable.clone());

        let sender = self.sender.clone();
        self.current_thread = Some(thread::spawn(move || {
            let start = Instant::now();
            let result = cancellable.execute(max_rows);
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

            let response = match result {
                Ok(outcome) => WorkerResponse::Result {
                    id,
                    outcome: outcome.into(),
                    elapsed_ms,
                },
                Err(e) if e.is_cancelled() || cancellable.is_cancelled() => {
                    WorkerResponse::Cancelled { id }
                }
                Err(e) => WorkerResponse::Error {
                    id,
                    message: e.to_string(),
                },
            };

            sender.send(&response);
        }));
    }

    fn ensure_tunnel(&mut self, config: &ConnectionConfig) -> Result<ConnectionConfig, String> {
        let Some(cache) = &self.tunnels else {
            if config.tunnel_key().is_some() {
                return Err("SSH tunnels are not available in this worker.".into());
            }
            return Ok(config.clone());
        };

        match cache.ensure(config) {
            Ok(Some(tunnel)) => Ok(config.with_tunnel_bind(tunnel.local_port())),
            Ok(None) => Ok(config.clone()),
            Err(e) => Err(e.to_string()),
        }
    }

    fn cancel_current(&mut self, id: u64) {
        if self.current_id != Some(id) {
            return;
        }
        if let Some(query) = &self.current_query {
            info!("worker cancelling query {}", id);
            query.cancel();
        }
    }
}

/// Worker process main loop.
///
/// Reads framed requests from `reader`, runs at most one query at a time on
/// a background thread, and answers every `Exec{id}` with exactly one frame
/// carrying that id. A second `Exec` while busy is rejected with a busy
/// error; `Shutdown` or a closed pipe ends the loop, cancelling any
/// in-flight query and tearing down the cached tunnel.
pub fn run_worker<R, W>(
    reader: R,
    writer: W,
    registry: Arc<ProviderRegistry>,
    tunnels: Option<Arc<dyn TunnelFactory>>,
) where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let sender = Arc::new(FrameSender {
        writer: Mutex::new(writer),
    });

    let mut state = WorkerState {
        sender,
        registry,
        tunnels: tunnels.map(TunnelCache::new),
        current_id: None,
        current_query: None,
        current_thread: None,
    };

    // Dedicated reader thread so the main loop can poll for finished query
    // threads between frames.
    let (tx, rx) = mpsc::channel::<WorkerRequest>();
    let reader_thread = thread::spawn(move || {
        let mut reader = reader;
        loop {
            match framing::recv_msg::<_, WorkerRequest>(&mut reader) {
                Ok(request) => {
                    if tx.send(request).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("worker pipe closed: {}", e);
                    break;
                }
            }
        }
    });

    info!("process worker started");

    loop {
        state.cleanup_current();

        let request = match rx.recv_timeout(POLL_INTERVAL) {
            Ok(request) => request,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match request {
            WorkerRequest::Shutdown => break,
            WorkerRequest::Exec {
                id,
                query,
                config,
                db_type,
                max_rows,
            } => {
                if state.busy() {
                    state.sender.send(&WorkerResponse::Error {
                        id,
                        message: "Worker is busy.".into(),
                    });
                } else {
                    state.start_query(id, query, config, db_type, max_rows);
                }
            }
            WorkerRequest::Cancel { id } => state.cancel_current(id),
        }
    }

    if let Some(id) = state.current_id {
        state.cancel_current(id);
    }
    if let Some(thread) = state.current_thread.take()
        && thread.join().is_err()
    {
        warn!("worker query thread panicked during shutdown");
    }
    if let Some(cache) = &state.tunnels {
        cache.close();
    }

    // The reader thread exits when the client closes its half of the pipe;
    // joining it here would wedge shutdown behind a quiet client.
    drop(rx);
    drop(reader_thread);
    info!("process worker stopped");
}
