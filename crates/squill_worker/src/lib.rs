mod client;
mod host;
mod lifecycle;

pub use client::ProcessWorkerClient;
pub use host::run_worker;
pub use lifecycle::{RemoteWorker, WorkerLifecycle};

use squill_core::{DbError, ProviderRegistry, TunnelFactory};
use std::sync::Arc;

/// Entry point for the hidden worker mode of the `squill` binary.
///
/// Connects back to the socket the parent is listening on (the parent
/// retries its connect, so bind order does not matter) and runs the worker
/// loop until shutdown or pipe close.
pub fn run_worker_mode(
    socket: &str,
    registry: Arc<ProviderRegistry>,
    tunnels: Option<Arc<dyn TunnelFactory>>,
) -> Result<(), DbError> {
    use interprocess::local_socket::{ListenerOptions, prelude::*};

    let name = squill_ipc::to_socket_name(socket)
        .map_err(|e| DbError::WorkerUnavailable(format!("bad socket name: {}", e)))?;

    let listener = ListenerOptions::new()
        .name(name)
        .create_sync()
        .map_err(|e| DbError::WorkerUnavailable(format!("failed to bind {}: {}", socket, e)))?;

    let stream = listener
        .accept()
        .map_err(|e| DbError::WorkerUnavailable(format!("accept failed: {}", e)))?;

    let (reader, writer) = stream.split();
    run_worker(reader, writer, registry, tunnels);
    Ok(())
}
