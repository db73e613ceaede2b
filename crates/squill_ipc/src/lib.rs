pub mod framing;
pub mod protocol;

pub use protocol::{WorkerRequest, WorkerResponse, WorkerResultBody};

use interprocess::local_socket::{GenericNamespaced, Name, ToNsName};
use std::io;

/// Namespaced socket name for one worker instance.
///
/// Includes the parent pid and a nonce so concurrent app instances never
/// collide.
pub fn worker_socket_name(nonce: u64) -> String {
    format!("squill-worker-{}-{}.sock", std::process::id(), nonce)
}

/// Resolve a socket string to a platform name.
///
/// Linux uses abstract-namespace Unix sockets, macOS sockets in `/tmp`,
/// Windows named pipes; `GenericNamespaced` picks per platform.
pub fn to_socket_name(socket: &str) -> io::Result<Name<'static>> {
    socket.to_string().to_ns_name::<GenericNamespaced>()
}
