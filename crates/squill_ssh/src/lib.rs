//! SSH tunneling for squill sessions and the process worker.
//!
//! One tunnel forwards a random loopback port to the database endpoint
//! through a bastion host. All libssh2 calls stay on a single thread; the
//! forwarder multiplexes every client connection in one loop.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use squill_core::{ConnectionConfig, DbError, Tunnel, TunnelAuth, TunnelConfig, TunnelFactory};
use ssh2::Session;

const SSH_TIMEOUT: Duration = Duration::from_secs(30);

/// An active tunnel. Forwarding stops when `stop` is called or the value is
/// dropped.
pub struct SshTunnel {
    local_port: u16,
    shutdown: Arc<AtomicBool>,
    #[allow(dead_code)]
    forwarder: JoinHandle<()>,
}

impl SshTunnel {
    /// Open a tunnel to `remote_host:remote_port` through the configured
    /// bastion. Verifies the bastion can actually reach the target before
    /// returning.
    pub fn open(
        tunnel: &TunnelConfig,
        remote_host: &str,
        remote_port: u16,
    ) -> Result<Self, DbError> {
        let session = establish_session(tunnel)?;

        session.set_blocking(true);
        let probe = session
            .channel_direct_tcpip(remote_host, remote_port, None)
            .map_err(|e| {
                DbError::tunnel_failed(format!(
                    "cannot reach {}:{} through {}: {}",
                    remote_host, remote_port, tunnel.host, e
                ))
            })?;
        drop(probe);

        let listener = TcpListener::bind("127.0.0.1:0")
            .map_err(|e| DbError::tunnel_failed(format!("failed to bind local port: {}", e)))?;
        let local_port = listener
            .local_addr()
            .map_err(|e| DbError::tunnel_failed(format!("failed to read local address: {}", e)))?
            .port();
        listener
            .set_nonblocking(true)
            .map_err(|e| DbError::tunnel_failed(format!("failed to configure listener: {}", e)))?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let forwarder = {
            let shutdown = shutdown.clone();
            let remote_host = remote_host.to_string();
            thread::spawn(move || forward_loop(listener, session, remote_host, remote_port, shutdown))
        };

        log::info!("ssh tunnel up: 127.0.0.1:{} -> {}:{}", local_port, remote_host, remote_port);

        Ok(Self {
            local_port,
            shutdown,
            forwarder,
        })
    }
}

impl Tunnel for SshTunnel {
    fn local_port(&self) -> u16 {
        self.local_port
    }

    fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

impl Drop for SshTunnel {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

/// Opens tunnels from a config's tunnel block; the session factory and the
/// worker both consume this through the `TunnelFactory` trait.
pub struct SshTunnelFactory;

impl TunnelFactory for SshTunnelFactory {
    fn open(&self, config: &ConnectionConfig) -> Result<Arc<dyn Tunnel>, DbError> {
        let tunnel = config
            .tunnel
            .as_ref()
            .filter(|t| t.enabled)
            .ok_or_else(|| DbError::tunnel_failed("config has no enabled tunnel block"))?;

        let host = config
            .endpoint
            .host()
            .ok_or_else(|| DbError::tunnel_failed("tunnels require a TCP endpoint"))?;
        let port = config
            .endpoint
            .port()
            .ok_or_else(|| DbError::tunnel_failed("tunnels require an endpoint port"))?;

        Ok(Arc::new(SshTunnel::open(tunnel, host, port)?))
    }
}

fn establish_session(config: &TunnelConfig) -> Result<Session, DbError> {
    let tcp = TcpStream::connect((&*config.host, config.port)).map_err(|e| {
        DbError::tunnel_failed(format!(
            "failed to connect to SSH server {}:{}: {}",
            config.host, config.port, e
        ))
    })?;

    tcp.set_nodelay(true).ok();
    tcp.set_read_timeout(Some(SSH_TIMEOUT)).ok();
    tcp.set_write_timeout(Some(SSH_TIMEOUT)).ok();

    let mut session = Session::new()
        .map_err(|e| DbError::tunnel_failed(format!("failed to create SSH session: {}", e)))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(SSH_TIMEOUT.as_millis() as u32);
    session
        .handshake()
        .map_err(|e| DbError::tunnel_failed(format!("SSH handshake failed: {}", e)))?;

    match &config.auth {
        TunnelAuth::Password => {
            let password = config
                .password
                .as_deref()
                .ok_or_else(|| DbError::tunnel_failed("SSH password required but not provided"))?;
            session
                .userauth_password(&config.username, password)
                .map_err(|e| {
                    DbError::auth_failed(format!("SSH password authentication failed: {}", e))
                })?;
        }
        TunnelAuth::Key { key_path } => {
            authenticate_with_key(
                &session,
                &config.username,
                key_path.as_deref(),
                config.password.as_deref(),
            )?;
        }
    }

    if !session.authenticated() {
        return Err(DbError::auth_failed("SSH authentication failed"));
    }

    Ok(session)
}

fn expand_tilde(path: &Path) -> std::path::PathBuf {
    let Some(home) = dirs::home_dir() else {
        return path.to_path_buf();
    };

    let path_str = path.to_string_lossy();
    if let Some(stripped) = path_str.strip_prefix("~/") {
        return home.join(stripped);
    }
    if path_str == "~" {
        return home;
    }
    path.to_path_buf()
}

fn authenticate_with_key(
    session: &Session,
    user: &str,
    key_path: Option<&Path>,
    passphrase: Option<&str>,
) -> Result<(), DbError> {
    // The agent only gets a shot when no explicit key was configured; an
    // explicit key means the user wants that key, and agent calls can hang
    // in some setups.
    if key_path.is_none() {
        match session.userauth_agent(user) {
            Ok(()) if session.authenticated() => {
                log::debug!("ssh: authenticated via agent");
                return Ok(());
            }
            Ok(()) => {}
            Err(e) => log::debug!("ssh: agent unavailable: {}", e),
        }
    }

    let candidates: Vec<std::path::PathBuf> = match key_path {
        Some(path) => vec![expand_tilde(path)],
        None => {
            let home = dirs::home_dir().unwrap_or_default();
            vec![
                home.join(".ssh/id_rsa"),
                home.join(".ssh/id_ed25519"),
                home.join(".ssh/id_ecdsa"),
            ]
        }
    };

    let mut last_error: Option<String> = None;
    for path in &candidates {
        if !path.exists() {
            continue;
        }

        match session.userauth_pubkey_file(user, None, path, passphrase) {
            Ok(()) if session.authenticated() => {
                log::debug!("ssh: authenticated with key {}", path.display());
                return Ok(());
            }
            Ok(()) => {
                last_error = Some(format!("key {} not accepted by server", path.display()));
            }
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    Err(DbError::auth_failed(format!(
        "SSH key authentication failed: {}",
        last_error.unwrap_or_else(|| "no usable SSH keys found".to_string())
    )))
}

/// One forwarded connection: a client TCP stream paired with its SSH
/// channel.
struct ForwardedConn {
    client: TcpStream,
    channel: ssh2::Channel,
    buf: Vec<u8>,
    closed: bool,
}

impl ForwardedConn {
    fn new(client: TcpStream, channel: ssh2::Channel) -> std::io::Result<Self> {
        client.set_nodelay(true)?;
        client.set_nonblocking(true)?;
        Ok(Self {
            client,
            channel,
            buf: vec![0u8; 8192],
            closed: false,
        })
    }

    /// Shuttle bytes in both directions. Returns true when any moved.
    fn pump(&mut self) -> bool {
        if self.closed {
            return false;
        }

        let mut moved = false;

        match self.client.read(&mut self.buf) {
            Ok(0) => {
                self.closed = true;
                return false;
            }
            Ok(n) => {
                if self.channel.write_all(&self.buf[..n]).is_err() {
                    self.closed = true;
                    return false;
                }
                moved = true;
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(_) => {
                self.closed = true;
                return false;
            }
        }

        match self.channel.read(&mut self.buf) {
            Ok(0) => {
                self.closed = true;
                return false;
            }
            Ok(n) => {
                if self.client.write_all(&self.buf[..n]).is_err() {
                    self.closed = true;
                    return false;
                }
                moved = true;
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(_) => {
                self.closed = true;
                return false;
            }
        }

        moved
    }
}

/// Single-threaded forwarder multiplexing all connections, keeping every
/// libssh2 call on this one thread.
fn forward_loop(
    listener: TcpListener,
    session: Session,
    remote_host: String,
    remote_port: u16,
    shutdown: Arc<AtomicBool>,
) {
    session.set_blocking(false);
    let mut conns: Vec<ForwardedConn> = Vec::new();

    while !shutdown.load(Ordering::SeqCst) {
        let mut active = false;

        match listener.accept() {
            Ok((client, _)) => {
                session.set_blocking(true);
                match session.channel_direct_tcpip(&remote_host, remote_port, None) {
                    Ok(channel) => {
                        session.set_blocking(false);
                        match ForwardedConn::new(client, channel) {
                            Ok(conn) => {
                                conns.push(conn);
                                active = true;
                            }
                            Err(e) => log::warn!("ssh: failed to set up forwarded conn: {}", e),
                        }
                    }
                    Err(e) => {
                        session.set_blocking(false);
                        log::warn!("ssh: failed to open channel: {}", e);
                    }
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => {
                log::warn!("ssh: listener error: {}", e);
                break;
            }
        }

        for conn in &mut conns {
            if conn.pump() {
                active = true;
            }
        }

        conns.retain(|c| !c.closed);

        if !active {
            thread::sleep(Duration::from_micros(500));
        }
    }

    log::debug!("ssh: forwarder loop exiting");
}
