//! IPC server — Unix socket listener, per-client state, message framing.
//!
//! Messages are length-prefixed s-expression payloads (4-byte big-endian
//! length, then UTF-8 text).  Clients authenticate with a `hello`
//! handshake before anything else is accepted; event broadcasts only go
//! to authenticated clients.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Instant;

use calloop::generic::Generic;
use calloop::{Interest, LoopHandle, Mode, PostAction};
use tracing::{debug, error, info, warn};

use super::dispatch;
use crate::state::AirpointState;

/// Maximum message payload size (256 KiB — frames are the largest input).
const MAX_MESSAGE_SIZE: u32 = 262_144;

/// Maximum pending write bytes before events are dropped for a client.
const MAX_WRITE_BUFFER: usize = 65_536;

/// Messages per second allowed per client.  Frame injection at sensor
/// rate plus queries fits comfortably under this.
const RATE_LIMIT_PER_SECOND: u32 = 200;

// ── Rate limiting ──────────────────────────────────────────

/// Fixed-window per-client rate limiter.
pub struct RateLimiter {
    window_start: Instant,
    count: u32,
    pub max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self {
            window_start: Instant::now(),
            count: 0,
            max_per_second,
        }
    }

    /// Account one message; false means the client is over its limit.
    fn allow(&mut self) -> bool {
        if self.window_start.elapsed().as_secs() >= 1 {
            self.window_start = Instant::now();
            self.count = 1;
            true
        } else {
            self.count += 1;
            self.count <= self.max_per_second
        }
    }
}

// ── Peer credentials ───────────────────────────────────────

/// Read peer UID/PID via SO_PEERCRED (Linux); None elsewhere.
fn peer_credentials(stream: &UnixStream) -> (Option<u32>, Option<i32>) {
    #[cfg(target_os = "linux")]
    {
        let fd = stream.as_raw_fd();
        let mut cred: libc::ucred = unsafe { std::mem::zeroed() };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;
        let ret = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                &mut cred as *mut _ as *mut libc::c_void,
                &mut len,
            )
        };
        if ret == 0 {
            return (Some(cred.uid), Some(cred.pid));
        }
    }
    #[cfg(not(target_os = "linux"))]
    let _ = stream;
    (None, None)
}

// ── Client state ───────────────────────────────────────────

/// One connected IPC client.
pub struct IpcClient {
    pub stream: UnixStream,
    read_buf: Vec<u8>,
    write_buf: Vec<u8>,
    pub authenticated: bool,
    pub id: u64,
    pub peer_uid: Option<u32>,
    pub peer_pid: Option<i32>,
    pub rate_limiter: RateLimiter,
}

impl IpcClient {
    fn new(stream: UnixStream, id: u64) -> Self {
        stream.set_nonblocking(true).ok();
        let (peer_uid, peer_pid) = peer_credentials(&stream);
        if let Some(uid) = peer_uid {
            debug!(id, peer_uid = uid, peer_pid = ?peer_pid, "peer credentials");
        }
        Self {
            stream,
            read_buf: Vec::with_capacity(4096),
            write_buf: Vec::new(),
            authenticated: false,
            id,
            peer_uid,
            peer_pid,
            rate_limiter: RateLimiter::new(RATE_LIMIT_PER_SECOND),
        }
    }

    /// Pull whatever is readable into the buffer and return all complete
    /// framed payloads.  Err means the client disconnected.
    fn read_messages(&mut self) -> io::Result<Vec<String>> {
        let mut buf = [0u8; 4096];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => return Err(io::Error::new(io::ErrorKind::ConnectionReset, "eof")),
                Ok(n) => self.read_buf.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }

        let mut messages = Vec::new();
        loop {
            if self.read_buf.len() < 4 {
                break;
            }
            let len = u32::from_be_bytes([
                self.read_buf[0],
                self.read_buf[1],
                self.read_buf[2],
                self.read_buf[3],
            ]);
            if len > MAX_MESSAGE_SIZE {
                // Protocol violation; discard everything buffered.
                error!(client_id = self.id, len, "message exceeds maximum size");
                self.read_buf.clear();
                break;
            }
            let total = 4 + len as usize;
            if self.read_buf.len() < total {
                break;
            }
            messages.push(String::from_utf8_lossy(&self.read_buf[4..total]).to_string());
            self.read_buf.drain(..total);
        }
        Ok(messages)
    }

    /// Enqueue a framed message for sending.
    pub fn enqueue_message(&mut self, payload: &str) {
        let bytes = payload.as_bytes();
        self.write_buf
            .extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        self.write_buf.extend_from_slice(bytes);
    }

    /// Enqueue an event, dropping it when the client is not draining.
    fn enqueue_event(&mut self, payload: &str) {
        if self.write_buf.len() > MAX_WRITE_BUFFER {
            warn!(client_id = self.id, "write buffer overflow, dropping event");
            return;
        }
        self.enqueue_message(payload);
    }

    /// Flush pending writes as far as the socket allows.
    fn flush_writes(&mut self) -> io::Result<()> {
        while !self.write_buf.is_empty() {
            match self.stream.write(&self.write_buf) {
                Ok(0) => return Err(io::Error::new(io::ErrorKind::WriteZero, "write zero")),
                Ok(n) => {
                    self.write_buf.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

// ── Server ─────────────────────────────────────────────────

/// IPC server managing the listener socket and all client connections.
pub struct IpcServer {
    pub socket_path: PathBuf,
    pub clients: HashMap<u64, IpcClient>,
    next_client_id: u64,
    pub ipc_trace: bool,
}

impl IpcServer {
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            clients: HashMap::new(),
            next_client_id: 1,
            ipc_trace: false,
        }
    }

    /// Default socket path under the user runtime directory.
    pub fn default_socket_path() -> PathBuf {
        let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
            .unwrap_or_else(|_| format!("/tmp/airpoint-{}", unsafe { libc::getuid() }));
        PathBuf::from(runtime_dir).join("airpoint-ipc.sock")
    }

    /// Bind the listener socket and register it with the event loop.
    pub fn bind(
        socket_path: &Path,
        loop_handle: &LoopHandle<'static, AirpointState>,
    ) -> anyhow::Result<()> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        listener.set_nonblocking(true)?;

        // Owner-only socket
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o700))?;
        }

        info!(?socket_path, "IPC server listening");

        let source = Generic::new(listener, Interest::READ, Mode::Level);
        loop_handle.insert_source(source, |_event, listener, state| {
            loop {
                match listener.accept() {
                    Ok((stream, _addr)) => {
                        let client_id = state.ipc_server.next_client_id;
                        state.ipc_server.next_client_id += 1;
                        info!(client_id, "IPC client connected");
                        state
                            .ipc_server
                            .clients
                            .insert(client_id, IpcClient::new(stream, client_id));
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        error!("accept error: {}", e);
                        break;
                    }
                }
            }
            Ok(PostAction::Continue)
        })?;

        Ok(())
    }

    /// Read, dispatch, and flush all clients.  Called once per loop
    /// iteration.
    pub fn poll_clients(state: &mut AirpointState) {
        let client_ids: Vec<u64> = state.ipc_server.clients.keys().copied().collect();
        let mut disconnected = Vec::new();

        for client_id in client_ids {
            let messages = {
                let client = state.ipc_server.clients.get_mut(&client_id).unwrap();
                match client.read_messages() {
                    Ok(msgs) => msgs,
                    Err(e) => {
                        debug!(client_id, "client disconnected: {}", e);
                        disconnected.push(client_id);
                        continue;
                    }
                }
            };

            for raw in messages {
                let allowed = state
                    .ipc_server
                    .clients
                    .get_mut(&client_id)
                    .map(|c| c.rate_limiter.allow())
                    .unwrap_or(false);
                if !allowed {
                    warn!(client_id, "rate limit exceeded, dropping message");
                    if let Some(client) = state.ipc_server.clients.get_mut(&client_id) {
                        client.enqueue_message(
                            "(:type :response :id 0 :status :error :reason \"rate limit exceeded\")",
                        );
                    }
                    continue;
                }

                if state.ipc_server.ipc_trace {
                    info!(client_id, "<< {}", raw);
                }
                if let Some(response) = dispatch::handle_message(state, client_id, &raw) {
                    if state.ipc_server.ipc_trace {
                        info!(client_id, ">> {}", response);
                    }
                    if let Some(client) = state.ipc_server.clients.get_mut(&client_id) {
                        client.enqueue_message(&response);
                    }
                }
            }

            if let Some(client) = state.ipc_server.clients.get_mut(&client_id) {
                if let Err(e) = client.flush_writes() {
                    debug!(client_id, "write error: {}", e);
                    disconnected.push(client_id);
                }
            }
        }

        for id in disconnected {
            info!(client_id = id, "removing disconnected IPC client");
            state.ipc_server.clients.remove(&id);
        }
    }

    /// Broadcast an event to all authenticated clients.
    pub fn broadcast_event(&mut self, event: &str) {
        if self.ipc_trace {
            info!("broadcast >> {}", event);
        }
        for client in self.clients.values_mut() {
            if client.authenticated {
                client.enqueue_event(event);
            }
        }
    }
}
