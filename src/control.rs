//! Unix socket control endpoint for pid registration commands.
//!
//! Protocol: newline-delimited JSON objects, one response per request line,
//! in order, on the same connection.
//!
//! Commands:
//!     {"cmd": "register", "pid": 1234, "account": "alice"}
//!     {"cmd": "unregister", "pid": 1234}
//!     {"cmd": "query", "pid": 1234}
//!     {"cmd": "list"}
//!     {"cmd": "cleanup"}

use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::io::AsRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use nix::sys::socket::{getsockopt, sockopt};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::registry::AccountRegistry;

pub const CONTROL_SOCKET_FILE: &str = "control.sock";

/// How often the reaper drops registrations whose pid has exited.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Cap on what a single connection may buffer before being dispatched.
const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// How often the accept loop checks for shutdown while idle.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct ControlServer {
    socket_path: PathBuf,
    shutdown: Sender<()>,
    threads: Vec<JoinHandle<()>>,
}

impl ControlServer {
    /// Binds the control socket and spawns the accept loop and the stale
    /// reaper. The socket inode is restricted to owner-only access.
    pub fn start(
        socket_path: PathBuf,
        registry: Arc<AccountRegistry>,
        allowed_uid: Option<u32>,
        sweep_interval: Duration,
    ) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {:?}", parent))?;
        }
        if socket_path.exists() {
            fs::remove_file(&socket_path)
                .with_context(|| format!("failed to remove stale socket {:?}", socket_path))?;
        }

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("failed to bind {:?}", socket_path))?;
        if let Err(e) = fs::set_permissions(&socket_path, fs::Permissions::from_mode(0o600)) {
            log::warn!("could not set control socket permissions: {}", e);
        }
        listener
            .set_nonblocking(true)
            .context("failed to set control socket non-blocking")?;

        let (shutdown, shutdown_rx) = crossbeam_channel::unbounded();

        let accept_registry = Arc::clone(&registry);
        let accept_rx = shutdown_rx.clone();
        let accept_thread = thread::spawn(move || {
            accept_loop(listener, accept_registry, allowed_uid, accept_rx);
        });

        let reaper_registry = Arc::clone(&registry);
        let reaper_thread = thread::spawn(move || {
            reaper_loop(reaper_registry, sweep_interval, shutdown_rx);
        });

        log::info!("control socket listening at {:?}", socket_path);
        Ok(Self {
            socket_path,
            shutdown,
            threads: vec![accept_thread, reaper_thread],
        })
    }

    /// Stops accepting connections and the reaper, then removes the socket
    /// file. In-flight handlers finish on their own.
    pub fn stop(self) {
        drop(self.shutdown);
        for handle in self.threads {
            let _ = handle.join();
        }
        let _ = fs::remove_file(&self.socket_path);
        log::info!("control socket closed");
    }
}

fn accept_loop(
    listener: UnixListener,
    registry: Arc<AccountRegistry>,
    allowed_uid: Option<u32>,
    shutdown: Receiver<()>,
) {
    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    if let Err(e) = handle_connection(stream, &registry, allowed_uid) {
                        log::error!("control connection handler error: {}", e);
                    }
                });
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                match shutdown.recv_timeout(ACCEPT_POLL_INTERVAL) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => break,
                }
            }
            Err(e) => {
                log::error!("control socket accept failed: {}", e);
                match shutdown.recv_timeout(ACCEPT_POLL_INTERVAL) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => break,
                }
            }
        }
    }
}

fn reaper_loop(registry: Arc<AccountRegistry>, interval: Duration, shutdown: Receiver<()>) {
    loop {
        match shutdown.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                let removed = registry.sweep_stale();
                if removed > 0 {
                    log::debug!("stale sweep removed {} entries", removed);
                }
            }
            _ => break,
        }
    }
}

/// Returns false only when the kernel reports a peer uid different from the
/// allowed one. A failed credentials query logs and allows; this is not a
/// security boundary on systems that cannot report peer credentials.
fn verify_peer(stream: &UnixStream, allowed_uid: Option<u32>) -> bool {
    let allowed_uid = match allowed_uid {
        Some(uid) => uid,
        None => return true,
    };

    match getsockopt(stream.as_raw_fd(), sockopt::PeerCredentials) {
        Ok(creds) => {
            if creds.uid() != allowed_uid {
                log::warn!(
                    "rejected control connection from uid {} (expected {})",
                    creds.uid(),
                    allowed_uid
                );
                return false;
            }
            true
        }
        Err(e) => {
            log::warn!("SO_PEERCRED check failed: {}, allowing connection", e);
            true
        }
    }
}

fn handle_connection(
    mut stream: UnixStream,
    registry: &AccountRegistry,
    allowed_uid: Option<u32>,
) -> Result<()> {
    if !verify_peer(&stream, allowed_uid) {
        stream.write_all(b"{\"ok\":false,\"error\":\"permission denied\"}\n")?;
        return Ok(());
    }

    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).context("control socket read failed")?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..n]);
        if data.contains(&b'\n') || data.len() >= MAX_REQUEST_BYTES {
            break;
        }
    }

    for line in String::from_utf8_lossy(&data).split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<ControlRequest>(line) {
            Ok(request) => dispatch(request, registry),
            Err(e) => json!({"ok": false, "error": format!("Invalid JSON: {}", e)}),
        };
        stream.write_all(response.to_string().as_bytes())?;
        stream.write_all(b"\n")?;
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
struct ControlRequest {
    #[serde(default)]
    cmd: String,
    /// Left raw so both integers and numeric strings coerce.
    #[serde(default)]
    pid: Option<Value>,
    #[serde(default)]
    account: Option<String>,
}

impl ControlRequest {
    fn pid(&self) -> Option<i32> {
        let pid = match self.pid.as_ref()? {
            Value::Number(n) => n.as_i64()?,
            Value::String(s) => s.trim().parse::<i64>().ok()?,
            _ => return None,
        };
        if pid <= 0 || pid > i32::MAX as i64 {
            return None;
        }

        Some(pid as i32)
    }

    fn account(&self) -> Option<&str> {
        self.account.as_deref().filter(|account| !account.is_empty())
    }
}

fn dispatch(request: ControlRequest, registry: &AccountRegistry) -> Value {
    match request.cmd.as_str() {
        "register" => match (request.pid(), request.account()) {
            (Some(pid), Some(account)) => {
                registry.register(pid, account);
                json!({"ok": true})
            }
            _ => json!({"ok": false, "error": "Missing pid or account"}),
        },
        "unregister" => match request.pid() {
            Some(pid) => {
                registry.unregister(pid);
                json!({"ok": true})
            }
            None => json!({"ok": false, "error": "Missing pid"}),
        },
        "query" => match request.pid() {
            Some(pid) => {
                let account = registry.lookup(pid);
                json!({"ok": true, "pid": pid, "account": account})
            }
            None => json!({"ok": false, "error": "Missing pid"}),
        },
        "list" => {
            let mappings: serde_json::Map<String, Value> = registry
                .list()
                .into_iter()
                .map(|(pid, account)| (pid.to_string(), Value::String(account)))
                .collect();
            json!({"ok": true, "mappings": mappings})
        }
        "cleanup" => {
            registry.sweep_stale();
            json!({"ok": true})
        }
        cmd => json!({"ok": false, "error": format!("Unknown command: {}", cmd)}),
    }
}
