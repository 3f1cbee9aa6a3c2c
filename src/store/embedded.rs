//! Embedded server process management
//!
//! Development-only mode: starts a throwaway `mongod` on the configured
//! port with a temporary data directory, and tears it down when the
//! connection is closed (or the process exits). The data directory is
//! removed with the server, so nothing survives a restart.

use std::io;
use std::net::TcpStream;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tracing::{info, warn};

use crate::error::{Result, StoreError};

const STARTUP_WAIT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A locally spawned, ephemeral server instance
pub struct EmbeddedServer {
    child: Option<Child>,
    port: u16,
    // Held for the lifetime of the server; deleted when this drops.
    _data_dir: TempDir,
}

impl EmbeddedServer {
    /// Spawn a local server on the given port and wait until it accepts
    /// connections
    pub fn start(port: u16) -> Result<EmbeddedServer> {
        warn!("starting chat store in embed mode");
        warn!("embed mode runs a throwaway local server and must never be used in production");

        let data_dir = TempDir::new().map_err(|e| StoreError::embedded(port, e))?;

        let child = Command::new("mongod")
            .arg("--port")
            .arg(port.to_string())
            .arg("--dbpath")
            .arg(data_dir.path())
            .arg("--bind_ip")
            .arg("127.0.0.1")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| StoreError::embedded(port, e))?;

        let mut server = EmbeddedServer {
            child: Some(child),
            port,
            _data_dir: data_dir,
        };
        server.wait_until_ready()?;
        info!("embedded server listening on port {}", port);
        Ok(server)
    }

    /// Poll the port until the server accepts TCP connections, so the
    /// client's first command does not race the server start
    fn wait_until_ready(&mut self) -> Result<()> {
        let deadline = Instant::now() + STARTUP_WAIT;
        let addr = format!("127.0.0.1:{}", self.port);
        loop {
            if TcpStream::connect(addr.as_str()).is_ok() {
                return Ok(());
            }
            // Surface an early exit (port taken, bad binary) instead of
            // polling out the clock
            if let Some(child) = self.child.as_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    self.child = None;
                    return Err(StoreError::embedded(
                        self.port,
                        io::Error::other(format!("server exited during startup: {status}")),
                    ));
                }
            }
            if Instant::now() >= deadline {
                self.stop();
                return Err(StoreError::embedded(
                    self.port,
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        "server did not accept connections in time",
                    ),
                ));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Port the server was started on
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stop the server process; safe to call more than once
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                warn!("failed to stop embedded server: {}", e);
            }
            let _ = child.wait();
            info!("embedded server on port {} stopped", self.port);
        }
    }
}

impl Drop for EmbeddedServer {
    fn drop(&mut self) {
        self.stop();
    }
}
