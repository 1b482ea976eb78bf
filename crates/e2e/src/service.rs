//! Browser-control service process management

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{E2eError, E2eResult};
use crate::http::{BrowserConfig, HttpBrowser};

/// Handle to a browser-control service spawned for the run
pub struct ServiceHandle {
    child: Child,
    pub base_url: String,
    pub port: u16,
}

impl ServiceHandle {
    /// Spawn the service and wait until `/health` answers
    pub async fn spawn(config: ServiceConfig) -> E2eResult<Self> {
        let port = match config.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let base_url = format!("http://127.0.0.1:{}", port);

        info!("Spawning browser service on port {}", port);

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .env("PORT", port.to_string())
            .env("HOST", "127.0.0.1")
            .env("HEADLESS", if config.headless { "true" } else { "false" })
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            E2eError::ServiceStartup(format!("Failed to spawn {}: {}", config.command, e))
        })?;
        forward_stderr(&mut child);

        let handle = ServiceHandle {
            child,
            base_url: base_url.clone(),
            port,
        };

        let probe = HttpBrowser::new(BrowserConfig {
            base_url,
            request_timeout: Duration::from_secs(2),
            startup_timeout: config.startup_timeout,
        })?;
        // On failure the handle drops here and the child is killed
        probe.wait_until_ready().await?;

        Ok(handle)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the service: SIGTERM, up to [`SHUTDOWN_GRACE`] to exit, then kill
    pub async fn shutdown(&mut self) -> E2eResult<()> {
        if self.has_exited() {
            return Ok(());
        }
        info!("Stopping browser service (pid: {})", self.child.id());

        if self.terminate() {
            let deadline = Instant::now() + SHUTDOWN_GRACE;
            while Instant::now() < deadline {
                if self.has_exited() {
                    return Ok(());
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
        self.stop()
    }

    /// Kill the service without a grace period
    pub fn stop(&mut self) -> E2eResult<()> {
        if self.has_exited() {
            return Ok(());
        }
        let _ = self.child.kill();
        self.child.wait()?;
        Ok(())
    }

    fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    #[cfg(unix)]
    fn terminate(&self) -> bool {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(self.child.id() as i32), Signal::SIGTERM).is_ok()
    }

    #[cfg(not(unix))]
    fn terminate(&self) -> bool {
        false
    }
}

/// Time a service gets to exit after SIGTERM
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

impl Drop for ServiceHandle {
    // Drop cannot wait on the runtime; call shutdown() first for a clean exit
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Relay the child's stderr to the log so the pipe never fills up
fn forward_stderr(child: &mut Child) {
    if let Some(stderr) = child.stderr.take() {
        std::thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                debug!("[browser-service] {}", line);
            }
        });
    }
}

/// Configuration for spawning the browser-control service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Program to run (e.g. `node`)
    pub command: String,

    /// Arguments (e.g. the service entry script)
    pub args: Vec<String>,

    /// Port to listen on (None = find free port)
    pub port: Option<u16>,

    /// Timeout for service startup
    #[serde(rename = "startup_timeout_ms", with = "crate::http::millis")]
    pub startup_timeout: Duration,

    /// Launch the browser without a window
    pub headless: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            command: "node".to_string(),
            args: vec!["browser-service/server.js".to_string()],
            port: None,
            startup_timeout: Duration::from_secs(30),
            headless: true,
        }
    }
}

/// Find a free port to use
fn find_free_port() -> E2eResult<u16> {
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_free_port() {
        let port1 = find_free_port().unwrap();
        let port2 = find_free_port().unwrap();

        // Ports should be in valid range
        assert!(port1 > 1024);
        assert!(port2 > 1024);
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let err = ServiceHandle::spawn(ServiceConfig {
            command: "/nonexistent/cvkit-browser-service".into(),
            args: vec![],
            port: Some(1),
            ..Default::default()
        })
        .await
        .err()
        .unwrap();
        assert!(matches!(err, E2eError::ServiceStartup(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_noisy_stderr_does_not_block_child() {
        // Well past a pipe buffer's worth of stderr
        let mut child = Command::new("sh")
            .args(["-c", "i=0; while [ $i -lt 4000 ]; do echo 'playwright: page event log line padding padding' >&2; i=$((i+1)); done"])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        forward_stderr(&mut child);
        assert!(child.stderr.is_none());
        assert!(child.wait().unwrap().success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_terminates_within_grace() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let mut handle = ServiceHandle {
            child,
            base_url: "http://127.0.0.1:0".into(),
            port: 0,
        };
        let started = std::time::Instant::now();
        handle.shutdown().await.unwrap();
        assert!(handle.has_exited());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
