//! Worker process lifecycle

use crate::error::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Readiness probe interval.
const PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Readiness probe attempts (30 s at 1 Hz).
const PROBE_ATTEMPTS: u32 = 30;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// How to launch one worker.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    /// Worker name used in logs and errors.
    pub name: String,
    /// Executable to spawn.
    pub command: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Loopback port the worker binds.
    pub port: u16,
}

/// A spawned worker registered with the supervisor.
pub struct ServiceHandle {
    /// Worker name.
    pub name: String,
    /// Child process handle.
    pub child: Child,
    /// Host the worker listens on.
    pub host: String,
    /// Port the worker listens on.
    pub port: u16,
    /// Rendered command line, for diagnostics.
    pub command: String,
    /// Whether the readiness probe succeeded.
    pub ready: bool,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    status: String,
}

/// Spawns worker processes in a deterministic order, probes readiness, and
/// tears everything down in reverse order on shutdown.
///
/// Child processes are spawned with kill-on-drop so an abnormal host exit
/// still reaps them; the orderly path is [`Supervisor::shutdown`], which
/// must run before process exit.
pub struct Supervisor {
    services: Vec<ServiceHandle>,
    http: Client,
    probe_interval: Duration,
    probe_attempts: u32,
}

impl Supervisor {
    /// Create an empty supervisor.
    pub fn new() -> Result<Self> {
        Self::with_probe(PROBE_INTERVAL, PROBE_ATTEMPTS)
    }

    /// Create a supervisor with custom probe timing.
    pub fn with_probe(probe_interval: Duration, probe_attempts: u32) -> Result<Self> {
        let http = Client::builder()
            .timeout(HEALTH_TIMEOUT)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            services: Vec::new(),
            http,
            probe_interval,
            probe_attempts,
        })
    }

    /// Start every worker in order. If any worker fails to become ready,
    /// all previously started workers are terminated and the failure is
    /// returned.
    pub async fn start_all(&mut self, specs: &[WorkerSpec]) -> Result<()> {
        for spec in specs {
            if let Err(e) = self.start_worker(spec).await {
                warn!("startup aborted while starting '{}': {}", spec.name, e);
                self.shutdown().await;
                return Err(e);
            }
        }
        Ok(())
    }

    async fn start_worker(&mut self, spec: &WorkerSpec) -> Result<()> {
        let command_line = format!("{} {}", spec.command, spec.args.join(" "));
        info!(
            "Starting worker '{}' on port {}: {}",
            spec.name, spec.port, command_line
        );

        let child = Command::new(&spec.command)
            .args(&spec.args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::ServiceInit {
                service: spec.name.clone(),
                cause: format!("spawn failed: {e}"),
            })?;

        debug!("worker '{}' spawned with pid {:?}", spec.name, child.id());
        self.services.push(ServiceHandle {
            name: spec.name.clone(),
            child,
            host: crate::WORKER_HOST.to_string(),
            port: spec.port,
            command: command_line,
            ready: false,
        });

        self.await_ready(spec).await?;
        if let Some(handle) = self.services.last_mut() {
            handle.ready = true;
        }
        info!("Worker '{}' is ready", spec.name);
        Ok(())
    }

    async fn await_ready(&mut self, spec: &WorkerSpec) -> Result<()> {
        for attempt in 1..=self.probe_attempts {
            // A dead child will never answer its health endpoint.
            if let Some(handle) = self.services.last_mut() {
                if let Ok(Some(status)) = handle.child.try_wait() {
                    return Err(Error::ServiceInit {
                        service: spec.name.clone(),
                        cause: format!("process exited during startup: {status}"),
                    });
                }
            }

            if self.probe_health(spec.port).await {
                debug!(
                    "worker '{}' became healthy after {} probe(s)",
                    spec.name, attempt
                );
                return Ok(());
            }
            tokio::time::sleep(self.probe_interval).await;
        }

        Err(Error::ServiceInit {
            service: spec.name.clone(),
            cause: format!(
                "no healthy response after {} probes on port {}",
                self.probe_attempts, spec.port
            ),
        })
    }

    /// One advisory health check. Steady-state failures are reported, not
    /// acted on; workers are not restarted.
    pub async fn probe_health(&self, port: u16) -> bool {
        let url = format!("http://{}:{}/health", crate::WORKER_HOST, port);
        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => response
                .json::<HealthResponse>()
                .await
                .map(|h| h.status == "healthy")
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Registered workers, in start order.
    #[must_use]
    pub fn services(&self) -> &[ServiceHandle] {
        &self.services
    }

    /// Terminate every worker in reverse start order and wait for each to
    /// exit.
    pub async fn shutdown(&mut self) {
        while let Some(mut handle) = self.services.pop() {
            info!("Stopping worker '{}'", handle.name);
            if let Err(e) = handle.child.start_kill() {
                warn!("failed to signal worker '{}': {}", handle.name, e);
                continue;
            }
            match handle.child.wait().await {
                Ok(status) => debug!("worker '{}' exited: {}", handle.name, status),
                Err(e) => warn!("failed to reap worker '{}': {}", handle.name, e),
            }
        }
        info!("All workers stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sleeper_spec(name: &str) -> WorkerSpec {
        WorkerSpec {
            name: name.to_string(),
            command: "sleep".to_string(),
            args: vec!["30".to_string()],
            port: 1,
        }
    }

    #[tokio::test]
    async fn unreachable_worker_fails_readiness_and_is_reaped() {
        let mut supervisor =
            Supervisor::with_probe(Duration::from_millis(10), 2).unwrap();
        let err = supervisor.start_all(&[sleeper_spec("tts")]).await.unwrap_err();
        match err {
            Error::ServiceInit { service, .. } => assert_eq!(service, "tts"),
            other => panic!("unexpected error: {other:?}"),
        }
        // The failed startup tore the worker down again.
        assert!(supervisor.services().is_empty());
    }

    #[tokio::test]
    async fn unknown_command_is_a_service_init_error() {
        let mut supervisor =
            Supervisor::with_probe(Duration::from_millis(10), 1).unwrap();
        let spec = WorkerSpec {
            name: "stt".to_string(),
            command: "definitely-not-a-real-binary".to_string(),
            args: Vec::new(),
            port: 1,
        };
        let err = supervisor.start_all(&[spec]).await.unwrap_err();
        assert!(matches!(err, Error::ServiceInit { .. }));
    }

    #[tokio::test]
    async fn shutdown_reaps_in_reverse_order() {
        let mut supervisor =
            Supervisor::with_probe(Duration::from_millis(10), 1).unwrap();
        // Bypass readiness: register two sleepers directly.
        for name in ["tts", "stt"] {
            let child = Command::new("sleep")
                .arg("30")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .unwrap();
            supervisor.services.push(ServiceHandle {
                name: name.to_string(),
                child,
                host: crate::WORKER_HOST.to_string(),
                port: 1,
                command: "sleep 30".to_string(),
                ready: false,
            });
        }
        supervisor.shutdown().await;
        assert!(supervisor.services().is_empty());
    }
}
