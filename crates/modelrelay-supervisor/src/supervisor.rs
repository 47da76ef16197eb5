use std::time::Duration;

use modelrelay_common::{Error, LIVENESS_PATH, Result};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::launcher::Launcher;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// HTTP liveness check against `127.0.0.1:{port}/health`.
#[derive(Clone)]
pub struct LivenessProbe {
    client: Client,
}

impl LivenessProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| Error::Process(format!("failed to build liveness client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_default_timeout() -> Result<Self> {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }

    /// True only when the liveness path answers 200. Every failure is `false`.
    pub async fn is_running(&self, port: u16) -> bool {
        let url = format!("http://127.0.0.1:{port}{LIVENESS_PATH}");
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(e) => {
                debug!("liveness probe on port {port} failed: {e}");
                false
            }
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Unknown,
    Probing,
    Starting,
    Running,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// Something already answered the probe; nothing was launched.
    AlreadyRunning,
    /// A process was launched and became healthy after `attempts` polls.
    Started { attempts: u32 },
}

/// Ensures one serving process is listening on a port.
///
/// There is no cross-process lock. Two launchers racing past the first probe may
/// both spawn; the loser fails to bind and polling still succeeds against the winner.
pub struct ProcessSupervisor<L> {
    port: u16,
    launcher: L,
    probe: LivenessProbe,
    poll_interval: Duration,
    max_attempts: u32,
    state: SupervisorState,
    spawned_pid: Option<u32>,
}

impl<L: Launcher> ProcessSupervisor<L> {
    pub fn new(port: u16, launcher: L) -> Result<Self> {
        Ok(Self {
            port,
            launcher,
            probe: LivenessProbe::with_default_timeout()?,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            state: SupervisorState::Unknown,
            spawned_pid: None,
        })
    }

    pub fn with_probe(mut self, probe: LivenessProbe) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_polling(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = interval;
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Pid of the process this supervisor launched, if any.
    pub fn spawned_pid(&self) -> Option<u32> {
        self.spawned_pid
    }

    pub async fn is_running(&self) -> bool {
        self.probe.is_running(self.port).await
    }

    /// Probe, launch if absent, then poll until healthy or the attempt budget runs out.
    pub async fn ensure_running(&mut self) -> Result<EnsureOutcome> {
        self.state = SupervisorState::Probing;
        if self.is_running().await {
            self.state = SupervisorState::Running;
            debug!("service already running on port {}", self.port);
            return Ok(EnsureOutcome::AlreadyRunning);
        }

        self.state = SupervisorState::Starting;
        info!("no service on port {}, launching one", self.port);
        match self.launcher.launch(self.port) {
            Ok(pid) => self.spawned_pid = pid,
            Err(e) => {
                self.state = SupervisorState::Failed;
                return Err(e);
            }
        }

        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.poll_interval).await;
            if self.is_running().await {
                self.state = SupervisorState::Running;
                info!(
                    "service on port {} healthy after {attempt} attempt(s)",
                    self.port
                );
                return Ok(EnsureOutcome::Started { attempts: attempt });
            }
            debug!(
                "waiting for service on port {} ({attempt}/{})",
                self.port, self.max_attempts
            );
        }

        self.state = SupervisorState::Failed;
        warn!(
            "service on port {} never became healthy (launched pid {:?})",
            self.port, self.spawned_pid
        );
        Err(Error::StartupTimeout {
            port: self.port,
            attempts: self.max_attempts,
        })
    }
}
