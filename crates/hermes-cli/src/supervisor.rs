//! Supervision of the Hermes backend process.
//!
//! A [`Supervisor`] owns at most one child process and an explicit
//! [`ProcessState`]. Transitions:
//!
//! ```text
//! Stopped --start--> Starting --grace period--> Running
//!    ^                   |                         |
//!    |   (spawn failed   |                        stop
//!    |    or exited)     v                         v
//!    +-------------------+<--------------------- Stopping
//! ```
//!
//! A child that exits on its own is noticed on the next call and the state
//! moves back to `Stopped`.

use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// How long a freshly spawned child must stay alive to count as running.
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_millis(500);

/// Lifecycle state of the supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Errors from supervisor transitions.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// `start` was called while the process is running.
    #[error("backend is already running (pid {pid:?})")]
    AlreadyRunning { pid: Option<u32> },

    /// `stop` was called while the process is stopped.
    #[error("backend is not running")]
    NotRunning,

    /// Another transition is in progress.
    #[error("backend is {state:?}, try again shortly")]
    Busy { state: ProcessState },

    /// The process could not be spawned.
    #[error("failed to spawn '{program}': {reason}")]
    Spawn { program: String, reason: String },

    /// The process exited before the startup grace period elapsed.
    #[error("backend exited during startup: {status}")]
    ExitedEarly { status: String },

    /// Killing or reaping the process failed.
    #[error("failed to stop backend: {reason}")]
    Stop { reason: String },
}

/// Snapshot returned by [`Supervisor::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessStatus {
    pub state: ProcessState,
    pub running: bool,
    pub pid: Option<u32>,
}

/// The program and arguments used to launch the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ChildCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The `hermes-server` binary next to the running executable, or the
    /// one on `PATH` when there is none.
    #[must_use]
    pub fn default_server() -> Self {
        let sibling = std::env::current_exe()
            .ok()
            .map(|exe| exe.with_file_name(format!("hermes-server{}", std::env::consts::EXE_SUFFIX)))
            .filter(|path| path.is_file());

        let program = sibling.map_or_else(
            || "hermes-server".to_owned(),
            |path| path.display().to_string(),
        );
        Self::new(program, Vec::new())
    }
}

#[derive(Debug)]
struct Inner {
    state: ProcessState,
    child: Option<Child>,
    pid: Option<u32>,
}

impl Inner {
    /// Notice a child that exited on its own.
    fn reap_exited(&mut self) {
        if self.state != ProcessState::Running {
            return;
        }
        let Some(child) = self.child.as_mut() else {
            return;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                info!(pid = ?self.pid, %status, "backend exited");
                self.clear();
            }
            Ok(None) => {}
            Err(e) => warn!(pid = ?self.pid, error = %e, "failed to poll backend"),
        }
    }

    fn clear(&mut self) {
        self.state = ProcessState::Stopped;
        self.child = None;
        self.pid = None;
    }
}

/// Starts, stops and reports on one backend process.
#[derive(Debug)]
pub struct Supervisor {
    command: ChildCommand,
    startup_grace: Duration,
    inner: Mutex<Inner>,
}

impl Supervisor {
    pub fn new(command: ChildCommand) -> Self {
        Self {
            command,
            startup_grace: DEFAULT_STARTUP_GRACE,
            inner: Mutex::new(Inner {
                state: ProcessState::Stopped,
                child: None,
                pid: None,
            }),
        }
    }

    #[must_use]
    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    /// Launch the backend and return its pid.
    ///
    /// # Errors
    ///
    /// [`SupervisorError::AlreadyRunning`] or [`SupervisorError::Busy`] unless
    /// stopped; [`SupervisorError::Spawn`] or [`SupervisorError::ExitedEarly`]
    /// if the process does not come up. The state is `Stopped` after any
    /// failure.
    pub async fn start(&self) -> Result<Option<u32>, SupervisorError> {
        {
            let mut inner = self.inner.lock().await;
            inner.reap_exited();
            match inner.state {
                ProcessState::Stopped => {}
                ProcessState::Running => {
                    return Err(SupervisorError::AlreadyRunning { pid: inner.pid });
                }
                state @ (ProcessState::Starting | ProcessState::Stopping) => {
                    return Err(SupervisorError::Busy { state });
                }
            }

            inner.state = ProcessState::Starting;
            let spawned = Command::new(&self.command.program)
                .args(&self.command.args)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .spawn();

            match spawned {
                Ok(child) => {
                    inner.pid = child.id();
                    inner.child = Some(child);
                    info!(pid = ?inner.pid, program = %self.command.program, "backend spawned");
                }
                Err(e) => {
                    inner.clear();
                    return Err(SupervisorError::Spawn {
                        program: self.command.program.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tokio::time::sleep(self.startup_grace).await;

        let mut inner = self.inner.lock().await;
        let exited = match inner.child.as_mut().map(Child::try_wait) {
            Some(Ok(Some(status))) => Some(status.to_string()),
            Some(Ok(None)) => None,
            Some(Err(e)) => {
                warn!(error = %e, "failed to poll backend after spawn");
                None
            }
            None => Some("process handle lost".to_owned()),
        };

        if let Some(status) = exited {
            inner.clear();
            return Err(SupervisorError::ExitedEarly { status });
        }

        inner.state = ProcessState::Running;
        info!(pid = ?inner.pid, "backend running");
        Ok(inner.pid)
    }

    /// Kill the backend and wait for it to exit.
    ///
    /// # Errors
    ///
    /// [`SupervisorError::NotRunning`] when stopped,
    /// [`SupervisorError::Busy`] during another transition and
    /// [`SupervisorError::Stop`] if the kill fails. The state is `Stopped`
    /// afterwards in every case but `Busy`.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        let (child, pid) = {
            let mut inner = self.inner.lock().await;
            inner.reap_exited();
            match inner.state {
                ProcessState::Running => {}
                ProcessState::Stopped => return Err(SupervisorError::NotRunning),
                state @ (ProcessState::Starting | ProcessState::Stopping) => {
                    return Err(SupervisorError::Busy { state });
                }
            }
            inner.state = ProcessState::Stopping;
            (inner.child.take(), inner.pid)
        };

        let result = match child {
            Some(mut child) => child.kill().await.map_err(|e| SupervisorError::Stop {
                reason: e.to_string(),
            }),
            None => Ok(()),
        };

        self.inner.lock().await.clear();
        if result.is_ok() {
            info!(?pid, "backend stopped");
        }
        result
    }

    /// Current state, noticing a child that exited on its own.
    pub async fn status(&self) -> ProcessStatus {
        let mut inner = self.inner.lock().await;
        inner.reap_exited();
        ProcessStatus {
            state: inner.state,
            running: inner.state == ProcessState::Running,
            pid: inner.pid,
        }
    }
}
