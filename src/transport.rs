//! The ambient process transport: spawns `gdb --interpreter=mi` (or an
//! `lldb-mi`-compatible binary) and exposes its stdio as a line-oriented MI
//! stream. §1 scopes subprocess lifecycle as an external collaborator, but
//! a concrete transport is still needed to exercise the engine end to end,
//! so it lives here rather than in a consuming application.
//!
//! Grounded in the teacher's `GDBBuilder::try_spawn` (piped stdio, buffered
//! stdout, `SIGINT` for `exec-interrupt` on unix).

use std::process::Stdio;
use std::sync::Arc;

use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::Config;
use crate::error::Error;

/// A spawned debugger process, not yet split into its I/O halves.
pub struct ProcessTransport {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
}

impl ProcessTransport {
    /// Spawns the debugger configured for MI output on stdout.
    pub async fn spawn(config: &Config) -> Result<Self, Error> {
        let mut command = Command::new(&config.debugger_path);
        command
            .arg("--interpreter=mi")
            .arg("--nx")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(debugger = %config.debugger_path, "spawning debugger process");

        let mut child = command
            .spawn()
            .map_err(|e| Error::Transport(format!("failed to spawn {}: {e}", config.debugger_path)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Transport("child stdin was not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Transport("child stdout was not piped".to_string()))?;

        Ok(ProcessTransport { child, stdin, stdout })
    }

    /// Splits into the generic read/write halves [`Session::attach`] wants
    /// plus a [`ProcessHandle`] for the process-lifecycle bits (signalling,
    /// shutdown) that a generic session has no business knowing about.
    pub fn into_parts(self) -> (ChildStdout, ChildStdin, ProcessHandle) {
        let handle = ProcessHandle {
            child: Arc::new(Mutex::new(self.child)),
        };
        (self.stdout, self.stdin, handle)
    }
}

/// The process-lifecycle control surface split off from the plain
/// `AsyncRead`/`AsyncWrite` halves handed to [`Session::attach`].
#[derive(Clone)]
pub struct ProcessHandle {
    child: Arc<Mutex<Child>>,
}

impl ProcessHandle {
    /// Sends `SIGINT` to interrupt a running inferior (`exec-interrupt`'s
    /// out-of-band delivery mechanism; the MI command itself only arms it).
    #[cfg(unix)]
    pub fn interrupt(&self) -> Result<(), Error> {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        let pid = self
            .child
            .try_lock()
            .map_err(|_| Error::Transport("child is busy".to_string()))?
            .id()
            .ok_or_else(|| Error::Transport("child has already exited".to_string()))?;
        signal::kill(Pid::from_raw(pid as i32), Signal::SIGINT)
            .map_err(|e| Error::Transport(format!("failed to signal debugger: {e}")))
    }

    #[cfg(not(unix))]
    pub fn interrupt(&self) -> Result<(), Error> {
        Err(Error::Transport("interrupt is only supported on unix".to_string()))
    }

    pub async fn shutdown(self) -> Result<(), Error> {
        let mut child = self.child.lock().await;
        let _ = child.start_kill();
        child.wait().await.map(|_| ()).map_err(|e| Error::Transport(e.to_string()))
    }
}
