//! Running an interactive child process that the operator can cancel.

use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::io::cancel::CancelToken;

/// How often the cancellation flag is checked while the child runs.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How an interactive run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Exited(ExitStatus),
    /// The token fired and the child was killed.
    Cancelled,
}

/// Owns a spawned child and kills it if dropped before being reaped.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            warn!("child still running on release, killing");
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Run `cmd` with the terminal's stdin/stdout/stderr until it exits or
/// `cancel` fires. One cancellation kills the child; nothing is escalated.
///
/// A terminal Ctrl-C also reaches the child, which usually exits before the
/// next poll. Any exit observed after the token fired counts as cancelled.
#[instrument(skip_all)]
pub fn run_interactive(mut cmd: Command, cancel: &CancelToken) -> Result<RunExit> {
    cmd.stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    debug!("spawning child process");
    let child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };
    let mut guard = ChildGuard {
        child,
        reaped: false,
    };

    loop {
        if let Some(status) = guard
            .child
            .wait_timeout(POLL_INTERVAL)
            .context("wait for command")?
        {
            guard.reaped = true;
            debug!(exit_code = ?status.code(), "command finished");
            if cancel.is_cancelled() {
                return Ok(RunExit::Cancelled);
            }
            return Ok(RunExit::Exited(status));
        }
        if cancel.is_cancelled() {
            debug!("cancellation requested, killing child");
            guard.child.kill().context("kill command")?;
            guard.child.wait().context("wait command after kill")?;
            guard.reaped = true;
            return Ok(RunExit::Cancelled);
        }
    }
}
