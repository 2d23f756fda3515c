//! Child process helpers: process-group spawning and teardown.

use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};

/// Build a command whose stdout/stderr are piped and which runs in its own
/// process group on unix, so the whole tree can be torn down at once.
pub(super) fn piped_command<I, S>(program: &str, args: I) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .env("LC_ALL", "C")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);
    cmd
}

/// Owns a running extractor process. Dropping it before the process exited
/// kills the process group.
pub(super) struct ProcessGuard {
    child: Child,
    exited: bool,
}

impl ProcessGuard {
    pub(super) fn new(child: Child) -> Self {
        Self {
            child,
            exited: false,
        }
    }

    pub(super) fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    pub(super) async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        let status = self.child.wait().await;
        self.exited = true;
        status
    }

    /// Kill the process group and reap the leader.
    pub(super) async fn terminate(&mut self) {
        if self.exited {
            return;
        }
        self.kill_group();
        let _ = self.child.kill().await;
        self.exited = true;
    }

    fn kill_group(&self) {
        #[cfg(unix)]
        {
            if let Some(pid) = self.child.id() {
                // SAFETY: killpg only sends a signal; the group id is the child's
                // pid because it was spawned with process_group(0).
                let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
                if rc != 0 {
                    tracing::debug!(pid, "killpg failed: {}", std::io::Error::last_os_error());
                }
            }
        }
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if !self.exited {
            self.kill_group();
            let _ = self.child.start_kill();
        }
    }
}
