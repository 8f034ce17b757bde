//! Out-of-band command execution in a separate, non-PTY subprocess.
//!
//! This is intentionally isolated from the interactive channel:
//! - one command per process, nothing shared with the session shell
//! - time-bounded
//! - output-bounded

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::RemoteExec;
use crate::error::TransportError;

#[derive(Clone, Debug)]
pub struct ShellExec {
    /// Argument vector the command string is appended to, e.g. `["sh", "-c"]`
    /// or `["ssh", "host"]`.
    prefix: Vec<String>,
    /// Per-command timeout.
    total_timeout: Duration,
    /// Max bytes of stdout kept.
    max_output_bytes: usize,
}

impl Default for ShellExec {
    fn default() -> Self {
        Self::local()
    }
}

impl ShellExec {
    /// Run commands through the local `/bin/sh -c`.
    pub fn local() -> Self {
        Self::with_prefix(vec!["/bin/sh".to_string(), "-c".to_string()])
    }

    pub fn with_prefix(prefix: Vec<String>) -> Self {
        Self {
            prefix,
            total_timeout: Duration::from_secs(10),
            max_output_bytes: 64 * 1024,
        }
    }

    pub fn timeout(mut self, total_timeout: Duration) -> Self {
        self.total_timeout = total_timeout;
        self
    }
}

impl RemoteExec for ShellExec {
    async fn exec(&self, command: &str) -> Result<String, TransportError> {
        let (program, args) = self.prefix.split_first().ok_or_else(|| TransportError::Exec {
            command: command.to_string(),
            reason: "empty exec prefix".to_string(),
        })?;

        let mut c = Command::new(program);
        c.args(args).arg(command);
        c.kill_on_drop(true);
        c.stdin(Stdio::null());

        debug!(?program, command, "Running out-of-band exec");

        let output = timeout(self.total_timeout, c.output())
            .await
            .map_err(|_| TransportError::ExecTimeout {
                command: command.to_string(),
                after: self.total_timeout,
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransportError::Exec {
                command: command.to_string(),
                reason: format!("{} ({})", output.status, stderr.trim()),
            });
        }

        let mut stdout = output.stdout;
        stdout.truncate(self.max_output_bytes);
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}
