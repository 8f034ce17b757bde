//! Final, authoritative reads of a command's artifacts.

use std::time::Duration;

use crate::config::PollPolicy;
use crate::error::CommandError;
use crate::transport::FileStore;
use crate::utils::wait::{Probe, wait_until};

use super::{Advisory, CommandResult, Completion};

/// Wait for `path` to exist, then read all of it.
pub async fn read_artifact<S: FileStore>(
    store: &S,
    path: &str,
    existence_timeout: Duration,
    poll: PollPolicy,
) -> Result<Vec<u8>, CommandError> {
    let content = wait_until(poll, existence_timeout, || match store.read_all(path) {
        Ok(bytes) => Ok(Probe::Ready(bytes)),
        Err(e) if e.is_not_found() => Ok(Probe::Pending),
        Err(e) => Err(CommandError::Store(e)),
    })
    .await?;

    content.ok_or_else(|| CommandError::ArtifactTimeout {
        path: path.to_string(),
        waited: existence_timeout,
    })
}

/// Parse the status artifact. Anything but a decimal integer (after
/// trimming whitespace) is `None`.
pub fn parse_exit_status(raw: &[u8]) -> Option<i32> {
    std::str::from_utf8(raw).ok()?.trim().parse().ok()
}

/// Build the result from the raw artifact contents.
pub fn assemble(
    stdout: &[u8],
    stderr: &[u8],
    status: &[u8],
    duration: Duration,
    completion: Completion,
    mut advisories: Vec<Advisory>,
) -> CommandResult {
    let exit_status = parse_exit_status(status);
    if exit_status.is_none() {
        advisories.push(Advisory::ExitStatusUnparseable {
            raw: String::from_utf8_lossy(status).trim().to_string(),
        });
    }

    CommandResult {
        stdout: stdout.trim_ascii().to_vec(),
        stderr: stderr.trim_ascii().to_vec(),
        exit_status,
        duration,
        completion,
        advisories,
    }
}
