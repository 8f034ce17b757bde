//! Builds and sends the command envelope.
//!
//! Two writes go down the channel for every command:
//! 1. the literal command text is persisted into the history artifact
//! 2. the history artifact is sourced with stdout/stderr redirected into
//!    their artifacts, the exit code is written to the status artifact and
//!    the sentinel is printed as a line
//!
//! Only embedded double quotes are escaped in the history write. Newlines,
//! backslashes and `$` expansions in the command text are interpreted by the
//! shell at write time.

use std::time::Duration;

use tracing::debug;

use crate::error::TransportError;
use crate::session::{CommandArtifacts, Session};
use crate::transport::{Channel, FileStore, shell_quote};

/// One dispatched command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandRecord {
    pub command: String,
    pub artifacts: CommandArtifacts,
}

impl CommandRecord {
    pub fn seq(&self) -> u64 {
        self.artifacts.seq
    }
}

/// The two channel writes for `command`, in send order.
pub fn envelope(command: &str, artifacts: &CommandArtifacts) -> (String, String) {
    let escaped = command.replace('"', "\\\"");
    let history = format!(
        "echo \"{}\" > {}\n",
        escaped,
        shell_quote(&artifacts.history)
    );

    // The token is assembled by printf so the echo of this line never
    // contains it.
    let exec = format!(
        ". {} > {} 2> {}; echo $? > {}; printf '__DONE_%s__\\n' {}\n",
        shell_quote(&artifacts.history),
        shell_quote(&artifacts.stdout),
        shell_quote(&artifacts.stderr),
        shell_quote(&artifacts.status),
        artifacts.seq,
    );
    (history, exec)
}

/// Send the envelope for `command` as sequence number `seq`.
///
/// Does not wait for any acknowledgment from the shell.
pub async fn dispatch<C: Channel, S: FileStore>(
    session: &Session<C, S>,
    seq: u64,
    command: &str,
    settle: Duration,
) -> Result<CommandRecord, TransportError> {
    let artifacts = session.artifacts(seq);
    let (history, exec) = envelope(command, &artifacts);

    session.channel().send(history.as_bytes())?;
    tokio::time::sleep(settle).await;
    session.channel().send(exec.as_bytes())?;

    debug!(seq, command, "Dispatched command");

    Ok(CommandRecord {
        command: command.to_string(),
        artifacts,
    })
}
