//! Dispatch-and-capture pipeline.
//!
//! One command goes through these phases, strictly one at a time per
//! session:
//!
//! ```text
//! Idle -> Dispatched -> Executing -> StreamingPartial -> StatusObserved
//!      -> SentinelConfirmed | SentinelTimedOut -> ResultAssembled -> Idle
//! ```
//!
//! Any existence timeout or streamer failure moves the command to `Aborted`
//! instead. The channel sentinel and the status artifact are independent
//! completion signals; a command is `Completed` only when both were seen.

pub mod assembler;
pub mod detector;
pub mod dispatcher;
pub mod streamer;
pub mod transcript;

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Timing;
use crate::error::CommandError;
use crate::session::Session;
use crate::transport::{Channel, FileStore};

pub use assembler::{assemble, parse_exit_status, read_artifact};
pub use detector::{Detection, SentinelScanner, wait_for_sentinel};
pub use dispatcher::{CommandRecord, dispatch, envelope};
pub use streamer::{
    NullSink, OutputSink, StreamCursor, StreamKind, StreamOutcome, StreamPolicy, stream_output,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Completion {
    Completed,
    TimedOut,
}

/// Non-fatal conditions noticed while running a command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Advisory {
    /// The status artifact did not appear while streaming.
    StatusTimeout { after: Duration },
    /// The sentinel was not seen on the channel.
    SentinelTimeout { after: Duration },
    /// The status artifact did not hold an integer.
    ExitStatusUnparseable { raw: String },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::StatusTimeout { after } => {
                write!(f, "status not observed within {:.1}s", after.as_secs_f64())
            }
            Advisory::SentinelTimeout { after } => {
                write!(f, "command output exceeded {:.1}s", after.as_secs_f64())
            }
            Advisory::ExitStatusUnparseable { raw } => {
                write!(f, "exit status unparseable: {raw:?}")
            }
        }
    }
}

/// Captured outcome of one command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_status: Option<i32>,
    pub duration: Duration,
    pub completion: Completion,
    pub advisories: Vec<Advisory>,
}

impl CommandResult {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// The summary printed after every command.
    pub fn summary(&self) -> String {
        let status = match self.exit_status {
            Some(code) => code.to_string(),
            None => "None".to_string(),
        };
        format!(
            "STDOUT[{} bytes]\nSTDERR[{} bytes]\nExit status: {}\nDuration (including file reads): {:.2} sec",
            self.stdout.len(),
            self.stderr.len(),
            status,
            self.duration.as_secs_f64()
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Dispatched,
    Executing,
    StreamingPartial,
    StatusObserved,
    SentinelConfirmed,
    SentinelTimedOut,
    ResultAssembled,
    Aborted,
}

fn enter(seq: u64, phase: Phase) {
    debug!(seq, ?phase, "Command phase");
}

/// Runs commands on one session, handing out sequence numbers.
///
/// Sequence numbers start at 1 and are consumed even when a command aborts,
/// so artifact paths are never reused.
pub struct Executor<'s, C, S> {
    session: &'s Session<C, S>,
    timing: Timing,
    next_seq: u64,
}

impl<'s, C: Channel, S: FileStore> Executor<'s, C, S> {
    pub fn new(session: &'s Session<C, S>, timing: Timing) -> Self {
        Self {
            session,
            timing,
            next_seq: 1,
        }
    }

    /// Replace the timing used from the next command on.
    pub fn set_timing(&mut self, timing: Timing) {
        self.timing = timing;
    }

    /// Sequence number the next command will get.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Run `command` to completion, streaming partial output into `sink`.
    pub async fn run<O: OutputSink>(
        &mut self,
        command: &str,
        sink: &mut O,
    ) -> Result<CommandResult, CommandError> {
        let seq = self.next_seq;
        self.next_seq += 1;

        let result = self.run_seq(seq, command, sink).await;
        match &result {
            Ok(r) => {
                enter(seq, Phase::ResultAssembled);
                info!(seq, exit_status = ?r.exit_status, completion = ?r.completion, "Command finished");
            }
            Err(e) => {
                enter(seq, Phase::Aborted);
                warn!(seq, "Command aborted: {}", e);
            }
        }
        enter(seq, Phase::Idle);
        result
    }

    async fn run_seq<O: OutputSink>(
        &self,
        seq: u64,
        command: &str,
        sink: &mut O,
    ) -> Result<CommandResult, CommandError> {
        let timing = &self.timing;
        let start = Instant::now();

        let record = dispatch(self.session, seq, command, timing.dispatch_settle).await?;
        enter(seq, Phase::Dispatched);
        enter(seq, Phase::Executing);

        enter(seq, Phase::StreamingPartial);
        let stream = stream_output(
            self.session.store(),
            &record.artifacts,
            sink,
            StreamPolicy {
                poll: timing.stream_poll,
                timeout: timing.command_timeout,
                chunk_limit: timing.stream_chunk_limit,
            },
        )
        .await?;

        let mut advisories = Vec::new();
        if stream.status_observed {
            enter(seq, Phase::StatusObserved);
        } else {
            warn!(seq, "Status artifact not observed within {:?}", timing.command_timeout);
            advisories.push(Advisory::StatusTimeout {
                after: timing.command_timeout,
            });
        }

        let detection = wait_for_sentinel(
            self.session.channel(),
            &record.artifacts.sentinel,
            timing.sentinel_timeout,
            timing.sentinel_poll,
            timing.recv_chunk,
        )
        .await?;
        debug!(seq, chatter = %detection.transcript.cleaned(), "Channel chatter");
        if detection.found {
            enter(seq, Phase::SentinelConfirmed);
        } else {
            enter(seq, Phase::SentinelTimedOut);
            advisories.push(Advisory::SentinelTimeout {
                after: timing.sentinel_timeout,
            });
        }

        tokio::time::sleep(timing.artifact_read_delay).await;
        let store = self.session.store();
        let artifacts = &record.artifacts;
        let stdout =
            read_artifact(store, &artifacts.stdout, timing.artifact_timeout, timing.artifact_poll)
                .await?;
        let stderr =
            read_artifact(store, &artifacts.stderr, timing.artifact_timeout, timing.artifact_poll)
                .await?;
        let status =
            read_artifact(store, &artifacts.status, timing.artifact_timeout, timing.artifact_poll)
                .await?;

        let completion = if stream.status_observed && detection.found {
            Completion::Completed
        } else {
            Completion::TimedOut
        };

        Ok(assemble(
            &stdout,
            &stderr,
            &status,
            start.elapsed(),
            completion,
            advisories,
        ))
    }
}
