//! Incremental output streaming from the side file store.
//!
//! While a command runs, its stdout/stderr artifacts grow. Each poll cycle
//! reads whatever lies beyond the bytes already emitted (bounded per cycle)
//! and hands it to an [`OutputSink`]. A missing artifact just means the
//! redirect has not created it yet.
//!
//! Polling ends when the status artifact appears. It is written after the
//! command exits, so every byte of output precedes it; one last drain after
//! seeing it makes the emitted ranges cover each artifact exactly once.

use std::time::Duration;

use tracing::{debug, trace};

use crate::config::PollPolicy;
use crate::error::{CommandError, StoreError};
use crate::session::CommandArtifacts;
use crate::transport::FileStore;
use crate::utils::wait::{Probe, wait_until};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// Receives partial output as soon as it is read.
pub trait OutputSink {
    /// `bytes` start at `offset` within the artifact for `stream`.
    fn emit(&mut self, stream: StreamKind, offset: u64, bytes: &[u8]);
}

/// Sink that drops everything.
pub struct NullSink;

impl OutputSink for NullSink {
    fn emit(&mut self, _stream: StreamKind, _offset: u64, _bytes: &[u8]) {}
}

/// Bytes already emitted per stream. Only ever moves forward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamCursor {
    pub stdout: u64,
    pub stderr: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamOutcome {
    pub status_observed: bool,
    pub cursor: StreamCursor,
}

/// Options for one streaming run.
#[derive(Clone, Copy, Debug)]
pub struct StreamPolicy {
    pub poll: PollPolicy,
    /// Give up on the status artifact after this long.
    pub timeout: Duration,
    /// Max bytes read per stream per cycle.
    pub chunk_limit: usize,
}

/// Read new bytes of one stream, emit them and advance its offset.
/// Returns how many bytes were emitted.
fn pump<S: FileStore, O: OutputSink>(
    store: &S,
    path: &str,
    kind: StreamKind,
    offset: &mut u64,
    limit: usize,
    sink: &mut O,
) -> Result<usize, StoreError> {
    let bytes = match store.read_at(path, *offset, limit) {
        Ok(bytes) => bytes,
        Err(e) if e.is_not_found() => return Ok(0),
        Err(e) => return Err(e),
    };
    if !bytes.is_empty() {
        trace!(?kind, offset = *offset, len = bytes.len(), "Emitting partial output");
        sink.emit(kind, *offset, &bytes);
        *offset += bytes.len() as u64;
    }
    Ok(bytes.len())
}

/// Stream stdout/stderr until the status artifact shows up or the policy's
/// timeout passes.
pub async fn stream_output<S: FileStore, O: OutputSink>(
    store: &S,
    artifacts: &CommandArtifacts,
    sink: &mut O,
    policy: StreamPolicy,
) -> Result<StreamOutcome, CommandError> {
    let mut cursor = StreamCursor::default();
    let limit = policy.chunk_limit;

    let observed = wait_until(policy.poll, policy.timeout, || {
        pump(store, &artifacts.stdout, StreamKind::Stdout, &mut cursor.stdout, limit, sink)?;
        pump(store, &artifacts.stderr, StreamKind::Stderr, &mut cursor.stderr, limit, sink)?;

        match store.stat(&artifacts.status) {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(Probe::Pending),
            Err(e) => return Err(e),
        }

        while pump(
            store,
            &artifacts.stdout,
            StreamKind::Stdout,
            &mut cursor.stdout,
            limit,
            sink,
        )? > 0
        {}
        while pump(
            store,
            &artifacts.stderr,
            StreamKind::Stderr,
            &mut cursor.stderr,
            limit,
            sink,
        )? > 0
        {}
        Ok(Probe::Ready(()))
    })
    .await
    .map_err(CommandError::Streamer)?
    .is_some();

    debug!(
        seq = artifacts.seq,
        observed,
        stdout = cursor.stdout,
        stderr = cursor.stderr,
        "Output streaming finished"
    );

    Ok(StreamOutcome {
        status_observed: observed,
        cursor,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::transport::scripted::{Script, ScriptedRemote};
    use crate::transport::Channel;

    /// Records every emitted range.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub chunks: Vec<(StreamKind, u64, Vec<u8>)>,
    }

    impl RecordingSink {
        pub fn joined(&self, kind: StreamKind) -> Vec<u8> {
            self.chunks
                .iter()
                .filter(|(k, _, _)| *k == kind)
                .flat_map(|(_, _, b)| b.clone())
                .collect()
        }
    }

    impl OutputSink for RecordingSink {
        fn emit(&mut self, stream: StreamKind, offset: u64, bytes: &[u8]) {
            self.chunks.push((stream, offset, bytes.to_vec()));
        }
    }

    fn policy(timeout_ms: u64, chunk_limit: usize) -> StreamPolicy {
        StreamPolicy {
            poll: PollPolicy::fixed(Duration::from_millis(1)),
            timeout: Duration::from_millis(timeout_ms),
            chunk_limit,
        }
    }

    /// Start the scripted job for `command` as sequence number 1 under `/r`.
    fn start(remote: &ScriptedRemote, command: &str) -> CommandArtifacts {
        let artifacts = CommandArtifacts::derive("/r", 1);
        let (history, exec) = crate::exec::dispatcher::envelope(command, &artifacts);
        remote.send(history.as_bytes()).unwrap();
        remote.send(exec.as_bytes()).unwrap();
        artifacts
    }

    #[tokio::test]
    async fn test_incremental_ranges_are_contiguous_and_complete() {
        let remote = ScriptedRemote::new();
        remote.script("seq 1 5", Script::chunked(&["1\n", "2\n3\n", "", "4\n", "5\n"]));
        let artifacts = start(&remote, "seq 1 5");

        let mut sink = RecordingSink::default();
        let outcome = stream_output(&remote, &artifacts, &mut sink, policy(5_000, 64))
            .await
            .unwrap();

        assert!(outcome.status_observed);
        let mut expected_offset = 0;
        for (kind, offset, bytes) in &sink.chunks {
            assert_eq!(*kind, StreamKind::Stdout);
            assert_eq!(*offset, expected_offset);
            assert!(!bytes.is_empty());
            expected_offset += bytes.len() as u64;
        }
        assert!(sink.chunks.len() >= 2);
        let full = remote.file(&artifacts.stdout).unwrap();
        assert_eq!(sink.joined(StreamKind::Stdout), full);
        assert_eq!(outcome.cursor.stdout, full.len() as u64);
    }

    #[tokio::test]
    async fn test_chunk_limit_bounds_each_read() {
        let remote = ScriptedRemote::new();
        remote.script("big", Script::chunked(&["abcdefghijklmnopqrstuvwxyz"]));
        let artifacts = start(&remote, "big");

        let mut sink = RecordingSink::default();
        stream_output(&remote, &artifacts, &mut sink, policy(5_000, 4))
            .await
            .unwrap();

        assert!(sink.chunks.iter().all(|(_, _, b)| b.len() <= 4));
        assert_eq!(sink.joined(StreamKind::Stdout), b"abcdefghijklmnopqrstuvwxyz");
    }

    #[tokio::test]
    async fn test_stderr_streamed_separately() {
        let remote = ScriptedRemote::new();
        remote.script("ls /nonexistent", Script::failing("ls: No such file or directory\n", 2));
        let artifacts = start(&remote, "ls /nonexistent");

        let mut sink = RecordingSink::default();
        let outcome = stream_output(&remote, &artifacts, &mut sink, policy(5_000, 64))
            .await
            .unwrap();

        assert!(outcome.status_observed);
        assert!(sink.joined(StreamKind::Stdout).is_empty());
        assert_eq!(sink.joined(StreamKind::Stderr), b"ls: No such file or directory\n");
    }

    #[tokio::test]
    async fn test_missing_status_times_out() {
        let remote = ScriptedRemote::new();
        remote.script("sleep 1000", Script::hanging());
        let artifacts = start(&remote, "sleep 1000");

        let mut sink = RecordingSink::default();
        let outcome = stream_output(&remote, &artifacts, &mut sink, policy(30, 64))
            .await
            .unwrap();

        assert!(!outcome.status_observed);
        assert_eq!(sink.joined(StreamKind::Stdout), b"partial");
    }

    #[tokio::test]
    async fn test_store_failure_is_fatal() {
        let remote = ScriptedRemote::new();
        let artifacts = start(&remote, "whoami");
        remote.fail_path(&artifacts.stderr);

        let mut sink = RecordingSink::default();
        let err = stream_output(&remote, &artifacts, &mut sink, policy(5_000, 64))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Streamer(_)));
    }
}
