//! Collaborator interfaces consumed by the dispatch pipeline.
//!
//! The pipeline never sees how bytes reach the shell or how artifacts are
//! read back. It talks to three seams:
//! - [`Channel`]: the raw, unframed interactive byte stream of the shell
//! - [`FileStore`]: random-access reads of artifacts, with a distinguishable
//!   not-found condition
//! - [`RemoteExec`]: an out-of-band "run this and give me stdout" primitive
//!
//! Concrete local implementations live in the submodules.

mod exec;
mod local_store;
mod pty;
#[cfg(test)]
pub(crate) mod scripted;

use std::future::Future;

use crate::error::{StoreError, TransportError};

pub use exec::ShellExec;
pub use local_store::LocalFileStore;
pub use pty::PtyChannel;

/// Interactive byte stream to the shell.
///
/// Methods take `&self`; implementations guard their handles internally so a
/// session can be shared by reference.
pub trait Channel {
    fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Non-blocking check whether `recv` would return bytes right now.
    fn recv_ready(&self) -> Result<bool, TransportError>;

    /// Return up to `max_bytes` already-received bytes (possibly none).
    fn recv(&self, max_bytes: usize) -> Result<Vec<u8>, TransportError>;
}

/// Metadata of an existing artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArtifactStat {
    pub len: u64,
}

/// Random-access side channel to the files the shell writes.
pub trait FileStore {
    fn stat(&self, path: &str) -> Result<ArtifactStat, StoreError>;

    /// Read at most `max_len` bytes starting at `offset`. Returns an empty
    /// buffer when `offset` is at or past the end.
    fn read_at(&self, path: &str, offset: u64, max_len: usize) -> Result<Vec<u8>, StoreError>;

    /// Read the whole artifact.
    fn read_all(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        const CHUNK: usize = 64 * 1024;
        let mut out = Vec::new();
        loop {
            let chunk = self.read_at(path, out.len() as u64, CHUNK)?;
            let done = chunk.len() < CHUNK;
            out.extend_from_slice(&chunk);
            if done {
                return Ok(out);
            }
        }
    }
}

/// Out-of-band command execution, independent of the interactive channel.
pub trait RemoteExec {
    /// Run `command` and return its standard output.
    fn exec(&self, command: &str) -> impl Future<Output = Result<String, TransportError>> + Send;
}

/// Quote `s` for a POSIX shell as a single word.
pub fn shell_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}
