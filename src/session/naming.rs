//! Deterministic artifact paths and sentinel tokens.

use std::fmt;

/// Remote paths and sentinel for one command, derived from the session root
/// and the command's sequence number.
///
/// Tokens look like `__DONE_<N>__`. The trailing underscores terminate the
/// number, so no token is a prefix of another. They are not guaranteed unique
/// against output that prints the token on purpose.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommandArtifacts {
    pub seq: u64,
    pub history: String,
    pub stdout: String,
    pub stderr: String,
    pub status: String,
    pub sentinel: String,
}

impl CommandArtifacts {
    pub fn derive(root: &str, seq: u64) -> Self {
        let root = root.trim_end_matches('/');
        Self {
            seq,
            history: format!("{root}/history-cmd{seq}"),
            stdout: format!("{root}/stdout-cmd{seq}"),
            stderr: format!("{root}/stderr-cmd{seq}"),
            status: format!("{root}/status-cmd{seq}"),
            sentinel: sentinel_token(seq),
        }
    }

    /// All four artifact paths.
    pub fn paths(&self) -> [&str; 4] {
        [&self.history, &self.stdout, &self.stderr, &self.status]
    }
}

pub fn sentinel_token(seq: u64) -> String {
    format!("__DONE_{seq}__")
}

impl fmt::Display for CommandArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd{} ({})", self.seq, self.sentinel)
    }
}
