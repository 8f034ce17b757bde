//! Error taxonomy for the dispatch-and-capture pipeline.
//!
//! Transport and store failures come from the collaborators; session and
//! command errors are what the pipeline itself surfaces. Non-fatal conditions
//! (sentinel timeout, unparseable exit status) are not errors: they are
//! recorded as [`crate::exec::Advisory`] values on the result.

use std::time::Duration;

/// Failures of the interactive byte channel or the out-of-band exec primitive.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("channel closed by remote shell")]
    Closed,

    #[error("failed to spawn shell: {0}")]
    Spawn(String),

    #[error("exec of `{command}` failed: {reason}")]
    Exec { command: String, reason: String },

    #[error("exec of `{command}` timed out after {after:?}")]
    ExecTimeout { command: String, after: Duration },

    #[error("lock poisoned: {0}")]
    Poisoned(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the side file store.
///
/// `NotFound` is distinguishable from every other failure because a missing
/// artifact is a normal condition while the remote redirect is still pending.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Map an IO error for `path`, keeping not-found distinct.
    pub fn from_io(path: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(path.to_string())
        } else {
            StoreError::Io {
                path: path.to_string(),
                source,
            }
        }
    }
}

/// Failures while establishing the session root.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("could not determine remote base directory")]
    EmptyBaseDir,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures that abort a single command's pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("artifact {path} not found within {waited:?}")]
    ArtifactTimeout { path: String, waited: Duration },

    #[error("output streaming failed: {0}")]
    Streamer(#[source] StoreError),

    #[error("artifact read failed: {0}")]
    Store(#[source] StoreError),
}

impl CommandError {
    /// Transport failures end the whole session; everything else only aborts
    /// the current command.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CommandError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_from_io_keeps_not_found_distinct() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(StoreError::from_io("/tmp/x", missing).is_not_found());

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        let err = StoreError::from_io("/tmp/x", denied);
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("/tmp/x"));
    }

    #[test]
    fn test_only_transport_errors_are_fatal() {
        assert!(CommandError::Transport(TransportError::Closed).is_fatal());
        let timeout = CommandError::ArtifactTimeout {
            path: "status-cmd1".to_string(),
            waited: Duration::from_secs(1),
        };
        assert!(!timeout.is_fatal());
    }
}
