//! Session root setup and teardown.
//!
//! A session is created once per connection: the base directory is queried
//! out of band, a timestamped root is composed under `.<namespace>` and a
//! single `mkdir -p` goes down the channel. Creation is not confirmed; a
//! fixed settle delay is all that separates it from the first dispatch.

use std::time::Duration;

use chrono::Local;
use tracing::{debug, info, warn};

use super::naming::CommandArtifacts;
use crate::error::SessionError;
use crate::exec::transcript::strip_ansi_codes;
use crate::transport::{Channel, FileStore, RemoteExec, shell_quote};

/// Options for [`Session::initialize`].
#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub namespace: String,
    pub mkdir_settle: Duration,
    /// Ask the shell for its `$PS1` before creating the root.
    pub probe_prompt: bool,
    pub recv_chunk: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            namespace: "rash".to_string(),
            mkdir_settle: Duration::from_millis(100),
            probe_prompt: false,
            recv_chunk: 4096,
        }
    }
}

/// Immutable per-connection context passed by reference to every operation.
pub struct Session<C, S> {
    root: String,
    channel: C,
    store: S,
    prompt: Option<String>,
}

impl<C: Channel, S: FileStore> Session<C, S> {
    pub async fn initialize<E: RemoteExec>(
        channel: C,
        store: S,
        exec: &E,
        options: &SessionOptions,
    ) -> Result<Self, SessionError> {
        let prompt = if options.probe_prompt {
            probe_prompt(&channel, options.recv_chunk).await?
        } else {
            None
        };

        let base = exec.exec("echo $HOME").await?;
        let base = base.trim();
        if base.is_empty() {
            return Err(SessionError::EmptyBaseDir);
        }

        let root = session_root(base, &options.namespace, &session_timestamp());
        channel.send(format!("mkdir -p {}\n", shell_quote(&root)).as_bytes())?;
        tokio::time::sleep(options.mkdir_settle).await;

        info!(root, ?prompt, "Session initialized");

        Ok(Self {
            root,
            channel,
            store,
            prompt,
        })
    }

    /// Build a session around an already existing root.
    pub fn from_parts(root: impl Into<String>, channel: C, store: S) -> Self {
        Self {
            root: root.into(),
            channel,
            store,
            prompt: None,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Last line the shell printed for `$PS1`, when probed.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn artifacts(&self, seq: u64) -> CommandArtifacts {
        CommandArtifacts::derive(&self.root, seq)
    }

    /// End the session and report the disk usage of its root.
    ///
    /// The channel and store are dropped here; a failing size query is only
    /// logged.
    pub async fn close<E: RemoteExec>(self, exec: &E) -> Option<String> {
        let size = match exec.exec(&format!("du -sh {}", shell_quote(&self.root))).await {
            Ok(out) => out.split_whitespace().next().map(str::to_string),
            Err(e) => {
                warn!("Failed to measure session directory: {}", e);
                None
            }
        };
        info!(root = self.root, ?size, "Session closed");
        size
    }
}

/// `<base>/.<namespace>/session-<timestamp>`
pub fn session_root(base: &str, namespace: &str, timestamp: &str) -> String {
    format!(
        "{}/.{}/session-{}",
        base.trim_end_matches('/'),
        namespace,
        timestamp
    )
}

fn session_timestamp() -> String {
    Local::now().format("%Y-%m-%d-%H%M-%S-%3f").to_string()
}

async fn probe_prompt<C: Channel>(channel: &C, recv_chunk: usize) -> Result<Option<String>, SessionError> {
    tokio::time::sleep(Duration::from_millis(200)).await;
    channel.send(b"echo \"$PS1\"\n")?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let mut raw = Vec::new();
    while channel.recv_ready()? {
        raw.extend(channel.recv(recv_chunk)?);
    }
    let text = strip_ansi_codes(&String::from_utf8_lossy(&raw));
    let prompt = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .map(str::to_string);
    debug!(?prompt, "Probed shell prompt");
    Ok(prompt)
}
