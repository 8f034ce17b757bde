//! Runtime configuration.
//!
//! Every knob has a default taken from how the dispatch protocol behaves in
//! practice, so an empty (or absent) TOML file yields a working setup.
//! Command-line flags are applied on top in `main`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::suite::MatchPolicy;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RashConfig {
    /// Directory under the base directory holding all sessions (`.<namespace>`).
    pub namespace: String,
    /// Program spawned inside the PTY. Falls back to `$SHELL`, then `/bin/sh`.
    pub shell: Option<String>,
    /// Directory for log files. Defaults to `logs/` next to the executable.
    pub log_dir: Option<PathBuf>,
    /// Lines that end the interactive loop (compared case-insensitively).
    pub exit_keywords: Vec<String>,
    pub match_policy: MatchPolicy,
    pub timing: TimingConfig,
}

impl Default for RashConfig {
    fn default() -> Self {
        Self {
            namespace: "rash".to_string(),
            shell: None,
            log_dir: None,
            exit_keywords: vec!["exit".to_string(), "quit".to_string(), "logout".to_string()],
            match_policy: MatchPolicy::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl RashConfig {
    /// Load from a TOML file, or return defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Shell program to run in the PTY.
    pub fn shell_program(&self) -> String {
        self.shell
            .clone()
            .or_else(|| std::env::var("SHELL").ok())
            .unwrap_or_else(|| "/bin/sh".to_string())
    }
}

/// Timing knobs, in milliseconds as they appear in the TOML file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub mkdir_settle_ms: u64,
    pub dispatch_settle_ms: u64,
    pub stream_poll_ms: u64,
    pub sentinel_poll_ms: u64,
    pub sentinel_timeout_ms: u64,
    pub artifact_poll_ms: u64,
    pub artifact_timeout_ms: u64,
    pub artifact_read_delay_ms: u64,
    pub command_timeout_ms: u64,
    pub poll_jitter_ms: u64,
    pub recv_chunk: usize,
    pub stream_chunk_limit: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            mkdir_settle_ms: 100,
            dispatch_settle_ms: 50,
            stream_poll_ms: 100,
            sentinel_poll_ms: 50,
            sentinel_timeout_ms: 10_000,
            artifact_poll_ms: 50,
            artifact_timeout_ms: 10_000,
            artifact_read_delay_ms: 50,
            command_timeout_ms: 300_000,
            poll_jitter_ms: 10,
            recv_chunk: 4096,
            stream_chunk_limit: 64 * 1024,
        }
    }
}

/// Resolved timing used by the pipeline.
#[derive(Clone, Debug)]
pub struct Timing {
    pub mkdir_settle: Duration,
    pub dispatch_settle: Duration,
    pub stream_poll: PollPolicy,
    pub sentinel_poll: PollPolicy,
    pub sentinel_timeout: Duration,
    pub artifact_poll: PollPolicy,
    pub artifact_timeout: Duration,
    pub artifact_read_delay: Duration,
    pub command_timeout: Duration,
    pub recv_chunk: usize,
    pub stream_chunk_limit: usize,
}

impl From<&TimingConfig> for Timing {
    fn from(cfg: &TimingConfig) -> Self {
        let jitter = Duration::from_millis(cfg.poll_jitter_ms);
        let poll = |ms: u64| PollPolicy::new(Duration::from_millis(ms), jitter);
        Self {
            mkdir_settle: Duration::from_millis(cfg.mkdir_settle_ms),
            dispatch_settle: Duration::from_millis(cfg.dispatch_settle_ms),
            stream_poll: poll(cfg.stream_poll_ms),
            sentinel_poll: poll(cfg.sentinel_poll_ms),
            sentinel_timeout: Duration::from_millis(cfg.sentinel_timeout_ms),
            artifact_poll: poll(cfg.artifact_poll_ms),
            artifact_timeout: Duration::from_millis(cfg.artifact_timeout_ms),
            artifact_read_delay: Duration::from_millis(cfg.artifact_read_delay_ms),
            command_timeout: Duration::from_millis(cfg.command_timeout_ms),
            // A zero-sized read would never make progress.
            recv_chunk: cfg.recv_chunk.max(1),
            stream_chunk_limit: cfg.stream_chunk_limit.max(1),
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

/// Sleep interval between polls: `base` plus up to `jitter` of random slack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub base: Duration,
    pub jitter: Duration,
}

impl PollPolicy {
    pub fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    pub fn fixed(base: Duration) -> Self {
        Self::new(base, Duration::ZERO)
    }

    pub fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.base;
        }
        let slack = rand::random::<f64>() * self.jitter.as_secs_f64();
        self.base + Duration::from_secs_f64(slack)
    }
}
