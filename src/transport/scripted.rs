//! In-memory stand-in for a remote shell, used by unit tests.
//!
//! Interprets the envelope lines the dispatcher sends, looks up a canned
//! [`Script`] for the command text and plays it back one step per status
//! probe, so tests can observe incremental output deterministically.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{ArtifactStat, Channel, FileStore};
use crate::error::{StoreError, TransportError};

/// Canned behavior for one command text.
#[derive(Clone, Debug)]
pub struct Script {
    pub stdout_chunks: Vec<Vec<u8>>,
    pub stderr_chunks: Vec<Vec<u8>>,
    /// Raw status artifact content; `None` means the status never appears.
    pub status: Option<Vec<u8>>,
    /// Emit the sentinel on the channel once the status is written.
    pub sentinel: bool,
    /// Deliver the sentinel split across two channel reads.
    pub split_sentinel: bool,
}

impl Script {
    pub fn ok(stdout: &str) -> Self {
        Self {
            stdout_chunks: vec![stdout.as_bytes().to_vec()],
            stderr_chunks: Vec::new(),
            status: Some(b"0\n".to_vec()),
            sentinel: true,
            split_sentinel: false,
        }
    }

    pub fn failing(stderr: &str, code: i32) -> Self {
        Self {
            stdout_chunks: Vec::new(),
            stderr_chunks: vec![stderr.as_bytes().to_vec()],
            status: Some(format!("{code}\n").into_bytes()),
            sentinel: true,
            split_sentinel: false,
        }
    }

    pub fn chunked(chunks: &[&str]) -> Self {
        Self {
            stdout_chunks: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
            ..Self::ok("")
        }
    }

    pub fn hanging() -> Self {
        Self {
            status: None,
            sentinel: false,
            ..Self::ok("partial")
        }
    }

    fn steps(&self) -> usize {
        self.stdout_chunks.len().max(self.stderr_chunks.len())
    }
}

struct Job {
    seq: String,
    stdout: String,
    stderr: String,
    status: String,
    script: Script,
    step: usize,
    finished: bool,
}

#[derive(Default)]
struct State {
    scripts: HashMap<String, Script>,
    files: HashMap<String, Vec<u8>>,
    outbox: VecDeque<Vec<u8>>,
    sent: Vec<String>,
    job: Option<Job>,
    failing_path: Option<String>,
    closed: bool,
}

/// Shared handle; clone it to get both the channel and the store side.
#[derive(Clone, Default)]
pub struct ScriptedRemote {
    state: Arc<Mutex<State>>,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn script(&self, command: &str, script: Script) {
        self.state().scripts.insert(command.to_string(), script);
    }

    /// Every line sent on the channel so far.
    pub fn sent(&self) -> Vec<String> {
        self.state().sent.clone()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state().files.get(path).cloned()
    }

    /// Make every store access to `path` fail with a non-not-found error.
    pub fn fail_path(&self, path: &str) {
        self.state().failing_path = Some(path.to_string());
    }

    /// Queue raw bytes on the channel, as unrelated shell chatter would.
    pub fn push_chatter(&self, bytes: &[u8]) {
        self.state().outbox.push_back(bytes.to_vec());
    }

    pub fn close(&self) {
        self.state().closed = true;
    }
}

/// Single-quoted words in `line`, in order.
fn quoted_words(line: &str) -> Vec<String> {
    line.split('\'')
        .enumerate()
        .filter(|(i, _)| i % 2 == 1)
        .map(|(_, w)| w.to_string())
        .collect()
}

impl State {
    fn interpret(&mut self, line: &str) {
        // PTY echo of whatever was typed.
        self.outbox.push_back(format!("{line}\r\n").into_bytes());

        if let Some(rest) = line.strip_prefix("echo \"") {
            if let Some((body, target)) = rest.rsplit_once("\" > ") {
                let text = body.replace("\\\"", "\"");
                let path = target.trim_matches('\'').to_string();
                self.files.insert(path, format!("{text}\n").into_bytes());
                return;
            }
        }

        if line.starts_with(". ") {
            let words = quoted_words(line);
            if words.len() < 4 {
                return;
            }
            let command = self
                .files
                .get(&words[0])
                .map(|b| String::from_utf8_lossy(b).trim_end().to_string())
                .unwrap_or_default();
            let script = self
                .scripts
                .get(&command)
                .cloned()
                .unwrap_or_else(|| Script::ok(""));
            let seq = line
                .rsplit(' ')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
            self.job = Some(Job {
                seq,
                stdout: words[1].clone(),
                stderr: words[2].clone(),
                status: words[3].clone(),
                script,
                step: 0,
                finished: false,
            });
            return;
        }

        self.outbox.push_back(b"$ ".to_vec());
    }

    /// One step of the running job; called on every status probe.
    fn advance(&mut self, status_path: &str) {
        let Some(job) = self.job.as_mut() else {
            return;
        };
        if job.status != status_path || job.finished {
            return;
        }

        if job.step < job.script.steps() {
            let out = job.script.stdout_chunks.get(job.step).cloned().unwrap_or_default();
            let err = job.script.stderr_chunks.get(job.step).cloned().unwrap_or_default();
            self.files.entry(job.stdout.clone()).or_default().extend(out);
            self.files.entry(job.stderr.clone()).or_default().extend(err);
            job.step += 1;
            return;
        }

        self.files.entry(job.stdout.clone()).or_default();
        self.files.entry(job.stderr.clone()).or_default();
        if let Some(status) = job.script.status.clone() {
            self.files.insert(job.status.clone(), status);
            job.finished = true;
            if job.script.sentinel {
                let token = format!("__DONE_{}__\r\n", job.seq).into_bytes();
                if job.script.split_sentinel {
                    let (a, b) = token.split_at(5);
                    self.outbox.push_back(a.to_vec());
                    self.outbox.push_back(b.to_vec());
                } else {
                    self.outbox.push_back(token);
                }
            }
        }
    }

    fn check_failing(&self, path: &str) -> Result<(), StoreError> {
        if self.failing_path.as_deref() == Some(path) {
            return Err(StoreError::Io {
                path: path.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            });
        }
        Ok(())
    }
}

impl Channel for ScriptedRemote {
    fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state();
        if state.closed {
            return Err(TransportError::Closed);
        }
        let text = String::from_utf8_lossy(data).into_owned();
        for line in text.lines() {
            state.sent.push(line.to_string());
            state.interpret(line);
        }
        Ok(())
    }

    fn recv_ready(&self) -> Result<bool, TransportError> {
        let state = self.state();
        if state.outbox.is_empty() && state.closed {
            return Err(TransportError::Closed);
        }
        Ok(!state.outbox.is_empty())
    }

    fn recv(&self, max_bytes: usize) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state();
        let Some(mut chunk) = state.outbox.pop_front() else {
            if state.closed {
                return Err(TransportError::Closed);
            }
            return Ok(Vec::new());
        };
        if chunk.len() > max_bytes {
            let rest = chunk.split_off(max_bytes);
            state.outbox.push_front(rest);
        }
        Ok(chunk)
    }
}

impl FileStore for ScriptedRemote {
    fn stat(&self, path: &str) -> Result<ArtifactStat, StoreError> {
        let mut state = self.state();
        state.check_failing(path)?;
        state.advance(path);
        state
            .files
            .get(path)
            .map(|f| ArtifactStat { len: f.len() as u64 })
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    fn read_at(&self, path: &str, offset: u64, max_len: usize) -> Result<Vec<u8>, StoreError> {
        let state = self.state();
        state.check_failing(path)?;
        let file = state
            .files
            .get(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        let start = (offset as usize).min(file.len());
        let end = start.saturating_add(max_len).min(file.len());
        Ok(file[start..end].to_vec())
    }
}
