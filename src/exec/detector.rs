//! Sentinel detection on the channel byte stream.
//!
//! The channel is noisy: echoed input, prompts and job-control messages all
//! arrive on it. The sentinel is only a liveness signal. Waiting uses an
//! inactivity timeout that restarts whenever new bytes arrive.

use std::time::Duration;

use tracing::{debug, warn};

use super::transcript::Transcript;
use crate::config::PollPolicy;
use crate::error::TransportError;
use crate::transport::Channel;
use crate::utils::wait::{Probe, wait_until};

/// Streaming substring matcher with bounded memory.
///
/// Between chunks it keeps only the longest suffix of what it has seen that
/// is still a proper prefix of the token, so a token split across reads is
/// matched while memory stays independent of output size.
#[derive(Clone, Debug)]
pub struct SentinelScanner {
    token: Vec<u8>,
    tail: Vec<u8>,
}

impl SentinelScanner {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.as_bytes().to_vec(),
            tail: Vec::with_capacity(token.len()),
        }
    }

    /// Feed the next chunk; true once the token has been seen.
    pub fn feed(&mut self, chunk: &[u8]) -> bool {
        let mut window = std::mem::take(&mut self.tail);
        window.extend_from_slice(chunk);

        if self.token.is_empty()
            || window
                .windows(self.token.len())
                .any(|w| w == self.token.as_slice())
        {
            return true;
        }

        let keep = self.partial_len(&window);
        window.drain(..window.len() - keep);
        self.tail = window;
        false
    }

    /// Bytes currently retained between feeds.
    pub fn retained(&self) -> usize {
        self.tail.len()
    }

    fn partial_len(&self, window: &[u8]) -> usize {
        let max = (self.token.len() - 1).min(window.len());
        (1..=max)
            .rev()
            .find(|&k| window.ends_with(&self.token[..k]))
            .unwrap_or(0)
    }
}

/// Outcome of a sentinel wait.
#[derive(Clone, Debug)]
pub struct Detection {
    pub found: bool,
    pub bytes_seen: usize,
    /// Tail of the channel chatter observed during the wait.
    pub transcript: Transcript,
}

/// Read the channel until `token` appears or `inactivity` passes with no new
/// bytes. Not finding the token is not an error: the command may still be
/// running and nothing is done to stop it.
pub async fn wait_for_sentinel<C: Channel>(
    channel: &C,
    token: &str,
    inactivity: Duration,
    poll: PollPolicy,
    recv_chunk: usize,
) -> Result<Detection, TransportError> {
    let mut scanner = SentinelScanner::new(token);
    let mut transcript = Transcript::default();

    let found = wait_until(poll, inactivity, || -> Result<Probe<()>, TransportError> {
        if !channel.recv_ready()? {
            return Ok(Probe::Pending);
        }
        let bytes = channel.recv(recv_chunk)?;
        if bytes.is_empty() {
            return Ok(Probe::Pending);
        }
        transcript.append(&bytes);
        if scanner.feed(&bytes) {
            Ok(Probe::Ready(()))
        } else {
            Ok(Probe::Progress)
        }
    })
    .await?
    .is_some();

    if found {
        debug!(token, bytes = transcript.bytes_seen(), "Sentinel observed");
    } else {
        warn!(token, ?inactivity, "Sentinel not observed before inactivity timeout");
    }

    Ok(Detection {
        found,
        bytes_seen: transcript.bytes_seen(),
        transcript,
    })
}
