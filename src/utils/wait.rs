//! Sleep-then-poll waiting shared by every blocking phase of a command.
//!
//! Existence waits and sentinel waits differ only in whether observed
//! progress pushes the deadline back, so both go through [`wait_until`].

use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::config::PollPolicy;

/// What a single probe observed.
#[derive(Debug, PartialEq, Eq)]
pub enum Probe<T> {
    /// The awaited condition holds.
    Ready(T),
    /// Nothing new yet.
    Pending,
    /// Something new arrived but the condition does not hold yet.
    /// Resets the deadline and re-probes without sleeping.
    Progress,
}

/// Repeatedly call `probe` until it reports `Ready`, fails, or `timeout`
/// elapses since the start (or since the last `Progress`).
///
/// Returns `Ok(None)` on timeout. The probe is always called at least once,
/// so a zero timeout still observes a condition that already holds.
pub async fn wait_until<T, E, F>(
    poll: PollPolicy,
    timeout: Duration,
    mut probe: F,
) -> Result<Option<T>, E>
where
    F: FnMut() -> Result<Probe<T>, E>,
{
    let mut deadline = Instant::now() + timeout;
    loop {
        match probe()? {
            Probe::Ready(value) => return Ok(Some(value)),
            Probe::Progress => {
                deadline = Instant::now() + timeout;
                continue;
            }
            Probe::Pending => {}
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        let delay = poll.next_delay().min(deadline - now);
        sleep(delay).await;
    }
}
