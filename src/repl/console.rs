//! Terminal output sink.

use std::io::Write;

use tracing::warn;

use crate::exec::{OutputSink, StreamKind};

/// Writes partial stdout/stderr to the process's own stdout/stderr as it
/// arrives.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn emit(&mut self, stream: StreamKind, _offset: u64, bytes: &[u8]) {
        let written = match stream {
            StreamKind::Stdout => {
                let mut out = std::io::stdout().lock();
                out.write_all(bytes).and_then(|()| out.flush())
            }
            StreamKind::Stderr => {
                let mut err = std::io::stderr().lock();
                err.write_all(bytes).and_then(|()| err.flush())
            }
        };
        if let Err(e) = written {
            warn!(?stream, "Failed to write partial output: {}", e);
        }
    }
}
