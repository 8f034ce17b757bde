//! PTY-backed shell channel.
//!
//! Spawns the shell program inside a pseudo terminal and exposes its raw byte
//! stream as a [`Channel`]. A dedicated reader thread forwards PTY output into
//! a bounded queue so the pipeline can poll it without blocking.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::Mutex;

use portable_pty::{Child, CommandBuilder, MasterPty, PtySize, native_pty_system};
use tokio::sync::mpsc::{self, Receiver, error::TryRecvError};
use tracing::{debug, error, warn};

use super::Channel;
use crate::error::TransportError;

// Channel buffer sizes
const PTY_OUTPUT_BUFFER: usize = 1024; // chunks queued before the reader thread blocks
const PTY_READ_BUFFER: usize = 16384; // 16KB per read

// Wide enough that echoed envelopes rarely wrap.
const PTY_COLS: u16 = 240;
const PTY_ROWS: u16 = 24;

struct Inbox {
    rx: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
    closed: bool,
}

impl Inbox {
    /// Move everything the reader thread has queued into `pending`.
    fn drain(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(chunk) => self.pending.extend(chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
    }
}

/// Shell subprocess attached to a PTY.
pub struct PtyChannel {
    program: String,
    #[allow(unused)]
    pty_master: Mutex<Box<dyn MasterPty + Send>>,
    pty_writer: Mutex<Box<dyn Write + Send>>,
    child: Mutex<Box<dyn Child + Send + Sync>>,
    inbox: Mutex<Inbox>,
}

impl PtyChannel {
    /// Spawn `program` in a fresh PTY.
    ///
    /// `program` is split on whitespace, so `"ssh -tt host"` works as well as
    /// `"/bin/sh"`. The child inherits the current working directory.
    pub fn spawn(program: &str) -> Result<Self, TransportError> {
        let mut words = program.split_whitespace();
        let shell_cmd = words
            .next()
            .ok_or_else(|| TransportError::Spawn("empty shell program".to_string()))?;

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: PTY_ROWS,
                cols: PTY_COLS,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| TransportError::Spawn(format!("openpty failed: {e}")))?;

        let mut cmd = CommandBuilder::new(shell_cmd);
        cmd.args(words);
        // Nothing renders this stream; keep escape sequences to a minimum.
        cmd.env("TERM", "dumb");
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| TransportError::Spawn(format!("{program}: {e}")))?;

        // Drop slave side in parent process
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| TransportError::Spawn(format!("PTY reader: {e}")))?;
        let pty_writer = pair
            .master
            .take_writer()
            .map_err(|e| TransportError::Spawn(format!("PTY writer: {e}")))?;

        let (output_tx, output_rx) = mpsc::channel::<Vec<u8>>(PTY_OUTPUT_BUFFER);

        std::thread::spawn(move || {
            let mut reader = reader;
            let mut buf = [0u8; PTY_READ_BUFFER];

            loop {
                match reader.read(&mut buf) {
                    Ok(0) => {
                        debug!("PTY reached EOF, shell exited");
                        break;
                    }
                    Ok(n) => {
                        // Use blocking_send since we're in a std::thread
                        if output_tx.blocking_send(buf[..n].to_vec()).is_err() {
                            // Receiver dropped, exit thread
                            break;
                        }
                    }
                    Err(e) => {
                        if e.kind() != std::io::ErrorKind::Interrupted {
                            // On Linux a closed PTY reports EIO rather than EOF.
                            debug!("PTY read ended: {}", e);
                            break;
                        }
                    }
                }
            }
        });

        debug!(program, "Spawned shell in PTY");

        Ok(Self {
            program: program.to_string(),
            pty_master: Mutex::new(pair.master),
            pty_writer: Mutex::new(pty_writer),
            child: Mutex::new(child),
            inbox: Mutex::new(Inbox {
                rx: output_rx,
                pending: VecDeque::new(),
                closed: false,
            }),
        })
    }

    fn lock_inbox(&self) -> Result<std::sync::MutexGuard<'_, Inbox>, TransportError> {
        self.inbox
            .lock()
            .map_err(|e| TransportError::Poisoned(format!("PTY inbox: {e}")))
    }
}

impl Channel for PtyChannel {
    fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut pty_writer = self
            .pty_writer
            .lock()
            .map_err(|e| TransportError::Poisoned(format!("PTY writer: {e}")))?;

        pty_writer.write_all(data)?;
        pty_writer.flush()?;
        Ok(())
    }

    fn recv_ready(&self) -> Result<bool, TransportError> {
        let mut inbox = self.lock_inbox()?;
        inbox.drain();
        if !inbox.pending.is_empty() {
            return Ok(true);
        }
        if inbox.closed {
            return Err(TransportError::Closed);
        }
        Ok(false)
    }

    fn recv(&self, max_bytes: usize) -> Result<Vec<u8>, TransportError> {
        let mut inbox = self.lock_inbox()?;
        inbox.drain();
        if inbox.pending.is_empty() && inbox.closed {
            return Err(TransportError::Closed);
        }
        let n = max_bytes.min(inbox.pending.len());
        Ok(inbox.pending.drain(..n).collect())
    }
}

impl Drop for PtyChannel {
    fn drop(&mut self) {
        match self.child.lock() {
            Ok(mut child) => {
                if let Ok(Some(_)) = child.try_wait() {
                    return;
                }
                if let Err(e) = child.kill() {
                    warn!(program = %self.program, "Failed to kill shell process: {}", e);
                } else {
                    debug!(program = %self.program, "Killed shell process");
                }
            }
            Err(e) => error!("Shell child lock poisoned on drop: {}", e),
        }
    }
}
