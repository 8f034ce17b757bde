//! Bounded record of channel chatter seen while waiting on a command.
//!
//! The channel carries echoed input, prompts and job-control noise that is
//! never part of a result. Only the most recent bytes are kept, cleaned of
//! terminal control sequences, for debug logging.

/// Keeps at most `max_len` trailing bytes of everything appended.
#[derive(Clone, Debug)]
pub struct Transcript {
    buf: Vec<u8>,
    max_len: usize,
    total: usize,
}

impl Transcript {
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::with_capacity(max_len.min(4096)),
            max_len,
            total: 0,
        }
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.total += bytes.len();
        if bytes.len() >= self.max_len {
            self.buf.clear();
            self.buf
                .extend_from_slice(&bytes[bytes.len() - self.max_len..]);
            return;
        }
        let overflow = (self.buf.len() + bytes.len()).saturating_sub(self.max_len);
        if overflow > 0 {
            self.buf.drain(..overflow);
        }
        self.buf.extend_from_slice(bytes);
    }

    /// Total bytes ever appended, including the ones dropped.
    pub fn bytes_seen(&self) -> usize {
        self.total
    }

    /// Retained tail as text with ANSI sequences removed.
    pub fn cleaned(&self) -> String {
        strip_ansi_codes(&String::from_utf8_lossy(&self.buf))
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(16 * 1024)
    }
}

/// Strip ANSI escape codes from text.
/// Removes color codes, cursor movements, and other terminal control sequences.
pub fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            if chars.peek() == Some(&'[') {
                chars.next();
                // CSI: runs until a letter
                while let Some(&next_ch) = chars.peek() {
                    chars.next();
                    if next_ch.is_ascii_alphabetic() {
                        break;
                    }
                }
            } else if chars.peek() == Some(&']') {
                chars.next();
                // OSC: runs until BEL or ST
                while let Some(&next_ch) = chars.peek() {
                    chars.next();
                    if next_ch == '\x07' {
                        break;
                    }
                    if next_ch == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
        } else if ch != '\r' {
            result.push(ch);
        }
    }

    result
}
