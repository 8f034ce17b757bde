//! Line sources for the interactive loop.

use std::collections::VecDeque;
use std::io;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

/// One read from a line source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineEvent {
    Line(String),
    /// The user interrupted at the prompt (Ctrl-C).
    Interrupted,
    /// End of input (Ctrl-D or closed stdin).
    Eof,
}

pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> io::Result<LineEvent>;
}

/// Terminal line editor with in-memory history.
pub struct RustylineSource {
    editor: DefaultEditor,
}

impl RustylineSource {
    pub fn new() -> io::Result<Self> {
        let editor = DefaultEditor::new().map_err(readline_to_io)?;
        Ok(Self { editor })
    }
}

impl LineSource for RustylineSource {
    fn read_line(&mut self, prompt: &str) -> io::Result<LineEvent> {
        // The editor blocks on the terminal; keep the runtime's other workers free.
        let read = tokio::task::block_in_place(|| self.editor.readline(prompt));
        match read {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(e) = self.editor.add_history_entry(line.as_str()) {
                        warn!("Failed to record history entry: {}", e);
                    }
                }
                Ok(LineEvent::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(LineEvent::Interrupted),
            Err(ReadlineError::Eof) => Ok(LineEvent::Eof),
            Err(e) => Err(readline_to_io(e)),
        }
    }
}

fn readline_to_io(e: ReadlineError) -> io::Error {
    match e {
        ReadlineError::Io(e) => e,
        other => io::Error::other(other.to_string()),
    }
}

/// Pre-recorded events, played back in order and then `Eof`.
#[derive(Clone, Debug, Default)]
pub struct ScriptedLines {
    events: VecDeque<LineEvent>,
}

impl ScriptedLines {
    pub fn new(events: impl IntoIterator<Item = LineEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }

    /// Convenience for plain lines.
    pub fn lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(lines.into_iter().map(|l| LineEvent::Line(l.to_string())))
    }
}

impl LineSource for ScriptedLines {
    fn read_line(&mut self, _prompt: &str) -> io::Result<LineEvent> {
        Ok(self.events.pop_front().unwrap_or(LineEvent::Eof))
    }
}
