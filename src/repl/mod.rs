//! Interactive loop: one user line at a time through the executor.

mod console;
mod input;

use std::io::Write;

use anyhow::{Context, Result};
use tracing::info;

use crate::exec::{Executor, OutputSink};
use crate::transport::{Channel, FileStore};

pub use console::ConsoleSink;
pub use input::{LineEvent, LineSource, RustylineSource, ScriptedLines};

/// Why the loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopEnd {
    Keyword,
    EndOfInput,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopSummary {
    pub commands: usize,
    pub aborted: usize,
    pub end: LoopEnd,
}

/// Whether `line` is one of `keywords`, ignoring case and surrounding
/// whitespace.
pub fn is_exit_keyword(keywords: &[String], line: &str) -> bool {
    let line = line.trim();
    keywords.iter().any(|k| k.eq_ignore_ascii_case(line))
}

/// Read lines until an exit keyword or end of input, running each one.
///
/// Empty lines are skipped and an interrupt at the prompt only prints a hint.
/// A command that aborts is reported and the loop moves on; a transport
/// failure ends the loop with an error.
pub async fn run_interactive<C, S, L, O, W>(
    executor: &mut Executor<'_, C, S>,
    lines: &mut L,
    sink: &mut O,
    out: &mut W,
    exit_keywords: &[String],
) -> Result<LoopSummary>
where
    C: Channel,
    S: FileStore,
    L: LineSource,
    O: OutputSink,
    W: Write,
{
    let mut commands = 0;
    let mut aborted = 0;

    writeln!(out, "\nEntering interactive mode. Type 'exit' or press CTRL-D to quit.\n")?;

    let end = loop {
        let line = match lines.read_line("> ").context("Failed to read input line")? {
            LineEvent::Line(line) => line,
            LineEvent::Interrupted => {
                writeln!(out, "\nInterrupted. Type 'exit' to quit.")?;
                continue;
            }
            LineEvent::Eof => {
                writeln!(out, "\n[EOF] CTRL-D received. Exiting.")?;
                break LoopEnd::EndOfInput;
            }
        };

        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if is_exit_keyword(exit_keywords, command) {
            writeln!(out, "Exiting session...")?;
            break LoopEnd::Keyword;
        }

        let seq = executor.next_seq();
        commands += 1;
        match executor.run(command, sink).await {
            Ok(result) => {
                for advisory in &result.advisories {
                    writeln!(out, "[WARNING] {advisory}")?;
                }
                writeln!(out, "{}", result.summary())?;
            }
            Err(e) if e.is_fatal() => {
                return Err(e).with_context(|| format!("Session lost while running cmd{seq}"));
            }
            Err(e) => {
                aborted += 1;
                writeln!(out, "[ABORTED] cmd{seq}: {e}")?;
            }
        }
    };

    info!(commands, aborted, ?end, "Interactive loop ended");
    Ok(LoopSummary {
        commands,
        aborted,
        end,
    })
}
