//! rash - run one command at a time over a raw interactive shell stream.
//!
//! The shell on the other end of a [`Channel`](transport::Channel) offers no
//! framing: no exit codes, no separation of stdout and stderr, no signal that
//! a command finished. rash gets all three by sending every command inside an
//! envelope that redirects its output into per-command artifact files, records
//! the exit status in a fourth file, and prints a unique sentinel token once
//! it is done. A side [`FileStore`](transport::FileStore) is polled for the
//! artifacts, so partial output can be streamed while the command runs.
//!
//! # Example
//!
//! ```no_run
//! use rash::config::Timing;
//! use rash::exec::{Executor, NullSink};
//! use rash::session::{Session, SessionOptions};
//! use rash::transport::{LocalFileStore, PtyChannel, ShellExec};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let channel = PtyChannel::spawn("/bin/sh")?;
//!     let exec = ShellExec::local();
//!     let session =
//!         Session::initialize(channel, LocalFileStore::new(), &exec, &SessionOptions::default())
//!             .await?;
//!
//!     let mut executor = Executor::new(&session, Timing::default());
//!     let result = executor.run("whoami", &mut NullSink).await?;
//!     println!("{}", result.summary());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod exec;
pub mod repl;
pub mod session;
pub mod suite;
pub mod transport;
pub mod utils;

// Re-export commonly used types
pub use config::{RashConfig, Timing};
pub use error::{CommandError, SessionError, StoreError, TransportError};
pub use exec::{Advisory, CommandResult, Completion, Executor};
pub use session::{CommandArtifacts, Session, SessionOptions};
pub use suite::{MatchPolicy, ShellTest, SuiteReport};
