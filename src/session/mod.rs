//! Session root and per-command artifact naming.

mod context;
mod naming;

pub use context::{Session, SessionOptions, session_root};
pub use naming::{CommandArtifacts, sentinel_token};
