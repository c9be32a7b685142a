//! lure - emulated shell commands for a honeypot
//!
//! Sessions run a small set of emulated Unix commands against a fake
//! filesystem. Anything an attacker pushes in, whether an `scp` upload or
//! input piped into a command, is captured into a content-addressed
//! artifact store (`lure_artifact`) and recorded as a session event.

pub mod commands;
pub mod config;
pub mod event;
pub mod shell;
pub mod vfs;

pub use config::{EffectiveConfig, LureConfig};
pub use event::{Event, EventKind, EventSink, JsonlSink, MemorySink, NullSink};
pub use shell::{Command, CommandRegistry, Flow, Session, ShellError, ShellResult, User};
pub use vfs::FakeFs;

pub use lure_artifact::{ArtifactStore, Committed, ContentHash};
