//! Emulated shell sessions
//!
//! A `Session` holds what one attacker connection sees: a fake filesystem,
//! a working directory, a login identity and buffered terminal output.
//! Commands are looked up in a `CommandRegistry` and driven through the
//! `Command` trait.

mod command;
pub mod getopt;
mod session;

pub use command::{Command, CommandFactory, CommandRegistry, Flow};
pub use getopt::{getopt, GetoptError, Opts};
pub use session::{Session, User};

use lure_artifact::StoreError;
use thiserror::Error;

use crate::vfs::VfsError;

/// Errors raised while running an emulated command
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("artifact store: {0}")]
    Store(#[from] StoreError),

    #[error("fake filesystem: {0}")]
    Vfs(#[from] VfsError),
}

/// Result type for shell operations
pub type ShellResult<T> = Result<T, ShellError>;
