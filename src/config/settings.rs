//! Typed view of the merged configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Complete honeypot shell configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LureConfig {
    pub honeypot: HoneypotConfig,
    pub shell: ShellConfig,
}

/// `[honeypot]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HoneypotConfig {
    /// Storage root of the artifact store
    pub download_path: PathBuf,

    pub hostname: String,

    /// JSON-lines event log file
    #[serde(default)]
    pub event_log: Option<PathBuf>,
}

/// `[shell]` table: identity of the emulated login
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShellConfig {
    pub user: String,
    pub uid: u32,
    pub gid: u32,
    pub home: String,
}
