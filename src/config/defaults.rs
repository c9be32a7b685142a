//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Storage root for captured artifacts (default: "var/lib/lure/downloads")
    pub download_path: String,

    /// Hostname shown to attackers (default: "svr04")
    pub hostname: String,

    /// JSON-lines event log; events are only logged via `log` when unset
    pub event_log: Option<String>,

    /// Login user of emulated sessions (default: "root")
    pub user: String,

    /// uid of the session user (default: 0)
    pub uid: u32,

    /// gid of the session user (default: 0)
    pub gid: u32,

    /// Home and initial working directory (default: "/root")
    pub home: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            download_path: "var/lib/lure/downloads".to_string(),
            hostname: "svr04".to_string(),
            event_log: None,
            user: "root".to_string(),
            uid: 0,
            gid: 0,
            home: "/root".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "honeypot": {
                "download_path": self.download_path,
                "hostname": self.hostname,
                "event_log": self.event_log,
            },
            "shell": {
                "user": self.user,
                "uid": self.uid,
                "gid": self.gid,
                "home": self.home,
            }
        })
    }
}
