//! Configuration
//!
//! Three layers, merged in order (later wins):
//! 1. Built-in defaults
//! 2. Config file (`etc/lure.toml` or `--config`)
//! 3. CLI flags

mod defaults;
mod effective;
mod merge;
mod settings;

pub use defaults::BuiltinDefaults;
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, DEFAULT_CONFIG_PATH};
pub use merge::{deep_merge, merge_layers};
pub use settings::{HoneypotConfig, LureConfig, ShellConfig};
