//! Built-in emulated commands
//!
//! Each command is registered under its bare name and its absolute path so
//! both `free` and `/usr/bin/free` resolve.

mod free;
mod init_d;
mod nproc;
mod pico;
mod scp;

pub use free::Free;
pub use init_d::InitScript;
pub use nproc::Nproc;
pub use pico::Pico;
pub use scp::Scp;

use crate::shell::{Command, CommandRegistry};

/// Register every built-in command.
pub fn register_all(registry: &mut CommandRegistry) {
    registry.register(&["free", "/usr/bin/free"], || Box::new(Free) as Box<dyn Command>);
    registry.register(&["nproc", "/usr/bin/nproc"], || Box::new(Nproc) as Box<dyn Command>);
    registry.register(&["pico", "/usr/bin/pico"], || Box::new(Pico) as Box<dyn Command>);
    registry.register(&["/etc/init.d/iptables"], || {
        Box::new(InitScript) as Box<dyn Command>
    });
    registry.register(&["scp", "/usr/bin/scp"], || {
        Box::new(Scp::default()) as Box<dyn Command>
    });
}
