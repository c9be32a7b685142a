//! Init scripts that are advertised but missing

use crate::shell::{Command, Flow, Session, ShellResult};

/// `/etc/init.d/iptables`
#[derive(Debug, Default)]
pub struct InitScript;

impl Command for InitScript {
    fn start(&mut self, session: &mut Session, _args: &[String]) -> ShellResult<Flow> {
        session.write("bash: /etc/init.d/iptables: No such file or directory\n");
        Ok(Flow::Exit)
    }
}
