//! Command trait and registry

use std::collections::BTreeMap;

use super::session::Session;
use super::ShellResult;

/// Whether a command is done or wants more input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Exit,
    Continue,
}

/// An emulated command.
///
/// `start` runs first. A command that returns `Flow::Continue` receives
/// stdin through `input` and is told about end of input through `eof`.
pub trait Command {
    fn start(&mut self, session: &mut Session, args: &[String]) -> ShellResult<Flow>;

    fn input(&mut self, _session: &mut Session, _data: &[u8]) -> ShellResult<Flow> {
        Ok(Flow::Exit)
    }

    fn eof(&mut self, _session: &mut Session) -> ShellResult<()> {
        Ok(())
    }
}

/// Builds a fresh command instance per invocation
pub type CommandFactory = fn() -> Box<dyn Command>;

/// Maps command names (bare and absolute) to factories
#[derive(Clone)]
pub struct CommandRegistry {
    commands: BTreeMap<String, CommandFactory>,
}

impl CommandRegistry {
    /// Registry without any commands
    pub fn empty() -> Self {
        Self {
            commands: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, names: &[&str], factory: CommandFactory) {
        for name in names {
            self.commands.insert(name.to_string(), factory);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// New instance of the command registered as `name`
    pub fn create(&self, name: &str) -> Option<Box<dyn Command>> {
        self.commands.get(name).map(|factory| factory())
    }
}

impl Default for CommandRegistry {
    /// All built-in commands
    fn default() -> Self {
        let mut registry = Self::empty();
        crate::commands::register_all(&mut registry);
        registry
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.commands.keys()).finish()
    }
}
