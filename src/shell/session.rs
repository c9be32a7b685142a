//! Session state shared by commands

use log::{info, warn};
use lure_artifact::{ArtifactStore, Committed};
use uuid::Uuid;

use super::command::{CommandRegistry, Flow};
use super::ShellResult;
use crate::config::LureConfig;
use crate::event::{Event, EventKind, EventSink, NullSink};
use crate::vfs::FakeFs;

/// Login identity of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: String,
}

impl Default for User {
    fn default() -> Self {
        Self {
            name: "root".to_string(),
            uid: 0,
            gid: 0,
            home: "/root".to_string(),
        }
    }
}

/// One attacker session
pub struct Session {
    id: String,
    pub user: User,
    pub cwd: String,
    pub hostname: String,
    pub fs: FakeFs,
    store: ArtifactStore,
    events: Box<dyn EventSink>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl Session {
    /// Session logged in as root in `/root`, discarding events.
    pub fn new(store: ArtifactStore, fs: FakeFs) -> Self {
        let user = User::default();
        Self {
            id: Uuid::new_v4().simple().to_string(),
            cwd: user.home.clone(),
            user,
            hostname: "svr04".to_string(),
            fs,
            store,
            events: Box::new(NullSink),
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    /// Session for the configured identity and storage root.
    pub fn from_config(config: &LureConfig, events: Box<dyn EventSink>) -> Self {
        let user = User {
            name: config.shell.user.clone(),
            uid: config.shell.uid,
            gid: config.shell.gid,
            home: config.shell.home.clone(),
        };
        let store = ArtifactStore::new(&config.honeypot.download_path);
        let mut session = Self::new(store, FakeFs::default())
            .with_user(user)
            .with_events(events);
        session.hostname = config.honeypot.hostname.clone();
        session
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.cwd = user.home.clone();
        self.user = user;
        self
    }

    pub fn with_events(mut self, events: Box<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn write(&mut self, text: &str) {
        self.stdout.extend_from_slice(text.as_bytes());
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.stdout.extend_from_slice(data);
    }

    pub fn error_write(&mut self, text: &str) {
        self.stderr.extend_from_slice(text.as_bytes());
    }

    /// Drain buffered standard output
    pub fn take_stdout(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.stdout)
    }

    /// Drain buffered standard error
    pub fn take_stderr(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.stderr)
    }

    /// Record an event. Sink failures are logged and otherwise ignored so
    /// the attacker-facing command is unaffected.
    pub fn emit(&mut self, kind: EventKind, message: impl Into<String>) {
        let event = Event::new(&self.id, kind, message);
        info!("[{}] {}: {}", self.id, event.kind.eventid(), event.message);
        if let Err(e) = self.events.emit(&event) {
            warn!("[{}] failed to record event: {}", self.id, e);
        }
    }

    /// Run one command line.
    ///
    /// Unknown commands print the bash error. Commands that keep reading get
    /// `stdin` followed by end of input; stdin piped into a command that
    /// does not read it is captured as an artifact.
    pub fn execute(
        &mut self,
        registry: &CommandRegistry,
        argv: &[String],
        stdin: Option<&[u8]>,
    ) -> ShellResult<()> {
        let (name, args) = match argv.split_first() {
            Some(split) => split,
            None => return Ok(()),
        };

        let mut command = match registry.create(name) {
            Some(command) => command,
            None => {
                self.error_write(&format!("-bash: {}: command not found\n", name));
                let input = argv.join(" ");
                let message = format!("Command not found: {}", input);
                self.emit(EventKind::CommandFailed { input }, message);
                return Ok(());
            }
        };

        let stdin = stdin.filter(|data| !data.is_empty());
        match command.start(self, args)? {
            Flow::Continue => {
                let flow = match stdin {
                    Some(data) => command.input(self, data)?,
                    None => Flow::Continue,
                };
                if flow == Flow::Continue {
                    command.eof(self)?;
                }
            }
            Flow::Exit => {
                if let Some(data) = stdin {
                    self.capture_stdin(data)?;
                }
            }
        }
        Ok(())
    }

    /// Store piped input as an artifact and record it.
    pub fn capture_stdin(&mut self, data: &[u8]) -> ShellResult<Option<Committed>> {
        let committed = self.store.put(data, false)?;
        if let Some(committed) = &committed {
            let message = format!(
                "Saved stdin contents with SHA-256 {} to {}",
                committed.hash,
                committed.path.display()
            );
            self.emit(
                EventKind::Stdin {
                    shasum: committed.hash.clone(),
                    outfile: committed.path.clone(),
                    size: committed.size,
                    duplicate: committed.duplicate,
                },
                message,
            );
        }
        Ok(committed)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("user", &self.user)
            .field("cwd", &self.cwd)
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::Harness;
    use crate::event::MemorySink;
    use lure_artifact::ContentHash;
    use std::io;

    struct BrokenSink;

    impl EventSink for BrokenSink {
        fn emit(&mut self, _event: &Event) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
    }

    #[test]
    fn test_unknown_command() {
        let mut h = Harness::new();
        let (out, err) = h.pipe(&["wget", "http://x/y"], b"ignored");
        assert!(out.is_empty());
        assert_eq!(err, "-bash: wget: command not found\n");

        let events = h.events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].kind,
            EventKind::CommandFailed {
                input: "wget http://x/y".to_string()
            }
        );
        assert!(h.session.store().objects().unwrap().is_empty());
    }

    #[test]
    fn test_stdin_to_exiting_command_is_captured() {
        let mut h = Harness::new();
        h.pipe(&["pico"], b"#!/bin/sh\necho pwned\n");
        h.pipe(&["pico"], b"#!/bin/sh\necho pwned\n");

        let hash = ContentHash::of(b"#!/bin/sh\necho pwned\n");
        assert_eq!(
            h.session.store().read_by_hash(&hash).unwrap(),
            b"#!/bin/sh\necho pwned\n"
        );

        let flags: Vec<bool> = h
            .events()
            .into_iter()
            .filter_map(|e| match e.kind {
                EventKind::Stdin {
                    shasum, duplicate, size, ..
                } => {
                    assert_eq!(shasum, hash);
                    assert_eq!(size, 21);
                    Some(duplicate)
                }
                _ => None,
            })
            .collect();
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn test_empty_stdin_not_captured() {
        let mut h = Harness::new();
        h.pipe(&["nproc"], b"");
        assert!(h.events().is_empty());
        assert!(h.session.store().objects().unwrap().is_empty());
    }

    #[test]
    fn test_capture_message() {
        let mut h = Harness::new();
        let committed = h.session.capture_stdin(b"abc").unwrap().unwrap();
        let events = h.events();
        assert_eq!(
            events[0].message,
            format!(
                "Saved stdin contents with SHA-256 {} to {}",
                committed.hash,
                committed.path.display()
            )
        );
        assert_eq!(events[0].session, h.session.id());
    }

    #[test]
    fn test_sink_failure_does_not_fail_command() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(ArtifactStore::new(dir.path()), FakeFs::default())
            .with_events(Box::new(BrokenSink));
        let registry = CommandRegistry::default();

        let argv = vec!["nosuch".to_string()];
        session.execute(&registry, &argv, None).unwrap();
        assert_eq!(session.take_stderr(), b"-bash: nosuch: command not found\n");
    }

    #[test]
    fn test_empty_argv_is_noop() {
        let mut h = Harness::new();
        let (out, err) = h.pipe(&[], b"data");
        assert!(out.is_empty() && err.is_empty());
        assert!(h.events().is_empty());
    }

    #[test]
    fn test_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config: LureConfig =
            serde_json::from_value(crate::config::BuiltinDefaults::default().to_value()).unwrap();
        config.honeypot.download_path = dir.path().join("downloads");
        config.honeypot.hostname = "web01".to_string();
        config.shell.user = "admin".to_string();
        config.shell.uid = 1000;
        config.shell.home = "/home/admin".to_string();

        let sink = MemorySink::new();
        let session = Session::from_config(&config, Box::new(sink));
        assert_eq!(session.user.name, "admin");
        assert_eq!(session.cwd, "/home/admin");
        assert_eq!(session.hostname, "web01");
        assert_eq!(session.store().root(), dir.path().join("downloads"));
        assert_eq!(session.id().len(), 32);
    }
}
