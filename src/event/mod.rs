//! Session events
//!
//! Structured records of what an attacker did, one JSON object per line.
//! Every event also goes to the `log` facade at info level.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use lure_artifact::ContentHash;
use serde::{Deserialize, Serialize};

/// Kind-specific payload of an event, tagged by `eventid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventid")]
pub enum EventKind {
    /// A file arrived through an upload command and was committed
    #[serde(rename = "lure.session.file_upload")]
    FileUpload {
        filename: String,
        url: String,
        destfile: String,
        outfile: PathBuf,
        shasum: ContentHash,
        duplicate: bool,
    },

    /// Raw input line received by a transfer command
    #[serde(rename = "lure.session.file_download")]
    FileDownload { realm: String, input: String },

    /// Piped input captured as an artifact
    #[serde(rename = "lure.session.stdin")]
    Stdin {
        shasum: ContentHash,
        outfile: PathBuf,
        size: u64,
        duplicate: bool,
    },

    /// Command not available in the emulated shell
    #[serde(rename = "lure.command.failed")]
    CommandFailed { input: String },
}

impl EventKind {
    pub fn eventid(&self) -> &'static str {
        match self {
            EventKind::FileUpload { .. } => "lure.session.file_upload",
            EventKind::FileDownload { .. } => "lure.session.file_download",
            EventKind::Stdin { .. } => "lure.session.stdin",
            EventKind::CommandFailed { .. } => "lure.command.failed",
        }
    }
}

/// One session event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub session: String,
    pub message: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(session: &str, kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            session: session.to_string(),
            message: message.into(),
            kind,
        }
    }

    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Destination for session events
pub trait EventSink: Send {
    fn emit(&mut self, event: &Event) -> io::Result<()>;
}

/// Discards events
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &Event) -> io::Result<()> {
        Ok(())
    }
}

/// Keeps events in memory; clones share one buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for MemorySink {
    fn emit(&mut self, event: &Event) -> io::Result<()> {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
        Ok(())
    }
}

/// Appends events as JSON lines to a file
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    file: File,
}

impl JsonlSink {
    /// Open (creating if needed) `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonlSink {
    fn emit(&mut self, event: &Event) -> io::Result<()> {
        let mut line = event
            .to_json_line()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        line.push('\n');
        self.file.write_all(line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn upload_event() -> Event {
        Event::new(
            "c0ffee",
            EventKind::FileUpload {
                filename: "x.sh".to_string(),
                url: "/tmp/x.sh".to_string(),
                destfile: "/tmp/x.sh".to_string(),
                outfile: PathBuf::from("/var/lib/lure/downloads/abc"),
                shasum: ContentHash::of(b"Hello world"),
                duplicate: true,
            },
            "SCP Uploaded file \"x.sh\" to /var/lib/lure/downloads/abc",
        )
    }

    #[test]
    fn test_event_json_shape() {
        let line = upload_event().to_json_line().unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["eventid"], "lure.session.file_upload");
        assert_eq!(value["session"], "c0ffee");
        assert_eq!(value["filename"], "x.sh");
        assert_eq!(value["duplicate"], true);
        assert_eq!(
            value["shasum"],
            "64ec88ca00b268e5ba1a35678a1b5316d212f4f366b2477232534a8aeca37f3c"
        );
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_event_parses_back() {
        let event = upload_event();
        let back: Event = serde_json::from_str(&event.to_json_line().unwrap()).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.kind.eventid(), "lure.session.file_upload");
    }

    #[test]
    fn test_memory_sink_clones_share_buffer() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.emit(&upload_event()).unwrap();
        writer.emit(&upload_event()).unwrap();
        assert_eq!(sink.events().len(), 2);
    }

    #[test]
    fn test_jsonl_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log/lure.json");

        let mut sink = JsonlSink::open(&path).unwrap();
        sink.emit(&upload_event()).unwrap();
        let failed = Event::new(
            "c0ffee",
            EventKind::CommandFailed {
                input: "wget".to_string(),
            },
            "Command not found: wget",
        );
        sink.emit(&failed).unwrap();
        drop(sink);

        // Reopening appends rather than truncating
        let mut sink = JsonlSink::open(&path).unwrap();
        sink.emit(&failed).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let ids: Vec<String> = contents
            .lines()
            .map(|l| serde_json::from_str::<Value>(l).unwrap()["eventid"].to_string())
            .collect();
        assert_eq!(
            ids,
            vec![
                "\"lure.session.file_upload\"",
                "\"lure.command.failed\"",
                "\"lure.command.failed\""
            ]
        );
    }
}
