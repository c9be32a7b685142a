//! `scp` in sink mode: uploads pushed by a remote `scp -t`
//!
//! The stream is a sequence of `C0MMM SIZE NAME\n` headers, each followed
//! by SIZE data bytes and a single `\0`. Each file is created in the fake
//! filesystem and its data streamed into an artifact; the commit points the
//! fake path at the stored object.

use std::sync::OnceLock;

use log::debug;
use lure_artifact::{Artifact, Committed};
use regex_lite::Regex;

use crate::event::EventKind;
use crate::shell::{getopt, Command, Flow, Session, ShellResult};
use crate::vfs::VfsError;

const USAGE: &str = "usage: scp [-12346BCpqrv] [-c cipher] [-F ssh_config] [-i identity_file]\n           \
[-l limit] [-o ssh_option] [-P port] [-S program]\n           \
[[user@]host1:]file1 ... [[user@]host2:]file2\n";

/// NUL bytes written when the sink starts
const READY_ACKS: usize = 10;

/// Longest header line accepted before the stream is rejected
const MAX_HEADER_LEN: usize = 4096;

fn header_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^C(0\d{3}) (\d+) (\S+)$").ok())
        .as_ref()
}

/// Parsed `C` record
#[derive(Debug, Clone, PartialEq, Eq)]
struct Header {
    mode: u32,
    size: u64,
    name: String,
}

impl Header {
    fn parse(line: &str) -> Option<Self> {
        let caps = header_regex()?.captures(line)?;
        Some(Self {
            mode: u32::from_str_radix(&caps[1], 8).ok()?,
            size: caps[2].parse().ok()?,
            name: caps[3].to_string(),
        })
    }
}

/// File being received
struct Incoming {
    fake_path: String,
    remaining: u64,
    artifact: Artifact,
}

enum Phase {
    /// Collecting a header line
    Header(Vec<u8>),
    /// Streaming file data
    Data(Incoming),
    /// Expecting the `\0` after file data
    Trailer,
    /// Input rejected; everything else is ignored
    Done,
}

/// `/usr/bin/scp`
pub struct Scp {
    out_dir: Option<String>,
    phase: Phase,
}

impl Default for Scp {
    fn default() -> Self {
        Self {
            out_dir: None,
            phase: Phase::Header(Vec::new()),
        }
    }
}

impl std::fmt::Debug for Scp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match &self.phase {
            Phase::Header(_) => "header",
            Phase::Data(_) => "data",
            Phase::Trailer => "trailer",
            Phase::Done => "done",
        };
        f.debug_struct("Scp")
            .field("out_dir", &self.out_dir)
            .field("phase", &phase)
            .finish()
    }
}

impl Scp {
    /// Handle a complete header line; returns the next phase.
    fn begin_file(&self, session: &mut Session, line: &[u8]) -> ShellResult<Phase> {
        let line = String::from_utf8_lossy(line).into_owned();
        session.emit(
            EventKind::FileDownload {
                realm: "scp".to_string(),
                input: line.clone(),
            },
            format!("INPUT (scp): {}", line),
        );
        session.write("\0");

        let header = match Header::parse(&line) {
            Some(header) => header,
            None => {
                debug!("[{}] scp: malformed header {:?}", session.id(), line);
                return Ok(Phase::Done);
            }
        };

        let name = match &self.out_dir {
            Some(dir) => format!("{}/{}", dir, header.name),
            None => header.name.clone(),
        };
        let fake_path = session.fs.resolve_path(&name, &session.cwd);

        // Owned by root until the transfer completes
        match session.fs.mkfile(&fake_path, 0, 0, header.size, header.mode) {
            Ok(()) => {}
            Err(e @ VfsError::FileNotFound(_))
            | Err(e @ VfsError::NotADirectory(_))
            | Err(e @ VfsError::IsADirectory(_)) => {
                session.error_write(&format!("-scp: {}\n", e));
                return Ok(Phase::Done);
            }
            Err(e) => return Err(e.into()),
        }

        let incoming = Incoming {
            fake_path,
            remaining: header.size,
            artifact: session.store().open()?,
        };
        if incoming.remaining == 0 {
            Self::finish_file(session, incoming)?;
            return Ok(Phase::Trailer);
        }
        Ok(Phase::Data(incoming))
    }

    /// Commit a file's artifact, point its fake path at the object and hand
    /// the file to the session user.
    fn finish_file(session: &mut Session, mut incoming: Incoming) -> ShellResult<()> {
        if let Some(committed) = incoming.artifact.close()? {
            Self::record_upload(session, &incoming.fake_path, &committed)?;
        }
        let (uid, gid) = (session.user.uid, session.user.gid);
        session.fs.chown(&incoming.fake_path, uid, gid)?;
        Ok(())
    }

    fn record_upload(
        session: &mut Session,
        fake_path: &str,
        committed: &Committed,
    ) -> ShellResult<()> {
        let filename = fake_path
            .rsplit('/')
            .next()
            .unwrap_or(fake_path)
            .to_string();
        let message = format!(
            "SCP Uploaded file \"{}\" to {}",
            filename,
            committed.path.display()
        );
        session.emit(
            EventKind::FileUpload {
                filename,
                url: fake_path.to_string(),
                destfile: fake_path.to_string(),
                outfile: committed.path.clone(),
                shasum: committed.hash.clone(),
                duplicate: committed.duplicate,
            },
            message,
        );
        session.fs.update_realfile(fake_path, &committed.path)?;
        Ok(())
    }
}

impl Command for Scp {
    fn start(&mut self, session: &mut Session, args: &[String]) -> ShellResult<Flow> {
        let (opts, rest) = match getopt(args, "12346BCpqrvfstdv:cFiloPS:", &[]) {
            Ok(parsed) => parsed,
            Err(_) => {
                session.write(USAGE);
                return Ok(Flow::Exit);
            }
        };

        if opts.iter().any(|(o, _)| o == "-d") {
            self.out_dir = rest.first().cloned();
        }

        if let Some(dir) = &self.out_dir {
            let resolved = session.fs.resolve_path(dir, &session.cwd);
            if !session.fs.exists(&resolved) {
                session.error_write(&format!("-scp: {}: No such file or directory\n", dir));
                return Ok(Flow::Exit);
            }
        }

        session.write_bytes(&[0u8; READY_ACKS]);
        Ok(Flow::Continue)
    }

    fn input(&mut self, session: &mut Session, data: &[u8]) -> ShellResult<Flow> {
        let mut data = data;
        while !data.is_empty() {
            let phase = std::mem::replace(&mut self.phase, Phase::Done);
            self.phase = match phase {
                Phase::Header(mut line) => match data.iter().position(|b| *b == b'\n') {
                    Some(pos) => {
                        line.extend_from_slice(&data[..pos]);
                        data = &data[pos + 1..];
                        self.begin_file(session, &line)?
                    }
                    None if line.len() + data.len() > MAX_HEADER_LEN => {
                        debug!("[{}] scp: header exceeds {} bytes", session.id(), MAX_HEADER_LEN);
                        data = &[];
                        Phase::Done
                    }
                    None => {
                        line.extend_from_slice(data);
                        data = &[];
                        Phase::Header(line)
                    }
                },
                Phase::Data(mut incoming) => {
                    let remaining = usize::try_from(incoming.remaining).unwrap_or(usize::MAX);
                    let take = data.len().min(remaining);
                    incoming.artifact.write(&data[..take])?;
                    incoming.remaining -= take as u64;
                    data = &data[take..];
                    if incoming.remaining == 0 {
                        Self::finish_file(session, incoming)?;
                        Phase::Trailer
                    } else {
                        Phase::Data(incoming)
                    }
                }
                Phase::Trailer => {
                    data = &data[1..];
                    Phase::Header(Vec::new())
                }
                Phase::Done => {
                    data = &[];
                    Phase::Done
                }
            };
        }
        Ok(Flow::Continue)
    }

    fn eof(&mut self, session: &mut Session) -> ShellResult<()> {
        // A truncated upload keeps whatever arrived
        if let Phase::Data(incoming) = std::mem::replace(&mut self.phase, Phase::Done) {
            debug!(
                "[{}] scp: {} ended {} bytes short",
                session.id(),
                incoming.fake_path,
                incoming.remaining
            );
            Self::finish_file(session, incoming)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::Harness;
    use lure_artifact::ContentHash;

    fn upload(name: &str, data: &[u8]) -> Vec<u8> {
        let mut out = format!("C0644 {} {}\n", data.len(), name).into_bytes();
        out.extend_from_slice(data);
        out.push(0);
        out
    }

    fn uploads(events: &[crate::event::Event]) -> Vec<&EventKind> {
        events
            .iter()
            .map(|e| &e.kind)
            .filter(|k| matches!(k, EventKind::FileUpload { .. }))
            .collect()
    }

    #[test]
    fn test_header_parse() {
        let header = Header::parse("C0755 12 run.sh").unwrap();
        assert_eq!(header, Header { mode: 0o755, size: 12, name: "run.sh".to_string() });

        assert!(Header::parse("C0755 12 two words").is_none());
        assert!(Header::parse("D0755 0 dir").is_none());
        assert!(Header::parse("C755 12 x").is_none());
        assert!(Header::parse("C0644 -1 x").is_none());
    }

    #[test]
    fn test_start_acknowledges() {
        let mut h = Harness::new();
        let (out, err) = h.exec(&["scp", "-t", "/tmp"], None);
        assert_eq!(out, vec![0u8; READY_ACKS]);
        assert!(err.is_empty());
    }

    #[test]
    fn test_bad_option_prints_usage() {
        let mut h = Harness::new();
        let (out, _) = h.run(&["scp", "-z"]);
        assert_eq!(out, USAGE);
    }

    #[test]
    fn test_upload_into_cwd() {
        let mut h = Harness::new();
        let stdin = upload("x.sh", b"Hello world");
        let (out, err) = h.exec(&["scp", "-t", "."], Some(&stdin[..]));
        assert!(err.is_empty());
        assert_eq!(out, vec![0u8; READY_ACKS + 1]);

        let entry = h.session.fs.get("/root/x.sh").unwrap();
        assert_eq!(entry.mode, 0o644);
        assert_eq!(entry.size, 11);
        assert_eq!(h.session.fs.file_contents("/root/x.sh").unwrap(), b"Hello world");

        let events = h.events();
        assert_eq!(events[0].kind.eventid(), "lure.session.file_download");
        match uploads(&events)[..] {
            [EventKind::FileUpload { filename, destfile, shasum, duplicate, outfile, .. }] => {
                assert_eq!(filename, "x.sh");
                assert_eq!(destfile, "/root/x.sh");
                assert_eq!(*shasum, ContentHash::of(b"Hello world"));
                assert!(!duplicate);
                assert_eq!(outfile, &h.dir.path().join(shasum.as_str()));
            }
            _ => panic!("expected one upload event"),
        }
    }

    #[test]
    fn test_directory_mode_and_duplicates() {
        let mut h = Harness::new();
        let mut stdin = upload("a.bin", b"payload");
        stdin.extend(upload("b.bin", b"payload"));

        h.exec(&["scp", "-d", "-t", "/tmp"], Some(&stdin[..]));
        assert_eq!(h.session.fs.file_contents("/tmp/a.bin").unwrap(), b"payload");
        assert_eq!(h.session.fs.file_contents("/tmp/b.bin").unwrap(), b"payload");

        let events = h.events();
        let flags: Vec<bool> = uploads(&events)
            .iter()
            .map(|k| match k {
                EventKind::FileUpload { duplicate, .. } => *duplicate,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(flags, vec![false, true]);
        assert_eq!(h.session.store().objects().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_target_directory() {
        let mut h = Harness::new();
        let (out, err) = h.run(&["scp", "-d", "/nope"]);
        assert!(out.is_empty());
        assert_eq!(err, "-scp: /nope: No such file or directory\n");
    }

    #[test]
    fn test_file_in_missing_directory() {
        let mut h = Harness::new();
        let stdin = upload("missing/x.sh", b"data");
        let (_, err) = h.pipe(&["scp", "-t", "."], &stdin);
        assert_eq!(err, "-scp: /root/missing/x.sh: No such file or directory\n");
        assert!(uploads(&h.events()).is_empty());
        assert!(h.session.store().objects().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_header_stops() {
        let mut h = Harness::new();
        let mut stdin = b"garbage line\n".to_vec();
        stdin.extend(upload("x.sh", b"data"));
        h.exec(&["scp", "-t", "."], Some(&stdin[..]));
        assert!(!h.session.fs.exists("/root/x.sh"));
        assert!(uploads(&h.events()).is_empty());
    }

    #[test]
    fn test_oversized_header_stops() {
        let mut h = Harness::new();
        let mut scp = Scp::default();
        let args: Vec<String> = vec!["-t".to_string(), ".".to_string()];
        scp.start(&mut h.session, &args).unwrap();

        let junk = vec![b'A'; 1024];
        for _ in 0..8 {
            scp.input(&mut h.session, &junk).unwrap();
        }
        assert!(matches!(scp.phase, Phase::Done));

        // A valid record after the junk is ignored
        scp.input(&mut h.session, &upload("x.sh", b"data")).unwrap();
        scp.eof(&mut h.session).unwrap();
        assert!(!h.session.fs.exists("/root/x.sh"));
        assert!(h.events().is_empty());
    }

    #[test]
    fn test_truncated_upload_keeps_partial_data() {
        let mut h = Harness::new();
        let stdin = b"C0600 100 part.bin\nonly this".to_vec();
        h.exec(&["scp", "-t", "/tmp"], Some(&stdin[..]));

        assert_eq!(h.session.fs.file_contents("/tmp/part.bin").unwrap(), b"only this");
        assert_eq!(h.session.fs.get("/tmp/part.bin").unwrap().size, 9);
        assert_eq!(uploads(&h.events()).len(), 1);
    }

    #[test]
    fn test_chunked_input() {
        let mut h = Harness::new();
        let stdin = upload("x.sh", b"Hello world");

        let mut scp = Scp::default();
        let args: Vec<String> = vec!["-t".to_string(), ".".to_string()];
        assert_eq!(scp.start(&mut h.session, &args).unwrap(), Flow::Continue);
        for chunk in stdin.chunks(3) {
            assert_eq!(scp.input(&mut h.session, chunk).unwrap(), Flow::Continue);
        }
        scp.eof(&mut h.session).unwrap();

        assert_eq!(h.session.fs.file_contents("/root/x.sh").unwrap(), b"Hello world");
        assert_eq!(uploads(&h.events()).len(), 1);
    }

    #[test]
    fn test_upload_owned_by_session_user() {
        let mut h = Harness::new();
        h.session.user.uid = 1000;
        h.session.user.gid = 1000;
        h.exec(&["scp", "-t", "/tmp"], Some(&upload("x", b"1")[..]));
        let entry = h.session.fs.get("/tmp/x").unwrap();
        assert_eq!((entry.uid, entry.gid), (1000, 1000));

        // Empty files are handed over too
        h.exec(&["scp", "-t", "/tmp"], Some(&upload("empty", b"")[..]));
        let entry = h.session.fs.get("/tmp/empty").unwrap();
        assert_eq!((entry.uid, entry.gid), (1000, 1000));
    }

    #[test]
    fn test_partial_file_owned_by_root() {
        let mut h = Harness::new();
        h.session.user.uid = 1000;
        h.session.user.gid = 1000;

        let mut scp = Scp::default();
        let args: Vec<String> = vec!["-t".to_string(), "/tmp".to_string()];
        scp.start(&mut h.session, &args).unwrap();
        scp.input(&mut h.session, b"C0644 10 slow.bin\nabc").unwrap();
        let entry = h.session.fs.get("/tmp/slow.bin").unwrap();
        assert_eq!((entry.uid, entry.gid), (0, 0));

        scp.eof(&mut h.session).unwrap();
        let entry = h.session.fs.get("/tmp/slow.bin").unwrap();
        assert_eq!((entry.uid, entry.gid), (1000, 1000));
    }
}
