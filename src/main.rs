//! lure CLI
//!
//! Entry point for the `lure` command-line tool: runs emulated commands in a
//! one-shot session and inspects the artifact store.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::warn;
use lure_shell::config::{EffectiveConfig, DEFAULT_CONFIG_PATH};
use lure_shell::{
    ArtifactStore, CommandRegistry, ContentHash, EventSink, JsonlSink, LureConfig, NullSink,
    Session,
};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "lure")]
#[command(about = "Honeypot shell emulation backed by a content-addressed artifact store", version)]
struct Cli {
    /// Path to config file (default: etc/lure.toml if present)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Override honeypot.download_path (artifact storage root)
    #[arg(long, global = true)]
    download_path: Option<PathBuf>,

    /// Override honeypot.event_log (JSON-lines event file)
    #[arg(long, global = true)]
    event_log: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one emulated command in a fresh session
    Exec {
        /// Pipe this process's stdin into the command
        #[arg(long)]
        stdin: bool,

        /// The command line to run (after --)
        #[arg(last = true, required = true)]
        cmd: Vec<String>,
    },

    /// Store a file (or `-` for stdin) as an artifact
    Store {
        file: PathBuf,

        /// Commit even if the input is empty
        #[arg(long)]
        keep_empty: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Write a stored artifact to stdout
    Cat { hash: String },

    /// List committed artifacts
    Ls {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Re-hash every artifact and report mismatches
    Verify,

    /// Remove staging files left behind by interrupted writers
    Sweep {
        /// Only remove staging files older than this
        #[arg(long, default_value = "3600")]
        older_than_secs: u64,
    },

    /// Print the effective configuration
    Config,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let effective = load_config(&cli);
    let settings = match effective.settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Exec { stdin, cmd } => run_exec(&settings, stdin, &cmd),
        Commands::Store {
            file,
            keep_empty,
            json,
        } => run_store(&settings, &file, keep_empty, json),
        Commands::Cat { hash } => run_cat(&settings, &hash),
        Commands::Ls { json } => run_ls(&settings, json),
        Commands::Verify => run_verify(&settings),
        Commands::Sweep { older_than_secs } => run_sweep(&settings, older_than_secs),
        Commands::Config => run_config(&effective),
    }
}

fn init_logging(level: &str) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(level));
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}

fn load_config(cli: &Cli) -> EffectiveConfig {
    let config_path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            default.exists().then_some(default)
        }
    };

    let mut honeypot = serde_json::Map::new();
    if let Some(path) = &cli.download_path {
        honeypot.insert("download_path".into(), path.to_string_lossy().into());
    }
    if let Some(path) = &cli.event_log {
        honeypot.insert("event_log".into(), path.to_string_lossy().into());
    }
    let overrides =
        (!honeypot.is_empty()).then(|| serde_json::json!({ "honeypot": honeypot }));

    match EffectiveConfig::build(config_path.as_deref(), overrides) {
        Ok(effective) => effective,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    }
}

fn open_store(settings: &LureConfig) -> ArtifactStore {
    match ArtifactStore::create(&settings.honeypot.download_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error opening artifact store: {}", e);
            process::exit(1);
        }
    }
}

fn event_sink(settings: &LureConfig) -> Box<dyn EventSink> {
    match &settings.honeypot.event_log {
        Some(path) => match JsonlSink::open(path) {
            Ok(sink) => Box::new(sink),
            Err(e) => {
                eprintln!("Error opening event log {}: {}", path.display(), e);
                process::exit(1);
            }
        },
        None => Box::new(NullSink),
    }
}

fn run_exec(settings: &LureConfig, pipe_stdin: bool, cmd: &[String]) {
    // Storage root must exist before the session opens artifacts
    open_store(settings);

    let input = if pipe_stdin {
        let mut buf = Vec::new();
        if let Err(e) = io::stdin().read_to_end(&mut buf) {
            eprintln!("Error reading stdin: {}", e);
            process::exit(1);
        }
        Some(buf)
    } else {
        None
    };

    let registry = CommandRegistry::default();
    let mut session = Session::from_config(settings, event_sink(settings));
    let result = session.execute(&registry, cmd, input.as_deref());

    write_output(&mut io::stdout(), &session.take_stdout(), "stdout");
    write_output(&mut io::stderr(), &session.take_stderr(), "stderr");

    if let Err(e) = result {
        eprintln!("Error running {}: {}", cmd.join(" "), e);
        process::exit(1);
    }
}

/// Copy buffered command output to `out`; failures are logged.
fn write_output(out: &mut dyn Write, data: &[u8], stream: &str) -> bool {
    match out.write_all(data).and_then(|()| out.flush()) {
        Ok(()) => true,
        Err(e) => {
            warn!("failed to write command {}: {}", stream, e);
            false
        }
    }
}

fn run_store(settings: &LureConfig, file: &Path, keep_empty: bool, json: bool) {
    let store = open_store(settings);

    let mut reader: Box<dyn Read> = if file == Path::new("-") {
        Box::new(io::stdin())
    } else {
        match File::open(file) {
            Ok(f) => Box::new(f),
            Err(e) => {
                eprintln!("Error opening {}: {}", file.display(), e);
                process::exit(1);
            }
        }
    };

    let committed = store
        .open_with(keep_empty)
        .map_err(io::Error::from)
        .and_then(|mut artifact| {
            io::copy(&mut reader, &mut artifact)?;
            artifact.close().map_err(io::Error::from)
        });

    match committed {
        Ok(Some(committed)) if json => match serde_json::to_string_pretty(&committed) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        },
        Ok(Some(committed)) => {
            let status = if committed.duplicate { "duplicate" } else { "stored" };
            println!("{} {} {}", committed.hash, status, committed.path.display());
        }
        Ok(None) => println!("Nothing stored (empty input)"),
        Err(e) => {
            eprintln!("Error storing artifact: {}", e);
            process::exit(1);
        }
    }
}

fn run_cat(settings: &LureConfig, hash: &str) {
    let store = ArtifactStore::new(&settings.honeypot.download_path);

    let hash: ContentHash = match hash.parse() {
        Ok(hash) => hash,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let copied = store
        .reader(&hash)
        .map_err(io::Error::from)
        .and_then(|mut reader| io::copy(&mut reader, &mut io::stdout().lock()));
    if let Err(e) = copied {
        eprintln!("Error reading {}: {}", hash, e);
        process::exit(1);
    }
}

fn run_ls(settings: &LureConfig, json: bool) {
    let store = ArtifactStore::new(&settings.honeypot.download_path);
    let objects = match store.objects() {
        Ok(objects) => objects,
        Err(e) => {
            eprintln!("Error listing artifacts: {}", e);
            process::exit(1);
        }
    };

    if json {
        let entries: Vec<serde_json::Value> = objects
            .iter()
            .map(|o| {
                serde_json::json!({
                    "hash": o.hash,
                    "size": o.size,
                    "modified": DateTime::<Utc>::from(o.modified).to_rfc3339(),
                })
            })
            .collect();
        match serde_json::to_string_pretty(&entries) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    for object in &objects {
        println!(
            "{}  {:>10}  {}",
            object.hash,
            object.size,
            DateTime::<Utc>::from(object.modified).format("%Y-%m-%d %H:%M:%S")
        );
    }
    let total: u64 = objects.iter().map(|o| o.size).sum();
    println!("{} artifacts, {} bytes", objects.len(), total);
}

fn run_verify(settings: &LureConfig) {
    let store = ArtifactStore::new(&settings.honeypot.download_path);
    match store.verify() {
        Ok(corrupt) if corrupt.is_empty() => println!("All artifacts verified"),
        Ok(corrupt) => {
            for c in &corrupt {
                println!(
                    "CORRUPT {}: content hashes to {}",
                    c.path.display(),
                    c.actual
                );
            }
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error verifying artifacts: {}", e);
            process::exit(1);
        }
    }
}

fn run_sweep(settings: &LureConfig, older_than_secs: u64) {
    let store = ArtifactStore::new(&settings.honeypot.download_path);
    match store.sweep_staging(Duration::from_secs(older_than_secs)) {
        Ok(removed) => println!("Removed {} stale staging files", removed),
        Err(e) => {
            eprintln!("Error sweeping staging files: {}", e);
            process::exit(1);
        }
    }
}

fn run_config(effective: &EffectiveConfig) {
    match effective.to_json() {
        Ok(out) => println!("{}", out),
        Err(e) => {
            eprintln!("Error serializing config: {}", e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_output() {
        let mut buf = Vec::new();
        assert!(write_output(&mut buf, b"2\n", "stdout"));
        assert_eq!(buf, b"2\n");

        assert!(!write_output(&mut ClosedPipe, b"2\n", "stdout"));
    }
}
