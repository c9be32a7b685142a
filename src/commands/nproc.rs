//! `nproc`: processor count from the fake `/proc/cpuinfo`

use crate::shell::{getopt, Command, Flow, Session, ShellResult};

const HELP: &str = "Usage: nproc [OPTION]...\n\
Print the number of processing units available to the current process,\n\
which may be less than the number of online processors\n\
\n      \
--all      print the number of installed processors\n      \
--ignore=N  if possible, exclude N processing units\n      \
--help     display this help and exit\n      \
--version  output version information and exit\n\
\n\
GNU coreutils online help: <https://www.gnu.org/software/coreutils/>\n\
Full documentation <https://www.gnu.org/software/coreutils/nproc>\n\
or available locally via: info '(coreutils) nproc invocation'\n";

const VERSION: &str = "nproc (GNU coreutils) 8.32\n\
Copyright (C) 2020 Free Software Foundation, Inc.\n\
License GPLv3+: GNU GPL version 3 or later <https://gnu.org/licenses/gpl.html>.\n\
This is free software: you are free to change and redistribute it.\n\
There is NO WARRANTY, to the extent permitted by law.\n\
\n\
Written by Giuseppe Scrivano.\n";

const TRY_HELP: &str = "Try 'nproc --help' for more information.\n";

/// `/usr/bin/nproc`
#[derive(Debug, Default)]
pub struct Nproc;

impl Nproc {
    fn fail(session: &mut Session, msg: &str) -> ShellResult<Flow> {
        session.error_write(msg);
        session.error_write(TRY_HELP);
        Ok(Flow::Exit)
    }

    fn cpu_count(session: &Session) -> ShellResult<u64> {
        let data = session.fs.file_contents("/proc/cpuinfo")?;
        let count = String::from_utf8_lossy(&data)
            .lines()
            .filter(|line| line.starts_with("processor"))
            .count();
        Ok(count as u64)
    }

    fn print_count(session: &mut Session, ignore: u64) -> ShellResult<Flow> {
        let n = Self::cpu_count(session)?;
        let n = if ignore < n { n - ignore } else { 1 };
        session.write(&format!("{}\n", n));
        Ok(Flow::Exit)
    }
}

impl Command for Nproc {
    fn start(&mut self, session: &mut Session, args: &[String]) -> ShellResult<Flow> {
        let opts = match getopt(args, "", &["all", "ignore=", "help", "version"]) {
            Ok((opts, _)) => opts,
            Err(e) => {
                let msg = if e.is_missing_argument() {
                    format!("nproc: option '--{}' requires an argument\n", e.opt)
                } else if e.msg.ends_with("must not have an argument") {
                    format!("nproc: option '--{}' doesn't allow an argument\n", e.opt)
                } else if e.is_long() {
                    format!("nproc: unrecognized option '--{}'\n", e.opt)
                } else {
                    format!("nproc: invalid option -- '{}'\n", e.opt)
                };
                return Self::fail(session, &msg);
            }
        };

        let names: Vec<&str> = opts.iter().map(|(o, _)| o.as_str()).collect();
        if names.contains(&"--help") {
            session.write(HELP);
            return Ok(Flow::Exit);
        }
        if names.contains(&"--version") {
            session.write(VERSION);
            return Ok(Flow::Exit);
        }

        let ignore = opts
            .iter()
            .find(|(o, _)| o == "--ignore")
            .map(|(_, value)| value.as_str())
            .unwrap_or("");
        if ignore.is_empty() {
            return Self::print_count(session, 0);
        }

        // Digit strings too long for u64 still ignore every processor
        let parsed = if ignore.bytes().all(|b| b.is_ascii_digit()) {
            Some(ignore.parse::<u64>().unwrap_or(u64::MAX))
        } else {
            None
        };
        match parsed {
            Some(ignore) => Self::print_count(session, ignore),
            None => Self::fail(session, &format!("nproc: invalid number: '{}'\n", ignore)),
        }
    }
}
