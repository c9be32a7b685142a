//! POSIX-style option parsing for emulated commands
//!
//! Conventions handled:
//! - Clustered short flags: `-abc`
//! - Short options with values, attached or separate: `-ofile`, `-o file`
//! - Long options, values after `=` or as the next argument: `--ignore=2`
//! - Unique prefixes of long options: `--vers` for `--version`
//! - Parsing stops at `--` or at the first non-option argument
//!
//! `shortopts` lists option letters, a letter followed by `:` takes a value.
//! `longopts` lists names, a trailing `=` marks names that take a value.

use std::fmt;

/// Parsed options in command-line order: (`-x` or `--name`, value).
/// Flags have an empty value.
pub type Opts = Vec<(String, String)>;

/// Option parsing failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetoptError {
    /// Human-readable message, e.g. `option --ignore requires argument`
    pub msg: String,
    /// Offending option without dashes
    pub opt: String,
}

impl GetoptError {
    fn new(msg: String, opt: impl Into<String>) -> Self {
        Self {
            msg,
            opt: opt.into(),
        }
    }

    pub fn is_unrecognized(&self) -> bool {
        self.msg.ends_with("not recognized")
    }

    pub fn is_missing_argument(&self) -> bool {
        self.msg.ends_with("requires argument")
    }

    pub fn is_long(&self) -> bool {
        self.msg.starts_with("option --")
    }
}

impl fmt::Display for GetoptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl std::error::Error for GetoptError {}

/// Split `args` into options and remaining positional arguments.
pub fn getopt(
    args: &[String],
    shortopts: &str,
    longopts: &[&str],
) -> Result<(Opts, Vec<String>), GetoptError> {
    let mut opts = Opts::new();
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];

        if arg == "--" {
            i += 1;
            break;
        }
        if !arg.starts_with('-') || arg == "-" {
            break;
        }
        i += 1;

        if let Some(long) = arg.strip_prefix("--") {
            let (name, inline_value) = match long.split_once('=') {
                Some((name, value)) => (name, Some(value.to_string())),
                None => (long, None),
            };
            let (full, takes_value) = match_long(name, longopts)?;

            if takes_value {
                let value = match inline_value {
                    Some(value) => value,
                    None if i < args.len() => {
                        i += 1;
                        args[i - 1].clone()
                    }
                    None => {
                        return Err(GetoptError::new(
                            format!("option --{} requires argument", full),
                            full,
                        ))
                    }
                };
                opts.push((format!("--{}", full), value));
            } else {
                if inline_value.is_some() {
                    return Err(GetoptError::new(
                        format!("option --{} must not have an argument", full),
                        full,
                    ));
                }
                opts.push((format!("--{}", full), String::new()));
            }
            continue;
        }

        let cluster = &arg[1..];
        for (pos, c) in cluster.char_indices() {
            if !short_takes_value(c, shortopts)? {
                opts.push((format!("-{}", c), String::new()));
                continue;
            }

            let rest = &cluster[pos + c.len_utf8()..];
            let value = if !rest.is_empty() {
                rest.to_string()
            } else if i < args.len() {
                i += 1;
                args[i - 1].clone()
            } else {
                return Err(GetoptError::new(
                    format!("option -{} requires argument", c),
                    c.to_string(),
                ));
            };
            opts.push((format!("-{}", c), value));
            break;
        }
    }

    Ok((opts, args[i..].to_vec()))
}

/// Whether short option `c` takes a value; the first occurrence of a letter
/// in `shortopts` decides.
fn short_takes_value(c: char, shortopts: &str) -> Result<bool, GetoptError> {
    if c == ':' {
        return Err(GetoptError::new(
            format!("option -{} not recognized", c),
            c.to_string(),
        ));
    }
    match shortopts.find(c) {
        Some(pos) => Ok(shortopts[pos + c.len_utf8()..].starts_with(':')),
        None => Err(GetoptError::new(
            format!("option -{} not recognized", c),
            c.to_string(),
        )),
    }
}

/// Resolve a possibly abbreviated long option to (full name, takes value).
fn match_long(name: &str, longopts: &[&str]) -> Result<(String, bool), GetoptError> {
    let candidates: Vec<&str> = longopts
        .iter()
        .copied()
        .filter(|o| o.starts_with(name))
        .collect();

    if candidates.is_empty() {
        return Err(GetoptError::new(
            format!("option --{} not recognized", name),
            name,
        ));
    }

    // An exact match wins over longer names sharing the prefix
    for candidate in &candidates {
        if *candidate == name {
            return Ok((name.to_string(), false));
        }
        if candidate.strip_suffix('=') == Some(name) {
            return Ok((name.to_string(), true));
        }
    }

    if candidates.len() > 1 {
        return Err(GetoptError::new(
            format!("option --{} not a unique prefix", name),
            name,
        ));
    }

    let unique = candidates[0];
    match unique.strip_suffix('=') {
        Some(stripped) => Ok((stripped.to_string(), true)),
        None => Ok((unique.to_string(), false)),
    }
}
