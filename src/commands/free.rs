//! `free`: memory usage from the fake `/proc/meminfo`

use crate::shell::{getopt, Command, Flow, Session, ShellResult};

const VERSION: &str = "free from procps-ng 3.3.9\n";

const HELP: &str = "\nUsage:\n \
free [options]\n\
\n\
Options:\n \
-b, --bytes         show output in bytes\n \
-k, --kilo          show output in kilobytes\n \
-m, --mega          show output in megabytes\n \
-g, --giga          show output in gigabytes\n     \
--tera          show output in terabytes\n \
-h, --human         show human-readable output\n     \
--si            use powers of 1000 not 1024\n \
-l, --lohi          show detailed low and high memory statistics\n \
-o, --old           use old format (without -/+buffers/cache line)\n \
-t, --total         show total for RAM + swap\n \
-s N, --seconds N   repeat printing every N seconds\n \
-c N, --count N     repeat printing N times, then exit\n\
\n     \
--help     display this help and exit\n \
-V, --version  output version information and exit\n\
\n\
For more details see free(1).\n\
You have new mail in /var/mail/root\n";

const HEADER: &str =
    "             total       used       free     shared    buffers     cached\n";

const HUMAN_SUFFIXES: [&str; 5] = ["K", "M", "G", "T", "P"];

/// Output unit; values in `/proc/meminfo` are kB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Bytes,
    Kilo,
    Mega,
    Giga,
    Tera,
}

impl Unit {
    fn scale(self, kb: u64) -> u64 {
        match self {
            Unit::Bytes => kb.saturating_mul(1024),
            Unit::Kilo => kb,
            Unit::Mega => kb / 1024,
            Unit::Giga => kb / 1024 / 1024,
            Unit::Tera => kb / 1024 / 1024 / 1024,
        }
    }
}

/// Memory figures in kB
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct MemInfo {
    mem_total: u64,
    mem_free: u64,
    shmem: u64,
    buffers: u64,
    cached: u64,
    swap_total: u64,
    swap_free: u64,
}

impl MemInfo {
    fn parse(text: &str) -> Self {
        let mut info = MemInfo::default();
        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let kb = value
                .split_whitespace()
                .next()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            match key.trim() {
                "MemTotal" => info.mem_total = kb,
                "MemFree" => info.mem_free = kb,
                "Shmem" => info.shmem = kb,
                "Buffers" => info.buffers = kb,
                "Cached" => info.cached = kb,
                "SwapTotal" => info.swap_total = kb,
                "SwapFree" => info.swap_free = kb,
                _ => {}
            }
        }
        info
    }

    fn mem_used(&self) -> u64 {
        self.mem_total.saturating_sub(self.mem_free)
    }

    fn swap_used(&self) -> u64 {
        self.swap_total.saturating_sub(self.swap_free)
    }

    /// Mem row then Swap row, in display order
    fn rows(&self) -> ([u64; 6], [u64; 3]) {
        (
            [
                self.mem_total,
                self.mem_used(),
                self.mem_free,
                self.shmem,
                self.buffers,
                self.cached,
            ],
            [self.swap_total, self.swap_used(), self.swap_free],
        )
    }
}

fn table(mem: &[String], swap: &[String]) -> String {
    let mut out = String::from(HEADER);
    out.push_str("Mem:   ");
    for value in mem {
        out.push_str(&format!(" {:>10}", value));
    }
    out.push_str("\nSwap:  ");
    for value in swap {
        out.push_str(&format!(" {:>10}", value));
    }
    out.push('\n');
    out
}

/// kB to a short figure: `1536` -> `1.5M`, `3145728` -> `3G`
fn human(kb: u64) -> String {
    let mut value = kb as f64;
    let mut index = 0;
    while value >= 1024.0 && index < HUMAN_SUFFIXES.len() - 1 {
        value /= 1024.0;
        index += 1;
    }
    let mut number = format!("{:.1}", value);
    if number.ends_with(".0") {
        number.truncate(number.len() - 2);
    }
    format!("{}{}", number, HUMAN_SUFFIXES[index])
}

/// `/usr/bin/free`
#[derive(Debug, Default)]
pub struct Free;

impl Free {
    fn meminfo(session: &Session) -> ShellResult<MemInfo> {
        let data = session.fs.file_contents("/proc/meminfo")?;
        Ok(MemInfo::parse(&String::from_utf8_lossy(&data)))
    }

    fn print(session: &mut Session, info: &MemInfo, unit: Unit) {
        let (mem, swap) = info.rows();
        let fmt = |row: &[u64]| -> Vec<String> {
            row.iter().map(|kb| unit.scale(*kb).to_string()).collect()
        };
        let out = table(&fmt(&mem), &fmt(&swap));
        session.write(&out);
    }

    fn print_human(session: &mut Session, info: &MemInfo) {
        let (mem, swap) = info.rows();
        let fmt = |row: &[u64]| -> Vec<String> { row.iter().map(|kb| human(*kb)).collect() };
        let out = table(&fmt(&mem), &fmt(&swap));
        session.write(&out);
    }
}

impl Command for Free {
    fn start(&mut self, session: &mut Session, args: &[String]) -> ShellResult<Flow> {
        let longopts = ["human", "bytes", "kilo", "mega", "giga", "tera", "help", "version"];
        let opts = match getopt(args, "hbkmgV", &longopts) {
            Ok((opts, _)) => opts,
            Err(e) => {
                session.error_write(&format!("free: invalid option -- {}\n", e.opt));
                session.write(HELP);
                return Ok(Flow::Exit);
            }
        };

        let names: Vec<&str> = opts.iter().map(|(o, _)| o.as_str()).collect();
        if names.contains(&"--help") {
            session.write(HELP);
            return Ok(Flow::Exit);
        }
        if names.contains(&"--version") || names.contains(&"-V") {
            session.write(VERSION);
            return Ok(Flow::Exit);
        }

        let info = Self::meminfo(session)?;
        if names.contains(&"--human") || names.contains(&"-h") {
            Self::print_human(session, &info);
            return Ok(Flow::Exit);
        }

        // First unit flag wins
        let unit = names
            .iter()
            .find_map(|name| match *name {
                "-b" | "--bytes" => Some(Unit::Bytes),
                "-k" | "--kilo" => Some(Unit::Kilo),
                "-m" | "--mega" => Some(Unit::Mega),
                "-g" | "--giga" => Some(Unit::Giga),
                "--tera" => Some(Unit::Tera),
                _ => None,
            })
            .unwrap_or(Unit::Kilo);
        Self::print(session, &info, unit);
        Ok(Flow::Exit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::Harness;

    const DEFAULT_TABLE: &str = "             total       used       free     shared    buffers     cached\n\
Mem:       4054744     929872    3124872      13492      43968     593104\n\
Swap:      2097148          0    2097148\n";

    #[test]
    fn test_default_kilobytes() {
        let mut h = Harness::new();
        let (out, err) = h.run(&["free"]);
        assert_eq!(out, DEFAULT_TABLE);
        assert!(err.is_empty());

        let (out, _) = h.run(&["/usr/bin/free", "-k"]);
        assert_eq!(out, DEFAULT_TABLE);
    }

    #[test]
    fn test_units() {
        let mut h = Harness::new();

        let (out, _) = h.run(&["free", "-m"]);
        assert!(out.contains("Mem:          3959        908       3051         13         42        579\n"));

        let (out, _) = h.run(&["free", "--bytes"]);
        assert!(out.contains(&format!(" {:>10}", 4054744u64 * 1024)));

        let (out, _) = h.run(&["free", "-g"]);
        assert!(out.starts_with(HEADER));
        assert!(out.contains("Mem:             3          0          2          0          0          0\n"));

        let (out, _) = h.run(&["free", "--tera"]);
        assert!(out.contains("Swap:            0          0          0\n"));
    }

    #[test]
    fn test_human() {
        let mut h = Harness::new();
        let (out, _) = h.run(&["free", "-h"]);
        let mem: Vec<&str> = out.lines().nth(1).unwrap().split_whitespace().collect();
        assert_eq!(mem, vec!["Mem:", "3.9G", "908.1M", "3G", "13.2M", "42.9M", "579.2M"]);
        let swap: Vec<&str> = out.lines().nth(2).unwrap().split_whitespace().collect();
        assert_eq!(swap, vec!["Swap:", "2G", "0K", "2G"]);
    }

    #[test]
    fn test_human_formatting() {
        assert_eq!(human(0), "0K");
        assert_eq!(human(512), "512K");
        assert_eq!(human(1024), "1M");
        assert_eq!(human(1536), "1.5M");
        assert_eq!(human(1024 * 1024 * 1024), "1T");
    }

    #[test]
    fn test_help_and_version() {
        let mut h = Harness::new();
        let (out, _) = h.run(&["free", "--help"]);
        assert!(out.contains(" free [options]\n"));
        assert!(out.contains(" -h, --human         show human-readable output\n"));

        let (out, _) = h.run(&["free", "-V"]);
        assert_eq!(out, VERSION);
        let (out, _) = h.run(&["free", "--vers"]);
        assert_eq!(out, VERSION);
    }

    #[test]
    fn test_oversized_meminfo_saturates() {
        let mut h = Harness::new();
        let meminfo = format!("MemTotal: {} kB\nMemFree: 1 kB\n", u64::MAX);
        let mut stdin = format!("C0444 {} meminfo\n", meminfo.len()).into_bytes();
        stdin.extend_from_slice(meminfo.as_bytes());
        stdin.push(0);
        h.exec(&["scp", "-d", "-t", "/proc"], Some(&stdin[..]));

        let (out, err) = h.run(&["free", "-b"]);
        assert!(err.is_empty());
        let mem: Vec<&str> = out.lines().nth(1).unwrap().split_whitespace().collect();
        assert_eq!(mem[1], u64::MAX.to_string());
        assert_eq!(mem[3], "1024");

        let (out, _) = h.run(&["free", "-h"]);
        assert!(out.lines().nth(1).unwrap().starts_with("Mem:"));
    }

    #[test]
    fn test_invalid_option() {
        let mut h = Harness::new();
        let (out, err) = h.run(&["free", "-x"]);
        assert_eq!(err, "free: invalid option -- x\n");
        assert_eq!(out, HELP);
    }
}
