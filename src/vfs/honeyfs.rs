//! Seed contents of the fake filesystem

pub(super) const DIRECTORIES: &[&str] = &[
    "/bin",
    "/etc",
    "/etc/init.d",
    "/home",
    "/proc",
    "/root",
    "/tmp",
    "/usr",
    "/usr/bin",
    "/var",
    "/var/tmp",
];

pub(super) const FILES: &[(&str, &str)] = &[("/proc/meminfo", MEMINFO), ("/proc/cpuinfo", CPUINFO)];

pub const MEMINFO: &str = "\
MemTotal:        4054744 kB
MemFree:         3124872 kB
MemAvailable:    3569008 kB
Buffers:           43968 kB
Cached:           593104 kB
SwapCached:            0 kB
Active:           499220 kB
Inactive:         294168 kB
Shmem:             13492 kB
SwapTotal:       2097148 kB
SwapFree:        2097148 kB
Dirty:                68 kB
";

pub const CPUINFO: &str = "\
processor\t: 0
vendor_id\t: GenuineIntel
cpu family\t: 6
model\t\t: 85
model name\t: Intel(R) Xeon(R) Gold 6140 CPU @ 2.30GHz
cpu MHz\t\t: 2294.608
cache size\t: 25344 KB
cpu cores\t: 2

processor\t: 1
vendor_id\t: GenuineIntel
cpu family\t: 6
model\t\t: 85
model name\t: Intel(R) Xeon(R) Gold 6140 CPU @ 2.30GHz
cpu MHz\t\t: 2294.608
cache size\t: 25344 KB
cpu cores\t: 2

";
