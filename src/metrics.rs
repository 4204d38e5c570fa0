use serde::Serialize;

/// Cumulative CPU time counters in jiffies, straight from the kernel.
///
/// These only ever grow (short of a counter reset), so a utilization figure
/// needs two readings separated by a measurement window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTicks {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
}

/// Share of one measurement window spent in each CPU bucket, in percent.
///
/// Either all five sum to ~100, or all five are zero (nothing measurable
/// happened in the window).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuPercent {
    pub user: f64,
    pub nice: f64,
    pub system: f64,
    pub idle: f64,
    pub iowait: f64,
}

/// 1/5/15-minute load averages.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadAvg {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

/// Memory counters plus the process count and uptime that ride along with
/// them, mirroring what `sysinfo(2)` reports in one call.
///
/// RAM/swap/high counters are in KiB; `mem_unit` records the scale of the
/// underlying kernel counters. The high-memory pair is 0 on kernels that
/// don't split off a high zone. Only `procs` and `uptime` are served today;
/// the counters are sampled along with them as one unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(dead_code)]
pub struct MemoryInfo {
    pub total_ram: u64,
    pub free_ram: u64,
    pub shared_ram: u64,
    pub buffer_ram: u64,
    pub total_swap: u64,
    pub free_swap: u64,
    pub total_high: u64,
    pub free_high: u64,
    pub mem_unit: u64,
    pub procs: u32,
    pub uptime: u64,
}

/// One IPv4-bearing network interface. Serialized verbatim into responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetIf {
    pub name: String,
    pub ip: String,
}
