use std::fs;

use crate::metrics::{CpuTicks, LoadAvg, MemoryInfo, NetIf};

const PROC_STAT: &str = "/proc/stat";
const PROC_LOADAVG: &str = "/proc/loadavg";
const PROC_MEMINFO: &str = "/proc/meminfo";
const PROC_UPTIME: &str = "/proc/uptime";

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("unexpected format in {0}")]
    Malformed(&'static str),
}

/// OS boundary for metric acquisition.
///
/// Every read is fallible and transient failures are expected; callers log
/// and retry on their next cycle, keeping the previous value in the meantime.
pub trait MetricSource: Send + Sync {
    fn cpu_ticks(&self) -> Result<CpuTicks, SourceError>;
    fn load_average(&self) -> Result<LoadAvg, SourceError>;
    fn memory_info(&self) -> Result<MemoryInfo, SourceError>;
    fn ipv4_interfaces(&self) -> Result<Vec<NetIf>, SourceError>;
}

/// Linux implementation backed by procfs and the OS interface table.
#[derive(Debug, Default)]
pub struct ProcSource;

impl MetricSource for ProcSource {
    fn cpu_ticks(&self) -> Result<CpuTicks, SourceError> {
        parse_cpu_line(&read_proc(PROC_STAT)?)
    }

    fn load_average(&self) -> Result<LoadAvg, SourceError> {
        parse_loadavg(&read_proc(PROC_LOADAVG)?)
    }

    fn memory_info(&self) -> Result<MemoryInfo, SourceError> {
        let mut info = parse_meminfo(&read_proc(PROC_MEMINFO)?)?;
        info.uptime = parse_uptime(&read_proc(PROC_UPTIME)?)?;
        info.procs = parse_procs(&read_proc(PROC_LOADAVG)?)?;
        Ok(info)
    }

    fn ipv4_interfaces(&self) -> Result<Vec<NetIf>, SourceError> {
        let mut netifs = Vec::new();
        for iface in netdev::get_interfaces() {
            for net in &iface.ipv4 {
                netifs.push(NetIf {
                    name: iface.name.clone(),
                    ip: net.addr().to_string(),
                });
            }
        }
        Ok(netifs)
    }
}

fn read_proc(path: &'static str) -> Result<String, SourceError> {
    fs::read_to_string(path).map_err(|source| SourceError::Io { path, source })
}

/// First line of `/proc/stat`: `cpu  user nice system idle iowait ...`.
fn parse_cpu_line(stat: &str) -> Result<CpuTicks, SourceError> {
    let line = stat.lines().next().ok_or(SourceError::Malformed(PROC_STAT))?;
    let mut fields = line.split_whitespace();
    if fields.next() != Some("cpu") {
        return Err(SourceError::Malformed(PROC_STAT));
    }

    let mut bucket = || fields.next().and_then(|v| v.parse::<u64>().ok());
    let (Some(user), Some(nice), Some(system), Some(idle)) =
        (bucket(), bucket(), bucket(), bucket())
    else {
        return Err(SourceError::Malformed(PROC_STAT));
    };
    // iowait was only added in 2.6 kernels; missing means an empty bucket
    let iowait = bucket().unwrap_or(0);

    Ok(CpuTicks {
        user,
        nice,
        system,
        idle,
        iowait,
    })
}

/// `/proc/loadavg`: `0.12 0.34 0.56 1/234 5678`, keeping the three averages.
fn parse_loadavg(loadavg: &str) -> Result<LoadAvg, SourceError> {
    let mut fields = loadavg.split_whitespace();
    let mut avg = || fields.next().and_then(|v| v.parse::<f64>().ok());
    let (Some(one), Some(five), Some(fifteen)) = (avg(), avg(), avg()) else {
        return Err(SourceError::Malformed(PROC_LOADAVG));
    };

    Ok(LoadAvg { one, five, fifteen })
}

/// Fourth field of `/proc/loadavg` is `runnable/total`; `total` is the same
/// process count `sysinfo(2)` reports.
fn parse_procs(loadavg: &str) -> Result<u32, SourceError> {
    loadavg
        .split_whitespace()
        .nth(3)
        .and_then(|pair| pair.split_once('/'))
        .and_then(|(_, total)| total.parse().ok())
        .ok_or(SourceError::Malformed(PROC_LOADAVG))
}

/// `/proc/meminfo` key/value lines. Values are already in kB, so the unit
/// scale is fixed at 1024. Keys the kernel omits (the High* pair on 64-bit)
/// read as 0; a file without `MemTotal` is rejected outright.
fn parse_meminfo(meminfo: &str) -> Result<MemoryInfo, SourceError> {
    let mut info = MemoryInfo {
        mem_unit: 1024,
        ..Default::default()
    };
    let mut seen_total = false;

    for line in meminfo.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let Some(value) = rest
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<u64>().ok())
        else {
            continue;
        };
        match key {
            "MemTotal" => {
                info.total_ram = value;
                seen_total = true;
            }
            "MemFree" => info.free_ram = value,
            "Shmem" => info.shared_ram = value,
            "Buffers" => info.buffer_ram = value,
            "SwapTotal" => info.total_swap = value,
            "SwapFree" => info.free_swap = value,
            "HighTotal" => info.total_high = value,
            "HighFree" => info.free_high = value,
            _ => {}
        }
    }

    if !seen_total {
        return Err(SourceError::Malformed(PROC_MEMINFO));
    }
    Ok(info)
}

/// `/proc/uptime`: seconds-with-fraction since boot; whole seconds suffice.
fn parse_uptime(uptime: &str) -> Result<u64, SourceError> {
    uptime
        .split_whitespace()
        .next()
        .and_then(|secs| secs.split('.').next())
        .and_then(|whole| whole.parse().ok())
        .ok_or(SourceError::Malformed(PROC_UPTIME))
}
