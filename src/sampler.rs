use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::metrics::{CpuPercent, CpuTicks};
use crate::snapshot::{MAX_NETIFS, Snapshot};
use crate::source::MetricSource;

/// Window between two cumulative tick readings; doubles as the CPU publish
/// cadence, since each new reading closes the previous window.
const CPU_WINDOW: Duration = Duration::from_secs(3);

/// Cadence of the single-read samplers.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Share of the window spent in each bucket, from two cumulative readings.
///
/// Counter resets are guarded with an absolute difference per bucket. A
/// window with no measurable activity (zero total delta) yields all-zero
/// percentages instead of dividing by zero, so clients never see NaN.
pub fn cpu_percentages(old: CpuTicks, new: CpuTicks) -> CpuPercent {
    let user = new.user.abs_diff(old.user);
    let nice = new.nice.abs_diff(old.nice);
    let system = new.system.abs_diff(old.system);
    let idle = new.idle.abs_diff(old.idle);
    let iowait = new.iowait.abs_diff(old.iowait);

    let total = user + nice + system + idle + iowait;
    if total == 0 {
        return CpuPercent::default();
    }

    let pct = |delta: u64| delta as f64 / total as f64 * 100.0;
    CpuPercent {
        user: pct(user),
        nice: pct(nice),
        system: pct(system),
        idle: pct(idle),
        iowait: pct(iowait),
    }
}

/// CPU sampling loop. Keeps the previous cumulative reading and publishes
/// the delta against it every window. A failed read keeps the old reference
/// reading; the next successful delta just spans a longer window, which the
/// ratio math absorbs.
pub async fn run_cpu<S: MetricSource>(
    source: Arc<S>,
    snapshot: Arc<Snapshot>,
    shutdown: CancellationToken,
) {
    let mut prev: Option<CpuTicks> = None;
    loop {
        match source.cpu_ticks() {
            Ok(ticks) => {
                if let Some(prev) = prev {
                    snapshot.set_cpu(cpu_percentages(prev, ticks)).await;
                }
                prev = Some(ticks);
            }
            Err(e) => warn!("cpu sample failed: {e}"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = sleep(CPU_WINDOW) => {}
        }
    }
}

pub async fn run_load<S: MetricSource>(
    source: Arc<S>,
    snapshot: Arc<Snapshot>,
    shutdown: CancellationToken,
) {
    loop {
        match source.load_average() {
            Ok(load) => snapshot.set_load(load).await,
            Err(e) => warn!("load sample failed: {e}"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = sleep(POLL_INTERVAL) => {}
        }
    }
}

pub async fn run_memory<S: MetricSource>(
    source: Arc<S>,
    snapshot: Arc<Snapshot>,
    shutdown: CancellationToken,
) {
    loop {
        match source.memory_info() {
            Ok(memory) => snapshot.set_memory(memory).await,
            Err(e) => warn!("memory sample failed: {e}"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = sleep(POLL_INTERVAL) => {}
        }
    }
}

pub async fn run_netifs<S: MetricSource>(
    source: Arc<S>,
    snapshot: Arc<Snapshot>,
    shutdown: CancellationToken,
) {
    loop {
        match source.ipv4_interfaces() {
            Ok(netifs) => {
                if netifs.len() > MAX_NETIFS {
                    warn!(
                        count = netifs.len(),
                        "interface list exceeds capacity, truncating"
                    );
                }
                snapshot.set_netifs(netifs).await;
            }
            Err(e) => warn!("interface scan failed: {e}"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = sleep(POLL_INTERVAL) => {}
        }
    }
}
