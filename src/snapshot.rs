use tokio::sync::RwLock;

use crate::metrics::{CpuPercent, LoadAvg, MemoryInfo, NetIf};

/// Upper bound on published interface entries; anything past it is dropped.
pub const MAX_NETIFS: usize = 16;

/// Latest known value of every metric family.
///
/// Each family sits behind its own lock: a setter replaces the family as a
/// unit, a getter clones the current value out, and unrelated families never
/// contend. Readers may see families from different sampling ticks; only
/// mixing *within* one family is ruled out. Since getters copy rather than
/// hold a guard, a slow client can never stall a sampler.
#[derive(Debug)]
pub struct Snapshot {
    cores: usize,
    cpu: RwLock<CpuPercent>,
    load: RwLock<LoadAvg>,
    memory: RwLock<MemoryInfo>,
    netifs: RwLock<Vec<NetIf>>,
}

impl Snapshot {
    /// Everything starts zeroed; samplers fill the families in as their
    /// first readings land. The core count is fixed for the process lifetime.
    pub fn new(cores: usize) -> Self {
        Self {
            cores,
            cpu: RwLock::new(CpuPercent::default()),
            load: RwLock::new(LoadAvg::default()),
            memory: RwLock::new(MemoryInfo::default()),
            netifs: RwLock::new(Vec::new()),
        }
    }

    pub fn cores(&self) -> usize {
        self.cores
    }

    pub async fn cpu(&self) -> CpuPercent {
        *self.cpu.read().await
    }

    pub async fn set_cpu(&self, cpu: CpuPercent) {
        *self.cpu.write().await = cpu;
    }

    pub async fn load(&self) -> LoadAvg {
        *self.load.read().await
    }

    pub async fn set_load(&self, load: LoadAvg) {
        *self.load.write().await = load;
    }

    pub async fn memory(&self) -> MemoryInfo {
        *self.memory.read().await
    }

    pub async fn set_memory(&self, memory: MemoryInfo) {
        *self.memory.write().await = memory;
    }

    pub async fn netifs(&self) -> Vec<NetIf> {
        self.netifs.read().await.clone()
    }

    /// Replaces the interface list, truncated to [`MAX_NETIFS`] entries.
    pub async fn set_netifs(&self, mut netifs: Vec<NetIf>) {
        netifs.truncate(MAX_NETIFS);
        *self.netifs.write().await = netifs;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn netif(i: usize) -> NetIf {
        NetIf {
            name: format!("eth{i}"),
            ip: format!("10.0.0.{i}"),
        }
    }

    #[tokio::test]
    async fn families_replace_as_a_unit() {
        let snapshot = Snapshot::new(8);
        assert_eq!(snapshot.cores(), 8);
        assert_eq!(snapshot.load().await, LoadAvg::default());

        let load = LoadAvg {
            one: 0.12,
            five: 0.34,
            fifteen: 0.56,
        };
        snapshot.set_load(load).await;
        assert_eq!(snapshot.load().await, load);
        // other families untouched
        assert_eq!(snapshot.cpu().await, CpuPercent::default());
    }

    #[tokio::test]
    async fn netif_overflow_is_truncated() {
        let snapshot = Snapshot::new(1);
        snapshot.set_netifs((0..MAX_NETIFS + 4).map(netif).collect()).await;

        let published = snapshot.netifs().await;
        assert_eq!(published.len(), MAX_NETIFS);
        assert_eq!(published[0], netif(0));
        assert_eq!(published[MAX_NETIFS - 1], netif(MAX_NETIFS - 1));
    }
}
