use serde::Serialize;

use crate::metrics::{CpuPercent, LoadAvg, NetIf};
use crate::snapshot::Snapshot;

/// Fixed body for anything the table doesn't match. Clients get this
/// sentinel and nothing else; no internal error detail crosses the wire.
const ERR_BODY: &str = r#"{"err":1}"#;

/// Everything a request line can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Cpu,
    Load,
    Uptime,
    Procs,
    Cores,
    Net,
    Overview,
}

/// Dispatch table, evaluated top to bottom; first matching prefix wins.
/// No entry's matching region is a prefix of a later entry's, so the order
/// only documents priority and never shadows.
const ROUTES: &[(&str, Endpoint)] = &[
    ("GET /cpu", Endpoint::Cpu),
    ("GET /load", Endpoint::Load),
    ("GET /uptime", Endpoint::Uptime),
    ("GET /procs", Endpoint::Procs),
    ("GET /cores", Endpoint::Cores),
    ("GET /net", Endpoint::Net),
    ("GET / HTTP", Endpoint::Overview),
];

/// Case-sensitive prefix match of a newline-trimmed request line.
pub fn resolve(line: &str) -> Option<Endpoint> {
    ROUTES
        .iter()
        .find(|(prefix, _)| line.starts_with(prefix))
        .map(|&(_, endpoint)| endpoint)
}

/// Renders the JSON body for one request line against the current snapshot.
pub async fn dispatch(line: &str, snapshot: &Snapshot) -> String {
    match resolve(line) {
        Some(endpoint) => render(endpoint, snapshot).await,
        None => ERR_BODY.to_owned(),
    }
}

async fn render(endpoint: Endpoint, snapshot: &Snapshot) -> String {
    match endpoint {
        Endpoint::Cpu => to_json(&CpuBody {
            cpu: CpuFields::from(snapshot.cpu().await),
        }),
        Endpoint::Load => to_json(&LoadBody {
            load: load_fields(snapshot.load().await),
        }),
        Endpoint::Uptime => to_json(&UptimeBody {
            uptime: split_uptime(snapshot.memory().await.uptime),
        }),
        Endpoint::Procs => to_json(&ProcsBody {
            procs: snapshot.memory().await.procs,
        }),
        Endpoint::Cores => to_json(&CoresBody {
            cores: snapshot.cores(),
        }),
        Endpoint::Net => to_json(&NetifsBody {
            netifs: snapshot.netifs().await,
        }),
        Endpoint::Overview => {
            let memory = snapshot.memory().await;
            let overview = Overview {
                cpu: CpuFields::from(snapshot.cpu().await),
                load: load_fields(snapshot.load().await),
                uptime: split_uptime(memory.uptime),
                procs: memory.procs,
                cores: snapshot.cores(),
                netifs: snapshot.netifs().await,
            };
            serde_json::to_string_pretty(&overview).expect("overview serialization cannot fail")
        }
    }
}

fn to_json<T: Serialize>(body: &T) -> String {
    serde_json::to_string(body).expect("payload serialization cannot fail")
}

#[derive(Debug, Serialize)]
struct CpuBody {
    cpu: CpuFields,
}

/// Wire order and names are fixed: us, sy, id, wa, ni, one decimal each.
#[derive(Debug, Serialize)]
struct CpuFields {
    us: f64,
    sy: f64,
    id: f64,
    wa: f64,
    ni: f64,
}

impl From<CpuPercent> for CpuFields {
    fn from(cpu: CpuPercent) -> Self {
        Self {
            us: round1(cpu.user),
            sy: round1(cpu.system),
            id: round1(cpu.idle),
            wa: round1(cpu.iowait),
            ni: round1(cpu.nice),
        }
    }
}

#[derive(Debug, Serialize)]
struct LoadBody {
    load: [f64; 3],
}

/// `[days, hours mod 24, minutes mod 60]`.
#[derive(Debug, Serialize)]
struct UptimeBody {
    uptime: [u64; 3],
}

#[derive(Debug, Serialize)]
struct ProcsBody {
    procs: u32,
}

#[derive(Debug, Serialize)]
struct CoresBody {
    cores: usize,
}

#[derive(Debug, Serialize)]
struct NetifsBody {
    netifs: Vec<NetIf>,
}

/// The combined document served for a plain `GET /`, pretty-printed.
#[derive(Debug, Serialize)]
struct Overview {
    cpu: CpuFields,
    load: [f64; 3],
    uptime: [u64; 3],
    procs: u32,
    cores: usize,
    netifs: Vec<NetIf>,
}

fn load_fields(load: LoadAvg) -> [f64; 3] {
    [round2(load.one), round2(load.five), round2(load.fifteen)]
}

fn split_uptime(secs: u64) -> [u64; 3] {
    [secs / 86400, secs / 3600 % 24, secs / 60 % 60]
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::metrics::MemoryInfo;

    async fn fixture_snapshot() -> Snapshot {
        let snapshot = Snapshot::new(8);
        snapshot
            .set_cpu(CpuPercent {
                user: 12.34,
                nice: 5.0,
                system: 45.61,
                idle: 32.12,
                iowait: 5.0,
            })
            .await;
        snapshot
            .set_load(LoadAvg {
                one: 0.12,
                five: 0.34,
                fifteen: 0.56,
            })
            .await;
        snapshot
            .set_memory(MemoryInfo {
                uptime: 90125,
                procs: 423,
                ..Default::default()
            })
            .await;
        snapshot
            .set_netifs(vec![
                NetIf {
                    name: "lo".to_owned(),
                    ip: "127.0.0.1".to_owned(),
                },
                NetIf {
                    name: "eth0".to_owned(),
                    ip: "192.168.1.2".to_owned(),
                },
            ])
            .await;
        snapshot
    }

    #[tokio::test]
    async fn cpu_body_rounds_to_one_decimal() {
        let snapshot = fixture_snapshot().await;
        assert_eq!(
            dispatch("GET /cpu", &snapshot).await,
            r#"{"cpu":{"us":12.3,"sy":45.6,"id":32.1,"wa":5.0,"ni":5.0}}"#
        );
    }

    #[tokio::test]
    async fn load_body_matches_fixture() {
        let snapshot = fixture_snapshot().await;
        assert_eq!(
            dispatch("GET /load", &snapshot).await,
            r#"{"load":[0.12,0.34,0.56]}"#
        );
    }

    #[tokio::test]
    async fn uptime_decomposes_into_days_hours_minutes() {
        // 90125 s = 1 day, 1 hour (90125/3600 % 24), 2 minutes (90125/60 % 60)
        let snapshot = fixture_snapshot().await;
        assert_eq!(
            dispatch("GET /uptime", &snapshot).await,
            r#"{"uptime":[1,1,2]}"#
        );
    }

    #[tokio::test]
    async fn procs_and_cores() {
        let snapshot = fixture_snapshot().await;
        assert_eq!(dispatch("GET /procs", &snapshot).await, r#"{"procs":423}"#);
        assert_eq!(dispatch("GET /cores", &snapshot).await, r#"{"cores":8}"#);
    }

    #[tokio::test]
    async fn netifs_with_entries() {
        let snapshot = fixture_snapshot().await;
        assert_eq!(
            dispatch("GET /net", &snapshot).await,
            r#"{"netifs":[{"name":"lo","ip":"127.0.0.1"},{"name":"eth0","ip":"192.168.1.2"}]}"#
        );
    }

    #[tokio::test]
    async fn netifs_empty_list() {
        let snapshot = Snapshot::new(1);
        assert_eq!(dispatch("GET /net", &snapshot).await, r#"{"netifs":[]}"#);
    }

    #[tokio::test]
    async fn overview_is_pretty_printed_and_complete() {
        let snapshot = fixture_snapshot().await;
        let body = dispatch("GET / HTTP/1.1", &snapshot).await;
        assert!(body.contains('\n'));

        let doc: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(doc["cpu"]["us"], 12.3);
        assert_eq!(doc["load"][2], 0.56);
        assert_eq!(doc["uptime"][0], 1);
        assert_eq!(doc["procs"], 423);
        assert_eq!(doc["cores"], 8);
        assert_eq!(doc["netifs"][1]["name"], "eth0");
    }

    #[tokio::test]
    async fn unrecognized_lines_get_the_error_sentinel() {
        let snapshot = Snapshot::new(1);
        for line in ["GARBAGE", "", "GET /nope", "get /cpu", "POST /cpu"] {
            assert_eq!(dispatch(line, &snapshot).await, r#"{"err":1}"#, "{line:?}");
        }
    }

    #[test]
    fn routing_priority_is_stable() {
        assert_eq!(resolve("GET /load HTTP/1.1"), Some(Endpoint::Load));
        assert_eq!(resolve("GET /loadavg"), Some(Endpoint::Load));
        assert_eq!(resolve("GET /cpu"), Some(Endpoint::Cpu));
        assert_eq!(resolve("GET /netif"), Some(Endpoint::Net));
        assert_eq!(resolve("GET / HTTP/1.0"), Some(Endpoint::Overview));
        // a bare slash is not the overview; the original matched `GET / HTTP`
        assert_eq!(resolve("GET /"), None);
        assert_eq!(resolve("GET /l"), None);
    }
}
