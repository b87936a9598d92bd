use super::{HostProbe, NetCounters};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

#[derive(Debug, Error)]
#[error("сбор прерван сигналом остановки")]
pub struct Cancelled;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Throughput {
    pub upload_bytes_per_sec: f64,
    pub download_bytes_per_sec: f64,
}

impl Throughput {
    pub fn between(before: NetCounters, after: NetCounters, interval: Duration) -> Self {
        let secs = interval.as_secs_f64();
        if secs <= 0.0 {
            return Self::default();
        }
        Self {
            upload_bytes_per_sec: after.bytes_sent.saturating_sub(before.bytes_sent) as f64 / secs,
            download_bytes_per_sec: after.bytes_recv.saturating_sub(before.bytes_recv) as f64
                / secs,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThroughputSample {
    pub rate: Throughput,
    /// Counters from the second read, if any interface was present.
    pub totals: Option<NetCounters>,
}

/// Two counter reads separated by `interval`. The wait ends early with
/// [`Cancelled`] once the shutdown channel flips or its sender is dropped.
pub async fn sample_throughput<P: HostProbe + ?Sized>(
    probe: &mut P,
    interval: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<ThroughputSample, Cancelled> {
    let before = read_aggregate(probe);
    wait_or_shutdown(interval, shutdown).await?;
    let after = read_aggregate(probe);

    let rate = match (before, after) {
        (Some(before), Some(after)) => Throughput::between(before, after, interval),
        _ => Throughput::default(),
    };

    Ok(ThroughputSample {
        rate,
        totals: after,
    })
}

pub async fn wait_or_shutdown(
    interval: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), Cancelled> {
    if *shutdown.borrow() {
        return Err(Cancelled);
    }
    tokio::select! {
        _ = tokio::time::sleep(interval) => Ok(()),
        _ = shutdown.changed() => Err(Cancelled),
    }
}

fn read_aggregate<P: HostProbe + ?Sized>(probe: &mut P) -> Option<NetCounters> {
    let ifaces = match probe.net_counters() {
        Ok(ifaces) => ifaces,
        Err(err) => {
            warn!(probe = "net_counters", error = %err, "не удалось прочитать сетевые счётчики");
            return None;
        }
    };
    if ifaces.is_empty() {
        return None;
    }
    Some(ifaces.iter().fold(NetCounters::default(), |acc, c| NetCounters {
        bytes_sent: acc.bytes_sent.saturating_add(c.bytes_sent),
        bytes_recv: acc.bytes_recv.saturating_add(c.bytes_recv),
    }))
}
