pub mod disk;
pub mod network;
pub mod platform;
pub mod system;

use crate::format::{format_bytes, format_timestamp, format_uptime, round_percent};
use crate::snapshot::{
    CpuSummary, LoadAverage, LoadWindows, NetworkSummary, Snapshot, UsageSummary,
    CPU_PERCENT_UNAVAILABLE,
};
use chrono::Local;
use disk::aggregate_disks;
use network::{sample_throughput, Cancelled};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{0} не поддерживается на этой платформе")]
    Unsupported(&'static str),
    #[error("нет данных: {0}")]
    Unavailable(&'static str),
    #[error("точка монтирования {0} недоступна")]
    MountUnavailable(String),
    #[error("statvfs для {mount}: {source}")]
    Statvfs {
        mount: String,
        source: std::io::Error,
    },
    #[error("не удалось прочитать {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("не удалось запустить {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("{command} завершилась с кодом {code:?}")]
    ExitStatus { command: String, code: Option<i32> },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuInfo {
    pub model: String,
    pub logical_cores: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadAvg {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub platform_version: String,
    pub boot_time_unix: u64,
    pub uptime_seconds: u64,
    pub process_count: u64,
}

impl HostInfo {
    fn unknown() -> Self {
        Self {
            platform_version: "unknown".to_string(),
            boot_time_unix: 0,
            uptime_seconds: 0,
            process_count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
}

/// One method per OS query. Every query may fail on its own; callers substitute fallbacks.
pub trait HostProbe {
    fn cpu_info(&mut self) -> Result<CpuInfo, ProbeError>;
    /// Utilization since the previous call, in percent.
    fn cpu_percent(&mut self) -> Result<f64, ProbeError>;
    fn memory(&mut self) -> Result<MemoryUsage, ProbeError>;
    fn swap(&mut self) -> Result<MemoryUsage, ProbeError>;
    fn load_average(&mut self) -> Result<LoadAvg, ProbeError>;
    fn host_info(&mut self) -> Result<HostInfo, ProbeError>;
    /// Cumulative counters per interface.
    fn net_counters(&mut self) -> Result<Vec<NetCounters>, ProbeError>;
    /// Mount points of every partition, pseudo filesystems included.
    fn partitions(&mut self) -> Result<Vec<String>, ProbeError>;
    fn disk_usage(&mut self, mount_point: &str) -> Result<DiskUsage, ProbeError>;

    // Shell and file collaborators, raw text only.
    fn os_release(&mut self) -> Result<String, ProbeError>;
    fn hypervisor_type(&mut self) -> Result<String, ProbeError>;
    fn detect_virt(&mut self) -> Result<String, ProbeError>;
    fn lscpu(&mut self) -> Result<String, ProbeError>;
}

/// Runs every probe once and assembles the results. Only a shutdown during the
/// throughput wait aborts; everything else degrades to a fallback value.
pub async fn collect_snapshot<P: HostProbe>(
    probe: &mut P,
    interval: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<Snapshot, Cancelled> {
    let throughput = sample_throughput(probe, interval, shutdown).await?;

    // Read after the throughput wait so the CPU delta spans the interval.
    let cpu_percent = match probe.cpu_percent() {
        Ok(v) => round_percent(v),
        Err(err) => {
            warn!(probe = "cpu_percent", error = %err, "проба недоступна, используется значение по умолчанию");
            CPU_PERCENT_UNAVAILABLE
        }
    };
    let cpu_count = or_fallback("cpu_info", probe.cpu_info(), CpuInfo::default).logical_cores;
    let cpu_model = platform::resolve_cpu_model(probe);

    let memory = or_fallback("memory", probe.memory(), MemoryUsage::default);
    let swap = or_fallback("swap", probe.swap(), MemoryUsage::default);
    let disk = aggregate_disks(probe);

    let load_average = match probe.load_average() {
        Ok(avg) => LoadAverage::Ok(LoadWindows {
            one: avg.one,
            five: avg.five,
            fifteen: avg.fifteen,
        }),
        Err(err) => {
            warn!(probe = "load_average", error = %err, "проба недоступна, используется значение по умолчанию");
            LoadAverage::Error(err.to_string())
        }
    };

    let host = or_fallback("host_info", probe.host_info(), HostInfo::unknown);
    let boot_time = if host.boot_time_unix == 0 {
        "unknown".to_string()
    } else {
        format_timestamp(host.boot_time_unix as i64, &Local)
    };

    let totals = throughput.totals.unwrap_or_default();

    Ok(Snapshot {
        platform: std::env::consts::OS.to_string(),
        platform_version: host.platform_version,
        distribution: platform::resolve_distribution(probe),
        virtualization: platform::resolve_virtualization(probe),
        architecture: std::env::consts::ARCH.to_string(),
        cpu: CpuSummary {
            model: cpu_model,
            count: cpu_count,
            percent: cpu_percent,
        },
        memory: UsageSummary::from_bytes(memory.used_bytes, memory.total_bytes),
        swap: UsageSummary::from_bytes(swap.used_bytes, swap.total_bytes),
        disk: UsageSummary::from_bytes(disk.used_bytes, disk.total_bytes),
        network: NetworkSummary {
            upload_speed: format_bytes(throughput.rate.upload_bytes_per_sec as u64),
            download_speed: format_bytes(throughput.rate.download_bytes_per_sec as u64),
            upload_total: format_bytes(totals.bytes_sent),
            download_total: format_bytes(totals.bytes_recv),
        },
        load_average,
        uptime: format_uptime(host.uptime_seconds),
        boot_time,
        current_time: format_timestamp(Local::now().timestamp(), &Local),
        process_count: host.process_count,
    })
}

fn or_fallback<T>(probe: &'static str, result: Result<T, ProbeError>, fallback: fn() -> T) -> T {
    result.unwrap_or_else(|err| {
        warn!(probe, error = %err, "проба недоступна, используется значение по умолчанию");
        fallback()
    })
}
