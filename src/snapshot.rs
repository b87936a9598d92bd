use crate::format::{format_bytes, usage_percent};
use serde::{Deserialize, Serialize};

/// Sentinel for a CPU utilization that could not be measured.
pub const CPU_PERCENT_UNAVAILABLE: f64 = -1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub platform: String,
    pub platform_version: String,
    pub distribution: String,
    pub virtualization: String,
    pub architecture: String,
    pub cpu: CpuSummary,
    pub memory: UsageSummary,
    pub swap: UsageSummary,
    pub disk: UsageSummary,
    pub network: NetworkSummary,
    pub load_average: LoadAverage,
    pub uptime: String,
    pub boot_time: String,
    pub current_time: String,
    pub process_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuSummary {
    pub model: String,
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total: String,
    pub used: String,
    pub percent: f64,
}

impl UsageSummary {
    pub fn from_bytes(used: u64, total: u64) -> Self {
        Self {
            total: format_bytes(total),
            used: format_bytes(used),
            percent: usage_percent(used, total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub upload_speed: String,
    pub download_speed: String,
    pub upload_total: String,
    pub download_total: String,
}

/// Shape-stable load average: either all three windows or the reason none are available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadAverage {
    Ok(LoadWindows),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadWindows {
    #[serde(rename = "1min")]
    pub one: f64,
    #[serde(rename = "5min")]
    pub five: f64,
    #[serde(rename = "15min")]
    pub fifteen: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub status: String,
    pub timestamp: i64,
}

impl Heartbeat {
    pub fn online(timestamp: i64) -> Self {
        Self {
            status: "online".to_string(),
            timestamp,
        }
    }
}
