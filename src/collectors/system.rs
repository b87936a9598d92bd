use super::platform::{read_file, run_command};
use super::{
    CpuInfo, DiskUsage, HostInfo, HostProbe, LoadAvg, MemoryUsage, NetCounters, ProbeError,
};
#[cfg(not(target_os = "linux"))]
use sysinfo::DiskExt;
use sysinfo::{CpuExt, NetworkExt, NetworksExt, System, SystemExt};

const OS_RELEASE_PATHS: [&str; 2] = ["/etc/os-release", "/usr/lib/os-release"];
#[cfg(target_os = "linux")]
const MOUNTS_PATH: &str = "/proc/self/mounts";

/// [`HostProbe`] backed by `sysinfo`, plus the few files and commands it does not cover.
pub struct SysinfoProbe {
    system: System,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: System::new_all(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe for SysinfoProbe {
    fn cpu_info(&mut self) -> Result<CpuInfo, ProbeError> {
        // No refresh here: it would reset the baseline cpu_percent measures against.
        let cpus = self.system.cpus();
        let first = cpus.first().ok_or(ProbeError::Unavailable("cpu"))?;
        Ok(CpuInfo {
            model: first.brand().trim().to_string(),
            logical_cores: cpus.len(),
        })
    }

    fn cpu_percent(&mut self) -> Result<f64, ProbeError> {
        self.system.refresh_cpu();
        if self.system.cpus().is_empty() {
            return Err(ProbeError::Unavailable("cpu"));
        }
        Ok(self.system.global_cpu_info().cpu_usage() as f64)
    }

    fn memory(&mut self) -> Result<MemoryUsage, ProbeError> {
        self.system.refresh_memory();
        let total_bytes = self.system.total_memory();
        if total_bytes == 0 {
            return Err(ProbeError::Unavailable("memory"));
        }
        Ok(MemoryUsage {
            total_bytes,
            used_bytes: self.system.used_memory(),
        })
    }

    fn swap(&mut self) -> Result<MemoryUsage, ProbeError> {
        self.system.refresh_memory();
        Ok(MemoryUsage {
            total_bytes: self.system.total_swap(),
            used_bytes: self.system.used_swap(),
        })
    }

    #[cfg(not(target_os = "windows"))]
    fn load_average(&mut self) -> Result<LoadAvg, ProbeError> {
        let avg = self.system.load_average();
        Ok(LoadAvg {
            one: avg.one,
            five: avg.five,
            fifteen: avg.fifteen,
        })
    }

    #[cfg(target_os = "windows")]
    fn load_average(&mut self) -> Result<LoadAvg, ProbeError> {
        Err(ProbeError::Unsupported("load average"))
    }

    fn host_info(&mut self) -> Result<HostInfo, ProbeError> {
        self.system.refresh_processes();
        let boot_time_unix = self.system.boot_time();
        if boot_time_unix == 0 {
            return Err(ProbeError::Unavailable("host"));
        }
        Ok(HostInfo {
            platform_version: self
                .system
                .os_version()
                .unwrap_or_else(|| "unknown".to_string()),
            boot_time_unix,
            uptime_seconds: self.system.uptime(),
            process_count: self.system.processes().len() as u64,
        })
    }

    fn net_counters(&mut self) -> Result<Vec<NetCounters>, ProbeError> {
        self.system.refresh_networks_list();
        self.system.refresh_networks();
        Ok(self
            .system
            .networks()
            .iter()
            .map(|(_, data)| NetCounters {
                bytes_sent: data.total_transmitted(),
                bytes_recv: data.total_received(),
            })
            .collect())
    }

    // sysinfo only lists block devices; tmpfs, overlay and friends come from the mount table.
    #[cfg(target_os = "linux")]
    fn partitions(&mut self) -> Result<Vec<String>, ProbeError> {
        read_file(MOUNTS_PATH).map(|text| parse_mount_points(&text))
    }

    #[cfg(target_os = "linux")]
    fn disk_usage(&mut self, mount_point: &str) -> Result<DiskUsage, ProbeError> {
        use nix::sys::statvfs::statvfs;

        let stats = statvfs(mount_point).map_err(|errno| ProbeError::Statvfs {
            mount: mount_point.to_string(),
            source: errno.into(),
        })?;
        let fragment = stats.fragment_size() as u64;
        let total_bytes = (stats.blocks() as u64).saturating_mul(fragment);
        let free_bytes = (stats.blocks_free() as u64).saturating_mul(fragment);
        Ok(DiskUsage {
            total_bytes,
            used_bytes: total_bytes.saturating_sub(free_bytes),
        })
    }

    #[cfg(not(target_os = "linux"))]
    fn partitions(&mut self) -> Result<Vec<String>, ProbeError> {
        self.system.refresh_disks_list();
        Ok(self
            .system
            .disks()
            .iter()
            .map(|d| d.mount_point().to_string_lossy().to_string())
            .collect())
    }

    #[cfg(not(target_os = "linux"))]
    fn disk_usage(&mut self, mount_point: &str) -> Result<DiskUsage, ProbeError> {
        let disk = self
            .system
            .disks_mut()
            .iter_mut()
            .find(|d| d.mount_point().to_string_lossy() == mount_point)
            .ok_or_else(|| ProbeError::MountUnavailable(mount_point.to_string()))?;
        if !disk.refresh() {
            return Err(ProbeError::MountUnavailable(mount_point.to_string()));
        }
        let total_bytes = disk.total_space();
        Ok(DiskUsage {
            total_bytes,
            used_bytes: total_bytes.saturating_sub(disk.available_space()),
        })
    }

    fn os_release(&mut self) -> Result<String, ProbeError> {
        let mut last_err = None;
        for path in OS_RELEASE_PATHS {
            match read_file(path) {
                Ok(text) => return Ok(text),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or(ProbeError::Unavailable("os-release")))
    }

    fn hypervisor_type(&mut self) -> Result<String, ProbeError> {
        read_file("/sys/hypervisor/type")
    }

    fn detect_virt(&mut self) -> Result<String, ProbeError> {
        run_command("systemd-detect-virt", &[])
    }

    fn lscpu(&mut self) -> Result<String, ProbeError> {
        run_command("lscpu", &[])
    }
}

/// Mount points from a `/proc/mounts`-style table, in order, duplicates kept.
pub fn parse_mount_points(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(unescape_mount_field)
        .collect()
}

// The kernel writes space, tab, newline and backslash as `\ooo` octal escapes.
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits.iter().fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
