use super::HostProbe;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskTotals {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub mounts_counted: usize,
    pub mounts_skipped: usize,
}

/// Sums capacity over every partition whose usage can be read. Unreadable mounts
/// are left out of the totals instead of failing the whole aggregation.
pub fn aggregate_disks<P: HostProbe + ?Sized>(probe: &mut P) -> DiskTotals {
    let partitions = match probe.partitions() {
        Ok(p) => p,
        Err(err) => {
            warn!(probe = "partitions", error = %err, "не удалось получить список разделов");
            return DiskTotals::default();
        }
    };

    let mut totals = DiskTotals::default();
    for mount in &partitions {
        match probe.disk_usage(mount) {
            Ok(usage) => {
                totals.total_bytes = totals.total_bytes.saturating_add(usage.total_bytes);
                totals.used_bytes = totals.used_bytes.saturating_add(usage.used_bytes);
                totals.mounts_counted += 1;
            }
            Err(err) => {
                debug!(mount = %mount, error = %err, "раздел пропущен");
                totals.mounts_skipped += 1;
            }
        }
    }

    debug!(
        counted = totals.mounts_counted,
        skipped = totals.mounts_skipped,
        "агрегация дисков завершена"
    );
    totals
}
