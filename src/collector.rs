// Host resource sampling via sysinfo. A reading is all-or-nothing: if any
// part fails, no reading is produced.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sysinfo::{Disks, System};
use tracing::instrument;

use crate::models::{DISK_SLOTS, ResourceReading};

/// Upper bound on how long one CPU measurement may block.
pub const MAX_CPU_WINDOW: Duration = Duration::from_secs(1);

pub struct ResourceCollector {
    sys: Arc<Mutex<System>>,
    disks: Arc<Mutex<Disks>>,
    mounts: [PathBuf; DISK_SLOTS],
    cpu_window: Duration,
}

impl ResourceCollector {
    /// `cpu_window` is clamped to `[MINIMUM_CPU_UPDATE_INTERVAL, MAX_CPU_WINDOW]`.
    pub fn new(mounts: [PathBuf; DISK_SLOTS], cpu_window: Duration) -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_usage();
        Self {
            sys: Arc::new(Mutex::new(sys)),
            disks: Arc::new(Mutex::new(Disks::new_with_refreshed_list())),
            mounts,
            cpu_window: cpu_window.clamp(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL, MAX_CPU_WINDOW),
        }
    }

    pub fn cpu_window(&self) -> Duration {
        self.cpu_window
    }

    /// One full reading. Blocks (off the runtime) for about `cpu_window`.
    #[instrument(skip(self), fields(repo = "collector", operation = "collect"))]
    pub async fn collect(&self) -> anyhow::Result<ResourceReading> {
        let sys = self.sys.clone();
        let disks = self.disks.clone();
        let mounts = self.mounts.clone();
        let cpu_window = self.cpu_window;
        tokio::task::spawn_blocking(move || {
            let mut sys = sys
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;

            // Two refreshes one window apart give usage averaged over the window.
            sys.refresh_cpu_usage();
            std::thread::sleep(cpu_window);
            sys.refresh_cpu_usage();
            let cpu_percent = (sys.global_cpu_usage() as f64).clamp(0.0, 100.0);

            sys.refresh_memory();
            let total = sys.total_memory();
            let available = sys.available_memory();
            anyhow::ensure!(total > 0, "total memory reported as 0");
            let memory_percent = percent(total.saturating_sub(available), total);

            let mut disks = disks
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo disks lock poisoned: {}", e))?;
            disks.refresh(true);
            let mut disk_percent = [0.0; DISK_SLOTS];
            for (slot, mount) in disk_percent.iter_mut().zip(mounts.iter()) {
                *slot = disk_usage_percent(&disks, mount)?;
            }

            let load = System::load_average();
            Ok(ResourceReading {
                cpu_percent,
                memory_percent,
                disk_percent,
                load_avg_1min: load.one,
                load_avg_5min: load.five,
                load_avg_15min: load.fifteen,
            })
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }
}

/// Usage of the filesystem holding `path`: the disk with the longest mount
/// point that is a prefix of `path`.
fn disk_usage_percent(disks: &Disks, path: &Path) -> anyhow::Result<f64> {
    let disk = disks
        .list()
        .iter()
        .filter(|d| path.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().components().count())
        .ok_or_else(|| anyhow::anyhow!("no mounted filesystem holds {}", path.display()))?;
    let total = disk.total_space();
    anyhow::ensure!(total > 0, "filesystem at {} reports 0 bytes", path.display());
    let used = total.saturating_sub(disk.available_space());
    Ok(percent(used, total))
}

fn percent(part: u64, total: u64) -> f64 {
    (part as f64 / total as f64) * 100.0
}
