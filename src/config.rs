use serde::Deserialize;

use crate::models::DISK_SLOTS;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub inventory: InventoryConfig,
    pub snapshot: SnapshotConfig,
    pub feed: FeedConfig,
    pub recorder: RecorderSettings,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryConfig {
    /// Directory of JSON station inventory documents.
    pub dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    /// QC snapshot blob. The writer lock lives next to it as `<path>.lock`.
    pub path: String,
    /// Queue depth in front of the store owner.
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,
}

fn default_command_capacity() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// `host:port` of the newline-delimited JSON QC feed.
    pub address: String,
    /// Wait between reconnect attempts. No built-in default.
    pub reconnect_delay_ms: u64,
    /// Consecutive failed connects before the feed is considered gone.
    /// Omitted = retry forever.
    pub max_reconnect_attempts: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecorderSettings {
    pub database_path: String,
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,
    pub interval_secs: u64,
    /// CPU usage is averaged over this window (bounded to 1 s).
    #[serde(default = "default_cpu_window_ms")]
    pub cpu_window_ms: u64,
    /// The five filesystems whose usage is recorded, in column order.
    #[serde(default = "default_mounts")]
    pub mounts: [String; DISK_SLOTS],
    /// Omitted = keep every sample.
    pub retention_days: Option<u32>,
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
    /// Cron expression (local time) for VACUUM, e.g. "0 0 3 * * *".
    pub vacuum_schedule: Option<String>,
}

fn default_max_pool_size() -> u32 {
    4
}

fn default_cpu_window_ms() -> u64 {
    1000
}

fn default_mounts() -> [String; DISK_SLOTS] {
    ["/", "/var", "/data", "/opt", "/home"].map(String::from)
}

fn default_prune_interval_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// How often to log ingestion/recorder counters at INFO level.
    pub stats_log_interval_secs: u64,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.inventory.dir.is_empty(),
            "inventory.dir must be non-empty"
        );
        anyhow::ensure!(
            !self.snapshot.path.is_empty(),
            "snapshot.path must be non-empty"
        );
        anyhow::ensure!(
            self.snapshot.command_capacity > 0,
            "snapshot.command_capacity must be > 0, got {}",
            self.snapshot.command_capacity
        );
        anyhow::ensure!(
            !self.feed.address.is_empty(),
            "feed.address must be non-empty"
        );
        anyhow::ensure!(
            self.feed.max_reconnect_attempts != Some(0),
            "feed.max_reconnect_attempts must be > 0 when set"
        );
        anyhow::ensure!(
            !self.recorder.database_path.is_empty(),
            "recorder.database_path must be non-empty"
        );
        anyhow::ensure!(
            self.recorder.max_pool_size > 0,
            "recorder.max_pool_size must be > 0, got {}",
            self.recorder.max_pool_size
        );
        anyhow::ensure!(
            self.recorder.interval_secs > 0,
            "recorder.interval_secs must be > 0, got {}",
            self.recorder.interval_secs
        );
        anyhow::ensure!(
            self.recorder.cpu_window_ms > 0 && self.recorder.cpu_window_ms <= 1000,
            "recorder.cpu_window_ms must be in 1..=1000, got {}",
            self.recorder.cpu_window_ms
        );
        anyhow::ensure!(
            self.recorder.mounts.iter().all(|m| m.starts_with('/')),
            "recorder.mounts must all be absolute paths, got {:?}",
            self.recorder.mounts
        );
        anyhow::ensure!(
            self.recorder.retention_days != Some(0),
            "recorder.retention_days must be > 0 when set"
        );
        anyhow::ensure!(
            self.recorder.prune_interval_secs > 0,
            "recorder.prune_interval_secs must be > 0, got {}",
            self.recorder.prune_interval_secs
        );
        if let Some(schedule) = &self.recorder.vacuum_schedule {
            use std::str::FromStr;
            anyhow::ensure!(
                cron::Schedule::from_str(schedule).is_ok(),
                "recorder.vacuum_schedule is not a valid cron expression: {}",
                schedule
            );
        }
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        Ok(())
    }
}
