// Recorder tests: collector bounds, one-shot recording, worker lifecycle

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use stationqc::collector::{MAX_CPU_WINDOW, ResourceCollector};
use stationqc::recorder::{self, RecorderConfig, RecorderDeps, record_once};
use stationqc::resource_log::ResourceLog;
use tempfile::TempDir;

fn root_mounts() -> [PathBuf; 5] {
    std::array::from_fn(|_| PathBuf::from("/"))
}

async fn open_log(dir: &TempDir) -> Arc<ResourceLog> {
    let path = dir.path().join("system_stats.db");
    let log = ResourceLog::connect(path.to_str().unwrap(), 2)
        .await
        .unwrap();
    log.init().await.unwrap();
    Arc::new(log)
}

fn recorder_config() -> RecorderConfig {
    RecorderConfig {
        interval_secs: 3600,
        retention_days: None,
        prune_interval_secs: 3600,
        vacuum_schedule: None,
        stats_log_interval_secs: 3600,
    }
}

#[test]
fn test_collector_clamps_cpu_window() {
    let long = ResourceCollector::new(root_mounts(), Duration::from_secs(30));
    assert_eq!(long.cpu_window(), MAX_CPU_WINDOW);
    let short = ResourceCollector::new(root_mounts(), Duration::ZERO);
    assert_eq!(short.cpu_window(), sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
}

/// A mount point whose every listed filesystem reports a nonzero size.
fn sized_mount() -> Option<PathBuf> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .map(|d| d.mount_point().to_path_buf())
        .find(|mount| {
            disks
                .list()
                .iter()
                .filter(|d| d.mount_point() == mount.as_path())
                .all(|d| d.total_space() > 0)
        })
}

#[tokio::test]
async fn test_collect_reading_is_in_range() {
    let Some(mount) = sized_mount() else {
        // Nothing sized to measure, so a reading must not be produced.
        let collector = ResourceCollector::new(root_mounts(), Duration::ZERO);
        assert!(collector.collect().await.is_err());
        return;
    };
    let collector = ResourceCollector::new(std::array::from_fn(|_| mount.clone()), Duration::ZERO);
    let r = collector.collect().await.unwrap();
    assert!((0.0..=100.0).contains(&r.cpu_percent));
    assert!((0.0..=100.0).contains(&r.memory_percent));
    assert!(r.disk_percent.iter().all(|d| (0.0..=100.0).contains(d)));
    assert!(r.disk_percent.iter().all(|d| *d == r.disk_percent[0]));
    assert!(r.load_avg_1min >= 0.0);
}

#[tokio::test]
async fn test_collect_fails_for_unknown_relative_mount() {
    let mut mounts = root_mounts();
    mounts[4] = PathBuf::from("relative/nowhere");
    let collector = ResourceCollector::new(mounts, Duration::ZERO);
    assert!(collector.collect().await.is_err());
}

#[tokio::test]
async fn test_record_once_skips_failed_collection() {
    let dir = TempDir::new().unwrap();
    let log = open_log(&dir).await;
    let mut mounts = root_mounts();
    mounts[2] = PathBuf::from("relative/nowhere");
    let collector = ResourceCollector::new(mounts, Duration::ZERO);

    let saved = record_once(&collector, &log).await.unwrap();
    assert!(!saved);
    let all = log
        .query(Utc::now() - chrono::Duration::days(1), Utc::now())
        .await
        .unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn test_record_once_appends_one_sample() {
    let dir = TempDir::new().unwrap();
    let log = open_log(&dir).await;
    let collector = ResourceCollector::new(root_mounts(), Duration::ZERO);

    let saved = record_once(&collector, &log).await.unwrap();
    let all = log
        .query(
            Utc::now() - chrono::Duration::days(1),
            Utc::now() + chrono::Duration::seconds(1),
        )
        .await
        .unwrap();
    assert_eq!(all.len(), usize::from(saved));
}

#[tokio::test]
async fn test_recorder_spawn_and_shutdown() {
    let dir = TempDir::new().unwrap();
    let log = open_log(&dir).await;
    let saved_total = Arc::new(AtomicU64::new(0));
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let handle = recorder::spawn(
        RecorderDeps {
            collector: Arc::new(ResourceCollector::new(root_mounts(), Duration::ZERO)),
            resource_log: log.clone(),
            samples_saved_total: saved_total.clone(),
            shutdown_rx,
        },
        RecorderConfig {
            retention_days: Some(30),
            vacuum_schedule: Some("0 0 3 * * *".into()),
            ..recorder_config()
        },
    );

    // The first tick fires immediately; give it time to collect.
    tokio::time::sleep(Duration::from_millis(500)).await;
    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("recorder did not stop")
        .unwrap();

    let all = log
        .query(
            Utc::now() - chrono::Duration::days(1),
            Utc::now() + chrono::Duration::seconds(1),
        )
        .await
        .unwrap();
    assert_eq!(all.len() as u64, saved_total.load(Ordering::Relaxed));
    assert!(all.len() <= 1);
}
