// Background resource recorder: collect a reading every interval and append it
// to the resource log. A failed collection skips that cycle's insert.
// Retention pruning and VACUUM only run when configured; by default the log
// keeps everything.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::time::{Duration, interval};
use tracing::{Instrument, info, warn};

use crate::collector::ResourceCollector;
use crate::resource_log::ResourceLog;

pub struct RecorderDeps {
    pub collector: Arc<ResourceCollector>,
    pub resource_log: Arc<ResourceLog>,
    pub samples_saved_total: Arc<AtomicU64>,
    pub shutdown_rx: tokio::sync::oneshot::Receiver<()>,
}

/// Recorder timing and retention. Intervals are real time.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub interval_secs: u64,
    /// `None` keeps every sample.
    pub retention_days: Option<u32>,
    pub prune_interval_secs: u64,
    /// Cron expression for VACUUM (local time), e.g. "0 0 3 * * *".
    pub vacuum_schedule: Option<String>,
    pub stats_log_interval_secs: u64,
}

/// Collect one reading and append it. Returns `Ok(false)` if collection
/// failed and nothing was written.
pub async fn record_once(collector: &ResourceCollector, log: &ResourceLog) -> anyhow::Result<bool> {
    let reading = match collector.collect().await {
        Ok(r) => r,
        Err(e) => {
            warn!(
                error = %e,
                operation = "collect",
                "resource collection failed, skipping sample"
            );
            return Ok(false);
        }
    };
    let sample = log.append(&reading).await?;
    tracing::debug!(
        id = sample.id,
        timestamp = %sample.timestamp,
        cpu_percent = reading.cpu_percent,
        "resource sample saved"
    );
    Ok(true)
}

pub fn spawn(deps: RecorderDeps, config: RecorderConfig) -> tokio::task::JoinHandle<()> {
    let RecorderDeps {
        collector,
        resource_log,
        samples_saved_total,
        mut shutdown_rx,
    } = deps;

    let recorder_span =
        tracing::span!(tracing::Level::DEBUG, "recorder", interval_secs = config.interval_secs);

    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(config.interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut stats_log_tick = interval(Duration::from_secs(config.stats_log_interval_secs));
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut prune_tick = interval(Duration::from_secs(config.prune_interval_secs));
        prune_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let (vacuum_tx, mut vacuum_rx) = tokio::sync::mpsc::channel::<()>(1);
        let vacuum_task = config
            .vacuum_schedule
            .clone()
            .map(|schedule| tokio::spawn(vacuum_scheduler(schedule, vacuum_tx)));

        let mut samples_pruned_total: u64 = 0;

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    tracing::debug!("recorder shutting down");
                    break;
                }
                _ = tick.tick() => {
                    match record_once(&collector, &resource_log).await {
                        Ok(true) => {
                            samples_saved_total.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(false) => {}
                        Err(e) => {
                            warn!(error = %e, operation = "append", "resource sample insert failed");
                        }
                    }
                }
                _ = prune_tick.tick(), if config.retention_days.is_some() => {
                    let days = config.retention_days.unwrap_or_default();
                    let cutoff = Utc::now() - chrono::Duration::days(days as i64);
                    match resource_log.prune_before(cutoff).await {
                        Ok(n) => {
                            samples_pruned_total += n;
                            tracing::debug!(operation = "prune", pruned = n, "old resource samples pruned");
                        }
                        Err(e) => warn!(error = %e, operation = "prune", "failed to prune resource log"),
                    }
                }
                Some(()) = vacuum_rx.recv() => {
                    if let Err(e) = resource_log.vacuum().await {
                        warn!(error = %e, "vacuum failed");
                    } else {
                        info!("vacuum complete");
                    }
                }
                _ = stats_log_tick.tick() => {
                    info!(
                        samples_saved_total = samples_saved_total.load(Ordering::Relaxed),
                        samples_pruned_total = samples_pruned_total,
                        "recorder stats"
                    );
                }
            }
        }

        if let Some(task) = vacuum_task {
            task.abort();
        }
    }
    .instrument(recorder_span))
}

/// Sends on `tx` at each scheduled VACUUM time. Uses local time.
async fn vacuum_scheduler(cron_str: String, tx: tokio::sync::mpsc::Sender<()>) {
    let Ok(schedule) = cron::Schedule::from_str(&cron_str) else {
        warn!(cron = %cron_str, "invalid vacuum_schedule; VACUUM will not run");
        return;
    };
    loop {
        let now = chrono::Local::now();
        let Some(next) = schedule.after(&now).next() else {
            return;
        };
        let delay = (next - now).to_std().unwrap_or(std::time::Duration::from_secs(1));
        tokio::time::sleep(delay).await;
        if tx.send(()).await.is_err() {
            break;
        }
    }
}
