use anyhow::Result;
use chrono::Utc;
use stationqc::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    // Bootstrap: only one writer may own the snapshot, and a failed inventory
    // read aborts before anything is written.
    let snapshot_path = Path::new(&app_config.snapshot.path);
    let lock = store::WriterLock::acquire(snapshot_path)?;
    let inventory = registry::InventoryDir::new(&app_config.inventory.dir);
    let snapshot = registry::refresh(&inventory, Utc::now(), &lock)?;

    let (store_handle, owner_task) = store::StoreOwner::with_snapshot(lock, snapshot)
        .spawn(app_config.snapshot.command_capacity);

    let resource_log = Arc::new(
        resource_log::ResourceLog::connect(
            &app_config.recorder.database_path,
            app_config.recorder.max_pool_size,
        )
        .await?,
    );
    resource_log.init().await?;

    let mounts = app_config.recorder.mounts.clone().map(PathBuf::from);
    let collector = Arc::new(collector::ResourceCollector::new(
        mounts,
        std::time::Duration::from_millis(app_config.recorder.cpu_window_ms),
    ));

    let (recorder_shutdown_tx, recorder_shutdown_rx) = tokio::sync::oneshot::channel();
    let recorder_handle = recorder::spawn(
        recorder::RecorderDeps {
            collector,
            resource_log: resource_log.clone(),
            samples_saved_total: Arc::new(AtomicU64::new(0)),
            shutdown_rx: recorder_shutdown_rx,
        },
        recorder::RecorderConfig {
            interval_secs: app_config.recorder.interval_secs,
            retention_days: app_config.recorder.retention_days,
            prune_interval_secs: app_config.recorder.prune_interval_secs,
            vacuum_schedule: app_config.recorder.vacuum_schedule.clone(),
            stats_log_interval_secs: app_config.monitoring.stats_log_interval_secs,
        },
    );

    let feed = ingest::TcpJsonFeed::new(
        app_config.feed.address.clone(),
        ingest::ReconnectPolicy {
            delay: std::time::Duration::from_millis(app_config.feed.reconnect_delay_ms),
            max_attempts: app_config.feed.max_reconnect_attempts,
        },
    );
    let (ingest_shutdown_tx, ingest_shutdown_rx) = tokio::sync::oneshot::channel();
    let mut ingest_handle = ingest::spawn(
        feed,
        store_handle,
        Arc::new(ingest::IngestStats::default()),
        ingest::IngestConfig {
            stats_log_interval_secs: app_config.monitoring.stats_log_interval_secs,
        },
        ingest_shutdown_rx,
    );

    let app = routes::app(
        store::FileStore::new(&app_config.snapshot.path),
        resource_log.clone(),
    );
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();
    let (feed_closed, serve_result) = tokio::select! {
        result = server => {
            tracing::info!("Received shutdown signal");
            (false, result)
        }
        state = &mut ingest_handle => {
            tracing::error!(state = ?state.ok(), "QC ingestion stopped");
            (true, Ok(()))
        }
    };

    // Stop taking feed events first; the store owner then finishes queued
    // writes and releases the lock once the last handle is gone.
    if !feed_closed {
        let _ = ingest_shutdown_tx.send(());
        if let Err(e) = ingest_handle.await {
            tracing::warn!(error = %e, "ingestion task join failed");
        }
    }
    if let Err(e) = owner_task.await {
        tracing::warn!(error = %e, "store owner join failed");
    }
    let _ = recorder_shutdown_tx.send(());
    if let Err(e) = recorder_handle.await {
        tracing::warn!(error = %e, "recorder join failed");
    }
    resource_log.close().await;

    serve_result?;
    anyhow::ensure!(!feed_closed, "QC feed closed");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
