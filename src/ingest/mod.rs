// QC event ingestion: one task, one message at a time, in feed order.
// A bad message costs exactly that message; the loop only stops on shutdown
// or when the feed is closed for good. Reconnects never reset the store.

mod event;
mod feed;

pub use event::{EventError, QcMessage};
pub use feed::{ChannelFeed, EventFeed, FeedMessage, ReconnectPolicy, TcpJsonFeed};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{Duration, interval};

use crate::store::{StoreError, StoreHandle, UpdateOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IngestState {
    Connecting,
    Subscribed,
    Processing,
    Reconnecting,
    Terminated,
}

impl IngestState {
    pub fn on_message(self, msg: &FeedMessage) -> IngestState {
        if self == IngestState::Terminated {
            return self;
        }
        match msg {
            FeedMessage::Subscribed => IngestState::Subscribed,
            FeedMessage::Message(_) | FeedMessage::Malformed(_) => IngestState::Processing,
            FeedMessage::Disconnected(_) => IngestState::Reconnecting,
            FeedMessage::Closed => IngestState::Terminated,
        }
    }
}

/// What happened to one feed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    /// Older than the value already stored for that slot.
    Stale,
    /// Not one of the tracked QC parameters.
    Ignored,
    /// Dropped after logging (malformed, unknown station, or write failure).
    Failed,
}

#[derive(Debug, Default)]
pub struct IngestStats {
    pub applied: AtomicU64,
    pub stale: AtomicU64,
    pub ignored: AtomicU64,
    pub failed: AtomicU64,
    pub reconnects: AtomicU64,
}

impl IngestStats {
    fn record(&self, outcome: EventOutcome) {
        let counter = match outcome {
            EventOutcome::Applied => &self.applied,
            EventOutcome::Stale => &self.stale,
            EventOutcome::Ignored => &self.ignored,
            EventOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct IngestConfig {
    /// How often to log ingestion counters (real seconds).
    pub stats_log_interval_secs: u64,
}

/// Validate one message and fold it into the store. Never returns an error:
/// every failure is logged here with station/parameter context.
pub async fn process_message(store: &StoreHandle, msg: &QcMessage) -> EventOutcome {
    let event = match msg.to_param_event(Utc::now()) {
        Ok(Some(event)) => event,
        Ok(None) => {
            tracing::debug!(parameter = %msg.parameter, "untracked QC parameter ignored");
            return EventOutcome::Ignored;
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                waveform_id = msg.waveform_id.as_deref().unwrap_or(""),
                parameter = %msg.parameter,
                operation = "ingest_event",
                "malformed QC event dropped"
            );
            return EventOutcome::Failed;
        }
    };

    tracing::debug!(
        waveform_id = msg.waveform_id.as_deref().unwrap_or(""),
        parameter = %msg.parameter,
        value = event.value,
        timestamp = %event.timestamp,
        "QC parameter"
    );

    match store
        .update(&event.station, event.kind, event.value, event.timestamp)
        .await
    {
        Ok(UpdateOutcome::Applied { .. }) => EventOutcome::Applied,
        Ok(UpdateOutcome::Stale) => {
            tracing::debug!(
                station = %event.station,
                parameter = ?event.kind,
                timestamp = %event.timestamp,
                "stale QC value skipped"
            );
            EventOutcome::Stale
        }
        Err(StoreError::UnknownStation(station)) => {
            tracing::warn!(
                station = %station,
                parameter = ?event.kind,
                operation = "ingest_event",
                "QC event for station not in registry dropped"
            );
            EventOutcome::Failed
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                station = %event.station,
                parameter = ?event.kind,
                value = event.value,
                operation = "store_update",
                "snapshot update failed"
            );
            EventOutcome::Failed
        }
    }
}

/// Spawns the ingestion loop. Resolves to the final state once shut down or
/// once the feed is closed.
pub fn spawn<F>(
    mut feed: F,
    store: StoreHandle,
    stats: Arc<IngestStats>,
    config: IngestConfig,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<IngestState>
where
    F: EventFeed + 'static,
{
    tokio::spawn(async move {
        let mut state = IngestState::Connecting;
        // Counters are logged from a separate task: a tick must never cancel a
        // pending feed read or reconnect.
        let (state_tx, state_rx) = watch::channel(state);
        let reporter = tokio::spawn(log_stats(
            stats.clone(),
            state_rx,
            Duration::from_secs(config.stats_log_interval_secs),
        ));

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => {
                    tracing::debug!("ingestion shutting down");
                    break;
                }
                msg = feed.next_message() => {
                    let next = state.on_message(&msg);
                    if next != state && next != IngestState::Processing {
                        tracing::info!(from = ?state, to = ?next, "QC feed state");
                    }
                    state = next;
                    state_tx.send_replace(state);
                    match msg {
                        FeedMessage::Message(m) => {
                            stats.record(process_message(&store, &m).await);
                        }
                        FeedMessage::Malformed(reason) => {
                            tracing::warn!(
                                error = %reason,
                                operation = "decode_feed_message",
                                "undecodable QC payload dropped"
                            );
                            stats.record(EventOutcome::Failed);
                        }
                        FeedMessage::Disconnected(reason) => {
                            stats.reconnects.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(error = %reason, "QC feed disconnected");
                        }
                        FeedMessage::Subscribed => {}
                        FeedMessage::Closed => break,
                    }
                }
            }
        }
        reporter.abort();
        IngestState::Terminated
    })
}

async fn log_stats(
    stats: Arc<IngestStats>,
    state: watch::Receiver<IngestState>,
    every: Duration,
) {
    let mut stats_log_tick = interval(every);
    stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        stats_log_tick.tick().await;
        let current = *state.borrow();
        tracing::info!(
            state = ?current,
            applied = stats.applied.load(Ordering::Relaxed),
            stale = stats.stale.load(Ordering::Relaxed),
            ignored = stats.ignored.load(Ordering::Relaxed),
            failed = stats.failed.load(Ordering::Relaxed),
            reconnects = stats.reconnects.load(Ordering::Relaxed),
            "ingest stats"
        );
    }
}
