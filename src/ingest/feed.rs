// QC feed clients. The feed owns connection and reconnect handling; the
// ingestion loop only sees the resulting FeedMessage stream.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::QcMessage;

#[derive(Debug, Clone)]
pub enum FeedMessage {
    /// (Re)subscribed to the QC group.
    Subscribed,
    Message(QcMessage),
    /// A payload arrived but could not be decoded.
    Malformed(String),
    /// Connection lost; the feed will try again on the next call.
    Disconnected(String),
    /// No more messages will ever arrive.
    Closed,
}

pub trait EventFeed: Send {
    fn next_message(&mut self) -> impl Future<Output = FeedMessage> + Send;
}

/// In-process feed, e.g. for embedding or tests. Closed once all senders drop.
pub struct ChannelFeed {
    rx: mpsc::Receiver<FeedMessage>,
}

impl ChannelFeed {
    pub fn new(rx: mpsc::Receiver<FeedMessage>) -> Self {
        Self { rx }
    }

    pub fn channel(capacity: usize) -> (mpsc::Sender<FeedMessage>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }
}

impl EventFeed for ChannelFeed {
    async fn next_message(&mut self) -> FeedMessage {
        self.rx.recv().await.unwrap_or(FeedMessage::Closed)
    }
}

/// Reconnect policy for [`TcpJsonFeed`]. Both values come from configuration.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    /// Consecutive failed connects before giving up; `None` retries forever.
    pub max_attempts: Option<u32>,
}

/// Newline-delimited JSON QC messages over TCP.
///
/// `next_message` is cancel-safe: the reconnect deadline and the attempt
/// count live in the feed, so a dropped call resumes the same backoff.
pub struct TcpJsonFeed {
    address: String,
    policy: ReconnectPolicy,
    lines: Option<Lines<BufReader<TcpStream>>>,
    failed_attempts: u32,
    next_attempt_at: Option<Instant>,
}

impl TcpJsonFeed {
    pub fn new(address: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            address: address.into(),
            policy,
            lines: None,
            failed_attempts: 0,
            next_attempt_at: None,
        }
    }

    async fn connect(&mut self) -> FeedMessage {
        if let Some(max) = self.policy.max_attempts
            && self.failed_attempts >= max
        {
            tracing::error!(
                address = %self.address,
                attempts = self.failed_attempts,
                "QC feed unreachable, giving up"
            );
            return FeedMessage::Closed;
        }
        if let Some(at) = self.next_attempt_at {
            tokio::time::sleep_until(at).await;
        }
        // Counted up front so an attempt abandoned mid-connect still counts.
        self.failed_attempts += 1;
        self.next_attempt_at = Some(Instant::now() + self.policy.delay);
        match TcpStream::connect(&self.address).await {
            Ok(stream) => {
                self.lines = Some(BufReader::new(stream).lines());
                self.failed_attempts = 0;
                self.next_attempt_at = None;
                FeedMessage::Subscribed
            }
            Err(e) => FeedMessage::Disconnected(format!("connect {}: {}", self.address, e)),
        }
    }

    fn drop_connection(&mut self, reason: String) -> FeedMessage {
        self.lines = None;
        self.next_attempt_at = Some(Instant::now() + self.policy.delay);
        FeedMessage::Disconnected(reason)
    }
}

impl EventFeed for TcpJsonFeed {
    async fn next_message(&mut self) -> FeedMessage {
        loop {
            let Some(lines) = self.lines.as_mut() else {
                return self.connect().await;
            };
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    return match QcMessage::from_json(line) {
                        Ok(msg) => FeedMessage::Message(msg),
                        Err(e) => FeedMessage::Malformed(e.to_string()),
                    };
                }
                Ok(None) => return self.drop_connection("feed closed the connection".into()),
                Err(e) => return self.drop_connection(format!("read: {}", e)),
            }
        }
    }
}
