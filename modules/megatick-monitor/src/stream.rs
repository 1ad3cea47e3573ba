// Stream boundary. The listener is the only code on the network I/O path:
// it enqueues and returns. Error callbacks decide whether the stream goes on.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info, warn};

use megatick_common::StreamItem;

use crate::queue::WorkQueue;
use crate::stats::{bump, PipelineStats};

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Non-success HTTP status from the streaming endpoint.
    #[error("stream returned status {0}")]
    Status(u16),

    #[error("stream rate limited")]
    RateLimited,

    #[error("stream timed out")]
    Timeout,

    #[error("stream read failed: {0}")]
    Read(String),

    /// One event that does not parse. The stream itself is fine.
    #[error("malformed event: {0}")]
    Malformed(String),
}

/// What the stream should do after a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Stop,
}

/// Why `run_stream` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The source ran out of events.
    Exhausted,
    /// A callback asked to stop (bad credentials).
    Stopped,
}

pub struct StreamListener {
    queue: Arc<WorkQueue<StreamItem>>,
    stats: Arc<PipelineStats>,
    reconnect_delay: Duration,
    rate_limit_backoff: Duration,
}

impl StreamListener {
    pub fn new(
        queue: Arc<WorkQueue<StreamItem>>,
        stats: Arc<PipelineStats>,
        reconnect_delay: Duration,
        rate_limit_backoff: Duration,
    ) -> Self {
        Self {
            queue,
            stats,
            reconnect_delay,
            rate_limit_backoff,
        }
    }

    /// Enqueue and return. Never blocks.
    pub fn on_item(&self, item: StreamItem) -> Control {
        bump(&self.stats.received);
        self.queue.push(item);
        Control::Continue
    }

    /// 401 means bad credentials: stop. Anything else is retried after the
    /// reconnect delay.
    pub async fn on_error(&self, status: u16) -> Control {
        if status == 401 {
            error!(status, "Stream unauthorized, stopping");
            return Control::Stop;
        }
        warn!(status, delay_secs = self.reconnect_delay.as_secs(), "Stream error, resuming after delay");
        tokio::time::sleep(self.reconnect_delay).await;
        Control::Continue
    }

    pub async fn on_limit(&self) -> Control {
        warn!(backoff_secs = self.rate_limit_backoff.as_secs(), "Stream rate limited, backing off");
        tokio::time::sleep(self.rate_limit_backoff).await;
        Control::Continue
    }

    pub async fn on_timeout(&self) -> Control {
        warn!(delay_secs = self.reconnect_delay.as_secs(), "Stream timed out, resuming after delay");
        tokio::time::sleep(self.reconnect_delay).await;
        Control::Continue
    }
}

/// Drive a stream of events through the listener until it ends or a
/// callback stops it.
pub async fn run_stream<S>(listener: &StreamListener, stream: S) -> StreamEnd
where
    S: Stream<Item = Result<StreamItem, StreamError>>,
{
    futures::pin_mut!(stream);
    while let Some(event) = stream.next().await {
        let control = match event {
            Ok(item) => listener.on_item(item),
            Err(StreamError::Status(status)) => listener.on_error(status).await,
            Err(StreamError::RateLimited) => listener.on_limit().await,
            Err(StreamError::Timeout) => listener.on_timeout().await,
            Err(StreamError::Read(msg)) => {
                warn!(error = msg.as_str(), "Stream read failed");
                listener.on_timeout().await
            }
            Err(StreamError::Malformed(msg)) => {
                warn!(error = msg.as_str(), "Skipping malformed event");
                Control::Continue
            }
        };
        if control == Control::Stop {
            return StreamEnd::Stopped;
        }
    }
    info!("Stream exhausted");
    StreamEnd::Exhausted
}

/// Newline-delimited JSON events. Blank lines are skipped.
pub fn ndjson_events<R>(reader: R) -> impl Stream<Item = Result<StreamItem, StreamError>>
where
    R: AsyncBufRead + Unpin,
{
    futures::stream::unfold(reader.lines(), |mut lines| async move {
        loop {
            let event = match lines.next_line().await {
                Ok(None) => return None,
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => serde_json::from_str::<StreamItem>(&line)
                    .map_err(|e| StreamError::Malformed(e.to_string())),
                Err(e) => Err(StreamError::Read(e.to_string())),
            };
            return Some((event, lines));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener(queue: Arc<WorkQueue<StreamItem>>) -> StreamListener {
        StreamListener::new(queue, Arc::new(PipelineStats::default()), Duration::ZERO, Duration::ZERO)
    }

    #[tokio::test]
    async fn ndjson_skips_blank_lines_and_flags_bad_ones() {
        let input = b"{\"platform\":\"tweet\",\"data\":{\"id\":1}}\n\nnot json\n" as &[u8];
        let events: Vec<_> = ndjson_events(input).collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(matches!(events[1], Err(StreamError::Malformed(_))));
    }

    #[tokio::test]
    async fn unauthorized_stops_the_stream() {
        let queue = Arc::new(WorkQueue::unbounded("ingest"));
        let events = futures::stream::iter(vec![
            Err(StreamError::Status(401)),
            Ok(StreamItem::Tweet(Default::default())),
        ]);
        let end = run_stream(&listener(queue.clone()), events).await;
        assert_eq!(end, StreamEnd::Stopped);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn transient_errors_resume() {
        let queue = Arc::new(WorkQueue::unbounded("ingest"));
        let events = futures::stream::iter(vec![
            Err(StreamError::Status(503)),
            Err(StreamError::Timeout),
            Err(StreamError::RateLimited),
            Err(StreamError::Read("reset".to_string())),
            Ok(StreamItem::Tweet(Default::default())),
        ]);
        let end = run_stream(&listener(queue.clone()), events).await;
        assert_eq!(end, StreamEnd::Exhausted);
        assert_eq!(queue.len(), 1);
    }
}
