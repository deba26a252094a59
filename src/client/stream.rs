//! Streaming Producer/Consumer
//!
//! A producer spawned on first poll owns the HTTP connection and writes
//! [`StreamSignal`]s into an unbounded channel; [`FragmentStream`] is the
//! read end.

use crate::api::streaming::{parse_sse_line, sse_lines, SseFrame};
use crate::client::http::{Endpoint, HttpClient};
use crate::client::retry::{log_stream_failure, RetryPolicy};
use crate::error::{ChatError, Result};
use crate::logging::LogSink;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::Level;

/// What the producer hands to the consumer
#[derive(Debug)]
pub enum StreamSignal {
    /// One non-empty piece of text
    Fragment(String),

    /// Normal end, including exhausted retries
    Closed,

    /// Terminal failure
    Failed(ChatError),
}

/// Lazy sequence of text fragments from a streamed completion.
///
/// Nothing is sent until the first poll, which spawns the producer on the
/// current tokio runtime. Finite and not restartable. Yields `Err` at most
/// once, as its last item. Dropping it stops the producer and closes its
/// connection.
pub struct FragmentStream {
    state: State,
}

enum State {
    /// Not polled yet
    Idle(Producer),
    Running(UnboundedReceiver<StreamSignal>),
    Done,
}

/// Everything one streamed call needs before it starts
pub(crate) struct Producer {
    pub(crate) endpoint: Endpoint,
    pub(crate) body: Result<String>,
    pub(crate) policy: RetryPolicy,
    pub(crate) sink: Arc<dyn LogSink>,
}

impl FragmentStream {
    /// Consumer over an already-running channel
    pub(crate) fn new(rx: UnboundedReceiver<StreamSignal>) -> Self {
        Self {
            state: State::Running(rx),
        }
    }

    /// Consumer that starts `producer` on first poll
    pub(crate) fn lazy(producer: Producer) -> Self {
        Self {
            state: State::Idle(producer),
        }
    }

    /// Concatenate every fragment, stopping at the first error
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl Stream for FragmentStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.state = match std::mem::replace(&mut self.state, State::Done) {
            State::Idle(producer) => match producer.spawn() {
                Ok(rx) => State::Running(rx),
                Err(err) => return Poll::Ready(Some(Err(err))),
            },
            other => other,
        };

        let State::Running(rx) = &mut self.state else {
            return Poll::Ready(None);
        };

        let item = match rx.poll_recv(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Some(StreamSignal::Fragment(text))) => return Poll::Ready(Some(Ok(text))),
            Poll::Ready(Some(StreamSignal::Closed)) => None,
            Poll::Ready(Some(StreamSignal::Failed(err))) => Some(Err(err)),
            Poll::Ready(None) => Some(Err(ChatError::Internal(
                "stream producer stopped without closing the stream".to_string(),
            ))),
        };
        self.state = State::Done;
        Poll::Ready(item)
    }
}

impl Producer {
    /// Spawn onto the current runtime and return the consumer end
    fn spawn(self) -> Result<UnboundedReceiver<StreamSignal>> {
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            ChatError::Internal(format!("streaming needs a tokio runtime: {}", e))
        })?;
        let (tx, rx) = mpsc::unbounded_channel();

        handle.spawn(async move {
            let Producer {
                endpoint,
                body,
                policy,
                sink,
            } = self;

            tokio::select! {
                result = produce(&endpoint, body, policy, sink.as_ref(), &tx) => {
                    let signal = match result {
                        Ok(()) => StreamSignal::Closed,
                        Err(err) => {
                            sink.log(Level::ERROR, &format!("Unexpected error: {}", err));
                            StreamSignal::Failed(err)
                        }
                    };
                    let _ = tx.send(signal);
                }
                _ = tx.closed() => {
                    sink.log(Level::DEBUG, "Stream consumer dropped, closing connection.");
                }
            }
        });

        Ok(rx)
    }
}

/// Connect with retry, then forward fragments until the body ends.
///
/// `Ok` covers both a clean end and exhausted connection attempts.
async fn produce(
    endpoint: &Endpoint,
    body: Result<String>,
    policy: RetryPolicy,
    sink: &dyn LogSink,
    tx: &UnboundedSender<StreamSignal>,
) -> Result<()> {
    let body = body?;
    let client = HttpClient::new()?;

    let connected = policy
        .run(
            |_| client.post_stream(endpoint, &body),
            |n, err| log_stream_failure(sink, n, policy.max_attempts, err),
        )
        .await;

    let response = match connected {
        Ok(response) => response,
        Err(ChatError::Exhausted { .. }) => {
            sink.log(
                Level::ERROR,
                "Failed to complete streaming after maximum retry attempts.",
            );
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    let mut lines = std::pin::pin!(sse_lines(response.bytes_stream()));
    while let Some(line) = lines.next().await {
        let line = line.map_err(|e| ChatError::Stream(format!("Failed to read stream: {}", e)))?;
        match parse_sse_line(&line)? {
            SseFrame::Done => break,
            SseFrame::Data(chunk) => {
                if let Some(fragment) = chunk.fragment() {
                    if tx.send(StreamSignal::Fragment(fragment.to_string())).is_err() {
                        break;
                    }
                }
            }
            SseFrame::Skip => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_fragments_then_close() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = task::spawn(FragmentStream::new(rx));

        assert_pending!(stream.poll_next());

        tx.send(StreamSignal::Fragment("He".into())).unwrap();
        tx.send(StreamSignal::Fragment("llo".into())).unwrap();
        assert!(stream.is_woken());

        let first = assert_ready!(stream.poll_next()).unwrap().unwrap();
        let second = assert_ready!(stream.poll_next()).unwrap().unwrap();
        assert_eq!((first.as_str(), second.as_str()), ("He", "llo"));

        tx.send(StreamSignal::Closed).unwrap();
        assert!(assert_ready!(stream.poll_next()).is_none());
        assert!(assert_ready!(stream.poll_next()).is_none());
    }

    #[test]
    fn test_failed_surfaces_once() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = task::spawn(FragmentStream::new(rx));

        tx.send(StreamSignal::Fragment("partial".into())).unwrap();
        tx.send(StreamSignal::Failed(ChatError::Stream("reset".into())))
            .unwrap();

        assert!(assert_ready!(stream.poll_next()).unwrap().is_ok());
        let err = assert_ready!(stream.poll_next()).unwrap().unwrap_err();
        assert!(matches!(err, ChatError::Stream(_)));
        assert!(assert_ready!(stream.poll_next()).is_none());
    }

    #[test]
    fn test_dropped_producer_is_an_error() {
        let (tx, rx) = mpsc::unbounded_channel::<StreamSignal>();
        let mut stream = task::spawn(FragmentStream::new(rx));
        drop(tx);

        let err = assert_ready!(stream.poll_next()).unwrap().unwrap_err();
        assert!(matches!(err, ChatError::Internal(_)));
        assert!(assert_ready!(stream.poll_next()).is_none());
    }

    #[test]
    fn test_lazy_stream_without_runtime_fails_on_poll() {
        let producer = Producer {
            endpoint: Endpoint::new("http://127.0.0.1:1/", "k").unwrap(),
            body: Ok("{}".to_string()),
            policy: RetryPolicy::streaming(),
            sink: Arc::new(crate::logging::MemorySink::new()),
        };
        let mut stream = task::spawn(FragmentStream::lazy(producer));

        let err = assert_ready!(stream.poll_next()).unwrap().unwrap_err();
        assert!(matches!(err, ChatError::Internal(_)));
        assert!(assert_ready!(stream.poll_next()).is_none());
    }

    #[tokio::test]
    async fn test_collect_text() {
        let (tx, rx) = mpsc::unbounded_channel();
        for part in ["a", "b", "c"] {
            tx.send(StreamSignal::Fragment(part.into())).unwrap();
        }
        tx.send(StreamSignal::Closed).unwrap();

        assert_eq!(FragmentStream::new(rx).collect_text().await.unwrap(), "abc");
    }
}
