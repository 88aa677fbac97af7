//! One logical subscription to the backend's push channel.
//!
//! The client runs as a single task owning at most one transport and at most
//! one pending retry timer. Connection loss of any kind funnels into the same
//! closed-pending-retry state and a fixed-delay reconnect; the cycle repeats
//! for the life of the owning view. Only explicit teardown reaches `Closed`,
//! and teardown cancels both the transport and any scheduled retry.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::stream::feed::WsEnvelope;
use crate::stream::transport::Connector;

/// Fixed interval between reconnect attempts. No backoff growth, no cap.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    ClosedPendingRetry,
    Closed,
}

pub struct StreamClient {
    url: String,
    connector: Arc<dyn Connector>,
}

/// Owner-side handle: observe connection state, tear the subscription down.
pub struct StreamHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
    state: watch::Receiver<ConnectionState>,
}

impl StreamHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Explicit teardown: cancels the transport and any pending retry timer,
    /// then waits for the task to finish. No reconnect fires afterwards.
    pub async fn close(self) {
        self.shutdown.cancel();
        let _ = self.task.await;
    }
}

impl StreamClient {
    pub fn new(url: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        Self {
            url: url.into(),
            connector,
        }
    }

    /// Starts the subscription task. Envelopes arrive on the returned channel
    /// in exact frame-delivery order, across physical reconnects.
    pub fn subscribe(self) -> (StreamHandle, mpsc::UnboundedReceiver<WsEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(run(self.url, self.connector, tx, shutdown.clone(), state_tx));

        (
            StreamHandle {
                shutdown,
                task,
                state: state_rx,
            },
            rx,
        )
    }
}

async fn run(
    url: String,
    connector: Arc<dyn Connector>,
    tx: mpsc::UnboundedSender<WsEnvelope>,
    shutdown: CancellationToken,
    state: watch::Sender<ConnectionState>,
) {
    loop {
        let _ = state.send(ConnectionState::Connecting);

        let mut frames = tokio::select! {
            _ = shutdown.cancelled() => break,
            attempt = connector.connect(&url) => match attempt {
                Ok(frames) => frames,
                Err(e) => {
                    warn!(error = %e, "stream connection attempt failed");
                    let _ = state.send(ConnectionState::ClosedPendingRetry);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => continue,
                    }
                }
            },
        };

        let _ = state.send(ConnectionState::Open);
        info!(url = %url, "stream connected");

        // Inner delivery loop; `true` means the connection closed and a retry
        // should be scheduled, `false` means stop for good.
        let retry = loop {
            tokio::select! {
                _ = shutdown.cancelled() => break false,
                frame = frames.next() => match frame {
                    Some(Ok(text)) => match serde_json::from_str::<WsEnvelope>(&text) {
                        Ok(envelope) => {
                            if tx.send(envelope).is_err() {
                                // receiver dropped, nobody left to deliver to
                                break false;
                            }
                        }
                        Err(e) => warn!(error = %e, "dropping unparseable frame"),
                    },
                    Some(Err(e)) => {
                        // a transport error forces the connection closed; the
                        // closure below is the one retry trigger
                        warn!(error = %e, "stream transport error");
                        break true;
                    }
                    None => {
                        info!("stream closed by server");
                        break true;
                    }
                },
            }
        };

        if !retry {
            break;
        }

        let _ = state.send(ConnectionState::ClosedPendingRetry);
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }

    let _ = state.send(ConnectionState::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::transport::{FrameStream, TransportError};
    use async_trait::async_trait;
    use futures::stream;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// What the fake transport does on the n-th connection attempt. Once the
    /// script is exhausted, further attempts connect and stay silently open.
    enum Script {
        /// Deliver these frames, then the transport closes.
        FramesThenClose(Vec<Result<String, TransportError>>),
        /// Deliver these frames, then stay open forever.
        FramesThenHold(Vec<Result<String, TransportError>>),
        /// The connection attempt itself fails.
        FailToConnect,
    }

    struct ScriptedConnector {
        attempts: AtomicUsize,
        scripts: Mutex<VecDeque<Script>>,
    }

    impl ScriptedConnector {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                attempts: AtomicUsize::new(0),
                scripts: Mutex::new(scripts.into()),
            })
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, _url: &str) -> Result<FrameStream, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let script = self.scripts.lock().unwrap().pop_front();
            match script {
                Some(Script::FramesThenClose(frames)) => Ok(stream::iter(frames).boxed()),
                Some(Script::FramesThenHold(frames)) => {
                    Ok(stream::iter(frames).chain(stream::pending()).boxed())
                }
                Some(Script::FailToConnect) => {
                    Err(TransportError::Connect("refused".to_string()))
                }
                None => Ok(stream::pending().boxed()),
            }
        }
    }

    fn envelope_frame(event: &str, ts: &str) -> Result<String, TransportError> {
        Ok(json!({"event": event, "payload": {"timestamp": ts}}).to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_exactly_once_after_the_fixed_delay() {
        let connector = ScriptedConnector::new(vec![Script::FramesThenClose(vec![])]);
        let (handle, _rx) =
            StreamClient::new("ws://test", connector.clone()).subscribe();

        // first attempt connects and immediately observes closure
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(connector.attempts(), 1);
        assert_eq!(handle.state(), ConnectionState::ClosedPendingRetry);

        // just shy of the delay: still exactly one attempt
        tokio::time::sleep(RECONNECT_DELAY - Duration::from_millis(20)).await;
        assert_eq!(connector.attempts(), 1);

        // past the delay: the single scheduled retry has fired
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(connector.attempts(), 2);
        assert_eq!(handle.state(), ConnectionState::Open);

        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_before_the_delay_cancels_the_retry() {
        let connector = ScriptedConnector::new(vec![Script::FramesThenClose(vec![])]);
        let (handle, _rx) =
            StreamClient::new("ws://test", connector.clone()).subscribe();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.state(), ConnectionState::ClosedPendingRetry);

        let states = handle.state_changes();
        handle.close().await;
        assert_eq!(*states.borrow(), ConnectionState::Closed);

        // well past the would-be retry: no reconnect fired after teardown
        tokio::time::sleep(RECONNECT_DELAY * 3).await;
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connection_attempts_keep_retrying() {
        let connector = ScriptedConnector::new(vec![
            Script::FailToConnect,
            Script::FailToConnect,
        ]);
        let (handle, _rx) =
            StreamClient::new("ws://test", connector.clone()).subscribe();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(connector.attempts(), 1);
        tokio::time::sleep(RECONNECT_DELAY).await;
        assert_eq!(connector.attempts(), 2);
        tokio::time::sleep(RECONNECT_DELAY).await;
        assert_eq!(connector.attempts(), 3);
        assert_eq!(handle.state(), ConnectionState::Open);

        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unparseable_frames_are_dropped_without_breaking_the_connection() {
        let connector = ScriptedConnector::new(vec![Script::FramesThenHold(vec![
            Ok("not json at all".to_string()),
            Ok(json!({"unexpected": "shape"}).to_string()),
            envelope_frame("scan_result_found", "2024-05-01T09:30:00Z"),
        ])]);
        let (handle, mut rx) =
            StreamClient::new("ws://test", connector.clone()).subscribe();

        tokio::time::sleep(Duration::from_millis(10)).await;

        let delivered = rx.recv().await.unwrap();
        assert_eq!(delivered.event, "scan_result_found");
        assert!(rx.try_recv().is_err());

        // bad frames neither broke the connection nor triggered a reconnect
        assert_eq!(connector.attempts(), 1);
        assert_eq!(handle.state(), ConnectionState::Open);

        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_forces_closure_then_a_single_retry() {
        let connector = ScriptedConnector::new(vec![Script::FramesThenHold(vec![
            envelope_frame("scan_result_found", "2024-05-01T09:30:00Z"),
            Err(TransportError::Receive("reset".to_string())),
        ])]);
        let (handle, mut rx) =
            StreamClient::new("ws://test", connector.clone()).subscribe();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(rx.recv().await.is_some());
        assert_eq!(handle.state(), ConnectionState::ClosedPendingRetry);
        assert_eq!(connector.attempts(), 1);

        tokio::time::sleep(RECONNECT_DELAY + Duration::from_millis(10)).await;
        assert_eq!(connector.attempts(), 2);

        handle.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn messages_arrive_in_frame_order_across_reconnects() {
        let connector = ScriptedConnector::new(vec![
            Script::FramesThenClose(vec![
                envelope_frame("scan_result_found", "2024-05-01T09:30:03Z"),
                envelope_frame("scan_result_found", "2024-05-01T09:30:01Z"),
            ]),
            Script::FramesThenHold(vec![envelope_frame(
                "scan_result_found",
                "2024-05-01T09:30:02Z",
            )]),
        ]);
        let (handle, mut rx) = StreamClient::new("ws://test", connector).subscribe();

        tokio::time::sleep(RECONNECT_DELAY * 2).await;

        let timestamps: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.payload["timestamp"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            timestamps,
            vec![
                "2024-05-01T09:30:03Z",
                "2024-05-01T09:30:01Z",
                "2024-05-01T09:30:02Z"
            ]
        );

        handle.close().await;
    }
}
