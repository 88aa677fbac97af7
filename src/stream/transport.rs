use async_trait::async_trait;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("receive failed: {0}")]
    Receive(String),
}

/// Text frames delivered by one physical connection. The stream ending means
/// the transport closed; an `Err` item is a transport fault that forces the
/// connection closed right after.
pub type FrameStream = BoxStream<'static, Result<String, TransportError>>;

/// Seam between the stream client's state machine and the wire. One call, one
/// physical connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<FrameStream, TransportError>;
}

/// Production connector over tokio-tungstenite.
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<FrameStream, TransportError> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        // Only text frames carry events; ping/pong and close bookkeeping stay
        // inside tungstenite. Errors surface once, then the stream ends.
        let frames = ws.filter_map(|item| async move {
            match item {
                Ok(Message::Text(text)) => Some(Ok(text.to_string())),
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::Receive(e.to_string()))),
            }
        });
        Ok(frames.boxed())
    }
}
