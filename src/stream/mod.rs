pub mod client;
pub mod feed;
pub mod transport;

pub use client::{ConnectionState, StreamClient, StreamHandle, RECONNECT_DELAY};
pub use feed::{Feed, ScanDetails, ScanResult, WsEnvelope, SCAN_RESULT_EVENT};
pub use transport::{Connector, TransportError, WsConnector};
