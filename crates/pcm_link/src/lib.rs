use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

mod rpc;
mod ws;

pub use ws::{normalize_address, WsRpcConnector, WsRpcLink};

/// Why an established link went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    TransportError,
    ServerClosed,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Closed(CloseReason),
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("invalid endpoint address: {0}")]
    InvalidAddress(String),
    #[error("endpoint reported failure: {0}")]
    Rejected(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("timed out waiting for an endpoint reply")]
    Timeout,
    #[error("link is closed")]
    ConnectionClosed,
}

/// One live connection to the instrumentation endpoint.
///
/// Reads and writes address variables by their namespaced wire name;
/// the endpoint owns the variable table. Lifecycle changes are pushed
/// on the event channel, after which every call fails with
/// [`LinkError::ConnectionClosed`].
#[async_trait]
pub trait PcmLink: Send + Sync {
    async fn read_variable(&self, name: &str) -> Result<i64, LinkError>;
    async fn write_variable(&self, name: &str, value: i64) -> Result<(), LinkError>;
    fn subscribe_events(&self) -> broadcast::Receiver<LinkEvent>;
    async fn close(&self);
}

#[async_trait]
pub trait PcmConnector: Send + Sync {
    async fn connect(&self, address: &str) -> Result<Arc<dyn PcmLink>, LinkError>;
}
