//! WebSocket implementation of the endpoint link.
//!
//! One writer half guarded by a mutex, one reader task routing replies
//! to pending calls by request id. The reader task is the only place
//! that classifies why a link went away.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::{
    net::TcpStream,
    sync::{broadcast, oneshot, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};
use url::Url;

use crate::{
    rpc::{RpcRequest, RpcResponse, METHOD_READ_VARIABLE, METHOD_WRITE_VARIABLE},
    CloseReason, LinkError, LinkEvent, PcmConnector, PcmLink,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(3);
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Turns a configured endpoint address into a websocket URL. A bare
/// `host:port` is given the `ws` scheme; explicit `ws`/`wss` URLs pass
/// through unchanged.
pub fn normalize_address(address: &str) -> Result<String, LinkError> {
    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        format!("ws://{address}")
    };
    let url = Url::parse(&candidate)
        .map_err(|err| LinkError::InvalidAddress(format!("{address}: {err}")))?;
    match url.scheme() {
        "ws" | "wss" => Ok(url.to_string()),
        other => Err(LinkError::InvalidAddress(format!(
            "{address}: unsupported scheme '{other}'"
        ))),
    }
}

pub struct WsRpcConnector {
    reply_timeout: Duration,
}

impl WsRpcConnector {
    pub fn new() -> Self {
        Self {
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    pub fn with_reply_timeout(reply_timeout: Duration) -> Self {
        Self { reply_timeout }
    }
}

impl Default for WsRpcConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PcmConnector for WsRpcConnector {
    async fn connect(&self, address: &str) -> Result<Arc<dyn PcmLink>, LinkError> {
        let url = normalize_address(address)?;
        let (stream, _) = connect_async(&url)
            .await
            .map_err(|err| LinkError::Transport(format!("failed to connect {url}: {err}")))?;
        info!(%url, "instrumentation endpoint link established");
        let link = WsRpcLink::spawn(stream, self.reply_timeout);
        Ok(link)
    }
}

struct LinkShared {
    pending: Mutex<HashMap<u64, oneshot::Sender<RpcResponse>>>,
    events: broadcast::Sender<LinkEvent>,
    closed: AtomicBool,
}

impl LinkShared {
    async fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // Dropping the pending senders fails the waiting calls with
        // ConnectionClosed.
        self.pending.lock().await.clear();
    }
}

pub struct WsRpcLink {
    shared: Arc<LinkShared>,
    sink: Mutex<WsSink>,
    next_id: AtomicU64,
    reply_timeout: Duration,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl WsRpcLink {
    fn spawn(stream: WsStream, reply_timeout: Duration) -> Arc<Self> {
        let (sink, reader) = stream.split();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(LinkShared {
            pending: Mutex::new(HashMap::new()),
            events,
            closed: AtomicBool::new(false),
        });
        let reader_task = tokio::spawn(run_reader(Arc::clone(&shared), reader));
        Arc::new(Self {
            shared,
            sink: Mutex::new(sink),
            next_id: AtomicU64::new(0),
            reply_timeout,
            reader_task: Mutex::new(Some(reader_task)),
        })
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> Result<RpcResponse, LinkError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(LinkError::ConnectionClosed);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let frame = serde_json::to_string(&RpcRequest::new(id, method, params))
            .map_err(|err| LinkError::Transport(format!("failed to encode request: {err}")))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.shared.pending.lock().await.insert(id, reply_tx);

        if let Err(err) = self.sink.lock().await.send(Message::Text(frame)).await {
            self.shared.pending.lock().await.remove(&id);
            return Err(LinkError::Transport(err.to_string()));
        }

        match tokio::time::timeout(self.reply_timeout, reply_rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(LinkError::ConnectionClosed),
            Err(_) => {
                self.shared.pending.lock().await.remove(&id);
                Err(LinkError::Timeout)
            }
        }
    }
}

#[async_trait]
impl PcmLink for WsRpcLink {
    async fn read_variable(&self, name: &str) -> Result<i64, LinkError> {
        self.call(METHOD_READ_VARIABLE, serde_json::json!([name]))
            .await?
            .into_read_value()
    }

    async fn write_variable(&self, name: &str, value: i64) -> Result<(), LinkError> {
        self.call(METHOD_WRITE_VARIABLE, serde_json::json!([name, value]))
            .await?
            .into_write_ack()
    }

    fn subscribe_events(&self) -> broadcast::Receiver<LinkEvent> {
        self.shared.events.subscribe()
    }

    async fn close(&self) {
        self.shared.mark_closed().await;
        if let Some(task) = self.reader_task.lock().await.take() {
            task.abort();
        }
        let _ = self.sink.lock().await.close().await;
    }
}

async fn run_reader(shared: Arc<LinkShared>, mut reader: SplitStream<WsStream>) {
    let reason = loop {
        match reader.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<RpcResponse>(&text) {
                Ok(response) => {
                    let reply_tx = shared.pending.lock().await.remove(&response.id);
                    match reply_tx {
                        Some(reply_tx) => {
                            let _ = reply_tx.send(response);
                        }
                        None => warn!(id = response.id, "reply for unknown or expired request"),
                    }
                }
                Err(err) => warn!("discarding malformed endpoint frame: {err}"),
            },
            Some(Ok(Message::Close(_))) => break CloseReason::ServerClosed,
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                warn!("websocket receive failed: {err}");
                break CloseReason::TransportError;
            }
            None => break CloseReason::Unknown,
        }
    };
    shared.mark_closed().await;
    let _ = shared.events.send(LinkEvent::Closed(reason));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_port_gets_ws_scheme() {
        assert_eq!(
            normalize_address("localhost:41000").expect("address"),
            "ws://localhost:41000/"
        );
    }

    #[test]
    fn explicit_secure_url_passes_through() {
        assert_eq!(
            normalize_address("wss://rig.example.com/ws").expect("address"),
            "wss://rig.example.com/ws"
        );
    }

    #[test]
    fn http_scheme_is_rejected() {
        assert!(matches!(
            normalize_address("http://rig.example.com"),
            Err(LinkError::InvalidAddress(_))
        ));
    }

    #[test]
    fn garbage_address_is_rejected() {
        assert!(matches!(
            normalize_address("not a url at all"),
            Err(LinkError::InvalidAddress(_))
        ));
    }
}
