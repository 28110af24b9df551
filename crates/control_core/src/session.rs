use std::sync::Arc;

use pcm_link::{CloseReason, LinkEvent, PcmConnector, PcmLink};
use thiserror::Error;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};

const SESSION_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Why a connected session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectCause {
    TransportError,
    ServerClosed,
    Requested,
    Unknown,
}

impl From<CloseReason> for DisconnectCause {
    fn from(reason: CloseReason) -> Self {
        match reason {
            CloseReason::TransportError => DisconnectCause::TransportError,
            CloseReason::ServerClosed => DisconnectCause::ServerClosed,
            CloseReason::Unknown => DisconnectCause::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Disconnected { cause: DisconnectCause },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect to '{address}': {reason}")]
    ConnectFailed { address: String, reason: String },
}

struct SessionInner {
    state: SessionState,
    link: Option<Arc<dyn PcmLink>>,
    watcher: Option<JoinHandle<()>>,
    // Bumped per established connection so a watcher left over from an
    // earlier link can never tear down its successor.
    generation: u64,
}

/// One connection to the instrumentation endpoint.
///
/// State machine: `Disconnected --connect--> Connecting --ok-->
/// Connected --close/error--> Disconnected`, with a failed handshake
/// dropping straight back to `Disconnected`. There is no automatic
/// reconnect; recovery is a fresh `connect`.
pub struct ConnectionSession {
    connector: Arc<dyn PcmConnector>,
    inner: Mutex<SessionInner>,
    events: broadcast::Sender<SessionEvent>,
}

impl ConnectionSession {
    pub fn new(connector: Arc<dyn PcmConnector>) -> Arc<Self> {
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Arc::new(Self {
            connector,
            inner: Mutex::new(SessionInner {
                state: SessionState::Disconnected,
                link: None,
                watcher: None,
                generation: 0,
            }),
            events,
        })
    }

    /// Connect to `address`. A no-op while already connecting or
    /// connected. Emits `SessionEvent::Connected` exactly once per
    /// successful handshake.
    pub async fn connect(self: &Arc<Self>, address: &str) -> Result<(), SessionError> {
        {
            let mut inner = self.inner.lock().await;
            if inner.state != SessionState::Disconnected {
                return Ok(());
            }
            inner.state = SessionState::Connecting;
        }

        let link = match self.connector.connect(address).await {
            Ok(link) => link,
            Err(err) => {
                self.inner.lock().await.state = SessionState::Disconnected;
                warn!(address, "endpoint connection failed: {err}");
                return Err(SessionError::ConnectFailed {
                    address: address.to_string(),
                    reason: err.to_string(),
                });
            }
        };

        {
            let mut inner = self.inner.lock().await;
            if inner.state != SessionState::Connecting {
                // A disconnect raced the handshake; discard the link.
                drop(inner);
                link.close().await;
                return Ok(());
            }
            inner.generation += 1;
            inner.state = SessionState::Connected;
            inner.link = Some(Arc::clone(&link));
            inner.watcher = Some(self.spawn_link_watcher(inner.generation, link.subscribe_events()));
        }

        info!(address, "session connected");
        let _ = self.events.send(SessionEvent::Connected);
        Ok(())
    }

    /// Tear the session down on operator request. In-flight reads and
    /// writes fail or finish against the closed link; their results are
    /// discarded by the callers.
    pub async fn disconnect(&self) {
        let (link, watcher) = {
            let mut inner = self.inner.lock().await;
            if inner.state == SessionState::Disconnected {
                return;
            }
            inner.state = SessionState::Disconnected;
            (inner.link.take(), inner.watcher.take())
        };
        if let Some(watcher) = watcher {
            watcher.abort();
        }
        if let Some(link) = link {
            link.close().await;
        }
        info!("session disconnected on request");
        let _ = self.events.send(SessionEvent::Disconnected {
            cause: DisconnectCause::Requested,
        });
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == SessionState::Connected
    }

    /// The live link, only while connected.
    pub async fn link(&self) -> Option<Arc<dyn PcmLink>> {
        let inner = self.inner.lock().await;
        match inner.state {
            SessionState::Connected => inner.link.clone(),
            _ => None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn spawn_link_watcher(
        self: &Arc<Self>,
        generation: u64,
        mut events: broadcast::Receiver<LinkEvent>,
    ) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(LinkEvent::Closed(reason)) => {
                        session.handle_link_closed(generation, reason.into()).await;
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn handle_link_closed(&self, generation: u64, cause: DisconnectCause) {
        {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation || inner.state != SessionState::Connected {
                return;
            }
            inner.state = SessionState::Disconnected;
            inner.link = None;
            // The watcher reporting this close is the task running
            // here; dropping its handle is enough.
            inner.watcher = None;
        }
        warn!(?cause, "session lost");
        let _ = self.events.send(SessionEvent::Disconnected { cause });
    }
}
