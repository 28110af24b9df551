use std::{sync::Arc, time::Duration};

use pcm_link::PcmConnector;
use shared::{
    domain::{CommandSignal, DoorCommand, DoorSide, TrackedVariable},
    error::CommandError,
};
use tokio::{sync::broadcast, task::JoinHandle};

pub mod dispatch;
pub mod projector;
pub mod session;
pub mod store;
pub mod sync;
pub mod video;

pub use dispatch::{CommandDispatcher, DriveStopReason, VIDEO_READY_TIMEOUT};
pub use projector::{NullSceneProjector, SceneProjector};
pub use session::{
    ConnectionSession, DisconnectCause, SessionError, SessionEvent, SessionState,
};
pub use store::{PollApply, VariableStore};
pub use sync::{VariableSync, POLL_PERIOD};
pub use video::{MissingVideoSurface, VideoEvent, VideoSurface};

const CONTROL_EVENT_CAPACITY: usize = 1024;

/// Everything a front-end needs to render: session transitions,
/// confirmed variable values, write rejections with the value to fall
/// back to, and drive state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    SessionConnected,
    SessionDisconnected {
        cause: DisconnectCause,
    },
    VariableChanged {
        variable: TrackedVariable,
        value: i64,
    },
    WriteRejected {
        variable: TrackedVariable,
        attempted: i64,
        current: i64,
    },
    DriveStarted {
        /// Whether the endpoint took the drive signal; false means the
        /// clip runs without the remote mirroring it.
        signalled: bool,
    },
    DriveStopped {
        reason: DriveStopReason,
    },
}

/// Owns the session, the store, the poller and the dispatcher, and fans
/// their notifications into one event stream for the front-end.
pub struct ControlClient {
    session: Arc<ConnectionSession>,
    store: Arc<VariableStore>,
    sync: Arc<VariableSync>,
    dispatcher: Arc<CommandDispatcher>,
    events: broadcast::Sender<ControlEvent>,
}

impl ControlClient {
    pub fn new(connector: Arc<dyn PcmConnector>) -> Arc<Self> {
        Self::new_with_dependencies(
            connector,
            Arc::new(MissingVideoSurface::new()),
            Arc::new(NullSceneProjector),
        )
    }

    pub fn new_with_dependencies(
        connector: Arc<dyn PcmConnector>,
        video: Arc<dyn VideoSurface>,
        projector: Arc<dyn SceneProjector>,
    ) -> Arc<Self> {
        Self::with_poll_period(connector, video, projector, POLL_PERIOD)
    }

    pub fn with_poll_period(
        connector: Arc<dyn PcmConnector>,
        video: Arc<dyn VideoSurface>,
        projector: Arc<dyn SceneProjector>,
        poll_period: Duration,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(CONTROL_EVENT_CAPACITY);
        let session = ConnectionSession::new(connector);
        let store = Arc::new(VariableStore::new());
        let sync = VariableSync::new(
            Arc::clone(&session),
            Arc::clone(&store),
            Arc::clone(&projector),
            events.clone(),
            poll_period,
        );
        let dispatcher = CommandDispatcher::new(
            Arc::clone(&session),
            Arc::clone(&store),
            video,
            projector,
            events.clone(),
        );

        let _supervisor = sync.spawn_session_supervisor(session.subscribe());
        let _forwarder = Self::spawn_session_forwarder(session.subscribe(), events.clone());

        Arc::new(Self {
            session,
            store,
            sync,
            dispatcher,
            events,
        })
    }

    pub async fn connect(&self, address: &str) -> Result<(), SessionError> {
        self.session.connect(address).await
    }

    pub async fn disconnect(&self) {
        self.session.disconnect().await
    }

    pub async fn session_state(&self) -> SessionState {
        self.session.state().await
    }

    pub async fn is_connected(&self) -> bool {
        self.session.is_connected().await
    }

    pub async fn is_driving(&self) -> bool {
        self.dispatcher.is_driving().await
    }

    pub async fn set_door(&self, side: DoorSide, command: DoorCommand) -> Result<(), CommandError> {
        self.dispatcher.set_door(side, command).await
    }

    pub async fn set_light_mode(&self, mode: i64) -> Result<(), CommandError> {
        self.dispatcher.set_light_mode(mode).await
    }

    pub async fn set_fan_level(&self, level: i64) -> Result<(), CommandError> {
        self.dispatcher.set_fan_level(level).await
    }

    pub async fn write_named(&self, name: &str, value: i64) -> Result<(), CommandError> {
        self.dispatcher.write_named(name, value).await
    }

    pub async fn read_named(&self, name: &str) -> Result<i64, CommandError> {
        self.dispatcher.read_named(name).await
    }

    pub async fn start_drive(&self) -> Result<(), CommandError> {
        self.dispatcher.start_drive().await
    }

    pub async fn stop_drive(&self) {
        self.dispatcher.stop_drive().await
    }

    /// Kick the rig's data refresh, then read everything back at once.
    pub async fn refresh_data(&self) -> Result<(), CommandError> {
        self.dispatcher
            .write_signal(CommandSignal::DataRefresh, 1)
            .await?;
        self.sync.poll_once().await;
        Ok(())
    }

    pub async fn variable(&self, variable: TrackedVariable) -> i64 {
        self.store.get(variable).await
    }

    pub async fn snapshot(&self) -> Vec<(TrackedVariable, i64)> {
        self.store.snapshot().await
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControlEvent> {
        self.events.subscribe()
    }

    fn spawn_session_forwarder(
        mut session_events: broadcast::Receiver<SessionEvent>,
        events: broadcast::Sender<ControlEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match session_events.recv().await {
                    Ok(SessionEvent::Connected) => {
                        let _ = events.send(ControlEvent::SessionConnected);
                    }
                    Ok(SessionEvent::Disconnected { cause }) => {
                        let _ = events.send(ControlEvent::SessionDisconnected { cause });
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
