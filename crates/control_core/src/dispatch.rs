use std::{sync::Arc, time::Duration};

use pcm_link::LinkError;
use shared::{
    domain::{CommandSignal, DoorCommand, DoorSide, TrackedVariable},
    error::CommandError,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::{
    projector::{project_variable, SceneProjector},
    session::ConnectionSession,
    store::VariableStore,
    video::{VideoEvent, VideoSurface},
    ControlEvent,
};

/// Upper bound on waiting for the drive clip to reach a playing state.
pub const VIDEO_READY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveStopReason {
    Requested,
    VideoEnded,
}

struct ActiveDrive {
    video_watcher: JoinHandle<()>,
}

/// Validates and issues single-variable writes, and runs the compound
/// drive start/stop operation.
///
/// Writes are validated against the catalog before any network call.
/// A failed write leaves the store untouched and emits a
/// [`ControlEvent::WriteRejected`] carrying the store's current value
/// so widgets can fall back to the last known-good state.
pub struct CommandDispatcher {
    session: Arc<ConnectionSession>,
    store: Arc<VariableStore>,
    video: Arc<dyn VideoSurface>,
    projector: Arc<dyn SceneProjector>,
    events: broadcast::Sender<ControlEvent>,
    drive: Mutex<Option<ActiveDrive>>,
}

impl CommandDispatcher {
    pub(crate) fn new(
        session: Arc<ConnectionSession>,
        store: Arc<VariableStore>,
        video: Arc<dyn VideoSurface>,
        projector: Arc<dyn SceneProjector>,
        events: broadcast::Sender<ControlEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            session,
            store,
            video,
            projector,
            events,
            drive: Mutex::new(None),
        })
    }

    /// Write any cataloged name, tracked variable or command signal.
    /// Unknown names fail without touching the network.
    pub async fn write_named(&self, name: &str, value: i64) -> Result<(), CommandError> {
        if let Some(variable) = TrackedVariable::from_wire_name(name) {
            self.write_tracked(variable, value).await
        } else if let Some(signal) = CommandSignal::from_wire_name(name) {
            self.write_signal(signal, value).await
        } else {
            Err(CommandError::UnknownVariable(name.to_string()))
        }
    }

    /// Read a tracked variable straight from the endpoint. A direct
    /// query: the store is left to the poll cycle. Command signals are
    /// write-only and unknown names fail without touching the network.
    pub async fn read_named(&self, name: &str) -> Result<i64, CommandError> {
        let Some(variable) = TrackedVariable::from_wire_name(name) else {
            return Err(CommandError::UnknownVariable(name.to_string()));
        };
        let link = self.session.link().await.ok_or(CommandError::NotConnected)?;
        link.read_variable(variable.wire_name())
            .await
            .map_err(map_link_error)
    }

    pub async fn set_door(&self, side: DoorSide, command: DoorCommand) -> Result<(), CommandError> {
        self.write_tracked(side.variable(), command.value()).await
    }

    pub async fn set_light_mode(&self, mode: i64) -> Result<(), CommandError> {
        self.write_tracked(TrackedVariable::LightMode, mode).await
    }

    pub async fn set_fan_level(&self, level: i64) -> Result<(), CommandError> {
        self.write_tracked(TrackedVariable::FanLevel, level).await
    }

    pub async fn is_driving(&self) -> bool {
        self.drive.lock().await.is_some()
    }

    async fn write_tracked(
        &self,
        variable: TrackedVariable,
        value: i64,
    ) -> Result<(), CommandError> {
        if !variable.accepts(value) {
            return Err(CommandError::OutOfDomain {
                variable: variable.wire_name(),
                value,
            });
        }
        let link = self.session.link().await.ok_or(CommandError::NotConnected)?;
        match link.write_variable(variable.wire_name(), value).await {
            Ok(()) => {
                self.store.record_write(variable, value).await;
                info!(variable = variable.wire_name(), value, "variable written");
                let _ = self
                    .events
                    .send(ControlEvent::VariableChanged { variable, value });
                project_variable(self.projector.as_ref(), variable, value);
                Ok(())
            }
            Err(err) => {
                let current = self.store.get(variable).await;
                let _ = self.events.send(ControlEvent::WriteRejected {
                    variable,
                    attempted: value,
                    current,
                });
                Err(map_link_error(err))
            }
        }
    }

    pub(crate) async fn write_signal(
        &self,
        signal: CommandSignal,
        value: i64,
    ) -> Result<(), CommandError> {
        if !signal.accepts(value) {
            return Err(CommandError::OutOfDomain {
                variable: signal.wire_name(),
                value,
            });
        }
        let link = self.session.link().await.ok_or(CommandError::NotConnected)?;
        link.write_variable(signal.wire_name(), value)
            .await
            .map_err(map_link_error)?;
        info!(signal = signal.wire_name(), value, "signal written");
        Ok(())
    }

    /// Start driving: bring up the clip (bounded wait, fatal on
    /// failure), then best-effort raise the drive signal. Video and
    /// remote state may diverge on partial failure; `DriveStarted`
    /// records whether the endpoint took the signal.
    pub async fn start_drive(self: &Arc<Self>) -> Result<(), CommandError> {
        if self.drive.lock().await.is_some() {
            return Ok(());
        }

        match tokio::time::timeout(VIDEO_READY_TIMEOUT, self.video.play_from_start()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(CommandError::ResourceUnavailable(err.to_string())),
            Err(_) => return Err(CommandError::Timeout("the drive clip to start playing")),
        }

        let signalled = self.signal_drive(1).await;
        let video_watcher = self.spawn_video_watcher();
        *self.drive.lock().await = Some(ActiveDrive { video_watcher });
        let _ = self.events.send(ControlEvent::DriveStarted { signalled });
        self.projector.drive_active(true);
        Ok(())
    }

    /// Stop driving: release the clip unconditionally, then best-effort
    /// lower the drive signal. A no-op while not driving.
    pub async fn stop_drive(&self) {
        let Some(active) = self.drive.lock().await.take() else {
            return;
        };
        active.video_watcher.abort();
        self.video.stop().await;
        self.signal_drive(0).await;
        let _ = self.events.send(ControlEvent::DriveStopped {
            reason: DriveStopReason::Requested,
        });
        self.projector.drive_active(false);
    }

    /// Best-effort drive signal; returns whether the endpoint took it.
    async fn signal_drive(&self, value: i64) -> bool {
        match self.session.link().await {
            Some(link) => match link
                .write_variable(CommandSignal::DriveActive.wire_name(), value)
                .await
            {
                Ok(()) => true,
                Err(err) => {
                    warn!(value, "drive signal write failed: {err}");
                    false
                }
            },
            None => {
                warn!(value, "endpoint not connected; drive runs on video only");
                false
            }
        }
    }

    fn spawn_video_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.video.subscribe_events();
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(VideoEvent::Ended) => {
                        dispatcher.finish_drive_after_video_end().await;
                        break;
                    }
                    Ok(VideoEvent::Error(message)) => {
                        warn!("video playback error while driving: {message}");
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    // Runs on the video watcher task itself, so it must not abort the
    // watcher handle it takes out of the drive slot.
    async fn finish_drive_after_video_end(&self) {
        if self.drive.lock().await.take().is_none() {
            return;
        }
        self.signal_drive(0).await;
        let _ = self.events.send(ControlEvent::DriveStopped {
            reason: DriveStopReason::VideoEnded,
        });
        self.projector.drive_active(false);
    }
}

fn map_link_error(err: LinkError) -> CommandError {
    match err {
        LinkError::Rejected(message) => CommandError::RemoteRejected(message),
        LinkError::Timeout => CommandError::Timeout("an endpoint reply"),
        LinkError::Transport(message) => CommandError::Transport(message),
        LinkError::ConnectionClosed => CommandError::Transport("link is closed".to_string()),
        LinkError::InvalidAddress(message) => CommandError::Transport(message),
    }
}
