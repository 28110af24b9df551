use async_trait::async_trait;
use tokio::sync::broadcast;

/// Notifications from the drive clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoEvent {
    Ended,
    Error(String),
}

/// The looping demo clip shown while the vehicle drives.
#[async_trait]
pub trait VideoSurface: Send + Sync {
    /// Rewind and start playback; resolves once the clip is actually
    /// playing. Callers bound the wait.
    async fn play_from_start(&self) -> anyhow::Result<()>;
    /// Pause and rewind.
    async fn stop(&self);
    fn subscribe_events(&self) -> broadcast::Receiver<VideoEvent>;
}

/// Stand-in used when no video surface is attached.
pub struct MissingVideoSurface {
    events: broadcast::Sender<VideoEvent>,
}

impl MissingVideoSurface {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(4);
        Self { events }
    }
}

impl Default for MissingVideoSurface {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VideoSurface for MissingVideoSurface {
    async fn play_from_start(&self) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("no video surface attached"))
    }

    async fn stop(&self) {}

    fn subscribe_events(&self) -> broadcast::Receiver<VideoEvent> {
        self.events.subscribe()
    }
}
