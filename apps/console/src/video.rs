use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use control_core::{VideoEvent, VideoSurface};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::info;

/// Simulated drive clip: "plays" for a fixed duration, then reports
/// the ended signal the way the page's video element would.
pub struct TimedClip {
    duration: Duration,
    ready_delay: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<VideoEvent>,
}

impl TimedClip {
    pub fn new(duration: Duration) -> Arc<Self> {
        Self::with_ready_delay(duration, Duration::ZERO)
    }

    /// A clip that takes `ready_delay` to buffer before it plays, for
    /// exercising the caller's bounded wait.
    pub fn with_ready_delay(duration: Duration, ready_delay: Duration) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            duration,
            ready_delay,
            timer: Mutex::new(None),
            events,
        })
    }
}

#[async_trait]
impl VideoSurface for TimedClip {
    async fn play_from_start(&self) -> anyhow::Result<()> {
        if !self.ready_delay.is_zero() {
            tokio::time::sleep(self.ready_delay).await;
        }
        let mut timer = self.timer.lock().await;
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        let events = self.events.clone();
        let duration = self.duration;
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = events.send(VideoEvent::Ended);
        }));
        info!(seconds = self.duration.as_secs(), "drive clip playing");
        Ok(())
    }

    async fn stop(&self) {
        if let Some(timer) = self.timer.lock().await.take() {
            timer.abort();
        }
        info!("drive clip stopped");
    }

    fn subscribe_events(&self) -> broadcast::Receiver<VideoEvent> {
        self.events.subscribe()
    }
}
