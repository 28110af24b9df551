use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::domain::TrackedVariable;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, warn};

use crate::{
    projector::{project_variable, SceneProjector},
    session::{ConnectionSession, SessionEvent},
    store::{PollApply, VariableStore},
    ControlEvent,
};

/// Fixed cadence at which tracked variables are re-read while connected.
pub const POLL_PERIOD: Duration = Duration::from_millis(2000);

/// Keeps the store eventually consistent with the endpoint.
///
/// A cancellable poll task runs while the session is connected, one
/// cycle per period plus an immediate cycle on start. Every cycle
/// carries a sequence number from a counter that is monotonic across
/// reconnects, which lets the store drop results from cycles that
/// finish out of order.
pub struct VariableSync {
    session: Arc<ConnectionSession>,
    store: Arc<VariableStore>,
    projector: Arc<dyn SceneProjector>,
    events: broadcast::Sender<ControlEvent>,
    cycle: AtomicU64,
    period: Duration,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl VariableSync {
    pub(crate) fn new(
        session: Arc<ConnectionSession>,
        store: Arc<VariableStore>,
        projector: Arc<dyn SceneProjector>,
        events: broadcast::Sender<ControlEvent>,
        period: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            session,
            store,
            projector,
            events,
            cycle: AtomicU64::new(0),
            period,
            poll_task: Mutex::new(None),
        })
    }

    /// Run one cycle now: read every tracked variable independently and
    /// offer the results to the store. One failed read never aborts the
    /// rest; results arriving after a disconnect are discarded.
    pub async fn poll_once(&self) {
        let Some(link) = self.session.link().await else {
            return;
        };
        let cycle = self.cycle.fetch_add(1, Ordering::Relaxed) + 1;

        for variable in TrackedVariable::ALL {
            match link.read_variable(variable.wire_name()).await {
                Ok(value) => {
                    if !self.session.is_connected().await {
                        debug!(cycle, "discarding poll results after disconnect");
                        return;
                    }
                    if !variable.accepts(value) {
                        warn!(
                            variable = variable.wire_name(),
                            value, "endpoint reported a value outside the documented domain"
                        );
                    }
                    if let PollApply::Applied { changed: true } =
                        self.store.apply_read(variable, value, cycle).await
                    {
                        let _ = self.events.send(ControlEvent::VariableChanged { variable, value });
                        project_variable(self.projector.as_ref(), variable, value);
                    }
                }
                Err(err) => {
                    warn!(
                        variable = variable.wire_name(),
                        cycle, "poll read failed: {err}"
                    );
                }
            }
        }
    }

    pub(crate) async fn start(self: &Arc<Self>) {
        let mut poll_task = self.poll_task.lock().await;
        if let Some(previous) = poll_task.take() {
            previous.abort();
        }
        let sync = Arc::clone(self);
        *poll_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sync.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                sync.poll_once().await;
            }
        }));
    }

    pub(crate) async fn stop(&self) {
        if let Some(task) = self.poll_task.lock().await.take() {
            task.abort();
        }
    }

    /// Start and stop the poll as the session comes and goes.
    pub(crate) fn spawn_session_supervisor(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<SessionEvent>,
    ) -> JoinHandle<()> {
        let sync = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Connected) => sync.start().await,
                    Ok(SessionEvent::Disconnected { .. }) => sync.stop().await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
