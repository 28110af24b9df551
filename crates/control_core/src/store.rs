use std::collections::HashMap;

use shared::domain::TrackedVariable;
use tokio::sync::Mutex;

/// Outcome of offering a polled value to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollApply {
    Applied { changed: bool },
    /// A newer cycle already wrote this variable; the value was dropped.
    Stale,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    value: i64,
    last_cycle: u64,
}

/// Last-known values of the tracked variables.
///
/// Values are only as trustworthy as their source: confirmed writes go
/// through [`record_write`](Self::record_write), authoritative polled
/// reads through [`apply_read`](Self::apply_read), which refuses values
/// from cycles older than the last one applied per variable.
pub struct VariableStore {
    inner: Mutex<HashMap<TrackedVariable, Slot>>,
}

impl VariableStore {
    pub fn new() -> Self {
        let inner = TrackedVariable::ALL
            .into_iter()
            .map(|variable| {
                (
                    variable,
                    Slot {
                        value: 0,
                        last_cycle: 0,
                    },
                )
            })
            .collect();
        Self {
            inner: Mutex::new(inner),
        }
    }

    pub async fn get(&self, variable: TrackedVariable) -> i64 {
        self.inner
            .lock()
            .await
            .get(&variable)
            .map(|slot| slot.value)
            .unwrap_or(0)
    }

    /// All tracked variables in catalog order.
    pub async fn snapshot(&self) -> Vec<(TrackedVariable, i64)> {
        let guard = self.inner.lock().await;
        TrackedVariable::ALL
            .into_iter()
            .map(|variable| {
                (
                    variable,
                    guard.get(&variable).map(|slot| slot.value).unwrap_or(0),
                )
            })
            .collect()
    }

    /// Record a write the endpoint acknowledged. Returns whether the
    /// stored value changed.
    pub async fn record_write(&self, variable: TrackedVariable, value: i64) -> bool {
        let mut guard = self.inner.lock().await;
        let slot = guard.entry(variable).or_insert(Slot {
            value: 0,
            last_cycle: 0,
        });
        let changed = slot.value != value;
        slot.value = value;
        changed
    }

    /// Offer a polled value read during `cycle`. Applied only when the
    /// cycle is at least as new as the last one applied for this
    /// variable, so a slow cycle can never overwrite a newer value.
    pub async fn apply_read(
        &self,
        variable: TrackedVariable,
        value: i64,
        cycle: u64,
    ) -> PollApply {
        let mut guard = self.inner.lock().await;
        let slot = guard.entry(variable).or_insert(Slot {
            value: 0,
            last_cycle: 0,
        });
        if cycle < slot.last_cycle {
            return PollApply::Stale;
        }
        slot.last_cycle = cycle;
        let changed = slot.value != value;
        slot.value = value;
        PollApply::Applied { changed }
    }
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn all_tracked_variables_start_at_zero() {
        let store = VariableStore::new();
        for (_, value) in store.snapshot().await {
            assert_eq!(value, 0);
        }
    }

    #[tokio::test]
    async fn record_write_reports_change() {
        let store = VariableStore::new();
        assert!(store.record_write(TrackedVariable::FanLevel, 2).await);
        assert!(!store.record_write(TrackedVariable::FanLevel, 2).await);
        assert_eq!(store.get(TrackedVariable::FanLevel).await, 2);
    }

    #[tokio::test]
    async fn stale_cycle_never_overwrites_a_newer_value() {
        let store = VariableStore::new();
        assert_eq!(
            store.apply_read(TrackedVariable::LightMode, 3, 7).await,
            PollApply::Applied { changed: true }
        );
        // Cycle 6 finished late; its value must be dropped.
        assert_eq!(
            store.apply_read(TrackedVariable::LightMode, 1, 6).await,
            PollApply::Stale
        );
        assert_eq!(store.get(TrackedVariable::LightMode).await, 3);
    }

    #[tokio::test]
    async fn equal_cycle_is_still_applied() {
        let store = VariableStore::new();
        store.apply_read(TrackedVariable::LeftDoor, 1, 4).await;
        assert_eq!(
            store.apply_read(TrackedVariable::LeftDoor, 2, 4).await,
            PollApply::Applied { changed: true }
        );
        assert_eq!(store.get(TrackedVariable::LeftDoor).await, 2);
    }

    #[tokio::test]
    async fn unchanged_poll_value_is_reported_as_such() {
        let store = VariableStore::new();
        assert_eq!(
            store.apply_read(TrackedVariable::RightDoor, 0, 1).await,
            PollApply::Applied { changed: false }
        );
    }
}
