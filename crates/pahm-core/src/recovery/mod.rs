//! Lifecycle / recovery monitor.
//!
//! Watches foreground/background transitions of a running session and keeps
//! an advisory snapshot in durable storage. The timer is never paused on
//! backgrounding: its epoch math stays correct, so returning to the
//! foreground only ever needs a tally reconciliation.
//!
//! ## States
//!
//! ```text
//! Idle -> Running -> Backgrounded -> Foregrounded -> PromptPending -> Running
//!                                                 \-> Running
//! any -> Ended
//! ```
//!
//! Storage I/O never fails session control flow: errors are logged and the
//! operation reports `false`/`None`.

mod record;
mod store;

pub use record::{RecoveryRecord, RecoverySnapshot, RECOVERY_KEY};
pub use store::{MemoryStore, RecoveryStore, SqliteStore};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::tally::AttentionTally;

/// Default staleness threshold before a returning user is asked.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    Running,
    Backgrounded,
    Foregrounded,
    PromptPending,
    Ended,
}

/// Outcome of a resolved recovery prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryDecision {
    Resumed,
    Discarded,
}

/// What the user is shown when asked to resume or discard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryPrompt {
    pub stage_label: String,
    pub initial_minutes: u32,
    pub remaining_minutes: u64,
    pub remaining_seconds: u64,
    pub elapsed_seconds: u64,
    pub tally: AttentionTally,
    pub captured_at_epoch_ms: u64,
    /// Seconds between capture and the check that raised the prompt.
    pub age_seconds: u64,
}

impl RecoveryPrompt {
    fn new(snapshot: &RecoverySnapshot, now_ms: u64) -> Self {
        Self {
            stage_label: snapshot.session_config.stage_label().to_string(),
            initial_minutes: snapshot.session_config.duration_minutes(),
            remaining_minutes: snapshot.timer_snapshot.minutes,
            remaining_seconds: snapshot.timer_snapshot.seconds,
            elapsed_seconds: snapshot.timer_snapshot.elapsed_seconds,
            tally: snapshot.tally,
            captured_at_epoch_ms: snapshot.captured_at_epoch_ms,
            age_seconds: now_ms.saturating_sub(snapshot.captured_at_epoch_ms) / 1000,
        }
    }
}

pub struct RecoveryMonitor {
    store: Box<dyn RecoveryStore>,
    clock: Arc<dyn Clock>,
    key: String,
    stale_after: Duration,
    state: LifecycleState,
    /// State to return to once the app is foregrounded again.
    resume_to: LifecycleState,
    pending: Option<RecoverySnapshot>,
}

impl RecoveryMonitor {
    pub fn new(store: Box<dyn RecoveryStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            key: RECOVERY_KEY.to_string(),
            stale_after: DEFAULT_STALE_AFTER,
            state: LifecycleState::Idle,
            resume_to: LifecycleState::Idle,
            pending: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn pending_prompt(&self) -> Option<RecoveryPrompt> {
        self.pending
            .as_ref()
            .map(|snap| RecoveryPrompt::new(snap, self.clock.now_ms()))
    }

    // ── Session lifecycle ────────────────────────────────────────────

    pub fn session_started(&mut self) {
        self.transition(LifecycleState::Running);
    }

    /// Session reached a terminal phase: the record is no longer needed.
    pub fn session_ended(&mut self) {
        self.pending = None;
        self.remove_record();
        self.transition(LifecycleState::Ended);
    }

    // ── Visibility ───────────────────────────────────────────────────

    /// The app lost the foreground. `snapshot` is `Some` only while the
    /// timer is running. Returns whether a record was written.
    pub fn on_hidden(&mut self, snapshot: Option<&RecoverySnapshot>) -> bool {
        if matches!(
            self.state,
            LifecycleState::Backgrounded | LifecycleState::Ended
        ) {
            return false;
        }
        self.resume_to = match self.state {
            LifecycleState::Foregrounded => LifecycleState::Running,
            LifecycleState::PromptPending => self.resume_to,
            other => other,
        };
        self.transition(LifecycleState::Backgrounded);
        match snapshot {
            Some(snap) => self.write_record(snap),
            None => false,
        }
    }

    /// The app regained the foreground. Reads the record once; a record older
    /// than the staleness threshold raises a prompt, a fresher one is dropped.
    pub fn on_visible(&mut self) -> Option<RecoveryPrompt> {
        if self.state != LifecycleState::Backgrounded {
            return None;
        }
        self.transition(LifecycleState::Foregrounded);
        let now = self.clock.now_ms();
        let prompt = match self.read_record() {
            Some(snapshot) => {
                let age = now.saturating_sub(snapshot.captured_at_epoch_ms);
                // An undecided prompt stays up whatever the new record's age.
                if age > self.stale_after.as_millis() as u64 || self.pending.is_some() {
                    let prompt = RecoveryPrompt::new(&snapshot, now);
                    self.pending = Some(snapshot);
                    Some(prompt)
                } else {
                    tracing::debug!(age_ms = age, "recovery record fresh, dropping");
                    self.remove_record();
                    None
                }
            }
            None => None,
        };
        if prompt.is_some() {
            self.transition(LifecycleState::PromptPending);
        } else {
            self.transition(self.resume_to);
        }
        prompt
    }

    /// Best-effort synchronous write while the app is closing.
    pub fn on_unload(&mut self, snapshot: Option<&RecoverySnapshot>) -> bool {
        if self.state == LifecycleState::Ended {
            return false;
        }
        match snapshot {
            Some(snap) => self.write_record(snap),
            None => false,
        }
    }

    /// Look for a record left behind by a previous process. Any record found
    /// is offered, regardless of age, since nothing else holds its tally.
    pub fn check_on_load(&mut self) -> Option<RecoveryPrompt> {
        if self.pending.is_some() || self.state == LifecycleState::Ended {
            return self.pending_prompt();
        }
        let snapshot = self.read_record()?;
        let prompt = RecoveryPrompt::new(&snapshot, self.clock.now_ms());
        self.pending = Some(snapshot);
        self.resume_to = self.state;
        self.transition(LifecycleState::PromptPending);
        Some(prompt)
    }

    // ── Decision ─────────────────────────────────────────────────────

    /// Accept the pending prompt. Returns the recovered tally for merging.
    pub fn accept(&mut self) -> Option<AttentionTally> {
        let snapshot = self.pending.take()?;
        self.remove_record();
        tracing::info!(decision = ?RecoveryDecision::Resumed, "recovery resolved");
        self.transition(self.resume_to);
        Some(snapshot.tally)
    }

    /// Decline the pending prompt. Returns whether a prompt was pending.
    pub fn decline(&mut self) -> bool {
        if self.pending.take().is_none() {
            return false;
        }
        self.remove_record();
        tracing::info!(decision = ?RecoveryDecision::Discarded, "recovery resolved");
        self.transition(self.resume_to);
        true
    }

    // ── Storage ──────────────────────────────────────────────────────

    fn write_record(&mut self, snapshot: &RecoverySnapshot) -> bool {
        let result = snapshot
            .to_json()
            .and_then(|json| self.store.write(&self.key, &json));
        match result {
            Ok(()) => {
                tracing::debug!(
                    elapsed_seconds = snapshot.timer_snapshot.elapsed_seconds,
                    "recovery snapshot written"
                );
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "recovery snapshot write failed");
                false
            }
        }
    }

    fn read_record(&mut self) -> Option<RecoverySnapshot> {
        let json = match self.store.read(&self.key) {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(error = %err, "recovery snapshot read failed");
                return None;
            }
        };
        match RecoverySnapshot::from_json(&json) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable recovery record");
                self.remove_record();
                None
            }
        }
    }

    fn remove_record(&mut self) {
        if let Err(err) = self.store.remove(&self.key) {
            tracing::warn!(error = %err, "recovery record removal failed");
        }
    }

    fn transition(&mut self, next: LifecycleState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "lifecycle transition");
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::StorageError;
    use crate::timer::{SessionConfiguration, TimerSnapshot};

    const T0: u64 = 1_700_000_000_000;

    fn snapshot_at(ms: u64) -> RecoverySnapshot {
        RecoverySnapshot {
            timer_snapshot: TimerSnapshot {
                minutes: 28,
                seconds: 0,
                elapsed_seconds: 120,
            },
            tally: AttentionTally {
                present: 3,
                likes: 1,
                ..Default::default()
            },
            captured_at_epoch_ms: ms,
            session_config: SessionConfiguration::new(30, "Stage 1", "seated").unwrap(),
        }
    }

    fn monitor() -> (ManualClock, MemoryStore, RecoveryMonitor) {
        let clock = ManualClock::new(T0);
        let store = MemoryStore::new();
        let monitor = RecoveryMonitor::new(Box::new(store.clone()), Arc::new(clock.clone()));
        (clock, store, monitor)
    }

    struct BrokenStore;

    impl RecoveryStore for BrokenStore {
        fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Locked)
        }
        fn write(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::WriteRejected("quota exceeded".into()))
        }
        fn remove(&mut self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Locked)
        }
    }

    #[test]
    fn hidden_while_running_writes_record() {
        let (_clock, store, mut monitor) = monitor();
        monitor.session_started();
        assert!(monitor.on_hidden(Some(&snapshot_at(T0))));
        assert_eq!(monitor.state(), LifecycleState::Backgrounded);
        assert!(store.contains(RECOVERY_KEY));
    }

    #[test]
    fn hidden_without_snapshot_writes_nothing() {
        let (_clock, store, mut monitor) = monitor();
        monitor.session_started();
        assert!(!monitor.on_hidden(None));
        assert!(!store.contains(RECOVERY_KEY));
    }

    #[test]
    fn stale_record_raises_prompt() {
        let (clock, store, mut monitor) = monitor();
        monitor.session_started();
        monitor.on_hidden(Some(&snapshot_at(T0)));
        clock.advance(Duration::from_secs(45));
        let prompt = monitor.on_visible().expect("prompt");
        assert_eq!(prompt.age_seconds, 45);
        assert_eq!(prompt.tally.present, 3);
        assert_eq!(monitor.state(), LifecycleState::PromptPending);
        assert!(store.contains(RECOVERY_KEY));
    }

    #[test]
    fn fresh_record_is_dropped_silently() {
        let (clock, store, mut monitor) = monitor();
        monitor.session_started();
        monitor.on_hidden(Some(&snapshot_at(T0)));
        clock.advance(Duration::from_secs(30));
        assert!(monitor.on_visible().is_none());
        assert_eq!(monitor.state(), LifecycleState::Running);
        assert!(!store.contains(RECOVERY_KEY));
    }

    #[test]
    fn threshold_is_configurable() {
        let (clock, _store, monitor) = monitor();
        let mut monitor = monitor.with_stale_after(Duration::from_secs(5));
        monitor.session_started();
        monitor.on_hidden(Some(&snapshot_at(T0)));
        clock.advance(Duration::from_secs(6));
        assert!(monitor.on_visible().is_some());
    }

    #[test]
    fn accept_returns_tally_and_clears_record() {
        let (clock, store, mut monitor) = monitor();
        monitor.session_started();
        monitor.on_hidden(Some(&snapshot_at(T0)));
        clock.advance(Duration::from_secs(60));
        monitor.on_visible();
        let tally = monitor.accept().expect("tally");
        assert_eq!(tally.likes, 1);
        assert_eq!(monitor.state(), LifecycleState::Running);
        assert!(!store.contains(RECOVERY_KEY));
        assert!(monitor.accept().is_none());
    }

    #[test]
    fn decline_clears_record() {
        let (clock, store, mut monitor) = monitor();
        monitor.session_started();
        monitor.on_hidden(Some(&snapshot_at(T0)));
        clock.advance(Duration::from_secs(60));
        monitor.on_visible();
        assert!(monitor.decline());
        assert!(!monitor.decline());
        assert!(!store.contains(RECOVERY_KEY));
        assert_eq!(monitor.state(), LifecycleState::Running);
    }

    #[test]
    fn visible_without_hidden_is_ignored() {
        let (_clock, _store, mut monitor) = monitor();
        monitor.session_started();
        assert!(monitor.on_visible().is_none());
        assert_eq!(monitor.state(), LifecycleState::Running);
    }

    #[test]
    fn check_on_load_offers_any_record() {
        let (_clock, mut store, mut monitor) = monitor();
        store
            .write(RECOVERY_KEY, &snapshot_at(T0).to_json().unwrap())
            .unwrap();
        let prompt = monitor.check_on_load().expect("prompt");
        assert_eq!(prompt.age_seconds, 0);
        assert_eq!(monitor.state(), LifecycleState::PromptPending);
        assert!(monitor.decline());
        assert_eq!(monitor.state(), LifecycleState::Idle);
    }

    #[test]
    fn corrupt_record_is_removed() {
        let (_clock, mut store, mut monitor) = monitor();
        store.write(RECOVERY_KEY, "{oops").unwrap();
        assert!(monitor.check_on_load().is_none());
        assert!(!store.contains(RECOVERY_KEY));
    }

    #[test]
    fn session_end_clears_record() {
        let (_clock, store, mut monitor) = monitor();
        monitor.session_started();
        monitor.on_unload(Some(&snapshot_at(T0)));
        assert!(store.contains(RECOVERY_KEY));
        monitor.session_ended();
        assert!(!store.contains(RECOVERY_KEY));
        assert!(!monitor.on_hidden(Some(&snapshot_at(T0))));
        assert!(!monitor.on_unload(Some(&snapshot_at(T0))));
    }

    #[test]
    fn storage_failures_never_surface() {
        let clock = ManualClock::new(T0);
        let mut monitor = RecoveryMonitor::new(Box::new(BrokenStore), Arc::new(clock.clone()));
        monitor.session_started();
        assert!(!monitor.on_hidden(Some(&snapshot_at(T0))));
        clock.advance(Duration::from_secs(60));
        assert!(monitor.on_visible().is_none());
        assert_eq!(monitor.state(), LifecycleState::Running);
        assert!(monitor.check_on_load().is_none());
        monitor.session_ended();
        assert_eq!(monitor.state(), LifecycleState::Ended);
    }
}
