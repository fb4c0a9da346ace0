//! Practice session: the single owner of every per-session component.
//!
//! ```text
//! Setup -> Running <-> Paused -> Completed | Interrupted
//! ```
//!
//! Both terminal transitions stop the timer, release the wake lock, clear
//! the recovery record and hand the final tally to analytics, exactly once.
//! Dropping the session releases every platform resource on any exit path.

mod report;

pub use report::{AnalyticsSink, CollectingAnalytics, NoopAnalytics, SessionReport};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::{
    completion_sound_length, AudioManager, AudioPermission, AudioPort, UserGesture,
};
use crate::clock::{Clock, Scheduler};
use crate::events::{at_ms, Event};
use crate::recovery::{
    LifecycleState, RecoveryMonitor, RecoverySnapshot, RecoveryStore, DEFAULT_STALE_AFTER,
    RECOVERY_KEY,
};
use crate::tally::{AttentionKey, AttentionTally, AttentionTallyAggregator};
use crate::timer::{RobustTimer, SessionConfiguration, TimerPhase, DEFAULT_TICK_INTERVAL};
use crate::wake_lock::{WakeLockManager, WakeLockPort};

/// Order in which start acquires the peripheral resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartSequence {
    #[default]
    WakeLockFirst,
    AudioFirst,
}

/// Foreground state reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Hidden,
    Visible,
}

/// Tunables for one session, usually derived from [`crate::Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub tick_interval: Duration,
    pub stale_after: Duration,
    pub recovery_key: String,
    pub audio_enabled: bool,
    pub tap_volume: f32,
    pub completion_chime: bool,
    pub wake_lock_enabled: bool,
    pub start_sequence: StartSequence,
    /// Present-moment percentage reported for a session with no taps.
    pub empty_present_percentage: u8,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            stale_after: DEFAULT_STALE_AFTER,
            recovery_key: RECOVERY_KEY.to_string(),
            audio_enabled: true,
            tap_volume: 0.3,
            completion_chime: true,
            wake_lock_enabled: true,
            start_sequence: StartSequence::WakeLockFirst,
            empty_present_percentage: 0,
        }
    }
}

/// Platform ports injected into a session.
pub struct SessionPorts {
    pub clock: Arc<dyn Clock>,
    pub scheduler: Box<dyn Scheduler>,
    pub wake_lock: Box<dyn WakeLockPort>,
    pub audio: Box<dyn AudioPort>,
    pub store: Box<dyn RecoveryStore>,
    pub analytics: Box<dyn AnalyticsSink>,
}

pub struct PracticeSession {
    clock: Arc<dyn Clock>,
    config: SessionConfiguration,
    options: SessionOptions,
    timer: RobustTimer,
    wake_lock: WakeLockManager,
    audio: AudioManager,
    tally: AttentionTallyAggregator,
    monitor: RecoveryMonitor,
    analytics: Box<dyn AnalyticsSink>,
    outbox: Vec<Event>,
    /// Playback still queued on the output device after the session ended.
    audio_tail: Duration,
    visible: bool,
    reported: bool,
    torn_down: bool,
}

impl PracticeSession {
    pub fn new(config: SessionConfiguration, ports: SessionPorts, options: SessionOptions) -> Self {
        let timer = RobustTimer::new(ports.clock.clone(), ports.scheduler)
            .with_tick_interval(options.tick_interval);
        let monitor = RecoveryMonitor::new(ports.store, ports.clock.clone())
            .with_key(options.recovery_key.clone())
            .with_stale_after(options.stale_after);
        Self {
            clock: ports.clock,
            config,
            timer,
            wake_lock: WakeLockManager::new(ports.wake_lock),
            audio: AudioManager::new(ports.audio).with_enabled(options.audio_enabled),
            tally: AttentionTallyAggregator::new(),
            monitor,
            analytics: ports.analytics,
            options,
            outbox: Vec::new(),
            audio_tail: Duration::ZERO,
            visible: true,
            reported: false,
            torn_down: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> TimerPhase {
        self.timer.phase()
    }

    pub fn config(&self) -> &SessionConfiguration {
        &self.config
    }

    pub fn tally(&self) -> &AttentionTally {
        self.tally.tally()
    }

    pub fn aggregator(&self) -> &AttentionTallyAggregator {
        &self.tally
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.timer.elapsed_seconds()
    }

    /// Remaining time as `(minutes, seconds)`.
    pub fn remaining(&self) -> (u64, u64) {
        self.timer.remaining()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timer.next_deadline()
    }

    pub fn wake_lock_active(&self) -> bool {
        self.wake_lock.is_active()
    }

    pub fn audio_permission(&self) -> AudioPermission {
        self.audio.permission()
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.monitor.state()
    }

    pub fn is_finished(&self) -> bool {
        self.reported
    }

    /// How long the audio output must stay open for queued cues to finish.
    /// Non-zero only after the completion chime was queued.
    pub fn audio_tail(&self) -> Duration {
        self.audio_tail
    }

    /// Take every event produced since the last call.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbox)
    }

    // ── Input contract ───────────────────────────────────────────────

    /// Start the countdown, then the wake lock and audio in the configured
    /// order. Must be called from the user's start action.
    pub fn start(&mut self, gesture: &UserGesture) {
        let events = self.timer.start(self.config.clone());
        if events.is_empty() {
            return;
        }
        self.outbox.push(Event::SessionStarted {
            duration_minutes: self.config.duration_minutes(),
            stage_label: self.config.stage_label().to_string(),
            posture: self.config.posture().to_string(),
            at: at_ms(self.clock.now_ms()),
        });
        self.outbox.extend(events);
        self.monitor.session_started();
        match self.options.start_sequence {
            StartSequence::WakeLockFirst => {
                self.acquire_wake_lock();
                self.request_audio(gesture);
            }
            StartSequence::AudioFirst => {
                self.request_audio(gesture);
                self.acquire_wake_lock();
            }
        }
    }

    pub fn pause(&mut self) {
        let events = self.timer.pause();
        if events.is_empty() {
            return;
        }
        self.outbox.extend(events);
        self.release_wake_lock();
    }

    pub fn resume(&mut self) {
        let events = self.timer.resume();
        if events.is_empty() {
            return;
        }
        self.absorb_timer_events(events);
        if self.visible && self.phase() == TimerPhase::Running {
            self.acquire_wake_lock();
        }
    }

    /// End the session before the countdown runs out.
    pub fn complete_early(&mut self) {
        let events = self.timer.stop();
        if events.is_empty() {
            return;
        }
        self.outbox.extend(events);
        self.finish();
    }

    /// Record the attention-matrix UI's cumulative count for `key`. Taps are
    /// accepted while running or paused. Returns whether the tally changed.
    pub fn on_attention_tap(&mut self, key: AttentionKey, cumulative_count: u32) -> bool {
        if !matches!(self.phase(), TimerPhase::Running | TimerPhase::Paused) {
            return false;
        }
        let changed = self.tally.record(key, cumulative_count);
        if changed {
            self.audio.play_tap_sound(self.options.tap_volume);
        }
        changed
    }

    /// Call whenever the driver wakes (at least by [`next_deadline`]).
    ///
    /// [`next_deadline`]: Self::next_deadline
    pub fn poll(&mut self) {
        if self.wake_lock.refresh() {
            self.push_wake_lock_event(false);
        }
        let events = self.timer.poll();
        self.absorb_timer_events(events);
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    pub fn on_visibility(&mut self, visibility: Visibility) {
        match visibility {
            Visibility::Hidden => {
                self.visible = false;
                let snapshot = self.running_snapshot();
                if self.monitor.on_hidden(snapshot.as_ref()) {
                    self.outbox.push(Event::RecoverySnapshotSaved {
                        elapsed_seconds: self.timer.elapsed_seconds(),
                        at: at_ms(self.clock.now_ms()),
                    });
                }
            }
            Visibility::Visible => {
                self.visible = true;
                // A countdown that ran out while hidden ends the session
                // before any prompt is raised.
                let events = self.timer.refresh();
                self.absorb_timer_events(events);
                if let Some(prompt) = self.monitor.on_visible() {
                    self.outbox.push(Event::RecoveryPromptShown {
                        prompt,
                        at: at_ms(self.clock.now_ms()),
                    });
                }
                if self.wake_lock.refresh() {
                    self.push_wake_lock_event(false);
                }
                if self.phase() == TimerPhase::Running {
                    self.acquire_wake_lock();
                }
            }
        }
    }

    /// The app is closing. Writes a recovery record if the timer is running.
    pub fn on_unload(&mut self) -> bool {
        let snapshot = self.running_snapshot();
        self.monitor.on_unload(snapshot.as_ref())
    }

    /// Offer a record left behind by a previous process, if any.
    pub fn check_for_recovery(&mut self) -> bool {
        match self.monitor.check_on_load() {
            Some(prompt) => {
                self.outbox.push(Event::RecoveryPromptShown {
                    prompt,
                    at: at_ms(self.clock.now_ms()),
                });
                true
            }
            None => false,
        }
    }

    /// Merge the pending record's tally into the live tally.
    pub fn accept_recovery(&mut self) -> bool {
        let Some(recovered) = self.monitor.accept() else {
            return false;
        };
        self.tally.merge(&recovered);
        self.outbox.push(Event::RecoveryAccepted {
            at: at_ms(self.clock.now_ms()),
        });
        true
    }

    pub fn decline_recovery(&mut self) -> bool {
        if !self.monitor.decline() {
            return false;
        }
        self.outbox.push(Event::RecoveryDiscarded {
            at: at_ms(self.clock.now_ms()),
        });
        true
    }

    /// Release every platform resource and cancel pending callbacks.
    /// Idempotent; also runs on drop.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.timer.cancel_scheduled();
        self.wake_lock.release_wake_lock();
        tracing::debug!("session torn down");
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Queue timer events. A completion plays the chime and finishes the
    /// session, whichever entry point observed it.
    fn absorb_timer_events(&mut self, events: Vec<Event>) {
        let completed = events
            .iter()
            .any(|e| matches!(e, Event::TimerCompleted { .. }));
        self.outbox.extend(events);
        if completed {
            if self.options.completion_chime && self.audio.play_completion_sound() > 0 {
                self.audio_tail = completion_sound_length();
            }
            self.finish();
        }
    }

    fn running_snapshot(&self) -> Option<RecoverySnapshot> {
        if self.phase() != TimerPhase::Running {
            return None;
        }
        Some(RecoverySnapshot {
            timer_snapshot: self.timer.snapshot(),
            tally: *self.tally.tally(),
            captured_at_epoch_ms: self.clock.now_ms(),
            session_config: self.config.clone(),
        })
    }

    fn acquire_wake_lock(&mut self) {
        if !self.options.wake_lock_enabled || self.wake_lock.is_active() {
            return;
        }
        if self.wake_lock.request_wake_lock() {
            self.push_wake_lock_event(true);
        }
    }

    fn release_wake_lock(&mut self) {
        if self.wake_lock.release_wake_lock() {
            self.push_wake_lock_event(false);
        }
    }

    fn push_wake_lock_event(&mut self, active: bool) {
        self.outbox.push(Event::WakeLockChanged {
            active,
            at: at_ms(self.clock.now_ms()),
        });
    }

    fn request_audio(&mut self, gesture: &UserGesture) {
        let before = self.audio.permission();
        let after = self.audio.request_permission(gesture);
        if after != before {
            self.outbox.push(Event::AudioPermissionChanged {
                permission: after,
                at: at_ms(self.clock.now_ms()),
            });
        }
    }

    /// Report the session once its timer has reached a terminal phase.
    fn finish(&mut self) {
        if self.reported || !self.phase().is_terminal() {
            return;
        }
        self.reported = true;
        self.timer.cancel_scheduled();
        self.release_wake_lock();
        self.monitor.session_ended();

        let report = SessionReport::new(
            self.timer.elapsed_seconds(),
            self.config.stage_label(),
            *self.tally.tally(),
            self.tally
                .summary_percentage(self.options.empty_present_percentage),
        );
        tracing::info!(
            outcome = ?self.phase(),
            minutes = report.duration_minutes_rounded,
            observations = self.tally.total_observations(),
            "session ended"
        );
        self.analytics.record_session(&report);
        self.outbox.push(Event::SessionEnded {
            outcome: self.phase(),
            report,
            at: at_ms(self.clock.now_ms()),
        });
    }
}

impl Drop for PracticeSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
