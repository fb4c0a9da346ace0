//! Robust practice timer.
//!
//! Remaining time is recomputed from epoch arithmetic on every tick, never
//! decremented. A tick that fires late (throttled driver, device sleep, clock
//! jump) simply observes a larger elapsed value, so no drift accumulates.
//!
//! ## State Transitions
//!
//! ```text
//! Setup -> Running <-> Paused -> (Completed | Interrupted)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut timer = RobustTimer::new(clock, Box::new(DeadlineScheduler::new()));
//! timer.start(config);
//! // In the event loop, after sleeping until `timer.next_deadline()`:
//! for event in timer.poll() { render(event) }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::practice::SessionConfiguration;
use crate::clock::{Clock, Scheduler, TaskId};
use crate::events::{at_ms, Event};

/// Default recompute cadence.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Setup,
    Running,
    Paused,
    Completed,
    /// Ended early by the practitioner.
    Interrupted,
}

impl TimerPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, TimerPhase::Completed | TimerPhase::Interrupted)
    }
}

/// Epoch bookkeeping. Only [`RobustTimer`] mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub phase: TimerPhase,
    pub start_epoch_ms: u64,
    pub total_duration_ms: u64,
    pub accumulated_paused_ms: u64,
    #[serde(default)]
    pub pause_start_epoch_ms: Option<u64>,
    /// Instant the timer reached a terminal phase. Elapsed time freezes here.
    #[serde(default)]
    pub stop_epoch_ms: Option<u64>,
}

impl Default for TimerState {
    fn default() -> Self {
        Self {
            phase: TimerPhase::Setup,
            start_epoch_ms: 0,
            total_duration_ms: 0,
            accumulated_paused_ms: 0,
            pause_start_epoch_ms: None,
            stop_epoch_ms: None,
        }
    }
}

/// Countdown values as captured for a recovery record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub minutes: u64,
    pub seconds: u64,
    pub elapsed_seconds: u64,
}

/// Wall-clock driven countdown.
pub struct RobustTimer {
    clock: Arc<dyn Clock>,
    scheduler: Box<dyn Scheduler>,
    tick_interval: Duration,
    state: TimerState,
    config: Option<SessionConfiguration>,
    tick_task: Option<TaskId>,
    completion_signalled: bool,
}

impl RobustTimer {
    pub fn new(clock: Arc<dyn Clock>, scheduler: Box<dyn Scheduler>) -> Self {
        Self {
            clock,
            scheduler,
            tick_interval: DEFAULT_TICK_INTERVAL,
            state: TimerState::default(),
            config: None,
            tick_task: None,
            completion_signalled: false,
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(Duration::from_millis(1));
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> TimerPhase {
        self.state.phase
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn config(&self) -> Option<&SessionConfiguration> {
        self.config.as_ref()
    }

    /// Earliest instant the driver must wake up to call [`poll`](Self::poll).
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_deadline()
    }

    pub fn is_ticking(&self) -> bool {
        self.tick_task
            .map(|id| self.scheduler.is_pending(id))
            .unwrap_or(false)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms_at(self.clock.now_ms())
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_ms() / 1000
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms_at(self.clock.now_ms())
    }

    /// Remaining time as `(minutes, seconds)`.
    pub fn remaining(&self) -> (u64, u64) {
        split_remaining(self.remaining_ms())
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let now = self.clock.now_ms();
        let (minutes, seconds) = split_remaining(self.remaining_ms_at(now));
        TimerSnapshot {
            minutes,
            seconds,
            elapsed_seconds: self.elapsed_ms_at(now) / 1000,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin the countdown. Ignored unless the timer is still in `Setup`.
    pub fn start(&mut self, config: SessionConfiguration) -> Vec<Event> {
        if self.state.phase != TimerPhase::Setup {
            return Vec::new();
        }
        let now = self.clock.now_ms();
        self.state = TimerState {
            phase: TimerPhase::Running,
            start_epoch_ms: now,
            total_duration_ms: config.duration_ms(),
            accumulated_paused_ms: 0,
            pause_start_epoch_ms: None,
            stop_epoch_ms: None,
        };
        tracing::info!(
            minutes = config.duration_minutes(),
            stage = config.stage_label(),
            "timer started"
        );
        self.config = Some(config);
        self.completion_signalled = false;
        self.arm(now);
        self.recompute(now)
    }

    pub fn pause(&mut self) -> Vec<Event> {
        if self.state.phase != TimerPhase::Running {
            return Vec::new();
        }
        let now = self.clock.now_ms();
        self.disarm();
        self.state.pause_start_epoch_ms = Some(now);
        self.state.phase = TimerPhase::Paused;
        tracing::info!(elapsed_ms = self.elapsed_ms_at(now), "timer paused");
        vec![Event::TimerPaused {
            remaining_ms: self.remaining_ms_at(now),
            at: at_ms(now),
        }]
    }

    pub fn resume(&mut self) -> Vec<Event> {
        if self.state.phase != TimerPhase::Paused {
            return Vec::new();
        }
        let now = self.clock.now_ms();
        self.fold_pause(now);
        self.state.phase = TimerPhase::Running;
        self.arm(now);
        tracing::info!(
            paused_total_ms = self.state.accumulated_paused_ms,
            "timer resumed"
        );
        let mut events = vec![Event::TimerResumed {
            remaining_ms: self.remaining_ms_at(now),
            at: at_ms(now),
        }];
        events.extend(self.recompute(now));
        events
    }

    /// End the session early. Idempotent; terminal phases are never
    /// overwritten and `Setup` has nothing to stop.
    pub fn stop(&mut self) -> Vec<Event> {
        match self.state.phase {
            TimerPhase::Running | TimerPhase::Paused => {
                let now = self.clock.now_ms();
                self.fold_pause(now);
                self.disarm();
                self.state.stop_epoch_ms = Some(now);
                self.state.phase = TimerPhase::Interrupted;
                let elapsed_seconds = self.elapsed_ms_at(now) / 1000;
                tracing::info!(elapsed_seconds, "timer interrupted");
                vec![Event::TimerInterrupted {
                    elapsed_seconds,
                    at: at_ms(now),
                }]
            }
            TimerPhase::Setup | TimerPhase::Completed | TimerPhase::Interrupted => Vec::new(),
        }
    }

    /// Call whenever the driver wakes. Emits a tick when the recompute task
    /// is due, and the completion event once the countdown reaches zero.
    pub fn poll(&mut self) -> Vec<Event> {
        if self.state.phase != TimerPhase::Running {
            return Vec::new();
        }
        let now = self.clock.now_ms();
        let due = self.scheduler.take_due(now);
        match self.tick_task {
            Some(id) if due.contains(&id) => self.recompute(now),
            _ => Vec::new(),
        }
    }

    /// Recompute immediately, outside the periodic schedule (e.g. when the
    /// app returns to the foreground).
    pub fn refresh(&mut self) -> Vec<Event> {
        if self.state.phase != TimerPhase::Running {
            return Vec::new();
        }
        let now = self.clock.now_ms();
        self.recompute(now)
    }

    /// Cancel every scheduled callback. Used by session teardown.
    pub fn cancel_scheduled(&mut self) {
        self.scheduler.cancel_all();
        self.tick_task = None;
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn recompute(&mut self, now: u64) -> Vec<Event> {
        let remaining = self.remaining_ms_at(now);
        if remaining > 0 {
            let (remaining_minutes, remaining_seconds) = split_remaining(remaining);
            tracing::debug!(remaining_minutes, remaining_seconds, "tick");
            return vec![Event::Tick {
                remaining_minutes,
                remaining_seconds,
                phase: self.state.phase,
                at: at_ms(now),
            }];
        }
        self.complete(now)
    }

    fn complete(&mut self, now: u64) -> Vec<Event> {
        if self.completion_signalled {
            return Vec::new();
        }
        self.completion_signalled = true;
        self.disarm();
        // Freeze elapsed at exactly the configured length.
        let end = self
            .state
            .start_epoch_ms
            .saturating_add(self.state.total_duration_ms)
            .saturating_add(self.state.accumulated_paused_ms);
        self.state.stop_epoch_ms = Some(end.min(now));
        self.state.phase = TimerPhase::Completed;
        let elapsed_seconds = self.state.total_duration_ms / 1000;
        tracing::info!(elapsed_seconds, "timer completed");
        vec![
            Event::Tick {
                remaining_minutes: 0,
                remaining_seconds: 0,
                phase: TimerPhase::Completed,
                at: at_ms(now),
            },
            Event::TimerCompleted {
                elapsed_seconds,
                at: at_ms(now),
            },
        ]
    }

    fn arm(&mut self, now: u64) {
        self.disarm();
        self.tick_task = Some(self.scheduler.schedule_repeating(now, self.tick_interval));
    }

    fn disarm(&mut self) {
        if let Some(id) = self.tick_task.take() {
            self.scheduler.cancel(id);
        }
    }

    fn fold_pause(&mut self, now: u64) {
        if let Some(paused_at) = self.state.pause_start_epoch_ms.take() {
            self.state.accumulated_paused_ms = self
                .state
                .accumulated_paused_ms
                .saturating_add(now.saturating_sub(paused_at));
        }
    }

    fn elapsed_ms_at(&self, now: u64) -> u64 {
        let s = &self.state;
        let reference = match s.phase {
            TimerPhase::Setup => return 0,
            TimerPhase::Paused => s.pause_start_epoch_ms.unwrap_or(now),
            TimerPhase::Completed | TimerPhase::Interrupted => s.stop_epoch_ms.unwrap_or(now),
            TimerPhase::Running => now,
        };
        let elapsed = reference
            .saturating_sub(s.start_epoch_ms)
            .saturating_sub(s.accumulated_paused_ms);
        if s.phase == TimerPhase::Completed {
            elapsed.min(s.total_duration_ms)
        } else {
            elapsed
        }
    }

    fn remaining_ms_at(&self, now: u64) -> u64 {
        self.state
            .total_duration_ms
            .saturating_sub(self.elapsed_ms_at(now))
    }
}

/// Split remaining milliseconds into whole display minutes and seconds,
/// rounding partial seconds up so `00:00` only shows at true completion.
fn split_remaining(remaining_ms: u64) -> (u64, u64) {
    let secs = remaining_ms.div_ceil(1000);
    (secs / 60, secs % 60)
}
