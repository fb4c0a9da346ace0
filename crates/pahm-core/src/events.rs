use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audio::AudioPermission;
use crate::recovery::RecoveryPrompt;
use crate::session::SessionReport;
use crate::timer::TimerPhase;

/// Every observable change in a practice session produces an Event.
/// Front ends drain them from the session; nothing calls into the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        duration_minutes: u32,
        stage_label: String,
        posture: String,
        at: DateTime<Utc>,
    },
    /// Countdown update, emitted about once per second while running.
    Tick {
        remaining_minutes: u64,
        remaining_seconds: u64,
        phase: TimerPhase,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    TimerCompleted {
        elapsed_seconds: u64,
        at: DateTime<Utc>,
    },
    TimerInterrupted {
        elapsed_seconds: u64,
        at: DateTime<Utc>,
    },
    /// Status indicator: screen wake lock gained or lost.
    WakeLockChanged {
        active: bool,
        at: DateTime<Utc>,
    },
    /// Status indicator: audio feedback availability.
    AudioPermissionChanged {
        permission: AudioPermission,
        at: DateTime<Utc>,
    },
    RecoverySnapshotSaved {
        elapsed_seconds: u64,
        at: DateTime<Utc>,
    },
    /// The one user-facing decision point: resume or discard.
    RecoveryPromptShown {
        prompt: RecoveryPrompt,
        at: DateTime<Utc>,
    },
    RecoveryAccepted {
        at: DateTime<Utc>,
    },
    RecoveryDiscarded {
        at: DateTime<Utc>,
    },
    /// Final analytics record, emitted once per terminal transition.
    SessionEnded {
        /// `Completed` or `Interrupted`.
        outcome: TimerPhase,
        report: SessionReport,
        at: DateTime<Utc>,
    },
}

/// Convert clock milliseconds to an event timestamp.
pub(crate) fn at_ms(ms: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms as i64).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::TimerPaused {
            remaining_ms: 1_500_000,
            at: at_ms(0),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TimerPaused");
        assert_eq!(json["remaining_ms"], 1_500_000);
    }

    #[test]
    fn at_ms_converts_epoch_millis() {
        assert_eq!(at_ms(1_000).timestamp(), 1);
    }
}
