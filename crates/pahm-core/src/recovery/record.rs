use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::tally::AttentionTally;
use crate::timer::{SessionConfiguration, TimerSnapshot};

/// Default durable-storage key for the recovery record.
pub const RECOVERY_KEY: &str = "pahmSessionRecovery";

/// In-flight session state captured when the app loses the foreground.
/// Advisory only; the timer never reads it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverySnapshot {
    pub timer_snapshot: TimerSnapshot,
    pub tally: AttentionTally,
    pub captured_at_epoch_ms: u64,
    pub session_config: SessionConfiguration,
}

/// Persisted JSON layout of a [`RecoverySnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryRecord {
    /// Remaining minutes at capture.
    pub minutes: u64,
    /// Remaining seconds at capture.
    pub seconds: u64,
    pub pahm_counts: AttentionTally,
    pub elapsed_seconds: u64,
    /// Capture instant, epoch milliseconds.
    pub timestamp: u64,
    pub stage_level: String,
    pub initial_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posture: Option<String>,
}

impl From<&RecoverySnapshot> for RecoveryRecord {
    fn from(snapshot: &RecoverySnapshot) -> Self {
        Self {
            minutes: snapshot.timer_snapshot.minutes,
            seconds: snapshot.timer_snapshot.seconds,
            pahm_counts: snapshot.tally,
            elapsed_seconds: snapshot.timer_snapshot.elapsed_seconds,
            timestamp: snapshot.captured_at_epoch_ms,
            stage_level: snapshot.session_config.stage_label().to_string(),
            initial_minutes: snapshot.session_config.duration_minutes(),
            posture: Some(snapshot.session_config.posture().to_string()),
        }
    }
}

impl TryFrom<RecoveryRecord> for RecoverySnapshot {
    type Error = StorageError;

    fn try_from(record: RecoveryRecord) -> Result<Self, Self::Error> {
        let session_config = SessionConfiguration::new(
            record.initial_minutes,
            record.stage_level,
            record.posture.unwrap_or_default(),
        )
        .map_err(|e| StorageError::Corrupt(e.to_string()))?;
        Ok(Self {
            timer_snapshot: TimerSnapshot {
                minutes: record.minutes,
                seconds: record.seconds,
                elapsed_seconds: record.elapsed_seconds,
            },
            tally: record.pahm_counts,
            captured_at_epoch_ms: record.timestamp,
            session_config,
        })
    }
}

impl RecoverySnapshot {
    pub fn to_json(&self) -> Result<String, StorageError> {
        serde_json::to_string(&RecoveryRecord::from(self))
            .map_err(|e| StorageError::Corrupt(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        let record: RecoveryRecord =
            serde_json::from_str(json).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        record.try_into()
    }
}
