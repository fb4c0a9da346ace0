use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Shortest practice session the timer accepts.
pub const MIN_DURATION_MINUTES: u32 = 30;

/// Parameters of one practice session. Immutable once the session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfiguration {
    duration_minutes: u32,
    stage_label: String,
    posture: String,
}

impl SessionConfiguration {
    /// Build a configuration, rejecting sessions shorter than
    /// [`MIN_DURATION_MINUTES`].
    pub fn new(
        duration_minutes: u32,
        stage_label: impl Into<String>,
        posture: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        if duration_minutes < MIN_DURATION_MINUTES {
            return Err(ValidationError::DurationTooShort {
                min: MIN_DURATION_MINUTES,
                got: duration_minutes,
            });
        }
        Ok(Self {
            duration_minutes,
            stage_label: stage_label.into(),
            posture: posture.into(),
        })
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    pub fn stage_label(&self) -> &str {
        &self.stage_label
    }

    pub fn posture(&self) -> &str {
        &self.posture
    }

    /// Session length in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        u64::from(self.duration_minutes)
            .saturating_mul(60)
            .saturating_mul(1000)
    }
}
