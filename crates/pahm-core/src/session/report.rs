use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::tally::{AttentionTally, PahmMatrix};

/// Final record handed to analytics once per terminal transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub duration_minutes_rounded: u32,
    pub stage_label: String,
    pub tally: AttentionTally,
    pub converted: PahmMatrix,
    pub present_percentage: u8,
}

impl SessionReport {
    pub fn new(
        elapsed_seconds: u64,
        stage_label: &str,
        tally: AttentionTally,
        present_percentage: u8,
    ) -> Self {
        let minutes = (elapsed_seconds as f64 / 60.0).round();
        Self {
            duration_minutes_rounded: minutes.min(f64::from(u32::MAX)) as u32,
            stage_label: stage_label.to_string(),
            tally,
            converted: tally.project(),
            present_percentage,
        }
    }
}

/// External analytics collaborator.
pub trait AnalyticsSink {
    fn record_session(&mut self, report: &SessionReport);
}

/// Discards reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnalytics;

impl AnalyticsSink for NoopAnalytics {
    fn record_session(&mut self, _report: &SessionReport) {}
}

/// Keeps reports in memory. Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct CollectingAnalytics {
    reports: Arc<Mutex<Vec<SessionReport>>>,
}

impl CollectingAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<SessionReport> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }
}

impl AnalyticsSink for CollectingAnalytics {
    fn record_session(&mut self, report: &SessionReport) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report.clone());
        }
    }
}
