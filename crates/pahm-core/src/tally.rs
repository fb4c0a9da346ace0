//! Attention tally: the nine self-reported PAHM positions of a session.
//!
//! The attention-matrix UI owns the increment logic and reports cumulative
//! counts; the aggregator stores them and derives summary metrics plus the
//! 3×3 time-by-valence projection consumed by analytics.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One cell of the attention matrix as laid out in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionKey {
    Nostalgia,
    Likes,
    Anticipation,
    Past,
    Present,
    Future,
    Regret,
    Dislikes,
    Worry,
}

impl AttentionKey {
    /// All positions in matrix order (row by row).
    pub const ALL: [AttentionKey; 9] = [
        AttentionKey::Nostalgia,
        AttentionKey::Likes,
        AttentionKey::Anticipation,
        AttentionKey::Past,
        AttentionKey::Present,
        AttentionKey::Future,
        AttentionKey::Regret,
        AttentionKey::Dislikes,
        AttentionKey::Worry,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AttentionKey::Nostalgia => "nostalgia",
            AttentionKey::Likes => "likes",
            AttentionKey::Anticipation => "anticipation",
            AttentionKey::Past => "past",
            AttentionKey::Present => "present",
            AttentionKey::Future => "future",
            AttentionKey::Regret => "regret",
            AttentionKey::Dislikes => "dislikes",
            AttentionKey::Worry => "worry",
        }
    }
}

impl fmt::Display for AttentionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttentionKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AttentionKey::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownPosition(s.to_string()))
    }
}

/// Nine counters keyed by [`AttentionKey`]. Serializes as a flat 9-key map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttentionTally {
    pub nostalgia: u32,
    pub likes: u32,
    pub anticipation: u32,
    pub past: u32,
    pub present: u32,
    pub future: u32,
    pub regret: u32,
    pub dislikes: u32,
    pub worry: u32,
}

impl AttentionTally {
    pub fn get(&self, key: AttentionKey) -> u32 {
        match key {
            AttentionKey::Nostalgia => self.nostalgia,
            AttentionKey::Likes => self.likes,
            AttentionKey::Anticipation => self.anticipation,
            AttentionKey::Past => self.past,
            AttentionKey::Present => self.present,
            AttentionKey::Future => self.future,
            AttentionKey::Regret => self.regret,
            AttentionKey::Dislikes => self.dislikes,
            AttentionKey::Worry => self.worry,
        }
    }

    fn slot(&mut self, key: AttentionKey) -> &mut u32 {
        match key {
            AttentionKey::Nostalgia => &mut self.nostalgia,
            AttentionKey::Likes => &mut self.likes,
            AttentionKey::Anticipation => &mut self.anticipation,
            AttentionKey::Past => &mut self.past,
            AttentionKey::Present => &mut self.present,
            AttentionKey::Future => &mut self.future,
            AttentionKey::Regret => &mut self.regret,
            AttentionKey::Dislikes => &mut self.dislikes,
            AttentionKey::Worry => &mut self.worry,
        }
    }

    pub fn set(&mut self, key: AttentionKey, count: u32) {
        *self.slot(key) = count;
    }

    pub fn total(&self) -> u64 {
        AttentionKey::ALL
            .into_iter()
            .map(|k| u64::from(self.get(k)))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Present-moment share in whole percent, `None` when nothing was recorded.
    pub fn present_percentage(&self) -> Option<u8> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let present =
            u64::from(self.present) + u64::from(self.likes) + u64::from(self.dislikes);
        Some((present as f64 / total as f64 * 100.0).round() as u8)
    }

    /// 3×3 time-by-valence projection.
    pub fn project(&self) -> PahmMatrix {
        PahmMatrix {
            present_attachment: self.likes,
            present_neutral: self.present,
            present_aversion: self.dislikes,
            past_attachment: self.nostalgia,
            past_neutral: self.past,
            past_aversion: self.regret,
            future_attachment: self.anticipation,
            future_neutral: self.future,
            future_aversion: self.worry,
        }
    }
}

/// Analytics schema: time orientation × emotional valence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PahmMatrix {
    pub present_attachment: u32,
    pub present_neutral: u32,
    pub present_aversion: u32,
    pub past_attachment: u32,
    pub past_neutral: u32,
    pub past_aversion: u32,
    pub future_attachment: u32,
    pub future_neutral: u32,
    pub future_aversion: u32,
}

impl PahmMatrix {
    pub fn total(&self) -> u64 {
        [
            self.present_attachment,
            self.present_neutral,
            self.present_aversion,
            self.past_attachment,
            self.past_neutral,
            self.past_aversion,
            self.future_attachment,
            self.future_neutral,
            self.future_aversion,
        ]
        .into_iter()
        .map(u64::from)
        .sum()
    }
}

/// Live tally for one session.
#[derive(Debug, Clone, Default)]
pub struct AttentionTallyAggregator {
    tally: AttentionTally,
}

impl AttentionTallyAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tally(&self) -> &AttentionTally {
        &self.tally
    }

    /// Store the caller's cumulative count for `key`.
    ///
    /// Counters never decrease within a session; a lower count than the one
    /// already stored is dropped. Returns whether the tally changed.
    pub fn record(&mut self, key: AttentionKey, cumulative_count: u32) -> bool {
        let current = self.tally.get(key);
        if cumulative_count < current {
            tracing::warn!(
                %key,
                current,
                cumulative_count,
                "ignoring decreasing attention count"
            );
            return false;
        }
        self.tally.set(key, cumulative_count);
        cumulative_count != current
    }

    /// Fold a recovered tally into the live one, key by key.
    pub fn merge(&mut self, other: &AttentionTally) {
        for key in AttentionKey::ALL {
            let merged = self.tally.get(key).max(other.get(key));
            self.tally.set(key, merged);
        }
    }

    pub fn total_observations(&self) -> u64 {
        self.tally.total()
    }

    /// Rounded present-moment percentage; 0 when nothing was recorded.
    pub fn present_moment_percentage(&self) -> u8 {
        self.tally.present_percentage().unwrap_or(0)
    }

    /// Percentage reported at session end, substituting `empty_default` for
    /// sessions with no taps.
    pub fn summary_percentage(&self, empty_default: u8) -> u8 {
        self.tally
            .present_percentage()
            .unwrap_or(empty_default.min(100))
    }

    pub fn project(&self) -> PahmMatrix {
        self.tally.project()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn key_parsing_is_case_insensitive() {
        assert_eq!("Present".parse::<AttentionKey>().unwrap(), AttentionKey::Present);
        assert_eq!(" worry ".parse::<AttentionKey>().unwrap(), AttentionKey::Worry);
        assert!("joy".parse::<AttentionKey>().is_err());
    }

    #[test]
    fn record_stores_cumulative_counts_verbatim() {
        let mut agg = AttentionTallyAggregator::new();
        assert!(agg.record(AttentionKey::Present, 1));
        assert!(agg.record(AttentionKey::Present, 4));
        assert_eq!(agg.tally().present, 4);
        assert_eq!(agg.total_observations(), 4);
    }

    #[test]
    fn record_ignores_decreasing_counts() {
        let mut agg = AttentionTallyAggregator::new();
        agg.record(AttentionKey::Worry, 3);
        assert!(!agg.record(AttentionKey::Worry, 1));
        assert_eq!(agg.tally().worry, 3);
    }

    #[test]
    fn present_percentage_rounds() {
        let mut agg = AttentionTallyAggregator::new();
        agg.record(AttentionKey::Present, 8);
        agg.record(AttentionKey::Likes, 2);
        agg.record(AttentionKey::Dislikes, 2);
        agg.record(AttentionKey::Past, 5);
        agg.record(AttentionKey::Worry, 3);
        assert_eq!(agg.total_observations(), 20);
        assert_eq!(agg.present_moment_percentage(), 60);

        let mut odd = AttentionTallyAggregator::new();
        odd.record(AttentionKey::Present, 2);
        odd.record(AttentionKey::Future, 1);
        assert_eq!(odd.present_moment_percentage(), 67);
    }

    #[test]
    fn empty_tally_percentage() {
        let agg = AttentionTallyAggregator::new();
        assert_eq!(agg.present_moment_percentage(), 0);
        assert_eq!(agg.summary_percentage(50), 50);
        assert_eq!(agg.summary_percentage(250), 100);
    }

    #[test]
    fn projection_follows_remap_table() {
        let tally = AttentionTally {
            nostalgia: 1,
            likes: 2,
            anticipation: 3,
            past: 4,
            present: 5,
            future: 6,
            regret: 7,
            dislikes: 8,
            worry: 9,
        };
        let m = tally.project();
        assert_eq!(m.present_attachment, 2);
        assert_eq!(m.present_neutral, 5);
        assert_eq!(m.present_aversion, 8);
        assert_eq!(m.past_attachment, 1);
        assert_eq!(m.past_neutral, 4);
        assert_eq!(m.past_aversion, 7);
        assert_eq!(m.future_attachment, 3);
        assert_eq!(m.future_neutral, 6);
        assert_eq!(m.future_aversion, 9);
    }

    #[test]
    fn merge_takes_per_key_max() {
        let mut agg = AttentionTallyAggregator::new();
        agg.record(AttentionKey::Present, 5);
        agg.record(AttentionKey::Regret, 1);
        let recovered = AttentionTally {
            present: 3,
            likes: 2,
            ..Default::default()
        };
        agg.merge(&recovered);
        assert_eq!(agg.tally().present, 5);
        assert_eq!(agg.tally().likes, 2);
        assert_eq!(agg.tally().regret, 1);
    }

    #[test]
    fn tally_serializes_as_flat_map() {
        let tally = AttentionTally {
            present: 3,
            likes: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(tally).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 9);
        assert_eq!(json["present"], 3);
        let partial: AttentionTally = serde_json::from_str(r#"{"worry": 2}"#).unwrap();
        assert_eq!(partial.worry, 2);
        assert_eq!(partial.total(), 2);
    }

    proptest! {
        #[test]
        fn projection_preserves_total(counts in proptest::array::uniform9(0u32..100_000)) {
            let mut tally = AttentionTally::default();
            for (key, count) in AttentionKey::ALL.into_iter().zip(counts) {
                tally.set(key, count);
            }
            prop_assert_eq!(tally.total(), tally.project().total());
        }

        #[test]
        fn percentage_is_bounded(counts in proptest::array::uniform9(0u32..1_000)) {
            let mut agg = AttentionTallyAggregator::new();
            for (key, count) in AttentionKey::ALL.into_iter().zip(counts) {
                agg.record(key, count);
            }
            prop_assert!(agg.present_moment_percentage() <= 100);
        }
    }
}
