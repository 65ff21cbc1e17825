//! Feature derivation
//!
//! This module turns a habit's chronological event history into the three
//! engineered features used by the engagement model:
//! - Trailing success streak
//! - Mean success rate
//! - Hours since the most recent event

use crate::config::TrainingConfig;
use crate::types::{EventRecord, FeatureVector, LabeledSample};
use chrono::{DateTime, Duration, Utc};

/// Feature extractor for habit event histories
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Extract features from a full (caller-limited) history.
    ///
    /// Events must be in chronological order. Returns `None` for an empty
    /// history, which callers treat as a cold start.
    pub fn extract(events: &[EventRecord], now: DateTime<Utc>) -> Option<FeatureVector> {
        let last = events.last()?;

        Some(FeatureVector {
            streak: compute_streak(events),
            mean_success: compute_mean_success(events),
            recency_hours: compute_recency_hours(last.timestamp, now),
        })
    }

    /// Build the training row for one habit from its trailing window.
    ///
    /// Returns `None` when no event falls inside `[now - window_days, now]`.
    pub fn training_sample(
        events: &[EventRecord],
        now: DateTime<Utc>,
        config: &TrainingConfig,
    ) -> Option<LabeledSample> {
        let window = window_events(events, now, config.window_days);
        let features = Self::extract(window, now)?;
        let label = features.recency_hours <= config.label_horizon_hours;

        Some(LabeledSample { features, label })
    }

    /// Build training rows for many habits, skipping habits with an empty window
    pub fn training_samples<'a, I>(
        histories: I,
        now: DateTime<Utc>,
        config: &TrainingConfig,
    ) -> Vec<LabeledSample>
    where
        I: IntoIterator<Item = &'a [EventRecord]>,
    {
        histories
            .into_iter()
            .filter_map(|events| Self::training_sample(events, now, config))
            .collect()
    }
}

/// Slice of chronologically ordered events inside the trailing window
fn window_events(events: &[EventRecord], now: DateTime<Utc>, window_days: i64) -> &[EventRecord] {
    let start = now - Duration::days(window_days);
    let from = events.partition_point(|e| e.timestamp < start);
    let to = events.partition_point(|e| e.timestamp <= now);
    if from >= to {
        return &[];
    }
    &events[from..to]
}

/// Count consecutive successes from the most recent event backward
fn compute_streak(events: &[EventRecord]) -> u32 {
    events.iter().rev().take_while(|e| e.success).count() as u32
}

/// Arithmetic mean of the binary outcomes
fn compute_mean_success(events: &[EventRecord]) -> f64 {
    if events.is_empty() {
        return 0.0;
    }
    let successes = events.iter().filter(|e| e.success).count();
    successes as f64 / events.len() as f64
}

/// Elapsed hours between the latest event and now, never negative
fn compute_recency_hours(latest: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let elapsed_ms = (now - latest).num_milliseconds() as f64;
    (elapsed_ms / 3_600_000.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    /// Events one day apart, oldest first, ending `last_hours_ago` before now
    fn history(outcomes: &[u8], last_hours_ago: i64) -> Vec<EventRecord> {
        let n = outcomes.len() as i64;
        outcomes
            .iter()
            .enumerate()
            .map(|(i, &o)| {
                let offset = Duration::hours(last_hours_ago) + Duration::days(n - 1 - i as i64);
                EventRecord::new(now() - offset, o == 1)
            })
            .collect()
    }

    #[test]
    fn test_streak_counts_only_trailing_run() {
        let f = FeatureExtractor::extract(&history(&[1, 1, 0, 1], 1), now()).unwrap();
        assert_eq!(f.streak, 1);

        let f = FeatureExtractor::extract(&history(&[1, 1, 1], 1), now()).unwrap();
        assert_eq!(f.streak, 3);

        let f = FeatureExtractor::extract(&history(&[0], 1), now()).unwrap();
        assert_eq!(f.streak, 0);
    }

    #[test]
    fn test_mean_success() {
        let f = FeatureExtractor::extract(&history(&[1, 0, 1, 1], 1), now()).unwrap();
        assert!((f.mean_success - 0.75).abs() < 1e-12);

        let f = FeatureExtractor::extract(&history(&[1, 0, 1, 0], 1), now()).unwrap();
        assert!((f.mean_success - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_recency_hours() {
        let f = FeatureExtractor::extract(&history(&[1], 30), now()).unwrap();
        assert!((f.recency_hours - 30.0).abs() < 1e-9);

        // Events stamped after "now" clamp to zero
        let future = vec![EventRecord::new(now() + Duration::hours(2), true)];
        let f = FeatureExtractor::extract(&future, now()).unwrap();
        assert_eq!(f.recency_hours, 0.0);
    }

    #[test]
    fn test_empty_history_is_cold_start() {
        assert!(FeatureExtractor::extract(&[], now()).is_none());
    }

    #[test]
    fn test_habit_outside_window_is_skipped() {
        let config = TrainingConfig::default();
        // Most recent event 15 days ago
        let stale = history(&[1, 1, 1], 15 * 24);
        assert!(FeatureExtractor::training_sample(&stale, now(), &config).is_none());

        let fresh = history(&[1, 1], 2);
        let never_logged: Vec<EventRecord> = Vec::new();
        let rows = FeatureExtractor::training_samples(
            [stale.as_slice(), fresh.as_slice(), never_logged.as_slice()],
            now(),
            &config,
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].features.streak, 2);
    }

    #[test]
    fn test_window_trims_old_events() {
        let config = TrainingConfig::default();
        // 20 daily events: the first six fall outside the 14-day window
        let mut outcomes = vec![0u8; 6];
        outcomes.extend(std::iter::repeat(1u8).take(14));
        let events = history(&outcomes, 1);

        let sample = FeatureExtractor::training_sample(&events, now(), &config).unwrap();
        assert_eq!(sample.features.streak, 14);
        assert_eq!(sample.features.mean_success, 1.0);

        // Inference uses the whole history
        let full = FeatureExtractor::extract(&events, now()).unwrap();
        assert!((full.mean_success - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_label_uses_24_hour_horizon() {
        let config = TrainingConfig::default();

        let recent = history(&[1, 0], 23);
        let sample = FeatureExtractor::training_sample(&recent, now(), &config).unwrap();
        assert!(sample.label);

        let lapsed = history(&[1, 1], 25);
        let sample = FeatureExtractor::training_sample(&lapsed, now(), &config).unwrap();
        assert!(!sample.label);
    }
}
