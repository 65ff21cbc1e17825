//! Per-user model training
//!
//! Pipeline stages:
//! 1. FeatureExtractor - one labeled row per habit with events in the window
//! 2. Normalizer - per-feature mean and std
//! 3. SeparatorFitter - logistic separator over standardized rows
//! 4. Store - single `put_model` write

use crate::config::TrainingConfig;
use crate::error::EngineError;
use crate::features::FeatureExtractor;
use crate::logistic::SeparatorFitter;
use crate::normalizer::Normalizer;
use crate::store::Store;
use crate::types::{LabeledSample, ModelRecord, FEATURE_COUNT};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Fits and persists per-user models
pub struct ModelTrainer {
    store: Arc<dyn Store>,
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(store: Arc<dyn Store>, config: TrainingConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train using the current time. See [`ModelTrainer::train_at`].
    pub fn train(&self, user_id: &str) -> Result<bool, EngineError> {
        self.train_at(user_id, Utc::now())
    }

    /// Train the user's model as of `now`.
    ///
    /// Returns `Ok(false)` without writing when fewer than `min_samples` rows
    /// are available; the previously stored model, if any, is left in place.
    pub fn train_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<bool, EngineError> {
        let samples = self.collect_samples(user_id, now)?;

        if samples.len() < self.config.min_samples {
            log::info!(
                "skipping training for user {}: {} of {} required samples",
                user_id,
                samples.len(),
                self.config.min_samples
            );
            return Ok(false);
        }

        let record = self.fit(user_id, &samples, now)?;
        self.store.put_model(&record)?;

        log::info!(
            "trained model for user {} on {} samples",
            user_id,
            samples.len()
        );
        Ok(true)
    }

    /// Training rows for every habit the user owns
    fn collect_samples(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<LabeledSample>, EngineError> {
        let habits = self.store.list_habits(user_id)?;
        let mut histories = Vec::with_capacity(habits.len());
        for habit in &habits {
            histories.push(self.store.get_events(user_id, &habit.id)?);
        }

        Ok(FeatureExtractor::training_samples(
            histories.iter().map(Vec::as_slice),
            now,
            &self.config,
        ))
    }

    fn fit(
        &self,
        user_id: &str,
        samples: &[LabeledSample],
        now: DateTime<Utc>,
    ) -> Result<ModelRecord, EngineError> {
        let rows: Vec<[f64; FEATURE_COUNT]> =
            samples.iter().map(|s| s.features.as_array()).collect();
        let labels: Vec<bool> = samples.iter().map(|s| s.label).collect();

        let normalization = Normalizer::fit(&rows)?;
        let standardized: Vec<[f64; FEATURE_COUNT]> = rows
            .iter()
            .map(|row| Normalizer::standardize(&normalization, row))
            .collect();

        let separator = SeparatorFitter::from_config(&self.config).fit(&standardized, &labels)?;

        Ok(ModelRecord {
            user_id: user_id.to_string(),
            normalization,
            separator,
            trained_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::Predictor;
    use crate::store::MemoryStore;
    use crate::types::{EventRecord, NormalizationParams, SeparatorParams};
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    /// Log `outcomes` ending `hours_ago` before now, one day apart
    fn log_history(store: &MemoryStore, user_id: &str, habit_id: &str, outcomes: &[bool], hours_ago: i64) {
        let n = outcomes.len() as i64;
        for (i, success) in outcomes.iter().enumerate() {
            let ts = now() - Duration::hours(hours_ago) - Duration::days(n - 1 - i as i64);
            store
                .append_event(user_id, habit_id, EventRecord::new(ts, *success))
                .unwrap();
        }
    }

    /// Three recently active habits and three stale ones
    fn seeded_store() -> (Arc<MemoryStore>, String) {
        let store = Arc::new(MemoryStore::new());
        let user = store.create_user("Ada", "mentor").unwrap();

        for (name, hours_ago) in [("Running", 2), ("Reading", 5), ("Stretching", 10)] {
            let habit = store.add_habit(&user.id, name, 1).unwrap();
            log_history(&store, &user.id, &habit.id, &[true, true, true, true], hours_ago);
        }
        for (name, hours_ago) in [("Piano", 100), ("Journaling", 150), ("Cooking", 200)] {
            let habit = store.add_habit(&user.id, name, 1).unwrap();
            log_history(&store, &user.id, &habit.id, &[true, false, false], hours_ago);
        }

        (store, user.id)
    }

    #[test]
    fn test_below_threshold_keeps_prior_model() {
        let store = Arc::new(MemoryStore::new());
        let user = store.create_user("Ada", "mentor").unwrap();
        for name in ["Running", "Reading", "Piano", "Cooking"] {
            let habit = store.add_habit(&user.id, name, 1).unwrap();
            log_history(&store, &user.id, &habit.id, &[true, false], 3);
        }

        let prior = ModelRecord {
            user_id: user.id.clone(),
            normalization: NormalizationParams {
                mean: vec![1.0, 0.5, 2.0],
                scale: vec![1.0, 1.0, 1.0],
            },
            separator: SeparatorParams {
                weights: vec![0.1, 0.2, 0.3],
                bias: -0.4,
            },
            trained_at: now() - Duration::days(3),
        };
        store.put_model(&prior).unwrap();

        let trainer = ModelTrainer::new(store.clone(), TrainingConfig::default());
        assert!(!trainer.train_at(&user.id, now()).unwrap());
        assert_eq!(store.get_model(&user.id).unwrap(), Some(prior));
    }

    #[test]
    fn test_events_outside_window_are_ignored() {
        let store = Arc::new(MemoryStore::new());
        let user = store.create_user("Ada", "mentor").unwrap();
        for name in ["A", "B", "C", "D", "E"] {
            let habit = store.add_habit(&user.id, name, 1).unwrap();
            // 20 days old, outside the 14 day window
            log_history(&store, &user.id, &habit.id, &[true], 24 * 20);
        }

        let trainer = ModelTrainer::new(store.clone(), TrainingConfig::default());
        assert!(!trainer.train_at(&user.id, now()).unwrap());
        assert!(store.get_model(&user.id).unwrap().is_none());
    }

    #[test]
    fn test_separable_data_is_learned() {
        let (store, user_id) = seeded_store();
        let trainer = ModelTrainer::new(store.clone(), TrainingConfig::default());
        assert!(trainer.train_at(&user_id, now()).unwrap());

        let record = store.get_model(&user_id).unwrap().unwrap();
        assert_eq!(record.trained_at, now());
        assert_eq!(record.normalization.mean.len(), FEATURE_COUNT);
        assert!(record.normalization.scale.iter().all(|s| *s > 0.0));

        let predictor = Predictor::from_record(&record).unwrap();
        for habit in store.list_habits(&user_id).unwrap() {
            let events = store.get_events(&user_id, &habit.id).unwrap();
            let sample =
                FeatureExtractor::training_sample(&events, now(), trainer.config()).unwrap();
            let p = predictor.predict(&sample.features).unwrap();
            assert_eq!(p > 0.5, sample.label, "habit {} p={}", habit.name, p);
        }
    }

    #[test]
    fn test_training_is_deterministic() {
        let (store, user_id) = seeded_store();
        let trainer = ModelTrainer::new(store.clone(), TrainingConfig::default());

        assert!(trainer.train_at(&user_id, now()).unwrap());
        let first = store.get_model(&user_id).unwrap().unwrap();
        assert!(trainer.train_at(&user_id, now()).unwrap());
        let second = store.get_model(&user_id).unwrap().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_min_samples_is_configurable() {
        let (store, user_id) = seeded_store();
        let trainer = ModelTrainer::new(
            store.clone(),
            TrainingConfig::default().with_min_samples(7),
        );
        assert!(!trainer.train_at(&user_id, now()).unwrap());
    }

    #[test]
    fn test_concurrent_training_matches_single_run() {
        let (store, user_id) = seeded_store();
        let trainer = Arc::new(ModelTrainer::new(store.clone(), TrainingConfig::default()));

        assert!(trainer.train_at(&user_id, now()).unwrap());
        let expected = store.get_model(&user_id).unwrap().unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let trainer = Arc::clone(&trainer);
                let user_id = user_id.clone();
                std::thread::spawn(move || trainer.train_at(&user_id, now()).unwrap())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }

        assert_eq!(store.get_model(&user_id).unwrap().unwrap(), expected);
    }
}
