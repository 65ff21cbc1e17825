//! Trained-model inference
//!
//! Converts a stored `ModelRecord` into an immutable predictor. Records with
//! missing, mis-sized or non-finite parameters are treated as absent so the
//! caller falls back to the heuristic.

use crate::error::StoreError;
use crate::logistic::{linear, sigmoid};
use crate::normalizer::Normalizer;
use crate::store::Store;
use crate::types::{FeatureVector, ModelRecord, NormalizationParams, FEATURE_COUNT};
use chrono::{DateTime, Utc};

/// Immutable predictor built from validated model parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Predictor {
    normalization: NormalizationParams,
    weights: [f64; FEATURE_COUNT],
    bias: f64,
    trained_at: DateTime<Utc>,
}

impl Predictor {
    /// Load the user's model from the store; `Ok(None)` if absent or malformed
    pub fn load(store: &dyn Store, user_id: &str) -> Result<Option<Self>, StoreError> {
        // One read: the record is a snapshot even if a retrain replaces it meanwhile
        let record = match store.get_model(user_id)? {
            Some(record) => record,
            None => return Ok(None),
        };
        Ok(Self::from_record(&record))
    }

    /// Validate a stored record and build a predictor from it
    pub fn from_record(record: &ModelRecord) -> Option<Self> {
        let norm = &record.normalization;
        let sep = &record.separator;

        let well_formed = norm.mean.len() == FEATURE_COUNT
            && norm.scale.len() == FEATURE_COUNT
            && sep.weights.len() == FEATURE_COUNT
            && norm.mean.iter().all(|m| m.is_finite())
            && norm.scale.iter().all(|s| s.is_finite() && *s > 0.0)
            && sep.weights.iter().all(|w| w.is_finite())
            && sep.bias.is_finite();

        if !well_formed {
            log::warn!(
                "ignoring malformed model record for user {} (trained at {})",
                record.user_id,
                record.trained_at
            );
            return None;
        }

        let mut weights = [0.0; FEATURE_COUNT];
        weights.copy_from_slice(&sep.weights);

        Some(Self {
            normalization: norm.clone(),
            weights,
            bias: sep.bias,
            trained_at: record.trained_at,
        })
    }

    /// Probability of continued engagement in [0, 1].
    ///
    /// `None` only when the result is not finite (non-finite input features).
    pub fn predict(&self, features: &FeatureVector) -> Option<f64> {
        let z = Normalizer::standardize(&self.normalization, &features.as_array());
        let p = sigmoid(linear(&self.weights, self.bias, &z));
        if p.is_finite() {
            Some(p.clamp(0.0, 1.0))
        } else {
            None
        }
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::SeparatorParams;
    use chrono::TimeZone;

    fn record(mean: Vec<f64>, scale: Vec<f64>, weights: Vec<f64>, bias: f64) -> ModelRecord {
        ModelRecord {
            user_id: "user-1".to_string(),
            normalization: NormalizationParams { mean, scale },
            separator: SeparatorParams { weights, bias },
            trained_at: Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
        }
    }

    fn features(streak: u32, mean_success: f64, recency_hours: f64) -> FeatureVector {
        FeatureVector {
            streak,
            mean_success,
            recency_hours,
        }
    }

    #[test]
    fn test_predict_matches_hand_computation() {
        let r = record(
            vec![2.0, 0.5, 24.0],
            vec![1.0, 0.25, 12.0],
            vec![0.5, 1.0, -1.0],
            0.1,
        );
        let predictor = Predictor::from_record(&r).unwrap();

        // z = [1, 1, -1] -> 0.5 + 1.0 + 1.0 + 0.1 = 2.6
        let p = predictor.predict(&features(3, 0.75, 12.0)).unwrap();
        let expected = 1.0 / (1.0 + (-2.6f64).exp());
        assert!((p - expected).abs() < 1e-12);
    }

    #[test]
    fn test_zero_model_predicts_half() {
        let r = record(vec![0.0; 3], vec![1.0; 3], vec![0.0; 3], 0.0);
        let predictor = Predictor::from_record(&r).unwrap();
        assert_eq!(predictor.predict(&features(10, 1.0, 0.0)), Some(0.5));
    }

    #[test]
    fn test_malformed_records_are_absent() {
        // Zero-length arrays
        assert!(Predictor::from_record(&record(vec![], vec![], vec![], 0.0)).is_none());
        // Wrong length
        assert!(Predictor::from_record(&record(
            vec![0.0; 2],
            vec![1.0; 3],
            vec![0.0; 3],
            0.0
        ))
        .is_none());
        // NaN weight
        assert!(Predictor::from_record(&record(
            vec![0.0; 3],
            vec![1.0; 3],
            vec![0.0, f64::NAN, 0.0],
            0.0
        ))
        .is_none());
        // Zero scale
        assert!(Predictor::from_record(&record(
            vec![0.0; 3],
            vec![1.0, 0.0, 1.0],
            vec![0.0; 3],
            0.0
        ))
        .is_none());
        // Infinite bias
        assert!(Predictor::from_record(&record(
            vec![0.0; 3],
            vec![1.0; 3],
            vec![0.0; 3],
            f64::INFINITY
        ))
        .is_none());
    }

    #[test]
    fn test_extreme_inputs_stay_in_range() {
        let r = record(vec![0.0; 3], vec![1.0; 3], vec![50.0, 50.0, -50.0], 0.0);
        let predictor = Predictor::from_record(&r).unwrap();

        let high = predictor.predict(&features(u32::MAX, 1.0, 0.0)).unwrap();
        let low = predictor.predict(&features(0, 0.0, 1e12)).unwrap();
        assert!((0.0..=1.0).contains(&high));
        assert!((0.0..=1.0).contains(&low));
        assert!(predictor.predict(&features(1, f64::NAN, 1.0)).is_none());
    }

    #[test]
    fn test_load_from_store() {
        let store = MemoryStore::new();
        assert!(Predictor::load(&store, "user-1").unwrap().is_none());

        let r = record(vec![0.0; 3], vec![1.0; 3], vec![0.0; 3], 1.0);
        store.put_model(&r).unwrap();
        let predictor = Predictor::load(&store, "user-1").unwrap().unwrap();
        assert_eq!(predictor.trained_at(), r.trained_at);
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_predictor_is_send_and_sync() {
        assert_send_sync::<Predictor>();
    }

    #[test]
    fn test_shared_predictor_matches_sequential_calls() {
        let r = record(
            vec![2.0, 0.5, 24.0],
            vec![1.5, 0.25, 20.0],
            vec![0.8, 1.2, -0.9],
            -0.2,
        );
        let predictor = std::sync::Arc::new(Predictor::from_record(&r).unwrap());
        let inputs: Vec<FeatureVector> = (0..32)
            .map(|i| features(i % 7, f64::from(i % 5) / 4.0, f64::from(i) * 3.5))
            .collect();
        let expected: Vec<Option<f64>> = inputs.iter().map(|f| predictor.predict(f)).collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let predictor = std::sync::Arc::clone(&predictor);
                    let inputs = &inputs;
                    scope.spawn(move || {
                        inputs.iter().map(|f| predictor.predict(f)).collect::<Vec<_>>()
                    })
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }
}
