//! Two-class logistic regression
//!
//! Fitting is done by aprender's gradient-descent `LogisticRegression`. The
//! fitted separator is read back into `SeparatorParams` so the persisted model
//! never depends on aprender's own layout; inference runs in `f64` against the
//! stored parameters.

use crate::config::TrainingConfig;
use crate::error::EngineError;
use crate::normalizer::to_matrix;
use crate::types::{SeparatorParams, FEATURE_COUNT};
use aprender::prelude::*;

/// Probabilities read back from the fitted model are kept this far from 0 and 1
const PROBABILITY_FLOOR: f64 = 1e-7;

/// Logistic transform `1 / (1 + e^-z)`
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        // Same value, computed without overflowing exp for large |z|
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Inverse of [`sigmoid`]
fn logit(p: f64) -> f64 {
    let p = p.clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR);
    (p / (1.0 - p)).ln()
}

/// `w . x + b`
pub fn linear(weights: &[f64; FEATURE_COUNT], bias: f64, row: &[f64; FEATURE_COUNT]) -> f64 {
    weights.iter().zip(row).map(|(w, x)| w * x).sum::<f64>() + bias
}

/// Optimizer settings for fitting a separator over standardized rows
#[derive(Debug, Clone, PartialEq)]
pub struct SeparatorFitter {
    learning_rate: f32,
    max_iter: usize,
    tolerance: f32,
}

impl Default for SeparatorFitter {
    fn default() -> Self {
        Self::from_config(&TrainingConfig::default())
    }
}

impl SeparatorFitter {
    pub fn from_config(config: &TrainingConfig) -> Self {
        Self {
            learning_rate: config.learning_rate as f32,
            max_iter: config.max_iter,
            tolerance: config.tolerance as f32,
        }
    }

    /// Fit on standardized rows. `rows` and `labels` must be non-empty and of
    /// equal length.
    pub fn fit(
        &self,
        rows: &[[f64; FEATURE_COUNT]],
        labels: &[bool],
    ) -> Result<SeparatorParams, EngineError> {
        if rows.is_empty() || rows.len() != labels.len() {
            return Err(EngineError::Training(format!(
                "cannot fit {} rows against {} labels",
                rows.len(),
                labels.len()
            )));
        }

        let x = to_matrix(rows)?;
        let y: Vec<usize> = labels.iter().map(|&label| usize::from(label)).collect();

        let mut model = LogisticRegression::new()
            .with_learning_rate(self.learning_rate)
            .with_max_iter(self.max_iter)
            .with_tolerance(self.tolerance);
        model
            .fit(&x, &y)
            .map_err(|e| EngineError::Training(e.to_string()))?;

        read_separator(&model)
    }
}

/// Recover `w` and `b` from a fitted model.
///
/// The logit is linear, so its value at the origin is `b` and its value at the
/// unit vector `e_i` is `b + w_i`.
fn read_separator(model: &LogisticRegression) -> Result<SeparatorParams, EngineError> {
    let mut points = [[0.0; FEATURE_COUNT]; FEATURE_COUNT + 1];
    for (i, row) in points.iter_mut().skip(1).enumerate() {
        row[i] = 1.0;
    }
    let proba = model.predict_proba(&to_matrix(&points)?);

    let bias = logit(f64::from(proba[0]));
    let weights = (0..FEATURE_COUNT)
        .map(|i| logit(f64::from(proba[i + 1])) - bias)
        .collect();

    Ok(SeparatorParams { weights, bias })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<[f64; FEATURE_COUNT]>, Vec<bool>) {
        let rows = vec![
            [1.2, 0.8, -1.1],
            [0.9, 1.1, -0.9],
            [1.0, 0.7, -1.3],
            [-1.1, -0.9, 1.0],
            [-0.8, -1.2, 1.2],
            [-1.2, -0.5, 1.1],
        ];
        let labels = vec![true, true, true, false, false, false];
        (rows, labels)
    }

    fn probability(params: &SeparatorParams, row: &[f64; FEATURE_COUNT]) -> f64 {
        let mut weights = [0.0; FEATURE_COUNT];
        weights.copy_from_slice(&params.weights);
        sigmoid(linear(&weights, params.bias, row))
    }

    #[test]
    fn test_sigmoid() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.9999);
        assert!(sigmoid(-10.0) < 0.0001);
        // No overflow at the extremes
        assert_eq!(sigmoid(-1000.0), 0.0);
        assert_eq!(sigmoid(1000.0), 1.0);
    }

    #[test]
    fn test_logit_inverts_sigmoid() {
        for z in [-4.0, -0.5, 0.0, 1.25, 3.0] {
            assert!((logit(sigmoid(z)) - z).abs() < 1e-9);
        }
        assert!(logit(0.0).is_finite());
        assert!(logit(1.0).is_finite());
    }

    #[test]
    fn test_fit_separates_classes() {
        let (rows, labels) = separable();
        let params = SeparatorFitter::default().fit(&rows, &labels).unwrap();

        assert_eq!(params.weights.len(), FEATURE_COUNT);
        for (row, label) in rows.iter().zip(&labels) {
            assert_eq!(probability(&params, row) > 0.5, *label, "row {row:?}");
        }
        // Positive rows are high on the first feature and low on the last
        assert!(params.weights[0] > 0.0);
        assert!(params.weights[2] < 0.0);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (rows, labels) = separable();
        let fitter = SeparatorFitter::default();
        assert_eq!(
            fitter.fit(&rows, &labels).unwrap(),
            fitter.fit(&rows, &labels).unwrap()
        );
    }

    #[test]
    fn test_fitted_parameters_are_finite() {
        let (rows, labels) = separable();
        let params = SeparatorFitter::default().fit(&rows, &labels).unwrap();
        assert!(params.bias.is_finite());
        assert!(params.weights.iter().all(|w| w.is_finite()));
    }

    #[test]
    fn test_empty_or_mismatched_input_rejected() {
        let fitter = SeparatorFitter::default();
        assert!(matches!(fitter.fit(&[], &[]), Err(EngineError::Training(_))));

        let (rows, _) = separable();
        assert!(matches!(
            fitter.fit(&rows, &[true, false]),
            Err(EngineError::Training(_))
        ));
    }
}
