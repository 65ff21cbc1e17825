//! Feature standardization
//!
//! This module fits and applies per-feature standardization:
//! - Mean and standard deviation per feature, fitted by aprender's `StandardScaler`
//! - Zero or non-finite deviation replaced by a unit scale
//! - Standardization of feature rows into model space

use crate::error::EngineError;
use crate::types::{NormalizationParams, FEATURE_COUNT};
use aprender::prelude::*;

/// Deviations at or below this are treated as a constant feature
const MIN_SCALE: f64 = f32::EPSILON as f64;

/// Fitting and applying `NormalizationParams`
pub struct Normalizer;

impl Normalizer {
    /// Fit mean and scale over the given rows
    pub fn fit(rows: &[[f64; FEATURE_COUNT]]) -> Result<NormalizationParams, EngineError> {
        if rows.is_empty() {
            return Err(EngineError::Training("no rows to standardize".into()));
        }

        let mut scaler = StandardScaler::new();
        scaler
            .fit(&to_matrix(rows)?)
            .map_err(|e| EngineError::Training(e.to_string()))?;

        let mean = scaler.mean();
        let std = scaler.std();
        Ok(NormalizationParams {
            mean: (0..FEATURE_COUNT).map(|i| f64::from(mean[i])).collect(),
            scale: (0..FEATURE_COUNT)
                .map(|i| safe_scale(f64::from(std[i])))
                .collect(),
        })
    }

    /// Standardize one row with fitted parameters.
    ///
    /// Callers must pass parameters with exactly `FEATURE_COUNT` entries.
    pub fn standardize(
        params: &NormalizationParams,
        row: &[f64; FEATURE_COUNT],
    ) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for (i, value) in out.iter_mut().enumerate() {
            let scale = params.scale.get(i).copied().map(safe_scale).unwrap_or(1.0);
            let mean = params.mean.get(i).copied().unwrap_or(0.0);
            *value = (row[i] - mean) / scale;
        }
        out
    }
}

/// Row-major aprender matrix over feature rows
pub(crate) fn to_matrix(rows: &[[f64; FEATURE_COUNT]]) -> Result<Matrix<f32>, EngineError> {
    let data: Vec<f32> = rows.iter().flatten().map(|&x| x as f32).collect();
    Matrix::from_vec(rows.len(), FEATURE_COUNT, data)
        .map_err(|e| EngineError::Training(e.to_string()))
}

/// Unit scale for degenerate deviations so inference never divides by zero
fn safe_scale(std: f64) -> f64 {
    if std.is_finite() && std > MIN_SCALE {
        std
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_mean_and_scale() {
        let rows = [[1.0, 0.5, 2.0], [3.0, 0.5, 4.0]];
        let params = Normalizer::fit(&rows).unwrap();

        assert_eq!(params.mean, vec![2.0, 0.5, 3.0]);
        // Same spread in the first and last feature
        assert!((params.scale[0] - params.scale[2]).abs() < 1e-6);
        assert!(params.scale[0] > 0.0);
    }

    #[test]
    fn test_constant_feature_gets_unit_scale() {
        let rows = [[2.0, 1.0, 5.0], [2.0, 0.0, 7.0], [2.0, 1.0, 9.0]];
        let params = Normalizer::fit(&rows).unwrap();

        assert_eq!(params.scale[0], 1.0);
        assert!(params.scale.iter().all(|s| *s > 0.0));

        let z = Normalizer::standardize(&params, &[2.0, 1.0, 9.0]);
        assert_eq!(z[0], 0.0);
        assert!(z.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_standardized_rows_are_centered() {
        let rows = [[0.0, 0.2, 1.0], [4.0, 0.4, 10.0], [8.0, 0.9, 100.0]];
        let params = Normalizer::fit(&rows).unwrap();

        let mut sums = [0.0; FEATURE_COUNT];
        for row in &rows {
            let z = Normalizer::standardize(&params, row);
            for (s, v) in sums.iter_mut().zip(z) {
                *s += v;
            }
        }
        assert!(sums.iter().all(|s| s.abs() < 1e-4), "{sums:?}");
    }

    #[test]
    fn test_missing_parameters_pass_through() {
        let params = NormalizationParams {
            mean: vec![],
            scale: vec![],
        };
        assert_eq!(Normalizer::standardize(&params, &[1.0, 2.0, 3.0]), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_empty_rows() {
        assert!(matches!(Normalizer::fit(&[]), Err(EngineError::Training(_))));
    }

    #[test]
    fn test_matrix_layout() {
        let m = to_matrix(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(m.get(1, 0), 4.0);
        assert_eq!(m.get(0, 2), 3.0);
    }
}
