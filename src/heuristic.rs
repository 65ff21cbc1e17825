//! Fallback heuristic
//!
//! Rule table used whenever no trained model is available for a user.

use crate::types::FeatureVector;

/// Probability for a habit with no logged events
pub const COLD_START_PROBABILITY: f64 = 0.5;

/// Strong engagement: high success rate with a running streak
pub const HIGH_PROBABILITY: f64 = 0.85;

/// Moderate engagement
pub const MEDIUM_PROBABILITY: f64 = 0.55;

/// Weak engagement
pub const LOW_PROBABILITY: f64 = 0.25;

/// Map success rate and streak to a coarse probability bucket
pub fn heuristic(mean_success: f64, streak: u32) -> f64 {
    if mean_success > 0.6 && streak >= 2 {
        HIGH_PROBABILITY
    } else if mean_success > 0.4 {
        MEDIUM_PROBABILITY
    } else {
        LOW_PROBABILITY
    }
}

/// Heuristic over optional features; `None` is a cold start
pub fn heuristic_for(features: Option<&FeatureVector>) -> f64 {
    match features {
        Some(f) => heuristic(f.mean_success, f.streak),
        None => COLD_START_PROBABILITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_table() {
        assert_eq!(heuristic(0.8, 3), 0.85);
        assert_eq!(heuristic(0.5, 0), 0.55);
        assert_eq!(heuristic(0.1, 0), 0.25);
    }

    #[test]
    fn test_boundaries_are_strict() {
        // Exactly 0.6 is not "above 0.6"
        assert_eq!(heuristic(0.6, 5), 0.55);
        // High success rate without a streak is only medium
        assert_eq!(heuristic(0.9, 1), 0.55);
        assert_eq!(heuristic(0.4, 10), 0.25);
    }

    #[test]
    fn test_cold_start() {
        assert_eq!(heuristic_for(None), 0.5);

        let features = FeatureVector {
            streak: 3,
            mean_success: 0.8,
            recency_hours: 1.0,
        };
        assert_eq!(heuristic_for(Some(&features)), 0.85);
    }

    #[test]
    fn test_total_over_odd_inputs() {
        assert_eq!(heuristic(f64::NAN, 4), 0.25);
        assert_eq!(heuristic(-1.0, 0), 0.25);
    }
}
