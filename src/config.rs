//! Engine configuration
//!
//! All knobs are plain data handed to constructors; nothing here is read from
//! the environment at call time. `TextGenerationConfig::from_env` exists for
//! process edges such as the CLI.

use crate::error::EngineError;
use crate::types::StyleTaxonomy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default trailing window for training extraction, in days
pub const DEFAULT_TRAINING_WINDOW_DAYS: i64 = 14;

/// Default horizon for the continued-engagement label, in hours
pub const DEFAULT_LABEL_HORIZON_HOURS: f64 = 24.0;

/// Default minimum number of training rows
pub const DEFAULT_MIN_SAMPLES: usize = 5;

/// Default number of most recent events read for inference
pub const DEFAULT_INFERENCE_QUERY_LIMIT: usize = 200;

/// Default OpenAI-compatible chat completions endpoint
pub const DEFAULT_TEXT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default chat model
pub const DEFAULT_TEXT_MODEL: &str = "gpt-4o-mini";

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub training: TrainingConfig,
    pub inference: InferenceConfig,
    pub nudge: NudgeConfig,
    pub text_generation: TextGenerationConfig,
}

impl EngineConfig {
    /// Parse configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let json = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_training(mut self, training: TrainingConfig) -> Self {
        self.training = training;
        self
    }

    pub fn with_taxonomy(mut self, taxonomy: StyleTaxonomy) -> Self {
        self.nudge.taxonomy = taxonomy;
        self
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), EngineError> {
        let t = &self.training;
        if t.min_samples == 0 {
            return Err(EngineError::Config("training.min_samples must be at least 1".into()));
        }
        if t.window_days <= 0 {
            return Err(EngineError::Config("training.window_days must be positive".into()));
        }
        if !(t.learning_rate.is_finite() && t.learning_rate > 0.0) {
            return Err(EngineError::Config(
                "training.learning_rate must be a positive number".into(),
            ));
        }
        if t.max_iter == 0 {
            return Err(EngineError::Config("training.max_iter must be at least 1".into()));
        }
        if self.inference.query_limit == 0 {
            return Err(EngineError::Config("inference.query_limit must be at least 1".into()));
        }
        if self.text_generation.timeout_secs == 0 {
            return Err(EngineError::Config(
                "text_generation.timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Training extraction and optimizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Minimum rows before a model is fitted
    pub min_samples: usize,
    /// Trailing window for training extraction (days)
    pub window_days: i64,
    /// Label horizon: last event within this many hours counts as engaged
    pub label_horizon_hours: f64,
    /// Gradient descent step size
    pub learning_rate: f64,
    /// Maximum gradient descent iterations
    pub max_iter: usize,
    /// Convergence tolerance handed to the optimizer
    pub tolerance: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_samples: DEFAULT_MIN_SAMPLES,
            window_days: DEFAULT_TRAINING_WINDOW_DAYS,
            label_horizon_hours: DEFAULT_LABEL_HORIZON_HOURS,
            learning_rate: 0.5,
            max_iter: 200,
            tolerance: 1e-6,
        }
    }
}

impl TrainingConfig {
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

}

/// Inference read settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Most recent events read per habit when predicting
    pub query_limit: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            query_limit: DEFAULT_INFERENCE_QUERY_LIMIT,
        }
    }
}

/// Nudge composition settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NudgeConfig {
    /// Style tags recognised by this deployment
    pub taxonomy: StyleTaxonomy,
}

/// External text generator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextGenerationConfig {
    pub enabled: bool,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for TextGenerationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: DEFAULT_TEXT_ENDPOINT.to_string(),
            api_key: None,
            model: DEFAULT_TEXT_MODEL.to_string(),
            timeout_secs: 10,
            max_tokens: 120,
            temperature: 0.7,
        }
    }
}

impl TextGenerationConfig {
    /// Generation is usable only when enabled and a non-empty key is present
    pub fn is_usable(&self) -> bool {
        self.enabled
            && self
                .api_key
                .as_deref()
                .map(|k| !k.trim().is_empty())
                .unwrap_or(false)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build from process environment. Enabled iff an API key is found.
    ///
    /// Reads `LIFELENS_OPENAI_API_KEY` (falling back to `OPENAI_API_KEY`),
    /// `OPENAI_MODEL` and `LIFELENS_TEXT_ENDPOINT`.
    pub fn from_env() -> Self {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = read("LIFELENS_OPENAI_API_KEY").or_else(|| read("OPENAI_API_KEY"));
        let mut config = Self {
            enabled: api_key.is_some(),
            api_key,
            ..Self::default()
        };
        if let Some(model) = read("OPENAI_MODEL") {
            config.model = model;
        }
        if let Some(endpoint) = read("LIFELENS_TEXT_ENDPOINT") {
            config.endpoint = endpoint;
        }
        config
    }
}
