//! Core types for the LifeLens engine
//!
//! This module defines the records that flow through each stage of the engine:
//! logged events, derived features, fitted model parameters and the outputs
//! handed back to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of engineered features per habit
pub const FEATURE_COUNT: usize = 3;

/// A single logged success/failure for a (user, habit) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// When the event was logged (UTC)
    pub timestamp: DateTime<Utc>,
    /// Whether the habit was completed
    pub success: bool,
}

impl EventRecord {
    pub fn new(timestamp: DateTime<Utc>, success: bool) -> Self {
        Self { timestamp, success }
    }
}

/// Engineered features for one habit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Consecutive trailing successes
    pub streak: u32,
    /// Mean of the binary outcomes (0-1)
    pub mean_success: f64,
    /// Hours since the most recent event
    pub recency_hours: f64,
}

impl FeatureVector {
    /// Features in model order: streak, mean success, recency
    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [self.streak as f64, self.mean_success, self.recency_hours]
    }
}

/// Training row: features plus the continued-engagement label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub features: FeatureVector,
    pub label: bool,
}

/// Per-feature standardization parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Linear decision boundary in standardized feature space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeparatorParams {
    pub weights: Vec<f64>,
    pub bias: f64,
}

/// Per-user trained model, replaced wholesale on every retrain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub user_id: String,
    pub normalization: NormalizationParams,
    pub separator: SeparatorParams,
    pub trained_at: DateTime<Utc>,
}

impl ModelRecord {
    /// Load a model record from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the model record to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Tone used when composing nudges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunicationStyle {
    Encourager,
    Mentor,
    Challenger,
    Neutral,
    Storyteller,
    Musician,
}

impl CommunicationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommunicationStyle::Encourager => "encourager",
            CommunicationStyle::Mentor => "mentor",
            CommunicationStyle::Challenger => "challenger",
            CommunicationStyle::Neutral => "neutral",
            CommunicationStyle::Storyteller => "storyteller",
            CommunicationStyle::Musician => "musician",
        }
    }

    /// Parse a raw tag, ignoring case and surrounding whitespace
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "encourager" => Some(CommunicationStyle::Encourager),
            "mentor" => Some(CommunicationStyle::Mentor),
            "challenger" => Some(CommunicationStyle::Challenger),
            "neutral" => Some(CommunicationStyle::Neutral),
            "storyteller" => Some(CommunicationStyle::Storyteller),
            "musician" => Some(CommunicationStyle::Musician),
            _ => None,
        }
    }
}

/// The set of style tags a deployment recognises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleTaxonomy {
    /// encourager | mentor | challenger
    #[default]
    Coach,
    /// neutral | storyteller | musician
    Persona,
}

impl StyleTaxonomy {
    pub fn default_style(&self) -> CommunicationStyle {
        match self {
            StyleTaxonomy::Coach => CommunicationStyle::Encourager,
            StyleTaxonomy::Persona => CommunicationStyle::Neutral,
        }
    }

    pub fn styles(&self) -> &'static [CommunicationStyle] {
        match self {
            StyleTaxonomy::Coach => &[
                CommunicationStyle::Encourager,
                CommunicationStyle::Mentor,
                CommunicationStyle::Challenger,
            ],
            StyleTaxonomy::Persona => &[
                CommunicationStyle::Neutral,
                CommunicationStyle::Storyteller,
                CommunicationStyle::Musician,
            ],
        }
    }

    /// Resolve a raw tag; anything outside this taxonomy maps to its default
    pub fn resolve(&self, tag: &str) -> CommunicationStyle {
        CommunicationStyle::parse(tag)
            .filter(|style| self.styles().contains(style))
            .unwrap_or_else(|| self.default_style())
    }
}

/// Account owning habits and a preferred nudge style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub style: String,
    pub created_at: DateTime<Utc>,
}

/// A habit tracked by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub target_per_day: u32,
    pub created_at: DateTime<Utc>,
}

/// Journal entry written by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub text: Option<String>,
    pub mood: Option<String>,
    /// Path or URL of an attached voice note
    pub audio_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when writing a diary entry; `created_at` defaults to now
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiaryDraft {
    pub title: Option<String>,
    pub text: Option<String>,
    pub mood: Option<String>,
    pub audio_path: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl DiaryDraft {
    /// True when there is no title, text or audio to store
    pub fn is_blank(&self) -> bool {
        [&self.title, &self.text, &self.audio_path]
            .iter()
            .all(|field| field.as_deref().map_or(true, |v| v.trim().is_empty()))
    }
}

/// Social group users can join
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A user's membership in a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub id: String,
    pub group_id: String,
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
}

/// Where a prediction came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    Trained,
    Heuristic,
    ColdStart,
}

/// Continued-engagement estimate for a habit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Probability the user keeps up the habit (0-1)
    pub probability: f64,
    pub used_trained_model: bool,
    pub source: PredictionSource,
    /// Features the estimate was computed from (absent on cold start)
    pub features: Option<FeatureVector>,
}

/// Combined prediction and nudge for a habit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NudgeResponse {
    pub message: String,
    pub probability: f64,
    pub style_used: String,
}
