//! LifeLens Engine - Adaptive engagement prediction for habit tracking
//!
//! The engine turns habit event logs into a probability that the user keeps up
//! each habit, and that probability into a short motivational nudge:
//! feature extraction → per-user logistic model (or heuristic fallback) →
//! style-aware nudge composition.
//!
//! ## Modules
//!
//! - **Prediction**: feature extraction, training, inference and the fallback heuristic
//! - **Nudges**: tone tiers, style clauses and an optional external text generator
//! - **Storage**: `Store` trait with in-memory and SQLite implementations
//! - **Accounts**: users, habits, the virtual pet, diary entries and groups

pub mod config;
pub mod error;
pub mod features;
pub mod heuristic;
pub mod logistic;
pub mod normalizer;
pub mod nudge;
pub mod pet;
pub mod pipeline;
pub mod predictor;
pub mod queue;
pub mod store;
pub mod trainer;
pub mod types;

pub use config::{EngineConfig, TextGenerationConfig, TrainingConfig};
pub use error::{EngineError, GenerationError, StoreError};
pub use nudge::{NudgeComposer, TextGenerator};
pub use pet::{PetState, PetUpdate};
pub use pipeline::Engine;
pub use predictor::Predictor;
pub use store::{MemoryStore, SqliteStore, Store};
pub use trainer::ModelTrainer;
pub use types::{
    CommunicationStyle, DiaryDraft, DiaryEntry, EventRecord, FeatureVector, Group,
    GroupMembership, Habit, ModelRecord, NudgeResponse, Prediction, PredictionSource,
    StyleTaxonomy, User,
};

/// Engine version reported by the CLI
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
