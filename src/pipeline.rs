//! Engine orchestration
//!
//! This module provides the public API for the LifeLens engine. It wires the
//! store, trainer, predictor and nudge composer together.
//!
//! Prediction stages:
//! 1. Store - most recent events for the habit (bounded by the query limit)
//! 2. FeatureExtractor - streak, mean success, recency
//! 3. Predictor - trained model if the user has a valid one
//! 4. Heuristic - rule table otherwise, or the cold start constant

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::features::FeatureExtractor;
use crate::heuristic::heuristic_for;
use crate::nudge::{onboarding, NudgeComposer};
use crate::pet::{PetState, PetUpdate};
use crate::predictor::Predictor;
use crate::queue::TrainingQueue;
use crate::store::Store;
use crate::trainer::ModelTrainer;
use crate::types::{
    DiaryDraft, DiaryEntry, EventRecord, Group, GroupMembership, Habit, NudgeResponse, Prediction,
    PredictionSource, User,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Diary entries returned when the caller does not pass a limit
pub const DEFAULT_DIARY_LIMIT: usize = 50;

/// Stateful engine bound to a store and configuration.
///
/// Use `start_background_training` from inside a tokio runtime to retrain
/// after every logged event; without it `log_event` only records the event.
pub struct Engine {
    store: Arc<dyn Store>,
    trainer: Arc<ModelTrainer>,
    composer: NudgeComposer,
    config: EngineConfig,
    queue: Option<TrainingQueue>,
}

impl Engine {
    /// Create an engine over a store. The configuration is validated first.
    pub fn new(store: Arc<dyn Store>, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let trainer = Arc::new(ModelTrainer::new(
            Arc::clone(&store),
            config.training.clone(),
        ));
        let composer = NudgeComposer::from_config(config.nudge.taxonomy, &config.text_generation);

        Ok(Self {
            store,
            trainer,
            composer,
            config,
            queue: None,
        })
    }

    /// Replace the nudge composer (e.g. to plug in a custom generator)
    pub fn with_composer(mut self, composer: NudgeComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn composer(&self) -> &NudgeComposer {
        &self.composer
    }

    // ------------------------------------------------------------------
    // Users and habits
    // ------------------------------------------------------------------

    /// Create a user. The style tag is resolved against the active taxonomy.
    pub fn create_user(&self, name: &str, style: &str) -> Result<User, EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidInput("user name must not be empty".into()));
        }
        let style = self.composer.resolve_style(style);
        Ok(self.store.create_user(name, style.as_str())?)
    }

    pub fn get_user(&self, user_id: &str) -> Result<User, EngineError> {
        self.store
            .get_user(user_id)?
            .ok_or_else(|| EngineError::UserNotFound(user_id.to_string()))
    }

    /// Change a user's nudge style
    pub fn update_style(&self, user_id: &str, style: &str) -> Result<User, EngineError> {
        let style = self.composer.resolve_style(style);
        self.store
            .update_style(user_id, style.as_str())?
            .ok_or_else(|| EngineError::UserNotFound(user_id.to_string()))
    }

    /// Delete a user and everything they own
    pub fn delete_user(&self, user_id: &str) -> Result<(), EngineError> {
        if self.store.delete_user(user_id)? {
            Ok(())
        } else {
            Err(EngineError::UserNotFound(user_id.to_string()))
        }
    }

    pub fn add_habit(
        &self,
        user_id: &str,
        name: &str,
        target_per_day: u32,
    ) -> Result<Habit, EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidInput("habit name must not be empty".into()));
        }
        if target_per_day == 0 {
            return Err(EngineError::InvalidInput(
                "target_per_day must be at least 1".into(),
            ));
        }
        self.get_user(user_id)?;
        Ok(self.store.add_habit(user_id, name, target_per_day)?)
    }

    pub fn list_habits(&self, user_id: &str) -> Result<Vec<Habit>, EngineError> {
        self.get_user(user_id)?;
        Ok(self.store.list_habits(user_id)?)
    }

    /// Habit owned by the user; a habit owned by someone else is not found
    fn owned_habit(&self, user_id: &str, habit_id: &str) -> Result<Habit, EngineError> {
        match self.store.get_habit(habit_id)? {
            Some(habit) if habit.user_id == user_id => Ok(habit),
            _ => Err(EngineError::HabitNotFound(habit_id.to_string())),
        }
    }

    // ------------------------------------------------------------------
    // Logging and training
    // ------------------------------------------------------------------

    /// Record an event stamped now. See [`Engine::log_event_at`].
    pub fn log_event(
        &self,
        user_id: &str,
        habit_id: &str,
        success: bool,
    ) -> Result<EventRecord, EngineError> {
        self.log_event_at(user_id, habit_id, success, Utc::now())
    }

    /// Record an event and, if background training is running, queue a retrain.
    ///
    /// The training outcome is never observed by the caller.
    pub fn log_event_at(
        &self,
        user_id: &str,
        habit_id: &str,
        success: bool,
        timestamp: DateTime<Utc>,
    ) -> Result<EventRecord, EngineError> {
        self.get_user(user_id)?;
        self.owned_habit(user_id, habit_id)?;

        let event = EventRecord::new(timestamp, success);
        self.store.append_event(user_id, habit_id, event)?;

        if let Some(queue) = &self.queue {
            if !queue.submit(user_id) {
                log::warn!("training queue closed, skipping retrain for user {user_id}");
            }
        }
        Ok(event)
    }

    /// Train the user's model from their last 14 days of events.
    ///
    /// Returns `Ok(false)` when there are not enough samples.
    pub fn extract_and_train(&self, user_id: &str) -> Result<bool, EngineError> {
        self.trainer.train(user_id)
    }

    pub fn train_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<bool, EngineError> {
        self.trainer.train_at(user_id, now)
    }

    /// Start the background training worker. Must be called inside a tokio
    /// runtime. Calling it twice keeps the existing worker.
    pub fn start_background_training(&mut self) {
        if self.queue.is_none() {
            self.queue = Some(TrainingQueue::spawn(Arc::clone(&self.trainer)));
        }
    }

    /// Stop the background worker after draining queued jobs
    pub async fn shutdown(&mut self) {
        if let Some(queue) = self.queue.take() {
            let completed = queue.shutdown().await;
            log::debug!("training queue drained after {completed} jobs");
        }
    }

    // ------------------------------------------------------------------
    // Prediction and nudges
    // ------------------------------------------------------------------

    /// Predict continued engagement for a habit as of now
    pub fn predict(&self, user_id: &str, habit_id: &str) -> Result<Prediction, EngineError> {
        self.predict_at(user_id, habit_id, Utc::now())
    }

    /// Predict continued engagement for a habit as of `now`.
    ///
    /// # Errors
    /// `UserNotFound` / `HabitNotFound` for unknown ids. A missing or malformed
    /// model is not an error: the heuristic is used instead.
    pub fn predict_at(
        &self,
        user_id: &str,
        habit_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Prediction, EngineError> {
        self.get_user(user_id)?;
        self.owned_habit(user_id, habit_id)?;

        let events = self
            .store
            .recent_events(user_id, habit_id, self.config.inference.query_limit)?;

        let features = FeatureExtractor::extract(&events, now);

        if let Some(features) = &features {
            if let Some(predictor) = Predictor::load(self.store.as_ref(), user_id)? {
                if let Some(probability) = predictor.predict(features) {
                    return Ok(Prediction {
                        probability,
                        used_trained_model: true,
                        source: PredictionSource::Trained,
                        features: Some(*features),
                    });
                }
                log::warn!("trained model for user {user_id} produced a non-finite probability");
            }
        }

        let source = if features.is_some() {
            PredictionSource::Heuristic
        } else {
            PredictionSource::ColdStart
        };
        Ok(Prediction {
            probability: heuristic_for(features.as_ref()),
            used_trained_model: false,
            source,
            features,
        })
    }

    /// Compose a nudge for a habit name, probability and style tag
    pub async fn nudge(&self, habit_name: &str, probability: f64, style: &str) -> String {
        self.composer.compose(habit_name, probability, style).await
    }

    /// Predict, then compose a nudge in the user's stored style. A habit with
    /// no events gets the onboarding message instead.
    pub async fn predict_and_nudge(
        &self,
        user_id: &str,
        habit_id: &str,
    ) -> Result<NudgeResponse, EngineError> {
        let user = self.get_user(user_id)?;
        let habit = self.owned_habit(user_id, habit_id)?;
        let prediction = self.predict(user_id, habit_id)?;

        let style = self.composer.resolve_style(&user.style);
        let message = if prediction.source == PredictionSource::ColdStart {
            onboarding(&habit.name)
        } else {
            self.composer
                .compose(&habit.name, prediction.probability, style.as_str())
                .await
        };

        Ok(NudgeResponse {
            message,
            probability: prediction.probability,
            style_used: style.as_str().to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Diary and groups
    // ------------------------------------------------------------------

    /// Write a diary entry. At least one of title, text or audio is required.
    pub fn add_diary_entry(
        &self,
        user_id: &str,
        draft: &DiaryDraft,
    ) -> Result<DiaryEntry, EngineError> {
        if draft.is_blank() {
            return Err(EngineError::InvalidInput(
                "diary entry needs a title, text or audio".into(),
            ));
        }
        self.get_user(user_id)?;
        Ok(self.store.add_diary_entry(user_id, draft)?)
    }

    /// The user's newest diary entries, newest first
    pub fn list_diary_entries(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<DiaryEntry>, EngineError> {
        self.get_user(user_id)?;
        Ok(self.store.list_diary_entries(user_id, limit)?)
    }

    pub fn create_group(&self, name: &str, description: Option<&str>) -> Result<Group, EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidInput("group name must not be empty".into()));
        }
        let description = description.map(str::trim).filter(|d| !d.is_empty());
        Ok(self.store.create_group(name, description)?)
    }

    pub fn list_groups(&self) -> Result<Vec<Group>, EngineError> {
        Ok(self.store.list_groups()?)
    }

    /// Join a group; joining a group twice is not an error
    pub fn join_group(&self, user_id: &str, group_id: &str) -> Result<GroupMembership, EngineError> {
        self.get_user(user_id)?;
        if self.store.get_group(group_id)?.is_none() {
            return Err(EngineError::GroupNotFound(group_id.to_string()));
        }
        Ok(self.store.join_group(user_id, group_id)?)
    }

    pub fn list_user_groups(&self, user_id: &str) -> Result<Vec<Group>, EngineError> {
        self.get_user(user_id)?;
        Ok(self.store.list_user_groups(user_id)?)
    }

    // ------------------------------------------------------------------
    // Pet
    // ------------------------------------------------------------------

    /// The user's pet, created with default stats on first access
    pub fn pet(&self, user_id: &str) -> Result<PetState, EngineError> {
        self.get_user(user_id)?;
        if let Some(pet) = self.store.get_pet_state(user_id)? {
            return Ok(pet);
        }
        let pet = PetState::new(user_id, Utc::now());
        self.store.put_pet_state(&pet)?;
        Ok(pet)
    }

    /// Apply an allow-listed update to the user's pet
    pub fn update_pet(&self, user_id: &str, update: &PetUpdate) -> Result<PetState, EngineError> {
        update.validate()?;
        let mut pet = self.pet(user_id)?;
        if pet.apply(update, Utc::now()) {
            self.store.put_pet_state(&pet)?;
        }
        Ok(pet)
    }
}
