//! Virtual pet state
//!
//! Each user has one pet whose stats reflect engagement. Partial updates go
//! through an explicit allow-list: only `mood`, `hunger`, `energy` and
//! `affection` may be changed, each checked for type and range.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lower bound for pet stats
pub const STAT_MIN: i64 = 0;

/// Upper bound for pet stats
pub const STAT_MAX: i64 = 100;

/// Starting value for every stat
pub const STAT_DEFAULT: i64 = 50;

pub const DEFAULT_MOOD: &str = "neutral";

/// Stored pet record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetState {
    pub user_id: String,
    pub mood: Option<String>,
    pub hunger: i64,
    pub energy: i64,
    pub affection: i64,
    pub last_updated: DateTime<Utc>,
}

impl PetState {
    /// Fresh pet for a user who has never had one
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            mood: Some(DEFAULT_MOOD.to_string()),
            hunger: STAT_DEFAULT,
            energy: STAT_DEFAULT,
            affection: STAT_DEFAULT,
            last_updated: now,
        }
    }

    /// Apply a validated update. Returns whether any field changed value.
    pub fn apply(&mut self, update: &PetUpdate, now: DateTime<Utc>) -> bool {
        let mut changed = false;

        if let Some(mood) = &update.mood {
            if self.mood.as_ref() != Some(mood) {
                self.mood = Some(mood.clone());
                changed = true;
            }
        }
        for (slot, value) in [
            (&mut self.hunger, update.hunger),
            (&mut self.energy, update.energy),
            (&mut self.affection, update.affection),
        ] {
            if let Some(v) = value {
                if *slot != v {
                    *slot = v;
                    changed = true;
                }
            }
        }

        if changed {
            self.last_updated = now;
        }
        changed
    }
}

/// Allow-listed partial update for a pet.
///
/// Unknown keys and wrongly typed values are rejected when parsing; `null`
/// leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PetUpdate {
    pub mood: Option<String>,
    pub hunger: Option<i64>,
    pub energy: Option<i64>,
    pub affection: Option<i64>,
}

impl PetUpdate {
    /// Parse and validate a JSON object of field updates
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let update: PetUpdate = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidPetUpdate(e.to_string()))?;
        update.validate()?;
        Ok(update)
    }

    /// Check every present stat against the allowed range
    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, value) in [
            ("hunger", self.hunger),
            ("energy", self.energy),
            ("affection", self.affection),
        ] {
            if let Some(stat) = value {
                if !(STAT_MIN..=STAT_MAX).contains(&stat) {
                    return Err(EngineError::InvalidPetUpdate(format!(
                        "{name} must be between {STAT_MIN} and {STAT_MAX}, got {stat}"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self == &PetUpdate::default()
    }
}
