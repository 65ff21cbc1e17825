//! In-memory store

use super::{new_id, Store};
use crate::error::StoreError;
use crate::pet::PetState;
use crate::types::{
    DiaryDraft, DiaryEntry, EventRecord, Group, GroupMembership, Habit, ModelRecord, User,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<String, User>,
    habits: HashMap<String, Habit>,
    /// Keyed by (user_id, habit_id), kept in chronological order
    events: HashMap<(String, String), Vec<EventRecord>>,
    models: HashMap<String, ModelRecord>,
    pets: HashMap<String, PetState>,
    /// Keyed by user, kept in chronological order
    diary: HashMap<String, Vec<DiaryEntry>>,
    groups: HashMap<String, Group>,
    /// In join order
    memberships: Vec<GroupMembership>,
}

/// Store backed by hash maps behind a single `RwLock`
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| StoreError::Poisoned)
    }
}

impl Store for MemoryStore {
    fn create_user(&self, name: &str, style: &str) -> Result<User, StoreError> {
        let user = User {
            id: new_id(),
            name: name.to_string(),
            style: style.to_string(),
            created_at: Utc::now(),
        };
        self.write()?.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.get(user_id).cloned())
    }

    fn update_style(&self, user_id: &str, style: &str) -> Result<Option<User>, StoreError> {
        let mut tables = self.write()?;
        Ok(tables.users.get_mut(user_id).map(|user| {
            user.style = style.to_string();
            user.clone()
        }))
    }

    fn delete_user(&self, user_id: &str) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        let existed = tables.users.remove(user_id).is_some();
        tables.habits.retain(|_, h| h.user_id != user_id);
        tables.events.retain(|(owner, _), _| owner != user_id);
        tables.models.remove(user_id);
        tables.pets.remove(user_id);
        tables.diary.remove(user_id);
        tables.memberships.retain(|m| m.user_id != user_id);
        Ok(existed)
    }

    fn add_habit(
        &self,
        user_id: &str,
        name: &str,
        target_per_day: u32,
    ) -> Result<Habit, StoreError> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(user_id) {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        let habit = Habit {
            id: new_id(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            target_per_day,
            created_at: Utc::now(),
        };
        tables.habits.insert(habit.id.clone(), habit.clone());
        Ok(habit)
    }

    fn get_habit(&self, habit_id: &str) -> Result<Option<Habit>, StoreError> {
        Ok(self.read()?.habits.get(habit_id).cloned())
    }

    fn list_habits(&self, user_id: &str) -> Result<Vec<Habit>, StoreError> {
        let tables = self.read()?;
        let mut habits: Vec<Habit> = tables
            .habits
            .values()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect();
        habits.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(habits)
    }

    fn append_event(
        &self,
        user_id: &str,
        habit_id: &str,
        event: EventRecord,
    ) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        match tables.habits.get(habit_id) {
            Some(habit) if habit.user_id == user_id => {}
            _ => return Err(StoreError::NotFound(format!("habit {habit_id}"))),
        }
        let log = tables
            .events
            .entry((user_id.to_string(), habit_id.to_string()))
            .or_default();
        // Insert after any events with the same timestamp
        let at = log.partition_point(|e| e.timestamp <= event.timestamp);
        log.insert(at, event);
        Ok(())
    }

    fn get_events(&self, user_id: &str, habit_id: &str) -> Result<Vec<EventRecord>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .events
            .get(&(user_id.to_string(), habit_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn get_model(&self, user_id: &str) -> Result<Option<ModelRecord>, StoreError> {
        Ok(self.read()?.models.get(user_id).cloned())
    }

    fn put_model(&self, record: &ModelRecord) -> Result<(), StoreError> {
        self.write()?
            .models
            .insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    fn get_pet_state(&self, user_id: &str) -> Result<Option<PetState>, StoreError> {
        Ok(self.read()?.pets.get(user_id).cloned())
    }

    fn put_pet_state(&self, state: &PetState) -> Result<(), StoreError> {
        self.write()?
            .pets
            .insert(state.user_id.clone(), state.clone());
        Ok(())
    }

    fn add_diary_entry(
        &self,
        user_id: &str,
        draft: &DiaryDraft,
    ) -> Result<DiaryEntry, StoreError> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(user_id) {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        let entry = DiaryEntry {
            id: new_id(),
            user_id: user_id.to_string(),
            title: draft.title.clone(),
            text: draft.text.clone(),
            mood: draft.mood.clone(),
            audio_path: draft.audio_path.clone(),
            created_at: draft.created_at.unwrap_or_else(Utc::now),
        };
        let entries = tables.diary.entry(user_id.to_string()).or_default();
        let at = entries.partition_point(|e| e.created_at <= entry.created_at);
        entries.insert(at, entry.clone());
        Ok(entry)
    }

    fn list_diary_entries(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<DiaryEntry>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .diary
            .get(user_id)
            .map(|entries| entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn create_group(&self, name: &str, description: Option<&str>) -> Result<Group, StoreError> {
        let group = Group {
            id: new_id(),
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: Utc::now(),
        };
        self.write()?.groups.insert(group.id.clone(), group.clone());
        Ok(group)
    }

    fn get_group(&self, group_id: &str) -> Result<Option<Group>, StoreError> {
        Ok(self.read()?.groups.get(group_id).cloned())
    }

    fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        let tables = self.read()?;
        let mut groups: Vec<Group> = tables.groups.values().cloned().collect();
        groups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(groups)
    }

    fn join_group(&self, user_id: &str, group_id: &str) -> Result<GroupMembership, StoreError> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(user_id) {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        if !tables.groups.contains_key(group_id) {
            return Err(StoreError::NotFound(format!("group {group_id}")));
        }
        if let Some(existing) = tables
            .memberships
            .iter()
            .find(|m| m.user_id == user_id && m.group_id == group_id)
        {
            return Ok(existing.clone());
        }
        let membership = GroupMembership {
            id: new_id(),
            group_id: group_id.to_string(),
            user_id: user_id.to_string(),
            joined_at: Utc::now(),
        };
        tables.memberships.push(membership.clone());
        Ok(membership)
    }

    fn list_user_groups(&self, user_id: &str) -> Result<Vec<Group>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| tables.groups.get(&m.group_id).cloned())
            .collect())
    }
}
