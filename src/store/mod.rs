//! Storage collaborators
//!
//! The engine reads event logs and model records through the `Store` trait and
//! writes model records back through it. The same trait carries the account
//! records around them: users, habits, pets, diary entries and groups. Two implementations are provided:
//! an in-memory store for tests and embedding, and a SQLite store.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::StoreError;
use crate::pet::PetState;
use crate::types::{
    DiaryDraft, DiaryEntry, EventRecord, Group, GroupMembership, Habit, ModelRecord, User,
};
use uuid::Uuid;

/// Row store used by the engine
///
/// Event lists are always returned in chronological order. `put_model`
/// replaces the user's record in a single write.
pub trait Store: Send + Sync {
    fn create_user(&self, name: &str, style: &str) -> Result<User, StoreError>;

    fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError>;

    /// Change a user's nudge style; `Ok(None)` if the user does not exist
    fn update_style(&self, user_id: &str, style: &str) -> Result<Option<User>, StoreError>;

    /// Delete a user with their habits, events, model, pet, diary entries and
    /// group memberships. Returns whether the user existed.
    fn delete_user(&self, user_id: &str) -> Result<bool, StoreError>;

    fn add_habit(&self, user_id: &str, name: &str, target_per_day: u32)
        -> Result<Habit, StoreError>;

    fn get_habit(&self, habit_id: &str) -> Result<Option<Habit>, StoreError>;

    fn list_habits(&self, user_id: &str) -> Result<Vec<Habit>, StoreError>;

    fn append_event(
        &self,
        user_id: &str,
        habit_id: &str,
        event: EventRecord,
    ) -> Result<(), StoreError>;

    /// Full event history for a (user, habit) pair
    fn get_events(&self, user_id: &str, habit_id: &str) -> Result<Vec<EventRecord>, StoreError>;

    /// The `limit` most recent events, still in chronological order
    fn recent_events(
        &self,
        user_id: &str,
        habit_id: &str,
        limit: usize,
    ) -> Result<Vec<EventRecord>, StoreError> {
        let mut events = self.get_events(user_id, habit_id)?;
        if events.len() > limit {
            events.drain(..events.len() - limit);
        }
        Ok(events)
    }

    fn get_model(&self, user_id: &str) -> Result<Option<ModelRecord>, StoreError>;

    fn put_model(&self, record: &ModelRecord) -> Result<(), StoreError>;

    fn get_pet_state(&self, user_id: &str) -> Result<Option<PetState>, StoreError>;

    fn put_pet_state(&self, state: &PetState) -> Result<(), StoreError>;

    /// Store a diary entry for an existing user
    fn add_diary_entry(&self, user_id: &str, draft: &DiaryDraft)
        -> Result<DiaryEntry, StoreError>;

    /// The user's `limit` newest diary entries, newest first
    fn list_diary_entries(&self, user_id: &str, limit: usize)
        -> Result<Vec<DiaryEntry>, StoreError>;

    fn create_group(&self, name: &str, description: Option<&str>) -> Result<Group, StoreError>;

    fn get_group(&self, group_id: &str) -> Result<Option<Group>, StoreError>;

    /// All groups, newest first
    fn list_groups(&self) -> Result<Vec<Group>, StoreError>;

    /// Add a user to a group. Joining twice returns the existing membership.
    fn join_group(&self, user_id: &str, group_id: &str) -> Result<GroupMembership, StoreError>;

    /// Groups the user belongs to, in the order they were joined
    fn list_user_groups(&self, user_id: &str) -> Result<Vec<Group>, StoreError>;
}

/// Fresh identifier for stored records
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}
