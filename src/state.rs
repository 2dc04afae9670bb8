use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use teloxide::types::User;

use crate::db::database::Database;
use crate::form::FormState;
use crate::schema::Schema;

#[derive(Debug, Clone)]
pub struct Requester {
    pub id: i64,
    pub username: Option<String>,
    pub full_name: String,
}

impl Requester {
    pub fn from_user(user: &User) -> Self {
        Requester {
            id: i64::try_from(user.id.0).unwrap_or_default(),
            username: user.username.clone(),
            full_name: user.full_name(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PendingImageRequest {
    pub requester: Requester,
    pub chat_id: i64,
    pub message_id: i64,
    pub selection_message_id: i64,
    pub form: FormState,
}

// One in-flight generation per user; the guard releases the slot on drop.
#[derive(Clone, Default)]
pub struct GenerationSlots {
    active: Arc<Mutex<HashSet<i64>>>,
}

impl GenerationSlots {
    pub fn try_acquire(&self, user_id: i64) -> Option<GenerationGuard> {
        if !self.active.lock().insert(user_id) {
            return None;
        }
        Some(GenerationGuard {
            active: Arc::clone(&self.active),
            user_id,
        })
    }
}

pub struct GenerationGuard {
    active: Arc<Mutex<HashSet<i64>>>,
    user_id: i64,
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.user_id);
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub schema: Arc<Schema>,
    pub pending_image_requests: Arc<Mutex<HashMap<String, PendingImageRequest>>>,
    pub generation_slots: GenerationSlots,
}

impl AppState {
    pub fn new(db: Database, schema: Schema) -> Self {
        AppState {
            db,
            schema: Arc::new(schema),
            pending_image_requests: Arc::new(Mutex::new(HashMap::new())),
            generation_slots: GenerationSlots::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_is_exclusive_per_user_until_released() {
        let slots = GenerationSlots::default();

        let guard = slots.try_acquire(7).expect("first acquire succeeds");
        assert!(slots.try_acquire(7).is_none(), "double submission is rejected");
        assert!(slots.try_acquire(8).is_some(), "other users are unaffected");

        drop(guard);
        assert!(slots.try_acquire(7).is_some(), "slot frees on drop");
    }
}
