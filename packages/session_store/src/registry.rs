use std::collections::HashMap;

use observable::Slot;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

pub type MessageSlot = Slot<Option<Value>>;

/// Message type → observable slot holding that type's latest payload.
///
/// Slots are created lazily on first request and live as long as the
/// registry. There is no removal.
pub struct MessageTypeRegistry {
    slots: RwLock<HashMap<String, MessageSlot>>,
    update_capacity: usize,
}

impl Default for MessageTypeRegistry {
    fn default() -> Self {
        Self::new(observable::DEFAULT_UPDATE_CAPACITY)
    }
}

impl MessageTypeRegistry {
    pub fn new(update_capacity: usize) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            update_capacity,
        }
    }

    /// The slot for `message_type`, created empty if this is the first request
    pub async fn get_or_create_slot(&self, message_type: &str) -> MessageSlot {
        if let Some(slot) = self.slots.read().await.get(message_type) {
            return slot.clone();
        }

        let mut slots = self.slots.write().await;
        slots
            .entry(message_type.to_string())
            .or_insert_with(|| {
                debug!(message_type, "creating message slot");
                Slot::with_capacity(None, self.update_capacity)
            })
            .clone()
    }

    /// The slot for `message_type` if anyone has asked for it
    pub async fn get(&self, message_type: &str) -> Option<MessageSlot> {
        self.slots.read().await.get(message_type).cloned()
    }

    pub async fn contains(&self, message_type: &str) -> bool {
        self.slots.read().await.contains_key(message_type)
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }

    /// Registered message types, sorted
    pub async fn message_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.slots.read().await.keys().cloned().collect();
        types.sort();
        types
    }
}
