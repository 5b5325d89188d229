//! Room persistence.
//!
//! Rooms are stored as whole documents tagged with a version. Writers hand
//! back the version they read; a mismatch means somebody else committed in
//! between and the write is refused with [`StoreError::Conflict`].

use crate::types::{Room, RoomId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("room {0} was changed by another writer")]
    Conflict(RoomId),

    #[error("room {0} not found")]
    NotFound(RoomId),

    #[error("storage backend failed: {0}")]
    Backend(String),
}

/// A stored room and the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned {
    pub version: u64,
    pub room: Room,
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Load a room by id
    async fn get(&self, room_id: &str) -> StoreResult<Option<Versioned>>;

    /// Insert a room; fails with `Conflict` if the id is taken
    async fn create(&self, room: Room) -> StoreResult<Versioned>;

    /// Overwrite a room that is still at `expected_version`
    async fn replace(&self, room: Room, expected_version: u64) -> StoreResult<Versioned>;

    /// Remove a room that is still at `expected_version`
    async fn delete(&self, room_id: &str, expected_version: u64) -> StoreResult<()>;

    /// Snapshot of every stored room
    async fn list(&self) -> StoreResult<Vec<Versioned>>;
}

/// In-process store backed by a map
#[derive(Debug, Clone, Default)]
pub struct MemoryRoomStore {
    rooms: Arc<RwLock<HashMap<RoomId, Versioned>>>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn get(&self, room_id: &str) -> StoreResult<Option<Versioned>> {
        Ok(self.rooms.read().await.get(room_id).cloned())
    }

    async fn create(&self, room: Room) -> StoreResult<Versioned> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room.room_id) {
            return Err(StoreError::Conflict(room.room_id));
        }

        let stored = Versioned { version: 1, room };
        rooms.insert(stored.room.room_id.clone(), stored.clone());
        Ok(stored)
    }

    async fn replace(&self, room: Room, expected_version: u64) -> StoreResult<Versioned> {
        let mut rooms = self.rooms.write().await;
        let current = rooms
            .get_mut(&room.room_id)
            .ok_or_else(|| StoreError::Conflict(room.room_id.clone()))?;
        if current.version != expected_version {
            return Err(StoreError::Conflict(room.room_id));
        }

        current.version += 1;
        current.room = room;
        Ok(current.clone())
    }

    async fn delete(&self, room_id: &str, expected_version: u64) -> StoreResult<()> {
        let mut rooms = self.rooms.write().await;
        match rooms.get(room_id) {
            Some(current) if current.version == expected_version => {
                rooms.remove(room_id);
                Ok(())
            }
            Some(_) => Err(StoreError::Conflict(room_id.to_string())),
            None => Err(StoreError::NotFound(room_id.to_string())),
        }
    }

    async fn list(&self) -> StoreResult<Vec<Versioned>> {
        Ok(self.rooms.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryRoomStore::new();
        assert!(store.get("r1").await.unwrap().is_none());

        let stored = store.create(Room::new("r1", "alice")).await.unwrap();
        assert_eq!(stored.version, 1);

        let loaded = store.get("r1").await.unwrap().unwrap();
        assert_eq!(loaded, stored);
    }

    #[tokio::test]
    async fn test_create_existing_id_conflicts() {
        let store = MemoryRoomStore::new();
        store.create(Room::new("r1", "alice")).await.unwrap();

        let result = store.create(Room::new("r1", "bob")).await;
        assert_eq!(result, Err(StoreError::Conflict("r1".to_string())));

        // First creator wins
        let loaded = store.get("r1").await.unwrap().unwrap();
        assert_eq!(loaded.room.users[0].name, "alice");
    }

    #[tokio::test]
    async fn test_replace_bumps_version() {
        let store = MemoryRoomStore::new();
        let stored = store.create(Room::new("r1", "alice")).await.unwrap();

        let mut room = stored.room.clone();
        room.anti_count = 1;
        let replaced = store.replace(room, stored.version).await.unwrap();

        assert_eq!(replaced.version, 2);
        assert_eq!(store.get("r1").await.unwrap().unwrap().room.anti_count, 1);
    }

    #[tokio::test]
    async fn test_stale_replace_is_rejected() {
        let store = MemoryRoomStore::new();
        let stored = store.create(Room::new("r1", "alice")).await.unwrap();

        let mut first = stored.room.clone();
        first.anti_count = 1;
        store.replace(first, stored.version).await.unwrap();

        let mut second = stored.room.clone();
        second.blank_count = 1;
        let result = store.replace(second, stored.version).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let loaded = store.get("r1").await.unwrap().unwrap();
        assert_eq!(loaded.room.anti_count, 1);
        assert_eq!(loaded.room.blank_count, 0);
    }

    #[tokio::test]
    async fn test_replace_missing_room_conflicts() {
        let store = MemoryRoomStore::new();
        let result = store.replace(Room::new("gone", "alice"), 1).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_delete_checks_version() {
        let store = MemoryRoomStore::new();
        let stored = store.create(Room::new("r1", "alice")).await.unwrap();

        assert!(matches!(
            store.delete("r1", stored.version + 1).await,
            Err(StoreError::Conflict(_))
        ));
        store.delete("r1", stored.version).await.unwrap();
        assert!(store.is_empty().await);
        assert!(matches!(
            store.delete("r1", stored.version).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_returns_all_rooms() {
        let store = MemoryRoomStore::new();
        store.create(Room::new("r1", "alice")).await.unwrap();
        store.create(Room::new("r2", "bob")).await.unwrap();

        let mut ids: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.room.room_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["r1", "r2"]);
        assert_eq!(store.len().await, 2);
    }
}
