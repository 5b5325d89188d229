mod room;
pub mod session;

use crate::broadcast::RoomBroadcaster;
use crate::corpus::{MemoryCorpus, WordCorpus};
use crate::game::{GameError, GameResult, Outcome, Transition};
use crate::protocol::RoomEvent;
use crate::store::{MemoryRoomStore, RoomStore, StoreError};
use crate::types::*;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub use session::{Caller, SessionStore};

/// How many times a conflicting read-modify-write is retried by default
pub const DEFAULT_COMMIT_ATTEMPTS: u32 = 5;

fn is_stale(room: &Room, cutoff: DateTime<Utc>) -> bool {
    room.last_updated.is_some_and(|t| t < cutoff)
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RoomStore>,
    pub corpus: Arc<dyn WordCorpus>,
    /// Fan-out of room events to subscribed sockets
    pub broadcaster: RoomBroadcaster,
    pub sessions: SessionStore,
    /// One mutex per room id; serializes load -> transition -> persist -> publish
    room_locks: Arc<Mutex<HashMap<RoomId, Arc<Mutex<()>>>>>,
    commit_attempts: u32,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RoomStore>,
        corpus: Arc<dyn WordCorpus>,
        broadcaster: RoomBroadcaster,
    ) -> Self {
        Self {
            store,
            corpus,
            broadcaster,
            sessions: SessionStore::new(),
            room_locks: Arc::new(Mutex::new(HashMap::new())),
            commit_attempts: DEFAULT_COMMIT_ATTEMPTS,
        }
    }

    /// Everything in memory, with the given word pairs
    pub fn in_memory(corpus: MemoryCorpus) -> Self {
        Self::new(
            Arc::new(MemoryRoomStore::new()),
            Arc::new(corpus),
            RoomBroadcaster::default(),
        )
    }

    pub fn with_commit_attempts(mut self, attempts: u32) -> Self {
        self.commit_attempts = attempts.max(1);
        self
    }

    async fn room_lock(&self, room_id: &str) -> Arc<Mutex<()>> {
        self.room_locks
            .lock()
            .await
            .entry(room_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the map entry for `lock` once nobody else holds or awaits it
    async fn release_lock(&self, room_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.room_locks.lock().await;
        let idle = locks
            .get(room_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, &lock) && Arc::strong_count(&lock) == 2);
        // Let go of our handle while the map is locked so the next releaser
        // sees an accurate count
        drop(lock);
        if idle {
            locks.remove(room_id);
        }
    }

    async fn forget_room(&self, room_id: &str) {
        self.broadcaster.close(room_id).await;
        self.sessions.close_room(room_id).await;
        self.room_locks.lock().await.remove(room_id);
    }

    #[cfg(test)]
    async fn lock_count(&self) -> usize {
        self.room_locks.lock().await.len()
    }

    /// Run one action against `room_id` as a single read-modify-write.
    ///
    /// The room lock keeps same-room actions from interleaving and keeps
    /// events in commit order. Store conflicts (a writer that bypassed the
    /// lock) re-run the whole cycle on a fresh snapshot. Nothing is published
    /// unless the write succeeded.
    pub async fn commit<F>(&self, room_id: &str, apply: F) -> GameResult<RoomEvent>
    where
        F: FnMut(Option<&Room>) -> GameResult<Transition> + Send,
    {
        let lock = self.room_lock(room_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.commit_locked(room_id, apply).await
        };
        self.release_lock(room_id, lock).await;
        result
    }

    async fn commit_locked<F>(&self, room_id: &str, mut apply: F) -> GameResult<RoomEvent>
    where
        F: FnMut(Option<&Room>) -> GameResult<Transition> + Send,
    {
        for attempt in 1..=self.commit_attempts {
            let current = self.store.get(room_id).await?;
            let Transition { outcome, event } = apply(current.as_ref().map(|v| &v.room))?;
            let version = current.as_ref().map(|v| v.version);

            let written = match (outcome, version) {
                (Outcome::Create(room), _) => self.store.create(room).await.map(|_| false),
                (Outcome::Replace(room), Some(version)) => {
                    self.store.replace(room, version).await.map(|_| false)
                }
                (Outcome::Delete(room), Some(version)) => {
                    self.store.delete(&room.room_id, version).await.map(|_| true)
                }
                (_, None) => Err(StoreError::NotFound(room_id.to_string())),
            };

            match written {
                Ok(deleted) => {
                    self.broadcaster.publish(room_id, event.clone()).await;
                    if deleted {
                        self.forget_room(room_id).await;
                    }
                    return Ok(event);
                }
                Err(StoreError::Conflict(_)) | Err(StoreError::NotFound(_)) => {
                    tracing::debug!(room_id, attempt, "Room changed underneath us, retrying");
                }
                Err(e) => {
                    tracing::error!(room_id, "Failed to persist room: {}", e);
                    return Err(e.into());
                }
            }
        }

        tracing::warn!(
            room_id,
            attempts = self.commit_attempts,
            "Giving up after repeated write conflicts"
        );
        Err(GameError::PersistenceConflict)
    }

    /// Like [`commit`](Self::commit) for actions that need an existing room
    pub async fn commit_existing<F>(&self, room_id: &str, mut apply: F) -> GameResult<RoomEvent>
    where
        F: FnMut(&Room) -> GameResult<Transition> + Send,
    {
        self.commit(room_id, |room| apply(room.ok_or(GameError::RoomNotFound)?))
            .await
    }

    pub async fn get_room(&self, room_id: &str) -> GameResult<Room> {
        self.store
            .get(room_id)
            .await?
            .map(|v| v.room)
            .ok_or(GameError::RoomNotFound)
    }

    /// Delete every room whose last update is older than `ttl`
    pub async fn sweep_stale_rooms(&self, ttl: std::time::Duration) -> GameResult<usize> {
        let Some(cutoff) = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
        else {
            return Ok(0);
        };
        let mut removed = 0;
        for candidate in self.store.list().await? {
            if !is_stale(&candidate.room, cutoff) {
                continue;
            }
            let room_id = candidate.room.room_id;

            let lock = self.room_lock(&room_id).await;
            let deleted = {
                let _guard = lock.lock().await;
                self.delete_if_stale(&room_id, cutoff).await
            };
            self.release_lock(&room_id, lock).await;

            if deleted? {
                tracing::info!(room_id = %room_id, "Deleted stale room");
                removed += 1;
            }
        }

        let pruned = self.broadcaster.prune_idle().await;
        if pruned > 0 {
            tracing::debug!(pruned, "Dropped idle room channels");
        }
        Ok(removed)
    }

    /// Caller holds the room lock
    async fn delete_if_stale(
        &self,
        room_id: &str,
        cutoff: DateTime<Utc>,
    ) -> GameResult<bool> {
        let Some(current) = self.store.get(room_id).await? else {
            return Ok(false);
        };
        if !is_stale(&current.room, cutoff) {
            return Ok(false);
        }

        match self.store.delete(room_id, current.version).await {
            Ok(()) => {
                self.forget_room(room_id).await;
                Ok(true)
            }
            Err(StoreError::Conflict(_)) | Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
