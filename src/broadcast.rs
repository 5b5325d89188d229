use crate::protocol::RoomEvent;
use crate::state::AppState;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};

/// Channel name subscribers use for a room
pub fn channel_name(room_id: &str) -> String {
    format!("room{}", room_id)
}

/// Fan-out of room events to every socket subscribed to that room.
///
/// Constructed once at startup and handed to [`AppState`]; channels are
/// created lazily on first subscribe/publish and closed when their room is
/// deleted.
#[derive(Debug, Clone)]
pub struct RoomBroadcaster {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<RoomEvent>>>>,
    capacity: usize,
}

impl Default for RoomBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RoomBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Receive every event published for `room_id` from now on
    pub async fn subscribe(&self, room_id: &str) -> broadcast::Receiver<RoomEvent> {
        let channel = channel_name(room_id);
        if let Some(tx) = self.channels.read().await.get(&channel) {
            return tx.subscribe();
        }

        // Subscribe while holding the write lock so a concurrent prune cannot
        // drop the sender between creation and subscription
        self.channels
            .write()
            .await
            .entry(channel)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish to the room's channel, returning how many subscribers got it
    pub async fn publish(&self, room_id: &str, event: RoomEvent) -> usize {
        let channel = channel_name(room_id);
        let tx = match self.channels.read().await.get(&channel) {
            Some(tx) => tx.clone(),
            None => {
                tracing::debug!(channel, "No subscribers for event");
                return 0;
            }
        };

        // No receivers connected is fine
        tx.send(event).unwrap_or(0)
    }

    /// Drop the room's channel; subscribers see the stream end
    pub async fn close(&self, room_id: &str) {
        if self
            .channels
            .write()
            .await
            .remove(&channel_name(room_id))
            .is_some()
        {
            tracing::debug!(room_id, "Closed room channel");
        }
    }

    /// Drop the room's channel if nobody is listening any more
    pub async fn prune(&self, room_id: &str) -> bool {
        let mut channels = self.channels.write().await;
        let channel = channel_name(room_id);
        match channels.get(&channel) {
            Some(tx) if tx.receiver_count() == 0 => {
                channels.remove(&channel);
                true
            }
            _ => false,
        }
    }

    /// Drop every channel without receivers, returning how many went
    pub async fn prune_idle(&self) -> usize {
        let mut channels = self.channels.write().await;
        let before = channels.len();
        channels.retain(|_, tx| tx.receiver_count() > 0);
        before - channels.len()
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    pub async fn subscriber_count(&self, room_id: &str) -> usize {
        self.channels
            .read()
            .await
            .get(&channel_name(room_id))
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

/// Spawn a background task that deletes rooms nobody has touched within
/// `ttl`, checking every `interval`.
pub fn spawn_stale_room_sweeper(state: Arc<AppState>, ttl: Duration, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            match state.sweep_stale_rooms(ttl).await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "Swept stale rooms"),
                Err(e) => tracing::error!("Stale room sweep failed: {}", e),
            }
        }
    });
}
