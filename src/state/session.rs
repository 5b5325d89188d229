use crate::types::{RoomId, Username};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Who is making a request: the room and name their session was opened for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub room_id: RoomId,
    pub username: Username,
}

/// Opaque session tokens handed out on room entry
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Caller>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session and return its token
    pub async fn open(&self, room_id: RoomId, username: Username) -> String {
        let token = ulid::Ulid::new().to_string();
        self.sessions
            .write()
            .await
            .insert(token.clone(), Caller { room_id, username });
        token
    }

    pub async fn get(&self, token: &str) -> Option<Caller> {
        self.sessions.read().await.get(token).cloned()
    }

    pub async fn close(&self, token: &str) -> Option<Caller> {
        self.sessions.write().await.remove(token)
    }

    /// Drop every session that belongs to `room_id`
    pub async fn close_room(&self, room_id: &str) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, caller| caller.room_id != room_id);
        before - sessions.len()
    }

    /// Drop the sessions held by one player of `room_id`
    pub async fn close_user(&self, room_id: &str, username: &str) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, caller| caller.room_id != room_id || caller.username != username);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_and_resolve_session() {
        let sessions = SessionStore::new();
        let token = sessions.open("r1".into(), "alice".into()).await;

        let caller = sessions.get(&token).await.unwrap();
        assert_eq!(caller.room_id, "r1");
        assert_eq!(caller.username, "alice");
        assert!(sessions.get("bogus").await.is_none());
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let sessions = SessionStore::new();
        let a = sessions.open("r1".into(), "alice".into()).await;
        let b = sessions.open("r1".into(), "alice".into()).await;
        assert_ne!(a, b);
        assert_eq!(sessions.len().await, 2);
    }

    #[tokio::test]
    async fn test_close_room_drops_only_that_room() {
        let sessions = SessionStore::new();
        sessions.open("r1".into(), "alice".into()).await;
        sessions.open("r1".into(), "bob".into()).await;
        let keep = sessions.open("r2".into(), "carol".into()).await;

        assert_eq!(sessions.close_room("r1").await, 2);
        assert_eq!(sessions.len().await, 1);
        assert!(sessions.get(&keep).await.is_some());

        assert!(sessions.close(&keep).await.is_some());
        assert!(sessions.is_empty().await);
    }

    #[tokio::test]
    async fn test_close_user_keeps_other_players() {
        let sessions = SessionStore::new();
        sessions.open("r1".into(), "alice".into()).await;
        let bob = sessions.open("r1".into(), "bob".into()).await;
        sessions.open("r2".into(), "alice".into()).await;

        assert_eq!(sessions.close_user("r1", "alice").await, 1);
        assert_eq!(sessions.len().await, 2);
        assert!(sessions.get(&bob).await.is_some());
    }

    #[tokio::test]
    async fn test_close_unknown_token() {
        let sessions = SessionStore::new();
        assert!(sessions.close("nope").await.is_none());
        assert!(sessions.is_empty().await);
    }
}
