use super::{AppState, Caller};
use crate::game::{engine, GameError, GameResult};
use crate::protocol::*;
use crate::types::*;

impl AppState {
    /// Join (or create) a room and open a session for the new seat
    pub async fn enter_room(&self, request: &EnterRoomRequest) -> GameResult<SessionInfo> {
        let room_id = request.room_id.trim();
        let event = self
            .commit(room_id, |room| {
                engine::enter_room(room, &request.room_id, &request.username)
            })
            .await?;

        let username = request.username.trim().to_string();
        let token = self
            .sessions
            .open(event.room.room_id.clone(), username.clone())
            .await;
        tracing::info!(
            room_id = %event.room.room_id,
            username = %username,
            players = event.room.total_count,
            "Player entered room"
        );

        Ok(SessionInfo {
            token,
            room_id: event.room.room_id,
            username,
        })
    }

    /// Leave the lobby; the caller's session ends with it
    pub async fn leave_room(&self, token: &str, caller: &Caller) -> GameResult<RoomEvent> {
        let event = self
            .commit_existing(&caller.room_id, |room| {
                engine::leave_room(room, &caller.username)
            })
            .await?;

        self.sessions.close(token).await;
        tracing::info!(room_id = %caller.room_id, username = %caller.username, "Player left room");
        Ok(event)
    }

    pub async fn kick_user(&self, caller: &Caller, user_to_kick: &str) -> GameResult<RoomEvent> {
        let event = self
            .commit_existing(&caller.room_id, |room| {
                engine::kick_user(room, &caller.username, user_to_kick)
            })
            .await?;

        self.sessions.close_user(&caller.room_id, user_to_kick).await;
        tracing::info!(
            room_id = %caller.room_id,
            host = %caller.username,
            kicked = %user_to_kick,
            "Player kicked"
        );
        Ok(event)
    }

    /// Current room plus the caller's own seat
    pub async fn room_view(&self, caller: &Caller) -> GameResult<RoomView> {
        let room = self.get_room(&caller.room_id).await?;
        let user = room
            .player(&caller.username)
            .cloned()
            .ok_or(GameError::UserNotFound)?;
        Ok(RoomView { room, user })
    }

    /// Resolve a token to its seat. A session whose seat is gone is dropped.
    pub async fn check_session(&self, token: &str) -> Option<SeatedSession> {
        let caller = self.sessions.get(token).await?;
        let seated = match self.get_room(&caller.room_id).await {
            Ok(room) => room.player(&caller.username).is_some(),
            Err(_) => false,
        };
        if !seated {
            self.sessions.close(token).await;
            tracing::debug!(room_id = %caller.room_id, username = %caller.username, "Dropped stale session");
            return None;
        }

        Some(SeatedSession {
            room_id: caller.room_id,
            username: caller.username,
        })
    }

    /// Draw a card and deal roles
    pub async fn start_game(
        &self,
        caller: &Caller,
        request: &StartGameRequest,
    ) -> GameResult<RoomEvent> {
        // Missing room wins over an empty corpus
        self.get_room(&caller.room_id).await?;
        let card = self
            .corpus
            .sample_one(&request.languages)
            .await
            .ok_or(GameError::NoCardAvailable)?;

        let event = self
            .commit_existing(&caller.room_id, |room| {
                let mut rng = rand::rng();
                engine::start_game(room, &caller.username, request, &card, &mut rng)
            })
            .await?;

        tracing::info!(
            room_id = %caller.room_id,
            players = event.room.total_count,
            anti = event.room.anti_count,
            blank = event.room.blank_count,
            language = %card.language,
            "Game started"
        );
        Ok(event)
    }

    pub async fn end_turn(&self, caller: &Caller) -> GameResult<RoomEvent> {
        let event = self
            .commit_existing(&caller.room_id, |room| {
                engine::end_turn(room, &caller.username)
            })
            .await?;

        tracing::debug!(room_id = %caller.room_id, turn = ?event.room.current_turn, "Turn ended");
        Ok(event)
    }

    pub async fn vote(&self, caller: &Caller, chosen: Seat) -> GameResult<RoomEvent> {
        let event = self
            .commit_existing(&caller.room_id, |room| {
                engine::vote(room, &caller.username, chosen)
            })
            .await?;

        tracing::info!(
            room_id = %caller.room_id,
            username = %caller.username,
            chosen,
            voted_out = ?event.user_voted_out,
            "Vote cast"
        );
        Ok(event)
    }

    pub async fn host_vote(&self, caller: &Caller, chosen: Seat) -> GameResult<RoomEvent> {
        let event = self
            .commit_existing(&caller.room_id, |room| {
                engine::host_vote(room, &caller.username, chosen)
            })
            .await?;

        tracing::info!(room_id = %caller.room_id, chosen, "Host broke the tie");
        Ok(event)
    }

    pub async fn end_game(
        &self,
        caller: &Caller,
        request: &EndGameRequest,
    ) -> GameResult<RoomEvent> {
        let event = self
            .commit_existing(&caller.room_id, |room| {
                engine::end_game(room, &caller.username, request)
            })
            .await?;

        tracing::info!(room_id = %caller.room_id, winner = ?event.room.winner, "Game ended");
        Ok(event)
    }

    /// Return the caller's room to the lobby
    pub async fn leave_game(&self, caller: &Caller) -> GameResult<RoomEvent> {
        let event = self
            .commit_existing(&caller.room_id, |room| {
                engine::leave_game(room, &caller.username)
            })
            .await?;

        tracing::info!(room_id = %caller.room_id, "Room back in lobby");
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::MemoryCorpus;

    fn corpus() -> MemoryCorpus {
        MemoryCorpus::new(vec![Card {
            num: Some(1),
            a: "apple".to_string(),
            b: "pear".to_string(),
            language: "english".to_string(),
        }])
    }

    async fn lobby(state: &AppState, names: &[&str]) -> Vec<(String, Caller)> {
        let mut seats = Vec::new();
        for name in names {
            let info = state
                .enter_room(&EnterRoomRequest {
                    room_id: "r1".to_string(),
                    username: name.to_string(),
                })
                .await
                .unwrap();
            let caller = state.sessions.get(&info.token).await.unwrap();
            seats.push((info.token, caller));
        }
        seats
    }

    #[tokio::test]
    async fn test_enter_room_opens_session() {
        let state = AppState::in_memory(corpus());
        let info = state
            .enter_room(&EnterRoomRequest {
                room_id: " r1 ".to_string(),
                username: " alice ".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(info.room_id, "r1");
        assert_eq!(info.username, "alice");
        let seated = state.check_session(&info.token).await.unwrap();
        assert_eq!(seated.username, "alice");
    }

    #[tokio::test]
    async fn test_duplicate_username_opens_no_session() {
        let state = AppState::in_memory(corpus());
        lobby(&state, &["alice"]).await;

        let result = state
            .enter_room(&EnterRoomRequest {
                room_id: "r1".to_string(),
                username: "alice".to_string(),
            })
            .await;

        assert!(matches!(result, Err(GameError::UsernameTaken)));
        assert_eq!(state.sessions.len().await, 1);
    }

    #[tokio::test]
    async fn test_last_leaver_deletes_room_and_sessions() {
        let state = AppState::in_memory(corpus());
        let seats = lobby(&state, &["alice"]).await;
        let (token, caller) = &seats[0];
        let mut rx = state.broadcaster.subscribe("r1").await;

        let event = state.leave_room(token, caller).await.unwrap();

        assert_eq!(event.action, RoomAction::LeaveRoom);
        assert_eq!(rx.recv().await.unwrap().action, RoomAction::LeaveRoom);
        assert!(matches!(state.get_room("r1").await, Err(GameError::RoomNotFound)));
        assert!(state.check_session(token).await.is_none());
    }

    #[tokio::test]
    async fn test_kicked_player_loses_session() {
        let state = AppState::in_memory(corpus());
        let seats = lobby(&state, &["alice", "bob"]).await;

        state.kick_user(&seats[0].1, "bob").await.unwrap();

        assert!(state.check_session(&seats[1].0).await.is_none());
        assert!(state.check_session(&seats[0].0).await.is_some());
    }

    #[tokio::test]
    async fn test_room_view_shows_own_seat() {
        let state = AppState::in_memory(corpus());
        let seats = lobby(&state, &["alice", "bob"]).await;

        let view = state.room_view(&seats[1].1).await.unwrap();
        assert_eq!(view.user.name, "bob");
        assert!(!view.user.is_host);
        assert_eq!(view.room.users.len(), 2);
    }

    #[tokio::test]
    async fn test_start_game_without_matching_card() {
        let state = AppState::in_memory(corpus());
        let seats = lobby(&state, &["alice", "bob", "carol"]).await;

        let request = StartGameRequest {
            anti_count: 1,
            languages: vec!["klingon".to_string()],
            ..Default::default()
        };
        let result = state.start_game(&seats[0].1, &request).await;

        assert!(matches!(result, Err(GameError::NoCardAvailable)));
        assert!(!state.get_room("r1").await.unwrap().has_started);
    }

    #[tokio::test]
    async fn test_full_round_through_state() {
        let state = AppState::in_memory(corpus());
        let seats = lobby(&state, &["alice", "bob", "carol", "dave"]).await;
        let host = &seats[0].1;

        let started = state
            .start_game(
                host,
                &StartGameRequest {
                    anti_count: 1,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(started.room.has_started);

        // Host may close every speaking turn
        for _ in 0..4 {
            state.end_turn(host).await.unwrap();
        }
        assert_eq!(
            state.get_room("r1").await.unwrap().current_turn,
            Some(Turn::Voting)
        );

        let room = state.get_room("r1").await.unwrap();
        let anti = room
            .users
            .iter()
            .position(|u| u.role == Some(Role::Anti))
            .unwrap();

        let mut last = None;
        for (_, caller) in &seats {
            last = Some(state.vote(caller, anti).await.unwrap());
        }
        let last = last.unwrap();

        assert_eq!(last.action, RoomAction::EndGame);
        assert_eq!(last.user_voted_out, Some(anti));
        assert_eq!(last.room.winner, Some(Winner::Faction(Role::Norm)));

        let back = state.leave_game(host).await.unwrap();
        assert!(!back.room.has_started);
        assert!(back.room.users.iter().all(|u| u.role.is_none()));
    }
}
