use crate::types::*;
use serde::{Deserialize, Serialize};

/// Name of the action that produced a room event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RoomAction {
    EnterRoom,
    LeaveRoom,
    KickUser,
    StartGame,
    EndTurn,
    Vote,
    HostVote,
    EndGame,
    LeaveGame,
}

/// Payload published on a room's channel after every committed mutation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomEvent {
    pub action: RoomAction,
    pub room: Room,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_voted_out: Option<Seat>,
}

impl RoomEvent {
    pub fn new(action: RoomAction, room: Room) -> Self {
        Self {
            action,
            room,
            user_voted_out: None,
        }
    }

    pub fn with_voted_out(mut self, seat: Option<Seat>) -> Self {
        self.user_voted_out = seat;
        self
    }
}

/// Frame sent over a room WebSocket
#[derive(Debug, Clone, Serialize)]
pub struct ChannelMessage<'a> {
    pub channel: String,
    #[serde(flatten)]
    pub event: &'a RoomEvent,
}

// ========== Request bodies ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterRoomRequest {
    pub room_id: RoomId,
    pub username: Username,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KickUserRequest {
    pub user_to_kick: Username,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameRequest {
    pub anti_count: usize,
    #[serde(default)]
    pub blank_count: usize,
    /// Shuffle seats instead of drawing a random first speaker
    #[serde(default)]
    pub random_order: bool,
    /// Corpus languages to draw from; empty means any
    #[serde(default, alias = "languageArray")]
    pub languages: Vec<String>,
    /// Host-arranged seating, as player names (fixed order only)
    #[serde(default)]
    pub seat_order: Option<Vec<Username>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub chosen_user: Seat,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndGameRequest {
    #[serde(default)]
    pub winner: Option<Winner>,
    #[serde(default)]
    pub user_voted_out: Option<Seat>,
}

// ========== Responses ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub token: String,
    pub room_id: RoomId,
    pub username: Username,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatedSession {
    pub room_id: RoomId,
    pub username: Username,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomView {
    pub room: Room,
    pub user: Player,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_message_flattens_event() {
        let event = RoomEvent::new(RoomAction::HostVote, Room::new("r1", "alice"))
            .with_voted_out(Some(0));
        let msg = ChannelMessage {
            channel: "roomr1".to_string(),
            event: &event,
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["channel"], "roomr1");
        assert_eq!(json["action"], "hostVote");
        assert_eq!(json["userVotedOut"], 0);
        assert_eq!(json["room"]["roomId"], "r1");
    }

    #[test]
    fn test_start_game_request_accepts_language_array() {
        let request: StartGameRequest = serde_json::from_str(
            r#"{"antiCount":1,"blankCount":0,"randomOrder":true,"languageArray":["english"]}"#,
        )
        .unwrap();

        assert_eq!(request.anti_count, 1);
        assert!(request.random_order);
        assert_eq!(request.languages, vec!["english".to_string()]);
        assert!(request.seat_order.is_none());
    }

    #[test]
    fn test_end_game_request_defaults_to_no_winner() {
        let request: EndGameRequest = serde_json::from_str("{}").unwrap();
        assert!(request.winner.is_none());
        assert!(request.user_voted_out.is_none());
    }
}
