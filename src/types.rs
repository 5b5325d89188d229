use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Opaque ID types for readability
pub type RoomId = String;
pub type Username = String;

/// Index of a player within `Room::users`.
pub type Seat = usize;

/// Smallest room that can start a game
pub const MIN_PLAYERS: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Civilian holding the majority word
    Norm,
    /// Undercover holding the minority word
    Anti,
    /// No word at all
    Blank,
}

/// Speaking pointer / phase of a started game.
///
/// On the wire a speaking seat is a bare number and the other phases are
/// strings (`"voting"`, `"hostVoting"`, `"ended"`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "TurnRepr", into = "TurnRepr")]
pub enum Turn {
    Speaking(Seat),
    Voting,
    HostVoting,
    Ended,
}

impl Turn {
    pub fn speaker(&self) -> Option<Seat> {
        match self {
            Turn::Speaking(seat) => Some(*seat),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TurnRepr {
    Seat(Seat),
    Phase(PhaseName),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum PhaseName {
    Voting,
    HostVoting,
    Ended,
}

impl From<TurnRepr> for Turn {
    fn from(repr: TurnRepr) -> Self {
        match repr {
            TurnRepr::Seat(seat) => Turn::Speaking(seat),
            TurnRepr::Phase(PhaseName::Voting) => Turn::Voting,
            TurnRepr::Phase(PhaseName::HostVoting) => Turn::HostVoting,
            TurnRepr::Phase(PhaseName::Ended) => Turn::Ended,
        }
    }
}

impl From<Turn> for TurnRepr {
    fn from(turn: Turn) -> Self {
        match turn {
            Turn::Speaking(seat) => TurnRepr::Seat(seat),
            Turn::Voting => TurnRepr::Phase(PhaseName::Voting),
            Turn::HostVoting => TurnRepr::Phase(PhaseName::HostVoting),
            Turn::Ended => TurnRepr::Phase(PhaseName::Ended),
        }
    }
}

/// Result of a finished game: a whole faction, or a lone surviving blank
/// identified by seat.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Winner {
    Seat(Seat),
    Faction(Role),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub name: Username,
    pub is_host: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Dealt word; empty for blanks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<String>,
    #[serde(default)]
    pub is_out: bool,
    #[serde(default)]
    pub has_voted: bool,
}

impl Player {
    pub fn new(name: impl Into<Username>, is_host: bool) -> Self {
        Self {
            name: name.into(),
            is_host,
            role: None,
            card: None,
            is_out: false,
            has_voted: false,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.is_out
    }
}

/// The single mutable document describing one lobby and its game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: RoomId,
    pub users: Vec<Player>,
    pub total_count: usize,
    #[serde(default)]
    pub anti_count: usize,
    #[serde(default)]
    pub blank_count: usize,
    #[serde(default)]
    pub has_started: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_turn: Option<Seat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_turn: Option<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_count: Option<usize>,
    #[serde(default)]
    pub votes: Vec<Seat>,
    #[serde(default)]
    pub users_with_most_votes: BTreeSet<Seat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Winner>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Room {
    /// A fresh lobby with `host` in seat 0
    pub fn new(room_id: impl Into<RoomId>, host: impl Into<Username>) -> Self {
        Self {
            room_id: room_id.into(),
            users: vec![Player::new(host, true)],
            total_count: 1,
            anti_count: 0,
            blank_count: 0,
            has_started: false,
            first_turn: None,
            current_turn: None,
            current_count: None,
            votes: Vec::new(),
            users_with_most_votes: BTreeSet::new(),
            winner: None,
            last_updated: None,
        }
    }

    pub fn seat_of(&self, name: &str) -> Option<Seat> {
        self.users.iter().position(|u| u.name == name)
    }

    pub fn player(&self, name: &str) -> Option<&Player> {
        self.users.iter().find(|u| u.name == name)
    }

    pub fn host(&self) -> Option<&Player> {
        self.users.iter().find(|u| u.is_host)
    }

    /// Seats of players that have not been voted out
    pub fn active_seats(&self) -> impl Iterator<Item = Seat> + '_ {
        self.users
            .iter()
            .enumerate()
            .filter(|(_, u)| u.is_active())
            .map(|(seat, _)| seat)
    }
}

/// A word pair drawn from the corpus at game start
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Card {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num: Option<u32>,
    pub a: String,
    pub b: String,
    pub language: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_wire_format() {
        assert_eq!(serde_json::to_string(&Turn::Speaking(2)).unwrap(), "2");
        assert_eq!(serde_json::to_string(&Turn::Voting).unwrap(), "\"voting\"");
        assert_eq!(
            serde_json::to_string(&Turn::HostVoting).unwrap(),
            "\"hostVoting\""
        );
        assert_eq!(serde_json::to_string(&Turn::Ended).unwrap(), "\"ended\"");

        let parsed: Turn = serde_json::from_str("\"hostVoting\"").unwrap();
        assert_eq!(parsed, Turn::HostVoting);
        let parsed: Turn = serde_json::from_str("4").unwrap();
        assert_eq!(parsed, Turn::Speaking(4));
    }

    #[test]
    fn test_winner_wire_format() {
        assert_eq!(
            serde_json::to_string(&Winner::Faction(Role::Norm)).unwrap(),
            "\"norm\""
        );
        assert_eq!(serde_json::to_string(&Winner::Seat(3)).unwrap(), "3");

        let parsed: Winner = serde_json::from_str("\"blank\"").unwrap();
        assert_eq!(parsed, Winner::Faction(Role::Blank));
        let parsed: Winner = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, Winner::Seat(1));
    }

    #[test]
    fn test_lobby_room_omits_game_fields() {
        let room = Room::new("abc", "alice");
        let json = serde_json::to_value(&room).unwrap();

        assert_eq!(json["roomId"], "abc");
        assert_eq!(json["totalCount"], 1);
        assert_eq!(json["users"][0]["isHost"], true);
        assert!(json.get("currentTurn").is_none());
        assert!(json.get("winner").is_none());
        assert!(json["users"][0].get("role").is_none());
    }

    #[test]
    fn test_room_json_roundtrip_mid_game() {
        let mut room = Room::new("abc", "alice");
        room.users.push(Player::new("bob", false));
        room.total_count = 2;
        room.has_started = true;
        room.current_turn = Some(Turn::HostVoting);
        room.users_with_most_votes = [0, 1].into_iter().collect();
        room.users[1].role = Some(Role::Anti);
        room.users[1].card = Some("cat".to_string());

        let json = serde_json::to_string(&room).unwrap();
        let back: Room = serde_json::from_str(&json).unwrap();
        assert_eq!(back, room);
    }
}
