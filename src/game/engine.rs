//! Room transitions, one per player action.
//!
//! Every function takes the snapshot that was read from the store and
//! returns a fresh snapshot wrapped in a [`Transition`]; the input is never
//! modified so the caller keeps a stable before/after pair for its
//! versioned write.

use super::outcome::{should_end_game, winner};
use super::roles::{assign_roles, shuffle_in_place};
use super::turn::{first_turn_after, next_turn};
use super::vote::{tally, Tally};
use super::{GameError, GameResult, Outcome, Transition};
use crate::protocol::{EndGameRequest, RoomAction, RoomEvent, StartGameRequest};
use crate::types::*;
use chrono::Utc;
use rand::Rng;
use std::collections::HashSet;

fn replace(action: RoomAction, mut room: Room, voted_out: Option<Seat>) -> Transition {
    room.last_updated = Some(Utc::now());
    Transition {
        event: RoomEvent::new(action, room.clone()).with_voted_out(voted_out),
        outcome: Outcome::Replace(room),
    }
}

fn phase_name(room: &Room) -> String {
    match room.current_turn {
        None if !room.has_started => "in the lobby".to_string(),
        None => "starting".to_string(),
        Some(Turn::Speaking(seat)) => format!("waiting for seat {seat} to speak"),
        Some(Turn::Voting) => "voting".to_string(),
        Some(Turn::HostVoting) => "waiting for the host to break a tie".to_string(),
        Some(Turn::Ended) => "ended".to_string(),
    }
}

fn wrong_phase(action: &'static str, room: &Room) -> GameError {
    GameError::WrongPhase {
        action,
        phase: phase_name(room),
    }
}

fn seat_of(room: &Room, username: &str) -> GameResult<Seat> {
    room.seat_of(username).ok_or(GameError::UserNotFound)
}

fn require_host(room: &Room, username: &str) -> GameResult<Seat> {
    let seat = seat_of(room, username)?;
    if room.users[seat].is_host {
        Ok(seat)
    } else {
        Err(GameError::NotAuthorized)
    }
}

fn require_lobby(room: &Room) -> GameResult<()> {
    if room.has_started {
        Err(GameError::GameAlreadyStarted)
    } else {
        Ok(())
    }
}

fn require_started(room: &Room) -> GameResult<()> {
    if room.has_started {
        Ok(())
    } else {
        Err(GameError::GameNotStarted)
    }
}

fn clean_name(raw: &str, what: &str) -> GameResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(GameError::InvalidInput(format!("{what} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Join `room_id`, creating the room with the caller as host if it does not
/// exist yet.
pub fn enter_room(room: Option<&Room>, room_id: &str, username: &str) -> GameResult<Transition> {
    let room_id = clean_name(room_id, "room id")?;
    let username = clean_name(username, "username")?;

    let Some(room) = room else {
        let mut created = Room::new(room_id, username);
        created.last_updated = Some(Utc::now());
        return Ok(Transition {
            event: RoomEvent::new(RoomAction::EnterRoom, created.clone()),
            outcome: Outcome::Create(created),
        });
    };

    require_lobby(room)?;
    if room.seat_of(&username).is_some() {
        return Err(GameError::UsernameTaken);
    }

    let mut next = room.clone();
    next.users.push(Player::new(username, false));
    next.total_count = next.users.len();
    Ok(replace(RoomAction::EnterRoom, next, None))
}

/// Leave the lobby. The last player out deletes the room.
pub fn leave_room(room: &Room, username: &str) -> GameResult<Transition> {
    let seat = seat_of(room, username)?;
    require_lobby(room)?;

    if room.users.len() == 1 {
        return Ok(Transition {
            event: RoomEvent::new(RoomAction::LeaveRoom, room.clone()),
            outcome: Outcome::Delete(room.clone()),
        });
    }

    let mut next = room.clone();
    let leaver = next.users.remove(seat);
    next.total_count = next.users.len();
    if leaver.is_host {
        next.users[0].is_host = true;
    }
    Ok(replace(RoomAction::LeaveRoom, next, None))
}

/// Host removes another player from the lobby.
pub fn kick_user(room: &Room, username: &str, user_to_kick: &str) -> GameResult<Transition> {
    let host_seat = require_host(room, username)?;
    require_lobby(room)?;

    let target = seat_of(room, user_to_kick)?;
    if target == host_seat {
        return Err(GameError::InvalidInput("host cannot kick themselves".to_string()));
    }

    let mut next = room.clone();
    next.users.remove(target);
    next.total_count = next.users.len();
    Ok(replace(RoomAction::KickUser, next, None))
}

/// Deal roles from `card` and open the first speaking round.
pub fn start_game<R: Rng + ?Sized>(
    room: &Room,
    username: &str,
    request: &StartGameRequest,
    card: &Card,
    rng: &mut R,
) -> GameResult<Transition> {
    require_host(room, username)?;
    require_lobby(room)?;

    let total = room.users.len();
    let (anti, blank) = (request.anti_count, request.blank_count);
    if total < MIN_PLAYERS || anti + blank >= total {
        return Err(GameError::InvalidRoleCounts { anti, blank, total });
    }

    let mut next = room.clone();
    if let Some(order) = &request.seat_order {
        if request.random_order {
            return Err(GameError::InvalidInput(
                "seat order cannot be combined with random order".to_string(),
            ));
        }
        next.users = arrange_seats(&next.users, order)?;
    }

    let assignments = assign_roles(card, total, anti, blank, rng);
    for (player, assignment) in next.users.iter_mut().zip(assignments) {
        player.role = Some(assignment.role);
        player.card = Some(assignment.card);
        player.is_out = false;
        player.has_voted = false;
    }

    let first = if request.random_order {
        loop {
            shuffle_in_place(&mut next.users, rng);
            if next.users[0].role != Some(Role::Blank) {
                break 0;
            }
        }
    } else {
        loop {
            let seat = rng.random_range(0..total);
            if next.users[seat].role != Some(Role::Blank) {
                break seat;
            }
        }
    };

    next.total_count = total;
    next.anti_count = anti;
    next.blank_count = blank;
    next.has_started = true;
    next.first_turn = Some(first);
    next.current_turn = Some(Turn::Speaking(first));
    next.current_count = Some(total);
    next.votes.clear();
    next.users_with_most_votes.clear();
    next.winner = None;
    Ok(replace(RoomAction::StartGame, next, None))
}

/// Reorder `users` to match `order`, which must name every player once.
fn arrange_seats(users: &[Player], order: &[Username]) -> GameResult<Vec<Player>> {
    let unique: HashSet<&str> = order.iter().map(String::as_str).collect();
    if order.len() != users.len() || unique.len() != order.len() {
        return Err(GameError::InvalidInput(
            "seat order must list every player exactly once".to_string(),
        ));
    }

    order
        .iter()
        .map(|name| {
            users
                .iter()
                .find(|u| &u.name == name)
                .cloned()
                .ok_or(GameError::UserNotFound)
        })
        .collect()
}

/// Hand the turn to the next speaker, or open voting after a full lap.
pub fn end_turn(room: &Room, username: &str) -> GameResult<Transition> {
    let caller = seat_of(room, username)?;
    require_started(room)?;

    let Some(current) = room.current_turn.and_then(|t| t.speaker()) else {
        return Err(wrong_phase("end a turn", room));
    };
    if caller != current && !room.users[caller].is_host {
        return Err(GameError::NotAuthorized);
    }

    let first = room.first_turn.unwrap_or(current);
    let mut next = room.clone();
    let turn = next_turn(&next.users, current, first);
    if turn == Turn::Voting {
        for player in &mut next.users {
            player.has_voted = false;
        }
    }
    next.current_turn = Some(turn);
    Ok(replace(RoomAction::EndTurn, next, None))
}

fn require_active_target(room: &Room, chosen: Seat) -> GameResult<()> {
    match room.users.get(chosen) {
        Some(player) if player.is_active() => Ok(()),
        _ => Err(GameError::InvalidSeat(chosen)),
    }
}

/// Cast the caller's ballot and resolve the round once everyone has voted.
pub fn vote(room: &Room, username: &str, chosen: Seat) -> GameResult<Transition> {
    let voter = seat_of(room, username)?;
    require_started(room)?;
    if room.current_turn != Some(Turn::Voting) {
        return Err(wrong_phase("vote", room));
    }
    if room.users[voter].is_out {
        return Err(GameError::PlayerEliminated);
    }
    if room.users[voter].has_voted {
        return Err(GameError::AlreadyVoted);
    }
    require_active_target(room, chosen)?;

    let mut next = room.clone();
    next.votes.push(chosen);
    next.users[voter].has_voted = true;

    let expected = next.current_count.unwrap_or(0);
    match tally(&next.votes, expected) {
        Tally::Pending => Ok(replace(RoomAction::Vote, next, None)),
        Tally::Tie(seats) => {
            next.votes.clear();
            next.current_turn = Some(Turn::HostVoting);
            next.users_with_most_votes = seats;
            clear_ballots(&mut next);
            Ok(replace(RoomAction::Vote, next, None))
        }
        Tally::Eliminate(seat) => {
            clear_ballots(&mut next);
            eliminate(next, seat, RoomAction::Vote)
        }
    }
}

/// Host breaks a tie by naming one of the tied seats.
pub fn host_vote(room: &Room, username: &str, chosen: Seat) -> GameResult<Transition> {
    require_host(room, username)?;
    require_started(room)?;
    if room.current_turn != Some(Turn::HostVoting) {
        return Err(wrong_phase("break a tie", room));
    }
    if !room.users_with_most_votes.contains(&chosen) {
        return Err(GameError::InvalidSeat(chosen));
    }
    require_active_target(room, chosen)?;

    let mut next = room.clone();
    clear_ballots(&mut next);
    eliminate(next, chosen, RoomAction::HostVote)
}

fn clear_ballots(room: &mut Room) {
    for player in &mut room.users {
        player.has_voted = false;
    }
}

/// Vote `seat` out, then either close the game or open the next round
/// starting after the eliminated seat.
fn eliminate(mut next: Room, seat: Seat, action: RoomAction) -> GameResult<Transition> {
    next.votes.clear();
    next.users_with_most_votes.clear();
    next.users[seat].is_out = true;
    next.current_count = Some(next.current_count.unwrap_or(0).saturating_sub(1));

    if should_end_game(&next.users) {
        next.current_turn = Some(Turn::Ended);
        next.winner = Some(winner(&next.users));
        return Ok(replace(RoomAction::EndGame, next, Some(seat)));
    }

    let first = first_turn_after(&next.users, seat).ok_or(GameError::InvalidSeat(seat))?;
    next.first_turn = Some(first);
    next.current_turn = Some(Turn::Speaking(first));
    Ok(replace(action, next, Some(seat)))
}

/// Host closes the game early, optionally naming a winner.
pub fn end_game(room: &Room, username: &str, request: &EndGameRequest) -> GameResult<Transition> {
    require_host(room, username)?;
    require_started(room)?;

    let mut next = room.clone();
    next.current_turn = Some(Turn::Ended);
    if let Some(winner) = request.winner {
        next.winner = Some(winner);
    }
    Ok(replace(RoomAction::EndGame, next, request.user_voted_out))
}

/// Send everybody back to the lobby, keeping seats and the host.
pub fn leave_game(room: &Room, username: &str) -> GameResult<Transition> {
    seat_of(room, username)?;
    require_started(room)?;

    let mut next = room.clone();
    next.has_started = false;
    next.first_turn = None;
    next.current_turn = None;
    next.current_count = None;
    next.winner = None;
    next.votes.clear();
    next.users_with_most_votes.clear();
    for player in &mut next.users {
        player.is_out = false;
        player.role = None;
        player.card = None;
        player.has_voted = false;
    }
    Ok(replace(RoomAction::LeaveGame, next, None))
}
