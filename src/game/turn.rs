use crate::types::{Player, Seat, Turn};

/// Advance the speaking pointer to the next seat that is still in the game.
///
/// Reaching `first` again closes the round and opens voting. `first` is
/// always an active seat, so the walk ends within one lap.
pub fn next_turn(users: &[Player], current: Seat, first: Seat) -> Turn {
    let total = users.len();
    if total == 0 {
        return Turn::Voting;
    }

    let mut pointer = current;
    for _ in 0..total {
        let candidate = (pointer + 1) % total;
        if candidate == first {
            return Turn::Voting;
        }
        if users[candidate].is_active() {
            return Turn::Speaking(candidate);
        }
        pointer = candidate;
    }
    Turn::Voting
}

/// First active seat after `out`, going around the table.
///
/// `None` only when nobody is left in the game.
pub fn first_turn_after(users: &[Player], out: Seat) -> Option<Seat> {
    let total = users.len();
    (1..=total)
        .map(|step| (out + step) % total)
        .find(|&seat| users[seat].is_active())
}
