use crate::types::{Player, Role, Winner};

struct Survivors<'a> {
    active: Vec<(usize, &'a Player)>,
    norm: usize,
}

fn survivors(users: &[Player]) -> Survivors<'_> {
    let active: Vec<_> = users.iter().enumerate().filter(|(_, u)| u.is_active()).collect();
    let norm = active
        .iter()
        .filter(|(_, u)| u.role == Some(Role::Norm))
        .count();
    Survivors { active, norm }
}

/// The game is over once only civilians remain, or at most one civilian does.
pub fn should_end_game(users: &[Player]) -> bool {
    let s = survivors(users);
    s.active.len() == s.norm || s.norm <= 1
}

/// Decide the winner of a game that [`should_end_game`] has closed.
///
/// A lone surviving blank wins outright and is reported by seat; several
/// surviving blanks share the win as a faction.
pub fn winner(users: &[Player]) -> Winner {
    let s = survivors(users);
    if s.active.len() == s.norm {
        return Winner::Faction(Role::Norm);
    }

    let blanks: Vec<usize> = s
        .active
        .iter()
        .filter(|(_, u)| u.role == Some(Role::Blank))
        .map(|(seat, _)| *seat)
        .collect();

    match blanks.as_slice() {
        [seat] => Winner::Seat(*seat),
        [] => Winner::Faction(Role::Anti),
        _ => Winner::Faction(Role::Blank),
    }
}
