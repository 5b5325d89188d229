use crate::types::Seat;
use std::collections::{BTreeMap, BTreeSet};

/// State of a voting round after a ballot has been added
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tally {
    /// Still waiting for ballots
    Pending,
    /// One seat has a strict plurality
    Eliminate(Seat),
    /// Several seats share the top count; the host decides
    Tie(BTreeSet<Seat>),
}

/// Count ballots per seat
pub fn count_votes(votes: &[Seat]) -> BTreeMap<Seat, u32> {
    let mut counts = BTreeMap::new();
    for &seat in votes {
        *counts.entry(seat).or_insert(0) += 1;
    }
    counts
}

/// Resolve the round once every active player has voted
pub fn tally(votes: &[Seat], expected: usize) -> Tally {
    if votes.len() < expected {
        return Tally::Pending;
    }

    let counts = count_votes(votes);
    let Some((&leader, &most)) = counts.iter().max_by_key(|&(_, n)| *n) else {
        return Tally::Pending;
    };
    let tied: BTreeSet<Seat> = counts
        .iter()
        .filter(|&(_, &n)| n == most)
        .map(|(&seat, _)| seat)
        .collect();

    if tied.len() == 1 {
        Tally::Eliminate(leader)
    } else {
        Tally::Tie(tied)
    }
}
