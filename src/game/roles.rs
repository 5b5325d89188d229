use crate::types::{Card, Role};
use rand::Rng;

/// A role and the word dealt with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub role: Role,
    pub card: String,
}

/// Swap every position with a uniformly drawn index over the whole slice.
///
/// This is deliberately not Fisher-Yates: the resulting permutations are
/// biased, and games dealt by earlier servers used exactly this walk.
pub fn shuffle_in_place<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    let len = items.len();
    for i in 0..len {
        let j = rng.random_range(0..len);
        items.swap(i, j);
    }
}

/// Build and shuffle one assignment per seat.
///
/// The caller guarantees `anti + blank < total`, so at least one non-blank
/// exists and the reshuffle loop terminates.
pub fn assign_roles<R: Rng + ?Sized>(
    card: &Card,
    total: usize,
    anti: usize,
    blank: usize,
    rng: &mut R,
) -> Vec<Assignment> {
    let (norm_word, anti_word) = if rng.random_bool(0.5) {
        (&card.a, &card.b)
    } else {
        (&card.b, &card.a)
    };

    let norm = total - anti - blank;
    let mut assignments = Vec::with_capacity(total);
    assignments.extend((0..norm).map(|_| Assignment {
        role: Role::Norm,
        card: norm_word.clone(),
    }));
    assignments.extend((0..anti).map(|_| Assignment {
        role: Role::Anti,
        card: anti_word.clone(),
    }));
    assignments.extend((0..blank).map(|_| Assignment {
        role: Role::Blank,
        card: String::new(),
    }));

    loop {
        shuffle_in_place(&mut assignments, rng);
        if !matches!(assignments.first(), Some(a) if a.role == Role::Blank) {
            break;
        }
    }
    assignments
}
