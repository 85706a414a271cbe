//! Guest display-name generation
//!
//! Players who join without a name get a generated one: five distinct
//! random lowercase letters followed by three distinct random digits
//! (e.g. `kwzab731`). Generation retries until the name is unique
//! within its session.

use std::collections::HashSet;

use crate::constants::names::{DIGIT_COUNT, LETTER_COUNT};

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";

fn distinct_sample(pool: &[u8], count: usize) -> String {
    let mut picked: Vec<u8> = Vec::with_capacity(count);
    while picked.len() < count {
        let candidate = pool[fastrand::usize(..pool.len())];
        if !picked.contains(&candidate) {
            picked.push(candidate);
        }
    }
    picked.into_iter().map(char::from).collect()
}

/// Generates a candidate guest name: 5 distinct lowercase letters
/// followed by 3 distinct digits.
pub fn random_guest_name() -> String {
    let mut name = distinct_sample(LETTERS, LETTER_COUNT);
    name.push_str(&distinct_sample(DIGITS, DIGIT_COUNT));
    name
}

/// Generates a guest name that does not collide with any name in
/// `taken`, retrying until one is found.
pub fn unique_guest_name(taken: &HashSet<&str>) -> String {
    loop {
        let candidate = random_guest_name();
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_shape() {
        for _ in 0..50 {
            let name = random_guest_name();
            assert_eq!(name.len(), LETTER_COUNT + DIGIT_COUNT);
            assert!(
                name[..LETTER_COUNT]
                    .chars()
                    .all(|c| c.is_ascii_lowercase())
            );
            assert!(
                name[LETTER_COUNT..]
                    .chars()
                    .all(|c| c.is_ascii_digit())
            );
        }
    }

    #[test]
    fn test_characters_are_distinct_within_each_half() {
        for _ in 0..50 {
            let name = random_guest_name();
            let letters: HashSet<char> = name[..LETTER_COUNT].chars().collect();
            let digits: HashSet<char> = name[LETTER_COUNT..].chars().collect();
            assert_eq!(letters.len(), LETTER_COUNT);
            assert_eq!(digits.len(), DIGIT_COUNT);
        }
    }

    #[test]
    fn test_unique_name_avoids_taken() {
        let mut taken = HashSet::new();
        let first = random_guest_name();
        taken.insert(first.as_str());
        let name = unique_guest_name(&taken);
        assert_ne!(name, first);
    }
}
