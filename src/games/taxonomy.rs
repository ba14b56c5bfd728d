//! Static rule table for the single-zero layout.
//!
//! Zero sits outside every dozen, column, and outside set. Only a straight
//! bet on 0 wins when the ball lands there.

use crate::games::types::{BetCategory, BetKey, OutsideBet, MAX_NUMBER};

/// Red pockets; black is the rest of 1..=36
const RED_NUMBERS: [u8; 18] = [1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36];

const RED: NumberSet = NumberSet::from_slice(&RED_NUMBERS);
const ONE_TO_36: NumberSet = NumberSet::range(1, MAX_NUMBER);

/// Set of wheel pockets packed into a bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NumberSet(u64);

impl NumberSet {
    pub const EMPTY: NumberSet = NumberSet(0);

    pub const fn single(number: u8) -> Self {
        NumberSet(1 << number)
    }

    /// Inclusive range
    pub const fn range(low: u8, high: u8) -> Self {
        let mut bits = 0u64;
        let mut n = low;
        while n <= high {
            bits |= 1 << n;
            n += 1;
        }
        NumberSet(bits)
    }

    pub const fn from_slice(numbers: &[u8]) -> Self {
        let mut bits = 0u64;
        let mut i = 0;
        while i < numbers.len() {
            bits |= 1 << numbers[i];
            i += 1;
        }
        NumberSet(bits)
    }

    /// Every `step`-th number from `start` up to 36
    const fn stepped(start: u8, step: u8) -> Self {
        let mut bits = 0u64;
        let mut n = start;
        while n <= MAX_NUMBER {
            bits |= 1 << n;
            n += step;
        }
        NumberSet(bits)
    }

    const fn difference(self, other: NumberSet) -> Self {
        NumberSet(self.0 & !other.0)
    }

    pub fn contains(&self, number: u8) -> bool {
        number <= MAX_NUMBER && self.0 & (1 << number) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=MAX_NUMBER).filter(move |n| self.contains(*n))
    }
}

/// Numbers that satisfy a bet, or `None` when the key has no rule
pub fn winning_set(key: &BetKey) -> Option<NumberSet> {
    match *key {
        BetKey::Straight(n) if n <= MAX_NUMBER => Some(NumberSet::single(n)),
        BetKey::Dozen(d @ 1..=3) => Some(NumberSet::range(12 * (d - 1) + 1, 12 * d)),
        // Column 1 holds 1, 4, 7, ..., 34
        BetKey::Column(c @ 1..=3) => Some(NumberSet::stepped(c, 3)),
        BetKey::Outside(bet) => Some(outside_set(bet)),
        _ => None,
    }
}

fn outside_set(bet: OutsideBet) -> NumberSet {
    match bet {
        OutsideBet::Red => RED,
        OutsideBet::Black => ONE_TO_36.difference(RED),
        OutsideBet::Even => NumberSet::stepped(2, 2),
        OutsideBet::Odd => NumberSet::stepped(1, 2),
        OutsideBet::Low => NumberSet::range(1, 18),
        OutsideBet::High => NumberSet::range(19, MAX_NUMBER),
    }
}

/// Winnings per unit staked, excluding the returned stake
pub fn payout_ratio(category: BetCategory) -> u64 {
    match category {
        BetCategory::Straight => 35,
        BetCategory::Dozen | BetCategory::Column => 2,
        BetCategory::Outside => 1,
    }
}

/// Amount credited for one bet: stake plus winnings on a win, nothing on a loss
pub fn credit_for(key: &BetKey, amount: u64, won: bool) -> u64 {
    if won {
        amount * (payout_ratio(key.category()) + 1)
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_keys() -> Vec<BetKey> {
        let mut keys: Vec<BetKey> = (0..=MAX_NUMBER).map(BetKey::Straight).collect();
        keys.extend((1..=3).map(BetKey::Dozen));
        keys.extend((1..=3).map(BetKey::Column));
        keys.extend(OutsideBet::ALL.into_iter().map(BetKey::Outside));
        keys
    }

    #[test]
    fn test_red_and_black_partition_one_to_36() {
        let red = outside_set(OutsideBet::Red);
        let black = outside_set(OutsideBet::Black);
        assert_eq!(red.len(), 18);
        assert_eq!(black.len(), 18);
        for n in 1..=MAX_NUMBER {
            assert!(red.contains(n) ^ black.contains(n), "{} must be exactly one color", n);
        }
        assert!(red.contains(5));
        assert!(black.contains(10));
    }

    #[test]
    fn test_zero_only_wins_straight_zero() {
        for key in all_keys() {
            let set = winning_set(&key).expect("every layout key resolves");
            assert_eq!(set.contains(0), key == BetKey::Straight(0), "{}", key);
        }
    }

    #[test]
    fn test_dozens_and_columns() {
        assert_eq!(winning_set(&BetKey::Dozen(1)).unwrap().iter().collect::<Vec<_>>(), (1..=12).collect::<Vec<_>>());
        assert_eq!(winning_set(&BetKey::Dozen(3)).unwrap().iter().collect::<Vec<_>>(), (25..=36).collect::<Vec<_>>());

        let column_two: Vec<u8> = winning_set(&BetKey::Column(2)).unwrap().iter().collect();
        assert_eq!(column_two, vec![2, 5, 8, 11, 14, 17, 20, 23, 26, 29, 32, 35]);
        assert_eq!(winning_set(&BetKey::Column(3)).unwrap().len(), 12);
    }

    #[test]
    fn test_ranges_and_parity() {
        let low = winning_set(&BetKey::Outside(OutsideBet::Low)).unwrap();
        let high = winning_set(&BetKey::Outside(OutsideBet::High)).unwrap();
        let even = winning_set(&BetKey::Outside(OutsideBet::Even)).unwrap();
        let odd = winning_set(&BetKey::Outside(OutsideBet::Odd)).unwrap();

        assert_eq!(low.len() + high.len(), 36);
        assert!(low.contains(18) && high.contains(19));
        assert!(even.contains(36) && !even.contains(35));
        assert!(odd.contains(1) && !odd.contains(2));
        assert_eq!(even.len(), 18);
        assert_eq!(odd.len(), 18);
    }

    #[test]
    fn test_out_of_range_keys_do_not_resolve() {
        assert!(winning_set(&BetKey::Straight(37)).is_none());
        assert!(winning_set(&BetKey::Dozen(0)).is_none());
        assert!(winning_set(&BetKey::Column(4)).is_none());
    }

    #[test]
    fn test_payout_ratios_and_credit() {
        assert_eq!(payout_ratio(BetCategory::Straight), 35);
        assert_eq!(payout_ratio(BetCategory::Dozen), 2);
        assert_eq!(payout_ratio(BetCategory::Column), 2);
        assert_eq!(payout_ratio(BetCategory::Outside), 1);

        assert_eq!(credit_for(&BetKey::Straight(17), 100, true), 3600);
        assert_eq!(credit_for(&BetKey::Outside(OutsideBet::Red), 200, true), 400);
        assert_eq!(credit_for(&BetKey::Column(2), 60, true), 180);
        assert_eq!(credit_for(&BetKey::Dozen(1), 100, false), 0);
    }
}
