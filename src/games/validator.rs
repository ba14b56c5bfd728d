//! Bet slip validation
//!
//! Turns the raw `"category-value" -> amount` mapping submitted by a client
//! into a `ValidatedSlip`. Nothing is mutated here; a slip that fails any
//! check is rejected as a whole.

use crate::errors::WagerError;
use crate::games::types::BetKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Slip as it arrives from the request layer
pub type RawSlip = BTreeMap<String, BetAmount>;

/// Amount submitted for one bet. Values that are not whole JSON numbers are
/// kept as sent and rejected during validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BetAmount {
    Whole(i64),
    Other(serde_json::Value),
}

impl BetAmount {
    fn positive(&self) -> Option<u64> {
        match self {
            BetAmount::Whole(amount) => u64::try_from(*amount).ok().filter(|a| *a > 0),
            BetAmount::Other(_) => None,
        }
    }
}

impl From<i64> for BetAmount {
    fn from(amount: i64) -> Self {
        BetAmount::Whole(amount)
    }
}

impl fmt::Display for BetAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetAmount::Whole(amount) => write!(f, "{}", amount),
            BetAmount::Other(value) => write!(f, "{}", value),
        }
    }
}

/// Hard ceiling on a single bet. With at most 49 distinct keys and a 36x
/// credit, slip totals stay far below `i64::MAX`.
pub const MAX_BET_AMOUNT: u64 = 1_000_000_000_000;

/// Per-bet table limits
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableLimits {
    pub min_bet: u64,
    pub max_bet: u64,
}

impl Default for TableLimits {
    fn default() -> Self {
        Self {
            min_bet: 1,
            max_bet: 1_000_000,
        }
    }
}

impl TableLimits {
    fn admits(&self, amount: u64) -> bool {
        amount >= self.min_bet && amount <= self.max_bet.min(MAX_BET_AMOUNT)
    }
}

/// Slip whose keys all resolve in the taxonomy and whose total fits the balance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSlip {
    bets: BTreeMap<BetKey, u64>,
    total_stake: u64,
}

impl ValidatedSlip {
    pub fn bets(&self) -> impl Iterator<Item = (&BetKey, u64)> + '_ {
        self.bets.iter().map(|(key, amount)| (key, *amount))
    }

    pub fn total_stake(&self) -> u64 {
        self.total_stake
    }

    pub fn len(&self) -> usize {
        self.bets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bets.is_empty()
    }
}

/// Check a raw slip against the taxonomy, the table limits and the balance
pub fn validate_slip(
    raw: &RawSlip,
    balance: u64,
    limits: &TableLimits,
) -> Result<ValidatedSlip, WagerError> {
    if raw.is_empty() {
        return Err(WagerError::EmptySlip);
    }

    let mut bets = BTreeMap::new();
    let mut total_stake = 0u64;

    for (raw_key, amount) in raw {
        let key: BetKey = raw_key
            .parse()
            .map_err(|_| WagerError::InvalidBetKey(raw_key.clone()))?;

        let stake = amount
            .positive()
            .filter(|stake| limits.admits(*stake))
            .ok_or_else(|| WagerError::InvalidAmount {
                bet: raw_key.clone(),
                amount: amount.to_string(),
            })?;

        total_stake += stake;
        bets.insert(key, stake);
    }

    if total_stake > balance {
        return Err(WagerError::InsufficientBalance {
            required: total_stake,
            available: balance,
        });
    }

    Ok(ValidatedSlip { bets, total_stake })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::types::OutsideBet;

    fn slip(entries: &[(&str, i64)]) -> RawSlip {
        entries.iter().map(|(k, v)| (k.to_string(), BetAmount::from(*v))).collect()
    }

    #[test]
    fn test_valid_slip_totals() {
        let raw = slip(&[("outside-red", 200), ("straight-5", 50)]);
        let validated = validate_slip(&raw, 1000, &TableLimits::default()).unwrap();

        assert_eq!(validated.total_stake(), 250);
        assert_eq!(validated.len(), 2);
        let bets: Vec<_> = validated.bets().collect();
        assert!(bets.contains(&(&BetKey::Outside(OutsideBet::Red), 200)));
        assert!(bets.contains(&(&BetKey::Straight(5), 50)));
    }

    #[test]
    fn test_empty_slip() {
        let err = validate_slip(&RawSlip::new(), 1000, &TableLimits::default()).unwrap_err();
        assert_eq!(err, WagerError::EmptySlip);
    }

    #[test]
    fn test_invalid_bet_key() {
        let raw = slip(&[("straight-5", 10), ("dozen-4", 10)]);
        let err = validate_slip(&raw, 1000, &TableLimits::default()).unwrap_err();
        assert_eq!(err, WagerError::InvalidBetKey("dozen-4".into()));
    }

    #[test]
    fn test_non_positive_amounts() {
        for amount in [0, -5] {
            let raw = slip(&[("outside-odd", amount)]);
            let err = validate_slip(&raw, 1000, &TableLimits::default()).unwrap_err();
            assert_eq!(
                err,
                WagerError::InvalidAmount {
                    bet: "outside-odd".into(),
                    amount: amount.to_string()
                }
            );
        }
    }

    #[test]
    fn test_non_integer_amounts() {
        let raw: RawSlip =
            serde_json::from_str(r#"{"straight-5": 1.5, "dozen-1": "10", "column-2": 1e20, "outside-red": 18446744073709551615}"#)
                .unwrap();
        assert_eq!(raw["straight-5"], BetAmount::Other(serde_json::json!(1.5)));

        for bet in ["straight-5", "dozen-1", "column-2", "outside-red"] {
            let single: RawSlip = [(bet.to_string(), raw[bet].clone())].into_iter().collect();
            let err = validate_slip(&single, u64::MAX, &TableLimits::default()).unwrap_err();
            assert!(
                matches!(&err, WagerError::InvalidAmount { bet: b, .. } if b == bet),
                "{} -> {:?}",
                bet,
                err
            );
        }

        let whole: RawSlip = serde_json::from_str(r#"{"straight-5": 10}"#).unwrap();
        assert_eq!(validate_slip(&whole, 100, &TableLimits::default()).unwrap().total_stake(), 10);
    }

    #[test]
    fn test_table_limits() {
        let limits = TableLimits {
            min_bet: 10,
            max_bet: 500,
        };
        assert!(validate_slip(&slip(&[("column-1", 9)]), 10_000, &limits).is_err());
        assert!(validate_slip(&slip(&[("column-1", 501)]), 10_000, &limits).is_err());
        assert!(validate_slip(&slip(&[("column-1", 500)]), 10_000, &limits).is_ok());
    }

    #[test]
    fn test_insufficient_balance() {
        let raw = slip(&[("straight-10", 100)]);
        let err = validate_slip(&raw, 50, &TableLimits::default()).unwrap_err();
        assert_eq!(
            err,
            WagerError::InsufficientBalance {
                required: 100,
                available: 50
            }
        );
    }

    #[test]
    fn test_stake_equal_to_balance_is_allowed() {
        let raw = slip(&[("dozen-2", 40), ("outside-low", 60)]);
        let validated = validate_slip(&raw, 100, &TableLimits::default()).unwrap();
        assert_eq!(validated.total_stake(), 100);
    }
}
