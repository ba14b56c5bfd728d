//! Payout calculation
//!
//! Pure function of (validated slip, winning number). The same pair always
//! yields the same outcome.

use crate::games::taxonomy::{credit_for, winning_set};
use crate::games::types::{BetOutcome, SettlementOutcome, WinningNumber};
use crate::games::validator::ValidatedSlip;

/// Settle every bet on the slip against the winning number
pub fn calculate_payout(slip: &ValidatedSlip, winning_number: WinningNumber) -> SettlementOutcome {
    let bets: Vec<BetOutcome> = slip
        .bets()
        .map(|(key, amount)| {
            let won = winning_set(key)
                .map(|set| set.contains(winning_number.value()))
                .unwrap_or(false);
            BetOutcome {
                key: *key,
                amount,
                won,
                credit: credit_for(key, amount, won),
            }
        })
        .collect();

    let total_staked = bets.iter().map(|bet| bet.amount).sum();
    let total_credited = bets.iter().map(|bet| bet.credit).sum();

    SettlementOutcome {
        winning_number,
        bets,
        total_staked,
        total_credited,
    }
}
