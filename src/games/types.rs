use rand::distributions::{Distribution, Standard};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::games::taxonomy;

/// Highest pocket on a single-zero wheel
pub const MAX_NUMBER: u8 = 36;

/// Bet categories on the layout
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum BetCategory {
    Straight,
    Dozen,
    Column,
    Outside,
}

impl BetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetCategory::Straight => "straight",
            BetCategory::Dozen => "dozen",
            BetCategory::Column => "column",
            BetCategory::Outside => "outside",
        }
    }
}

impl fmt::Display for BetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Even-money bets outside the number grid
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum OutsideBet {
    Red,
    Black,
    Even,
    Odd,
    Low,
    High,
}

impl OutsideBet {
    pub const ALL: [OutsideBet; 6] = [
        OutsideBet::Red,
        OutsideBet::Black,
        OutsideBet::Even,
        OutsideBet::Odd,
        OutsideBet::Low,
        OutsideBet::High,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutsideBet::Red => "red",
            OutsideBet::Black => "black",
            OutsideBet::Even => "even",
            OutsideBet::Odd => "odd",
            OutsideBet::Low => "low",
            OutsideBet::High => "high",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|bet| bet.as_str() == value)
    }
}

/// A position on the layout.
///
/// The wire form is `"category-value"` (`straight-17`, `dozen-2`,
/// `outside-red`). Parsing accepts only the canonical spelling and only keys
/// the taxonomy can resolve, so every `BetKey` obtained from a string has a
/// winning set and a payout ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BetKey {
    Straight(u8),
    Dozen(u8),
    Column(u8),
    Outside(OutsideBet),
}

impl BetKey {
    pub fn category(&self) -> BetCategory {
        match self {
            BetKey::Straight(_) => BetCategory::Straight,
            BetKey::Dozen(_) => BetCategory::Dozen,
            BetKey::Column(_) => BetCategory::Column,
            BetKey::Outside(_) => BetCategory::Outside,
        }
    }
}

impl fmt::Display for BetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetKey::Straight(n) | BetKey::Dozen(n) | BetKey::Column(n) => {
                write!(f, "{}-{}", self.category(), n)
            }
            BetKey::Outside(bet) => write!(f, "{}-{}", self.category(), bet.as_str()),
        }
    }
}

/// Raised for bet keys the taxonomy does not know
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown bet key '{0}'")]
pub struct BetKeyParseError(pub String);

/// Digits only, no sign, no leading zeros
fn parse_canonical_number(value: &str) -> Option<u8> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if value.len() > 1 && value.starts_with('0') {
        return None;
    }
    value.parse().ok()
}

impl FromStr for BetKey {
    type Err = BetKeyParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let reject = || BetKeyParseError(raw.to_string());
        let (category, value) = raw.split_once('-').ok_or_else(reject)?;

        let key = match category {
            "straight" => BetKey::Straight(parse_canonical_number(value).ok_or_else(reject)?),
            "dozen" => BetKey::Dozen(parse_canonical_number(value).ok_or_else(reject)?),
            "column" => BetKey::Column(parse_canonical_number(value).ok_or_else(reject)?),
            "outside" => BetKey::Outside(OutsideBet::parse(value).ok_or_else(reject)?),
            _ => return Err(reject()),
        };

        match taxonomy::winning_set(&key) {
            Some(set) if !set.is_empty() => Ok(key),
            _ => Err(reject()),
        }
    }
}

impl TryFrom<String> for BetKey {
    type Error = BetKeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BetKey> for String {
    fn from(key: BetKey) -> Self {
        key.to_string()
    }
}

/// The pocket the ball landed in, always within `0..=36`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct WinningNumber(u8);

impl WinningNumber {
    pub fn new(number: u8) -> Option<Self> {
        (number <= MAX_NUMBER).then_some(Self(number))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Every pocket on the wheel, in numeric order
    pub fn all() -> impl Iterator<Item = WinningNumber> {
        (0..=MAX_NUMBER).map(WinningNumber)
    }
}

impl TryFrom<u8> for WinningNumber {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("winning number {} is outside 0..={}", value, MAX_NUMBER))
    }
}

impl From<WinningNumber> for u8 {
    fn from(number: WinningNumber) -> Self {
        number.0
    }
}

impl fmt::Display for WinningNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Distribution<WinningNumber> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> WinningNumber {
        WinningNumber(rng.gen_range(0..=MAX_NUMBER))
    }
}

/// Settlement of a single bet on the slip
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BetOutcome {
    pub key: BetKey,
    pub amount: u64,
    pub won: bool,
    pub credit: u64,
}

/// Settlement of a whole slip against one winning number
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettlementOutcome {
    pub winning_number: WinningNumber,
    pub bets: Vec<BetOutcome>,
    pub total_staked: u64,
    pub total_credited: u64,
}

impl SettlementOutcome {
    pub fn net_gain(&self) -> i64 {
        self.total_credited as i64 - self.total_staked as i64
    }
}

/// What the caller learns once a spin has been committed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpinReceipt {
    pub winning_number: WinningNumber,
    pub new_balance: u64,
    pub net_gain: i64,
}
