use crate::constants::{MAX_NUMBER, MIN_NUMBER, NUMBERS_PER_TICKET, UNITS_PER_COIN};
use crate::error::{LotteryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type RoundId = u64;

/// Value in indivisible base units of the single settlement asset.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_units(units: u64) -> Self {
        Self(units)
    }

    pub const fn to_units(self) -> u64 {
        self.0
    }

    pub fn to_coins(self) -> f64 {
        self.0 as f64 / UNITS_PER_COIN as f64
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    pub fn checked_mul(self, factor: u64) -> Option<Amount> {
        self.0.checked_mul(factor).map(Amount)
    }

    pub fn saturating_add(self, rhs: Amount) -> Amount {
        Amount(self.0.saturating_add(rhs.0))
    }

    /// `self * bps / 10_000`, truncated toward zero.
    pub fn mul_bps(self, bps: u16) -> Amount {
        let scaled = self.0 as u128 * bps as u128 / crate::constants::BPS_DENOMINATOR as u128;
        Amount(u64::try_from(scaled).unwrap_or(u64::MAX))
    }

    /// Integer division truncated toward zero. `None` when dividing by zero.
    pub fn checked_div(self, divisor: u64) -> Option<Amount> {
        self.0.checked_div(divisor).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a ticket owner or an operator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Five distinct numbers in `MIN_NUMBER..=MAX_NUMBER`, always ascending.
///
/// Used both for ticket selections and for winning combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct NumberSet([u8; NUMBERS_PER_TICKET]);

impl NumberSet {
    /// Validates and sorts a raw selection. Range is checked before duplicates.
    pub fn new(mut numbers: [u8; NUMBERS_PER_TICKET]) -> Result<Self> {
        if let Some(&number) = numbers
            .iter()
            .find(|&&n| !(MIN_NUMBER..=MAX_NUMBER).contains(&n))
        {
            return Err(LotteryError::InvalidRange {
                number,
                min: MIN_NUMBER,
                max: MAX_NUMBER,
            });
        }

        numbers.sort_unstable();
        if let Some(pair) = numbers.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(LotteryError::DuplicateNumber { number: pair[0] });
        }

        Ok(Self(numbers))
    }

    pub fn from_slice(numbers: &[u8]) -> Result<Self> {
        let raw: [u8; NUMBERS_PER_TICKET] = numbers.try_into().map_err(|_| {
            LotteryError::config(format!(
                "expected exactly {} numbers, got {}",
                NUMBERS_PER_TICKET,
                numbers.len()
            ))
        })?;
        Self::new(raw)
    }

    /// Caller guarantees the numbers are distinct, in range and ascending.
    pub(crate) fn from_drawn(numbers: [u8; NUMBERS_PER_TICKET]) -> Self {
        Self(numbers)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn contains(&self, number: u8) -> bool {
        self.0.binary_search(&number).is_ok()
    }

    /// Size of the intersection with another set.
    pub fn matches(&self, other: &NumberSet) -> u8 {
        self.0.iter().filter(|&&n| other.contains(n)).count() as u8
    }
}

impl TryFrom<Vec<u8>> for NumberSet {
    type Error = LotteryError;

    fn try_from(numbers: Vec<u8>) -> Result<Self> {
        Self::from_slice(&numbers)
    }
}

impl From<NumberSet> for Vec<u8> {
    fn from(set: NumberSet) -> Self {
        set.0.to_vec()
    }
}

impl fmt::Display for NumberSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|n| format!("{:02}", n)).collect();
        f.write_str(&parts.join("-"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub owner: AccountId,
    pub round_id: RoundId,
    /// Sequential position within the round, starting at 0.
    pub index: u64,
    pub numbers: NumberSet,
    pub purchased_at: DateTime<Utc>,
}
