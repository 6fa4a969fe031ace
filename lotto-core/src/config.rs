use crate::constants::{
    BPS_DENOMINATOR, DEFAULT_FEE_BPS, DEFAULT_OPERATOR, DEFAULT_ROUND_DURATION_SECS,
    DEFAULT_TICKET_PRICE, MAX_ROUND_DURATION_SECS, PRIZE_TIERS,
};
use crate::error::{LotteryError, Result};
use crate::types::{AccountId, Amount};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotteryConfig {
    /// Account allowed to withdraw fees and trigger an emergency sweep.
    pub operator: AccountId,
    pub ticket_price: Amount,
    pub fee_bps: u16,
    pub round_duration: Duration,
    pub tier_shares: TierShares,
}

/// Share of a round's prize pool earmarked per match tier, in basis points.
///
/// Whatever the four shares leave unallocated rolls into the jackpot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierShares {
    pub two_matches: u16,
    pub three_matches: u16,
    pub four_matches: u16,
    pub five_matches: u16,
}

impl Default for TierShares {
    fn default() -> Self {
        Self {
            two_matches: 1_000,
            three_matches: 1_500,
            four_matches: 2_500,
            five_matches: 5_000,
        }
    }
}

impl TierShares {
    pub fn share_bps(&self, matches: u8) -> Option<u16> {
        match matches {
            2 => Some(self.two_matches),
            3 => Some(self.three_matches),
            4 => Some(self.four_matches),
            5 => Some(self.five_matches),
            _ => None,
        }
    }

    /// `(match count, share)` pairs, lowest tier first.
    pub fn tiers(&self) -> [(u8, u16); 4] {
        PRIZE_TIERS.map(|matches| (matches, self.share_bps(matches).unwrap_or(0)))
    }

    pub fn total_bps(&self) -> u64 {
        self.tiers().iter().map(|(_, bps)| *bps as u64).sum()
    }
}

impl Default for LotteryConfig {
    fn default() -> Self {
        Self {
            operator: AccountId::new(DEFAULT_OPERATOR),
            ticket_price: Amount::from_units(DEFAULT_TICKET_PRICE),
            fee_bps: DEFAULT_FEE_BPS,
            round_duration: Duration::from_secs(DEFAULT_ROUND_DURATION_SECS),
            tier_shares: TierShares::default(),
        }
    }
}

impl LotteryConfig {
    pub fn new(operator: AccountId) -> Self {
        Self {
            operator,
            ..Self::default()
        }
    }

    pub fn with_ticket_price(mut self, price: Amount) -> Self {
        self.ticket_price = price;
        self
    }

    pub fn with_fee_bps(mut self, fee_bps: u16) -> Self {
        self.fee_bps = fee_bps;
        self
    }

    pub fn with_round_duration(mut self, duration: Duration) -> Self {
        self.round_duration = duration;
        self
    }

    pub fn with_tier_shares(mut self, shares: TierShares) -> Self {
        self.tier_shares = shares;
        self
    }

    /// Operator fee taken from a single ticket.
    pub fn ticket_fee(&self) -> Amount {
        self.ticket_price.mul_bps(self.fee_bps)
    }

    /// Part of a single ticket that goes into the round's prize pool.
    pub fn ticket_net(&self) -> Amount {
        // fee_bps <= 10_000 is enforced by validate()
        self.ticket_price
            .checked_sub(self.ticket_fee())
            .unwrap_or(Amount::ZERO)
    }

    pub fn round_duration_chrono(&self) -> Result<chrono::Duration> {
        chrono::Duration::from_std(self.round_duration)
            .map_err(|e| LotteryError::config(format!("Round duration out of range: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.operator.as_str().trim().is_empty() {
            return Err(LotteryError::config("Operator account cannot be empty"));
        }

        if self.ticket_price.is_zero() {
            return Err(LotteryError::config("Ticket price must be greater than 0"));
        }

        if self.fee_bps as u64 >= BPS_DENOMINATOR {
            return Err(LotteryError::config(format!(
                "Fee must be below {} bps, got {}",
                BPS_DENOMINATOR, self.fee_bps
            )));
        }

        if self.round_duration.is_zero() {
            return Err(LotteryError::config("Round duration must be greater than 0"));
        }
        if self.round_duration.as_secs() > MAX_ROUND_DURATION_SECS {
            return Err(LotteryError::config(format!(
                "Round duration must be at most {} seconds, got {}",
                MAX_ROUND_DURATION_SECS,
                self.round_duration.as_secs()
            )));
        }

        let total = self.tier_shares.total_bps();
        if total > BPS_DENOMINATOR {
            return Err(LotteryError::config(format!(
                "Tier shares sum to {} bps, at most {} allowed",
                total, BPS_DENOMINATOR
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LotteryConfig::default();
        config.validate().unwrap();

        assert_eq!(config.ticket_fee(), Amount::from_units(1_000_000));
        assert_eq!(config.ticket_net(), Amount::from_units(99_000_000));
        assert_eq!(config.tier_shares.total_bps(), 10_000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = LotteryConfig::default().with_ticket_price(Amount::ZERO);
        assert!(matches!(config.validate(), Err(LotteryError::Config(_))));

        let config = LotteryConfig::default().with_fee_bps(10_000);
        assert!(config.validate().is_err());

        let config = LotteryConfig::default().with_round_duration(Duration::ZERO);
        assert!(config.validate().is_err());

        let config =
            LotteryConfig::default().with_round_duration(Duration::from_secs(10_000_000_000_000));
        assert!(matches!(config.validate(), Err(LotteryError::Config(_))));

        let config = LotteryConfig::default()
            .with_round_duration(Duration::from_secs(MAX_ROUND_DURATION_SECS));
        config.validate().unwrap();

        let config = LotteryConfig::new(AccountId::new("  "));
        assert!(config.validate().is_err());

        let config = LotteryConfig::default().with_tier_shares(TierShares {
            two_matches: 5_000,
            three_matches: 5_000,
            four_matches: 1,
            five_matches: 0,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_tier_shares_are_allowed() {
        let config = LotteryConfig::default().with_tier_shares(TierShares {
            two_matches: 0,
            three_matches: 1_000,
            four_matches: 2_000,
            five_matches: 4_000,
        });
        config.validate().unwrap();
        assert_eq!(config.tier_shares.share_bps(1), None);
        assert_eq!(config.tier_shares.share_bps(5), Some(4_000));
    }
}
