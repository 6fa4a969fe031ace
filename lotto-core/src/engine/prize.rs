//! Tiered prize allocation.
//!
//! Everything here is a pure function of the pool, the configured tier shares
//! and the tickets, so settlement can be tested without any engine state.

use crate::config::TierShares;
use crate::constants::PRIZE_TIERS;
use crate::error::{LotteryError, Result};
use crate::types::{Amount, NumberSet, Ticket};
use serde::{Deserialize, Serialize};

/// Winning-ticket counts, indexed like [`PRIZE_TIERS`].
pub type WinnerCounts = [u64; PRIZE_TIERS.len()];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPayout {
    pub matches: u8,
    pub share_bps: u16,
    /// Part of the pool set aside for this tier.
    pub earmark: Amount,
    pub winners: u64,
    /// Amount owed per winning ticket.
    pub unit_payout: Amount,
    /// Earmark left undistributed: the whole earmark when nobody won,
    /// otherwise the division remainder.
    pub rolled_over: Amount,
}

impl TierPayout {
    pub fn paid(&self) -> Amount {
        self.earmark
            .checked_sub(self.rolled_over)
            .unwrap_or(Amount::ZERO)
    }
}

/// Distribution plan computed once when a round closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub prize_pool: Amount,
    pub tiers: Vec<TierPayout>,
    /// Pool share not covered by any tier.
    pub unallocated: Amount,
    /// Total owed to winning tickets.
    pub allocated: Amount,
    /// Carried into the jackpot: `prize_pool - allocated`.
    pub rollover: Amount,
}

impl Settlement {
    pub fn tier(&self, matches: u8) -> Option<&TierPayout> {
        self.tiers.iter().find(|tier| tier.matches == matches)
    }

    pub fn unit_payout(&self, matches: u8) -> Amount {
        self.tier(matches)
            .map(|tier| tier.unit_payout)
            .unwrap_or(Amount::ZERO)
    }

    pub fn top_tier_won(&self) -> bool {
        self.tiers.last().map_or(false, |tier| tier.winners > 0)
    }
}

/// Splits `pool` across tiers given how many tickets landed in each.
pub fn allocate(pool: Amount, shares: &TierShares, winners: &WinnerCounts) -> Result<Settlement> {
    let mut tiers = Vec::with_capacity(PRIZE_TIERS.len());
    let mut earmarked = Amount::ZERO;
    let mut allocated = Amount::ZERO;

    for (slot, (matches, share_bps)) in shares.tiers().into_iter().enumerate() {
        let earmark = pool.mul_bps(share_bps);
        let count = winners[slot];

        // no winners: nothing is paid and the whole earmark rolls over
        let unit_payout = earmark.checked_div(count).unwrap_or(Amount::ZERO);
        let paid = unit_payout
            .checked_mul(count)
            .ok_or(LotteryError::MathOverflow("tier payout"))?;
        let rolled_over = earmark
            .checked_sub(paid)
            .ok_or(LotteryError::MathOverflow("tier remainder"))?;

        earmarked = earmarked
            .checked_add(earmark)
            .ok_or(LotteryError::MathOverflow("tier earmarks"))?;
        allocated = allocated
            .checked_add(paid)
            .ok_or(LotteryError::MathOverflow("allocated prizes"))?;

        tiers.push(TierPayout {
            matches,
            share_bps,
            earmark,
            winners: count,
            unit_payout,
            rolled_over,
        });
    }

    let unallocated = pool.checked_sub(earmarked).ok_or_else(|| {
        LotteryError::config(format!(
            "Tier shares earmark {} out of a pool of {}",
            earmarked, pool
        ))
    })?;
    let rollover = pool
        .checked_sub(allocated)
        .ok_or(LotteryError::MathOverflow("rollover"))?;

    Ok(Settlement {
        prize_pool: pool,
        tiers,
        unallocated,
        allocated,
        rollover,
    })
}

/// Counts tickets per prize tier. Tickets below the lowest tier are ignored.
pub fn count_winners<'a>(
    tickets: impl IntoIterator<Item = &'a Ticket>,
    winning: &NumberSet,
) -> WinnerCounts {
    let mut counts = WinnerCounts::default();
    for ticket in tickets {
        let matches = ticket.numbers.matches(winning);
        if let Some(slot) = PRIZE_TIERS.iter().position(|&tier| tier == matches) {
            counts[slot] += 1;
        }
    }
    counts
}

pub fn settle(
    pool: Amount,
    shares: &TierShares,
    tickets: &[Ticket],
    winning: &NumberSet,
) -> Result<Settlement> {
    let winners = count_winners(tickets, winning);
    allocate(pool, shares, &winners)
}

/// Total owed for a set of tickets under a settlement.
pub fn prize_for<'a>(
    settlement: &Settlement,
    tickets: impl IntoIterator<Item = &'a Ticket>,
    winning: &NumberSet,
) -> Result<Amount> {
    tickets.into_iter().try_fold(Amount::ZERO, |total, ticket| {
        let payout = settlement.unit_payout(ticket.numbers.matches(winning));
        total
            .checked_add(payout)
            .ok_or(LotteryError::MathOverflow("player prize"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccountId;
    use chrono::Utc;

    fn ticket(owner: &str, numbers: [u8; 5]) -> Ticket {
        Ticket {
            owner: AccountId::new(owner),
            round_id: 1,
            index: 0,
            numbers: NumberSet::new(numbers).unwrap(),
            purchased_at: Utc::now(),
        }
    }

    fn assert_conserved(settlement: &Settlement) {
        let paid: u64 = settlement
            .tiers
            .iter()
            .map(|tier| {
                assert_eq!(tier.paid().to_units(), tier.unit_payout.to_units() * tier.winners);
                tier.paid().to_units()
            })
            .sum();
        assert_eq!(paid, settlement.allocated.to_units());
        assert_eq!(
            settlement.allocated.to_units() + settlement.rollover.to_units(),
            settlement.prize_pool.to_units()
        );
    }

    #[test]
    fn test_allocate_truncates_and_rolls_remainder() {
        let settlement =
            allocate(Amount::from_units(1_000), &TierShares::default(), &[3, 1, 0, 0]).unwrap();

        let two = settlement.tier(2).unwrap();
        assert_eq!(two.earmark, Amount::from_units(100));
        assert_eq!(two.unit_payout, Amount::from_units(33));
        assert_eq!(two.rolled_over, Amount::from_units(1));

        let three = settlement.tier(3).unwrap();
        assert_eq!(three.unit_payout, Amount::from_units(150));
        assert_eq!(three.rolled_over, Amount::ZERO);

        assert_eq!(settlement.tier(4).unwrap().rolled_over, Amount::from_units(250));
        assert_eq!(settlement.tier(5).unwrap().rolled_over, Amount::from_units(500));

        assert_eq!(settlement.allocated, Amount::from_units(249));
        assert_eq!(settlement.rollover, Amount::from_units(751));
        assert!(!settlement.top_tier_won());
        assert_conserved(&settlement);
    }

    #[test]
    fn test_allocate_without_winners_rolls_everything() {
        let pool = Amount::from_units(2_970_000);
        let settlement = allocate(pool, &TierShares::default(), &[0, 0, 0, 0]).unwrap();

        assert_eq!(settlement.allocated, Amount::ZERO);
        assert_eq!(settlement.rollover, pool);
        assert_conserved(&settlement);
    }

    #[test]
    fn test_allocate_empty_pool() {
        let settlement = allocate(Amount::ZERO, &TierShares::default(), &[2, 0, 0, 1]).unwrap();
        assert_eq!(settlement.allocated, Amount::ZERO);
        assert_eq!(settlement.rollover, Amount::ZERO);
    }

    #[test]
    fn test_unallocated_share_rolls_over() {
        let shares = TierShares {
            two_matches: 1_000,
            three_matches: 1_000,
            four_matches: 2_000,
            five_matches: 3_000,
        };
        let settlement = allocate(Amount::from_units(10_000), &shares, &[1, 1, 1, 1]).unwrap();

        assert_eq!(settlement.unallocated, Amount::from_units(3_000));
        assert_eq!(settlement.allocated, Amount::from_units(7_000));
        assert_eq!(settlement.rollover, Amount::from_units(3_000));
        assert!(settlement.top_tier_won());
        assert_conserved(&settlement);
    }

    #[test]
    fn test_allocate_conserves_value() {
        let pools = [0u64, 1, 7, 99, 1_000, 98_999_999, 297_000_000];
        let counts: [WinnerCounts; 5] = [
            [0, 0, 0, 0],
            [1, 0, 0, 0],
            [3, 2, 1, 0],
            [7, 0, 3, 1],
            [13, 11, 5, 2],
        ];

        for pool in pools {
            for winners in &counts {
                let settlement =
                    allocate(Amount::from_units(pool), &TierShares::default(), winners).unwrap();
                assert_conserved(&settlement);
            }
        }
    }

    #[test]
    fn test_allocate_rejects_oversubscribed_shares() {
        let shares = TierShares {
            two_matches: 5_000,
            three_matches: 5_000,
            four_matches: 5_000,
            five_matches: 0,
        };
        let result = allocate(Amount::from_units(1_000), &shares, &[0, 0, 0, 0]);
        assert!(matches!(result, Err(LotteryError::Config(_))));
    }

    #[test]
    fn test_settle_and_prize_for() {
        let winning = NumberSet::new([1, 2, 3, 4, 5]).unwrap();
        let tickets = vec![
            ticket("alice", [1, 2, 3, 4, 5]),
            ticket("alice", [1, 2, 30, 31, 32]),
            ticket("bob", [1, 2, 33, 34, 35]),
            ticket("carol", [10, 11, 12, 13, 14]),
        ];

        let settlement = settle(
            Amount::from_units(10_000),
            &TierShares::default(),
            &tickets,
            &winning,
        )
        .unwrap();

        assert_eq!(settlement.tier(2).unwrap().winners, 2);
        assert_eq!(settlement.tier(5).unwrap().winners, 1);
        assert_eq!(settlement.unit_payout(2), Amount::from_units(500));
        assert_eq!(settlement.unit_payout(5), Amount::from_units(5_000));
        assert_eq!(settlement.unit_payout(0), Amount::ZERO);

        let alice: Vec<&Ticket> = tickets.iter().filter(|t| t.owner.as_str() == "alice").collect();
        assert_eq!(
            prize_for(&settlement, alice, &winning).unwrap(),
            Amount::from_units(5_500)
        );

        let carol: Vec<&Ticket> = tickets.iter().filter(|t| t.owner.as_str() == "carol").collect();
        assert_eq!(prize_for(&settlement, carol, &winning).unwrap(), Amount::ZERO);

        // tiers three and four had no winners
        assert_eq!(settlement.rollover, Amount::from_units(4_000));
        assert_conserved(&settlement);
    }
}
