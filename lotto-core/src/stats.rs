use crate::constants::PRIZE_TIERS;
use crate::engine::LotteryEngine;
use crate::error::{LotteryError, Result};
use crate::types::{AccountId, Amount};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifetime summary of one player's activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatistics {
    pub owner: AccountId,
    pub rounds_played: u64,
    pub tickets_bought: u64,
    pub total_spent: Amount,
    /// Tickets in drawn rounds that reached a prize tier.
    pub winning_tickets: u64,
    /// Winning tickets per match count.
    pub matches_by_tier: BTreeMap<u8, u64>,
    pub best_match: u8,
    pub total_claimed: Amount,
    pub unclaimed: Amount,
    /// Percentage of drawn tickets that won something.
    pub win_rate: f64,
}

impl PlayerStatistics {
    pub fn collect(engine: &LotteryEngine, owner: &AccountId) -> Result<Self> {
        let rounds = engine.rounds_played(owner);

        let mut tickets_bought = 0u64;
        let mut drawn_tickets = 0u64;
        let mut winning_tickets = 0u64;
        let mut best_match = 0u8;
        let mut matches_by_tier: BTreeMap<u8, u64> =
            PRIZE_TIERS.iter().map(|&tier| (tier, 0)).collect();
        let mut unclaimed = Amount::ZERO;

        for &round_id in &rounds {
            let round = engine.round_details(round_id)?;
            let tickets = engine.tickets_of(owner, round_id);
            tickets_bought += tickets.len() as u64;

            let Some(winning) = round.winning_numbers else {
                continue;
            };

            for ticket in &tickets {
                drawn_tickets += 1;
                let matches = ticket.numbers.matches(&winning);
                best_match = best_match.max(matches);
                if let Some(count) = matches_by_tier.get_mut(&matches) {
                    *count += 1;
                    winning_tickets += 1;
                }
            }

            unclaimed = unclaimed
                .checked_add(engine.pending_prize(owner, round_id)?)
                .ok_or(LotteryError::MathOverflow("unclaimed prizes"))?;
        }

        let total_spent = engine
            .config()
            .ticket_price
            .checked_mul(tickets_bought)
            .ok_or(LotteryError::MathOverflow("total spent"))?;

        let win_rate = if drawn_tickets == 0 {
            0.0
        } else {
            winning_tickets as f64 / drawn_tickets as f64 * 100.0
        };

        Ok(Self {
            owner: owner.clone(),
            rounds_played: rounds.len() as u64,
            tickets_bought,
            total_spent,
            winning_tickets,
            matches_by_tier,
            best_match,
            total_claimed: engine.total_claimed(owner),
            unclaimed,
            win_rate,
        })
    }
}
