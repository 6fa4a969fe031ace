use crate::engine::prize::Settlement;
use crate::error::{LotteryError, Result};
use crate::types::{Amount, NumberSet, RoundId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle position of a round relative to a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    /// Accepting tickets.
    Open,
    /// Deadline passed, waiting for the next request to close it.
    Expired,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub opened_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    pub closed: bool,
    pub closed_at: Option<DateTime<Utc>>,
    pub ticket_count: u64,
    /// Ticket proceeds after the operator fee.
    pub collected: Amount,
    /// Rollover merged into this round when it opened.
    pub jackpot_contribution: Amount,
    pub winning_numbers: Option<NumberSet>,
    /// Sum of prizes claimed so far.
    pub distributed_total: Amount,
    pub seed_commitment: String,
    pub revealed_seed: Option<String>,
    pub settlement: Option<Settlement>,
}

impl Round {
    pub fn open(
        id: RoundId,
        opened_at: DateTime<Utc>,
        duration: chrono::Duration,
        jackpot_contribution: Amount,
        seed_commitment: String,
    ) -> Result<Self> {
        let closes_at = opened_at
            .checked_add_signed(duration)
            .ok_or(LotteryError::MathOverflow("round deadline"))?;

        Ok(Self {
            id,
            opened_at,
            closes_at,
            closed: false,
            closed_at: None,
            ticket_count: 0,
            collected: Amount::ZERO,
            jackpot_contribution,
            winning_numbers: None,
            distributed_total: Amount::ZERO,
            seed_commitment,
            revealed_seed: None,
            settlement: None,
        })
    }

    /// Everything this round can pay out: net proceeds plus carried jackpot.
    pub fn prize_pool(&self) -> Amount {
        self.collected.saturating_add(self.jackpot_contribution)
    }

    pub fn phase(&self, now: DateTime<Utc>) -> RoundPhase {
        if self.closed {
            RoundPhase::Closed
        } else if now < self.closes_at {
            RoundPhase::Open
        } else {
            RoundPhase::Expired
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.phase(now) == RoundPhase::Expired
    }

    /// Whole seconds left before the deadline, zero once it has passed.
    pub fn seconds_until_close(&self, now: DateTime<Utc>) -> u64 {
        (self.closes_at - now).num_seconds().max(0) as u64
    }

    pub fn summary(&self) -> RoundSummary {
        RoundSummary {
            id: self.id,
            opened_at: self.opened_at,
            closes_at: self.closes_at,
            prize_pool: self.prize_pool(),
            ticket_count: self.ticket_count,
            closed: self.closed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub id: RoundId,
    pub opened_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    pub prize_pool: Amount,
    pub ticket_count: u64,
    pub closed: bool,
}
