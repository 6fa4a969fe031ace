//! Round lifecycle: closing expired rounds and opening their successors.

use super::prize;
use super::LotteryEngine;
use crate::draw::{draw_numbers, seed_to_hex, SeedCommitment};
use crate::error::{LotteryError, Result};
use crate::events::LotteryEvent;
use crate::round::Round;
use crate::types::RoundId;
use chrono::{DateTime, Utc};

impl LotteryEngine {
    /// Draws and settles `round_id`, then opens the next round. Returns the
    /// new round's id.
    pub fn close_round(&mut self, round_id: RoundId, now: DateTime<Utc>) -> Result<RoundId> {
        self.transact(|engine| {
            let round = engine.round_details(round_id)?;
            if round.closed {
                return Err(LotteryError::AlreadyClosed { round_id });
            }
            if now < round.closes_at {
                return Err(LotteryError::StillActive { round_id });
            }

            engine.close_current(now)
        })
    }

    /// Closes the current round if its deadline has passed. Every mutating
    /// request starts here.
    pub(crate) fn ensure_current(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.current_round().is_expired(now) {
            tracing::debug!(
                "Round {} expired at {}, closing before request",
                self.current_round_id,
                self.current_round().closes_at
            );
            self.close_current(now)?;
        }
        Ok(())
    }

    fn close_current(&mut self, now: DateTime<Utc>) -> Result<RoundId> {
        let round_id = self.current_round_id;
        let seed = self.pending_seed;
        let winning = draw_numbers(&seed);

        let round = self.round_details(round_id)?;
        let settlement = prize::settle(
            round.prize_pool(),
            &self.config.tier_shares,
            self.book.round_tickets(round_id),
            &winning,
        )?;
        self.ledger.absorb_rollover(settlement.rollover)?;

        let round = self
            .rounds
            .get_mut(&round_id)
            .ok_or(LotteryError::UnknownRound(round_id))?;
        round.closed = true;
        round.closed_at = Some(now);
        round.winning_numbers = Some(winning);
        round.revealed_seed = Some(seed_to_hex(&seed));

        self.outbox.events.push(LotteryEvent::RoundClosed {
            round_id,
            winning_numbers: winning,
            prize_pool: settlement.prize_pool,
            allocated: settlement.allocated,
            rollover: settlement.rollover,
            ticket_count: round.ticket_count,
            at: now,
        });
        round.settlement = Some(settlement);
        self.outbox.dirty_rounds.insert(round_id);

        self.open_next_round(round_id, now)
    }

    fn open_next_round(&mut self, previous: RoundId, now: DateTime<Utc>) -> Result<RoundId> {
        let round_id = previous
            .checked_add(1)
            .ok_or(LotteryError::MathOverflow("round id"))?;
        let duration = self.config.round_duration_chrono()?;

        let seed = self.seeds.next_seed(round_id);
        let contribution = self.ledger.open_round_contribution();
        let round = Round::open(
            round_id,
            now,
            duration,
            contribution,
            SeedCommitment::new(&seed).to_hex(),
        )?;
        let closes_at = round.closes_at;

        self.rounds.insert(round_id, round);
        self.current_round_id = round_id;
        self.pending_seed = seed;
        self.outbox.dirty_rounds.insert(round_id);

        if !contribution.is_zero() {
            self.outbox.events.push(LotteryEvent::JackpotRolledOver {
                from_round: previous,
                to_round: round_id,
                amount: contribution,
            });
        }

        tracing::info!("Round {} open until {}", round_id, closes_at);
        Ok(round_id)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::draw::SeedCommitment;
    use crate::error::LotteryError;
    use crate::types::{AccountId, Amount};
    use chrono::Duration;

    #[test]
    fn test_ensure_current_is_noop_while_open() {
        let mut engine = engine();
        engine.take_changes();

        engine.ensure_current(start()).unwrap();
        engine
            .ensure_current(engine.current_round().closes_at - Duration::seconds(1))
            .unwrap();

        assert_eq!(engine.current_round_id(), 1);
        assert!(!engine.has_changes());
    }

    #[test]
    fn test_close_exactly_at_deadline() {
        let mut engine = engine();
        let deadline = engine.current_round().closes_at;

        assert!(matches!(
            engine.close_round(1, deadline - Duration::seconds(1)),
            Err(LotteryError::StillActive { round_id: 1 })
        ));
        assert_eq!(engine.close_round(1, deadline).unwrap(), 2);
    }

    #[test]
    fn test_one_close_per_round_even_after_long_idle() {
        let mut engine = engine();
        let later = start() + Duration::days(30);

        engine
            .buy(
                &AccountId::new("alice"),
                numbers_matching(1),
                engine.config().ticket_price,
                later,
            )
            .unwrap();

        // the idle weeks collapse into a single close
        assert_eq!(engine.current_round_id(), 2);
        assert_eq!(engine.current_round().opened_at, later);
        assert_eq!(engine.rounds().filter(|r| r.closed).count(), 1);
    }

    #[test]
    fn test_close_reveals_committed_seed() {
        let mut engine = engine();
        let commitment = engine.current_round().seed_commitment.clone();

        engine.draw(after_close(&engine)).unwrap();

        let closed = engine.round_details(1).unwrap();
        assert_eq!(closed.revealed_seed.as_deref(), Some(hex::encode(SEED).as_str()));
        assert_eq!(closed.winning_numbers, Some(winning()));
        assert!(SeedCommitment::from_hex(&commitment).unwrap().verify(&SEED));
        assert!(closed.closed_at.is_some());

        let next = engine.current_round();
        assert!(next.revealed_seed.is_none());
        assert!(!next.seed_commitment.is_empty());
    }

    #[test]
    fn test_contribution_resets_after_empty_round() {
        let mut engine = engine();
        let alice = AccountId::new("alice");

        engine
            .buy(&alice, numbers_matching(0), engine.config().ticket_price, start())
            .unwrap();
        engine.draw(after_close(&engine)).unwrap();
        let carried = engine.jackpot_snapshot().current_contribution;
        assert!(!carried.is_zero());

        // nobody plays round 2, so the carry passes straight through
        engine.draw(after_close(&engine)).unwrap();
        assert_eq!(engine.jackpot_snapshot().current_contribution, carried);
        assert_eq!(engine.round_details(2).unwrap().distributed_total, Amount::ZERO);
        assert_eq!(engine.jackpot_snapshot().rollover, Amount::ZERO);
    }
}
