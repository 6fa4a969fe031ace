//! The lottery state machine.
//!
//! [`LotteryEngine`] owns every round, ticket and balance and is driven by
//! one request at a time. Each mutating request reads the clock once, brings
//! the current round up to date, and either completes or leaves the engine
//! exactly as it found it. Whatever a request changed is collected in a
//! [`ChangeSet`] for the caller to persist and publish.

pub mod ledger;
pub mod prize;
mod scheduler;
pub mod ticket_book;

pub use ledger::{ClaimRecord, JackpotState, Ledger, LedgerBalances, Transfer, TransferKind};
pub use prize::{Settlement, TierPayout};
pub use ticket_book::TicketBook;

use crate::config::LotteryConfig;
use crate::constants::NUMBERS_PER_TICKET;
use crate::draw::{seed_from_hex, Seed, SeedCommitment, SeedSource};
use crate::error::{LotteryError, Result};
use crate::events::LotteryEvent;
use crate::round::{Round, RoundSummary};
use crate::stats::PlayerStatistics;
use crate::types::{AccountId, Amount, NumberSet, RoundId, Ticket};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Engine-wide scalars, persisted as a single row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    pub current_round_id: RoundId,
    pub balances: LedgerBalances,
    /// Seed committed to by the current round, revealed when it closes.
    pub pending_seed: Seed,
}

/// Everything needed to rebuild an engine from storage.
#[derive(Debug, Clone)]
pub struct EngineParts {
    pub config: LotteryConfig,
    pub state: EngineState,
    pub rounds: Vec<Round>,
    pub tickets: Vec<Ticket>,
    pub claims: Vec<ClaimRecord>,
}

/// What a committed request changed.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    pub state: EngineState,
    pub rounds: Vec<Round>,
    pub tickets: Vec<Ticket>,
    pub claims: Vec<ClaimRecord>,
    pub transfers: Vec<Transfer>,
    pub events: Vec<LotteryEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JackpotSnapshot {
    pub rollover: Amount,
    pub current_contribution: Amount,
    pub current_pool: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPrize {
    pub round_id: RoundId,
    pub amount: Amount,
}

#[derive(Debug, Default)]
struct Outbox {
    dirty_rounds: BTreeSet<RoundId>,
    tickets: Vec<Ticket>,
    claims: Vec<ClaimRecord>,
    transfers: Vec<Transfer>,
    events: Vec<LotteryEvent>,
}

/// State captured before a request so a failure can be undone.
struct Checkpoint {
    current_round: Round,
    balances: LedgerBalances,
    pending_seed: Seed,
    ticket_lengths: BTreeMap<RoundId, usize>,
    dirty_rounds: BTreeSet<RoundId>,
    outbox_lengths: [usize; 4],
}

pub struct LotteryEngine {
    config: LotteryConfig,
    rounds: BTreeMap<RoundId, Round>,
    current_round_id: RoundId,
    book: TicketBook,
    ledger: Ledger,
    seeds: Box<dyn SeedSource>,
    pending_seed: Seed,
    outbox: Outbox,
}

impl fmt::Debug for LotteryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LotteryEngine")
            .field("config", &self.config)
            .field("current_round_id", &self.current_round_id)
            .field("rounds", &self.rounds.len())
            .field("tickets", &self.book.total_count())
            .field("balances", &self.ledger.balances())
            .finish_non_exhaustive()
    }
}

impl LotteryEngine {
    /// Starts a fresh lottery with round 1 opening at `now`.
    pub fn new(
        config: LotteryConfig,
        mut seeds: Box<dyn SeedSource>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        config.validate()?;

        let seed = seeds.next_seed(1);
        let round = Round::open(
            1,
            now,
            config.round_duration_chrono()?,
            Amount::ZERO,
            SeedCommitment::new(&seed).to_hex(),
        )?;

        let mut engine = Self {
            config,
            rounds: BTreeMap::from([(1, round)]),
            current_round_id: 1,
            book: TicketBook::new(),
            ledger: Ledger::new(),
            seeds,
            pending_seed: seed,
            outbox: Outbox::default(),
        };
        engine.outbox.dirty_rounds.insert(1);

        tracing::info!("Lottery started, round 1 open until {}", engine.current_round().closes_at);
        Ok(engine)
    }

    pub fn from_parts(parts: EngineParts, seeds: Box<dyn SeedSource>) -> Result<Self> {
        let (config, rounds, book, ledger, state) = Self::unpack(parts)?;

        Ok(Self {
            config,
            rounds,
            current_round_id: state.current_round_id,
            book,
            ledger,
            seeds,
            pending_seed: state.pending_seed,
            outbox: Outbox::default(),
        })
    }

    /// Replaces all state with `parts`, keeping the seed source. Pending
    /// changes are discarded.
    pub fn reset_to(&mut self, parts: EngineParts) -> Result<()> {
        let (config, rounds, book, ledger, state) = Self::unpack(parts)?;

        self.config = config;
        self.rounds = rounds;
        self.current_round_id = state.current_round_id;
        self.book = book;
        self.ledger = ledger;
        self.pending_seed = state.pending_seed;
        self.outbox = Outbox::default();
        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn unpack(
        parts: EngineParts,
    ) -> Result<(
        LotteryConfig,
        BTreeMap<RoundId, Round>,
        TicketBook,
        Ledger,
        EngineState,
    )> {
        parts.config.validate()?;

        let rounds: BTreeMap<RoundId, Round> = parts
            .rounds
            .into_iter()
            .map(|round| (round.id, round))
            .collect();

        match rounds.get(&parts.state.current_round_id) {
            Some(round) if !round.closed => {}
            Some(_) => {
                return Err(LotteryError::internal(format!(
                    "Current round {} is already closed",
                    parts.state.current_round_id
                )))
            }
            None => {
                return Err(LotteryError::internal(format!(
                    "Current round {} missing from storage",
                    parts.state.current_round_id
                )))
            }
        }

        let book = TicketBook::from_tickets(parts.tickets);
        let ledger = Ledger::restore(parts.state.balances, parts.claims);
        Ok((parts.config, rounds, book, ledger, parts.state))
    }

    // ---- actions ----

    /// Buys one ticket in the current round, closing it first if it expired.
    pub fn buy(
        &mut self,
        owner: &AccountId,
        numbers: [u8; NUMBERS_PER_TICKET],
        paid: Amount,
        now: DateTime<Utc>,
    ) -> Result<Ticket> {
        self.transact(|engine| {
            engine.ensure_current(now)?;

            let round_id = engine.current_round_id;
            let round = engine
                .rounds
                .get_mut(&round_id)
                .ok_or(LotteryError::UnknownRound(round_id))?;
            let ticket = engine.book.buy(
                &mut engine.ledger,
                round,
                &engine.config,
                owner,
                numbers,
                paid,
                now,
            )?;

            engine.outbox.dirty_rounds.insert(round_id);
            engine.outbox.tickets.push(ticket.clone());
            engine.outbox.events.push(LotteryEvent::TicketPurchased {
                owner: owner.clone(),
                round_id,
                ticket_index: ticket.index,
                numbers: ticket.numbers,
                at: now,
            });
            Ok(ticket)
        })
    }

    /// Draws and closes the current round. Returns the id of the round that
    /// opened in its place.
    pub fn draw(&mut self, now: DateTime<Utc>) -> Result<RoundId> {
        let round_id = self.current_round_id;
        self.close_round(round_id, now)
    }

    /// Pays out everything `owner` won in `round_id`.
    pub fn claim(
        &mut self,
        owner: &AccountId,
        round_id: RoundId,
        now: DateTime<Utc>,
    ) -> Result<Amount> {
        self.transact(|engine| {
            engine.ensure_current(now)?;

            let prize = engine.prize_of(owner, engine.round_details(round_id)?)?;
            let round = engine
                .rounds
                .get_mut(&round_id)
                .ok_or(LotteryError::UnknownRound(round_id))?;
            let (record, transfer) = engine.ledger.claim(owner, round, prize, now)?;

            engine.outbox.dirty_rounds.insert(round_id);
            engine.outbox.claims.push(record);
            engine.outbox.transfers.push(transfer);
            engine.outbox.events.push(LotteryEvent::PrizeClaimed {
                owner: owner.clone(),
                round_id,
                amount: prize,
                at: now,
            });
            Ok(prize)
        })
    }

    pub fn withdraw_fees(&mut self, caller: &AccountId, now: DateTime<Utc>) -> Result<Transfer> {
        self.transact(|engine| {
            engine.ensure_current(now)?;

            let transfer = engine
                .ledger
                .withdraw_fees(caller, &engine.config.operator, now)?;

            engine.outbox.transfers.push(transfer.clone());
            engine.outbox.events.push(LotteryEvent::FeesWithdrawn {
                operator: caller.clone(),
                amount: transfer.amount,
                at: now,
            });
            Ok(transfer)
        })
    }

    /// Sweeps the entire vault to the operator. Round history stays intact,
    /// later claims fail until the vault is replenished. The open round keeps
    /// its tickets but its pool, which left with the vault, drops to zero.
    pub fn emergency_withdraw(
        &mut self,
        caller: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<Transfer> {
        self.transact(|engine| {
            engine.ensure_current(now)?;

            let transfer = engine
                .ledger
                .emergency_withdraw(caller, &engine.config.operator, now)?;

            let round_id = engine.current_round_id;
            if let Some(round) = engine.rounds.get_mut(&round_id) {
                round.collected = Amount::ZERO;
                round.jackpot_contribution = Amount::ZERO;
            }
            engine.outbox.dirty_rounds.insert(round_id);
            engine.outbox.transfers.push(transfer.clone());
            engine.outbox.events.push(LotteryEvent::EmergencySweep {
                operator: caller.clone(),
                amount: transfer.amount,
                at: now,
            });
            Ok(transfer)
        })
    }

    /// Hands over everything changed since the last call.
    pub fn take_changes(&mut self) -> ChangeSet {
        let outbox = std::mem::take(&mut self.outbox);
        let rounds = outbox
            .dirty_rounds
            .iter()
            .filter_map(|id| self.rounds.get(id).cloned())
            .collect();

        ChangeSet {
            state: self.state(),
            rounds,
            tickets: outbox.tickets,
            claims: outbox.claims,
            transfers: outbox.transfers,
            events: outbox.events,
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.outbox.dirty_rounds.is_empty()
            || !self.outbox.transfers.is_empty()
            || !self.outbox.claims.is_empty()
    }

    // ---- queries ----

    pub fn config(&self) -> &LotteryConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        EngineState {
            current_round_id: self.current_round_id,
            balances: self.ledger.balances(),
            pending_seed: self.pending_seed,
        }
    }

    pub fn current_round_id(&self) -> RoundId {
        self.current_round_id
    }

    pub fn current_round(&self) -> &Round {
        // the current round is inserted before current_round_id moves
        &self.rounds[&self.current_round_id]
    }

    pub fn current_round_summary(&self) -> RoundSummary {
        self.current_round().summary()
    }

    pub fn round_details(&self, round_id: RoundId) -> Result<&Round> {
        self.rounds
            .get(&round_id)
            .ok_or(LotteryError::UnknownRound(round_id))
    }

    /// All rounds, oldest first.
    pub fn rounds(&self) -> impl DoubleEndedIterator<Item = &Round> {
        self.rounds.values()
    }

    pub fn tickets_of(&self, owner: &AccountId, round_id: RoundId) -> Vec<Ticket> {
        self.book.tickets_of(owner, round_id)
    }

    pub fn round_tickets(&self, round_id: RoundId) -> &[Ticket] {
        self.book.round_tickets(round_id)
    }

    pub fn rounds_played(&self, owner: &AccountId) -> Vec<RoundId> {
        self.book.rounds_of(owner)
    }

    /// What `owner` could claim for `round_id` right now. Zero for unknown
    /// or open rounds and after claiming.
    pub fn pending_prize(&self, owner: &AccountId, round_id: RoundId) -> Result<Amount> {
        let Some(round) = self.rounds.get(&round_id) else {
            return Ok(Amount::ZERO);
        };
        if self.ledger.is_claimed(owner, round_id) {
            return Ok(Amount::ZERO);
        }
        self.prize_of(owner, round)
    }

    /// Every closed round in which `owner` has an unclaimed prize.
    pub fn pending_prizes(&self, owner: &AccountId) -> Result<Vec<PendingPrize>> {
        let mut pending = Vec::new();
        for round_id in self.book.rounds_of(owner) {
            let amount = self.pending_prize(owner, round_id)?;
            if !amount.is_zero() {
                pending.push(PendingPrize { round_id, amount });
            }
        }
        Ok(pending)
    }

    pub fn claimed_status(&self, owner: &AccountId, round_id: RoundId) -> bool {
        self.ledger.is_claimed(owner, round_id)
    }

    pub fn claim_record(&self, owner: &AccountId, round_id: RoundId) -> Option<&ClaimRecord> {
        self.ledger.claim_record(owner, round_id)
    }

    pub fn total_claimed(&self, owner: &AccountId) -> Amount {
        self.ledger
            .claims_of(owner)
            .fold(Amount::ZERO, |total, record| total.saturating_add(record.amount))
    }

    pub fn jackpot_snapshot(&self) -> JackpotSnapshot {
        let jackpot = self.ledger.jackpot();
        JackpotSnapshot {
            rollover: jackpot.rollover,
            current_contribution: jackpot.current_contribution,
            current_pool: self.current_round().prize_pool(),
        }
    }

    pub fn operator_balance(&self) -> Amount {
        self.ledger.operator_balance()
    }

    /// Value held and not yet transferred out.
    pub fn vault(&self) -> Amount {
        self.ledger.vault()
    }

    pub fn time_until_draw(&self, now: DateTime<Utc>) -> u64 {
        self.current_round().seconds_until_close(now)
    }

    pub fn total_tickets(&self) -> u64 {
        self.book.total_count()
    }

    /// `None` until the round has been drawn.
    pub fn winning_numbers(&self, round_id: RoundId) -> Result<Option<NumberSet>> {
        Ok(self.round_details(round_id)?.winning_numbers)
    }

    /// Recomputes a closed round's result from its revealed seed.
    pub fn verify_draw(&self, round_id: RoundId) -> Result<bool> {
        let round = self.round_details(round_id)?;
        let (Some(winning), Some(revealed)) = (&round.winning_numbers, &round.revealed_seed) else {
            return Err(LotteryError::RoundNotClosed { round_id });
        };

        let seed = seed_from_hex(revealed)?;
        let commitment = SeedCommitment::from_hex(&round.seed_commitment)?;
        Ok(commitment.verify_draw(&seed, winning))
    }

    pub fn player_statistics(&self, owner: &AccountId) -> Result<PlayerStatistics> {
        PlayerStatistics::collect(self, owner)
    }

    fn prize_of(&self, owner: &AccountId, round: &Round) -> Result<Amount> {
        match (&round.settlement, &round.winning_numbers) {
            (Some(settlement), Some(winning)) if round.closed => prize::prize_for(
                settlement,
                self.book.owner_tickets(owner, round.id),
                winning,
            ),
            _ => Ok(Amount::ZERO),
        }
    }

    // ---- all-or-nothing ----

    fn transact<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let checkpoint = self.checkpoint();
        let result = op(self);
        if let Err(e) = &result {
            tracing::debug!("Request failed, rolling back: {}", e);
            self.rollback(checkpoint);
        }
        result
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            current_round: self.current_round().clone(),
            balances: self.ledger.balances(),
            pending_seed: self.pending_seed,
            ticket_lengths: self.book.lengths(),
            dirty_rounds: self.outbox.dirty_rounds.clone(),
            outbox_lengths: [
                self.outbox.tickets.len(),
                self.outbox.claims.len(),
                self.outbox.transfers.len(),
                self.outbox.events.len(),
            ],
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        let round_id = checkpoint.current_round.id;

        self.rounds.retain(|id, _| *id <= round_id);
        self.rounds.insert(round_id, checkpoint.current_round);
        self.current_round_id = round_id;
        self.pending_seed = checkpoint.pending_seed;
        self.ledger.set_balances(checkpoint.balances);
        self.book.truncate_to(&checkpoint.ticket_lengths);

        let [tickets, claims, transfers, events] = checkpoint.outbox_lengths;
        for record in self.outbox.claims.drain(claims..) {
            self.ledger.remove_claim(&record.owner, record.round_id);
        }
        self.outbox.tickets.truncate(tickets);
        self.outbox.transfers.truncate(transfers);
        self.outbox.events.truncate(events);
        self.outbox.dirty_rounds = checkpoint.dirty_rounds;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::draw::{draw_numbers, FixedSeedSource};
    use chrono::TimeZone;

    pub const SEED: Seed = [7u8; 32];

    pub fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    pub fn engine() -> LotteryEngine {
        LotteryEngine::new(
            LotteryConfig::default(),
            Box::new(FixedSeedSource(SEED)),
            start(),
        )
        .unwrap()
    }

    pub fn winning() -> NumberSet {
        draw_numbers(&SEED)
    }

    /// A selection sharing exactly `k` numbers with the fixed winning set.
    pub fn numbers_matching(k: usize) -> [u8; NUMBERS_PER_TICKET] {
        let winning = winning();
        let hits = winning.as_slice().iter().copied().take(k);
        let misses = (1..=35u8).filter(|n| !winning.contains(*n)).take(NUMBERS_PER_TICKET - k);

        let mut numbers = [0u8; NUMBERS_PER_TICKET];
        for (slot, n) in numbers.iter_mut().zip(hits.chain(misses)) {
            *slot = n;
        }
        numbers
    }

    pub fn after_close(engine: &LotteryEngine) -> DateTime<Utc> {
        engine.current_round().closes_at + chrono::Duration::seconds(1)
    }
}
