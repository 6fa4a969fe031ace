use crate::config::LotteryConfig;
use crate::constants::NUMBERS_PER_TICKET;
use crate::engine::ledger::Ledger;
use crate::error::{LotteryError, Result};
use crate::round::Round;
use crate::types::{AccountId, Amount, NumberSet, RoundId, Ticket};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// How a single ticket payment is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProceedsSplit {
    /// Credited to the operator.
    pub fee: Amount,
    /// Added to the round's prize pool.
    pub net: Amount,
}

#[derive(Debug, Clone, Default)]
pub struct TicketBook {
    tickets: BTreeMap<RoundId, Vec<Ticket>>,
    total: u64,
}

impl TicketBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the book from persisted tickets, in any order.
    pub fn from_tickets(tickets: impl IntoIterator<Item = Ticket>) -> Self {
        let mut book = Self::new();
        for ticket in tickets {
            book.tickets.entry(ticket.round_id).or_default().push(ticket);
            book.total += 1;
        }
        for round_tickets in book.tickets.values_mut() {
            round_tickets.sort_by_key(|ticket| ticket.index);
        }
        book
    }

    pub fn split_payment(config: &LotteryConfig, paid: Amount) -> Result<ProceedsSplit> {
        if paid != config.ticket_price {
            return Err(LotteryError::InvalidPrice {
                expected: config.ticket_price,
                offered: paid,
            });
        }

        Ok(ProceedsSplit {
            fee: config.ticket_fee(),
            net: config.ticket_net(),
        })
    }

    /// Records a ticket in `round`. The round must be open; callers close
    /// expired rounds first.
    ///
    /// Validation happens before anything is touched, so an error leaves the
    /// book, the ledger and the round unchanged.
    #[allow(clippy::too_many_arguments)]
    pub fn buy(
        &mut self,
        ledger: &mut Ledger,
        round: &mut Round,
        config: &LotteryConfig,
        owner: &AccountId,
        numbers: [u8; NUMBERS_PER_TICKET],
        paid: Amount,
        now: DateTime<Utc>,
    ) -> Result<Ticket> {
        let split = Self::split_payment(config, paid)?;
        let numbers = NumberSet::new(numbers)?;

        if round.closed {
            return Err(LotteryError::AlreadyClosed { round_id: round.id });
        }

        let collected = round
            .collected
            .checked_add(split.net)
            .ok_or(LotteryError::MathOverflow("round proceeds"))?;
        collected
            .checked_add(round.jackpot_contribution)
            .ok_or(LotteryError::MathOverflow("prize pool"))?;
        let ticket_count = round
            .ticket_count
            .checked_add(1)
            .ok_or(LotteryError::MathOverflow("ticket count"))?;

        ledger.credit_ticket(paid, split.fee)?;

        let ticket = Ticket {
            owner: owner.clone(),
            round_id: round.id,
            index: round.ticket_count,
            numbers,
            purchased_at: now,
        };

        round.collected = collected;
        round.ticket_count = ticket_count;
        self.tickets
            .entry(round.id)
            .or_default()
            .push(ticket.clone());
        self.total += 1;

        tracing::debug!(
            "Ticket {} in round {} for {}: {}",
            ticket.index,
            ticket.round_id,
            owner,
            ticket.numbers
        );
        Ok(ticket)
    }

    pub fn round_tickets(&self, round_id: RoundId) -> &[Ticket] {
        self.tickets
            .get(&round_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn owner_tickets<'a>(
        &'a self,
        owner: &'a AccountId,
        round_id: RoundId,
    ) -> impl Iterator<Item = &'a Ticket> {
        self.round_tickets(round_id)
            .iter()
            .filter(move |ticket| &ticket.owner == owner)
    }

    /// The owner's tickets in purchase order.
    pub fn tickets_of(&self, owner: &AccountId, round_id: RoundId) -> Vec<Ticket> {
        self.owner_tickets(owner, round_id).cloned().collect()
    }

    /// Rounds in which `owner` holds at least one ticket, ascending.
    pub fn rounds_of(&self, owner: &AccountId) -> Vec<RoundId> {
        self.tickets
            .iter()
            .filter(|(_, tickets)| tickets.iter().any(|ticket| &ticket.owner == owner))
            .map(|(round_id, _)| *round_id)
            .collect()
    }

    pub fn total_count(&self) -> u64 {
        self.total
    }

    /// Drops tickets beyond the given per-round lengths. Used to undo a
    /// failed request.
    pub(crate) fn truncate_to(&mut self, lengths: &BTreeMap<RoundId, usize>) {
        self.tickets.retain(|round_id, _| lengths.contains_key(round_id));
        for (round_id, tickets) in self.tickets.iter_mut() {
            if let Some(&len) = lengths.get(round_id) {
                tickets.truncate(len);
            }
        }
        self.total = self.tickets.values().map(|tickets| tickets.len() as u64).sum();
    }

    pub(crate) fn lengths(&self) -> BTreeMap<RoundId, usize> {
        self.tickets
            .iter()
            .map(|(round_id, tickets)| (*round_id, tickets.len()))
            .collect()
    }
}
