use crate::types::{AccountId, Amount, NumberSet, RoundId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Notification emitted after a request commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LotteryEvent {
    TicketPurchased {
        owner: AccountId,
        round_id: RoundId,
        ticket_index: u64,
        numbers: NumberSet,
        at: DateTime<Utc>,
    },
    RoundClosed {
        round_id: RoundId,
        winning_numbers: NumberSet,
        prize_pool: Amount,
        allocated: Amount,
        rollover: Amount,
        ticket_count: u64,
        at: DateTime<Utc>,
    },
    PrizeClaimed {
        owner: AccountId,
        round_id: RoundId,
        amount: Amount,
        at: DateTime<Utc>,
    },
    FeesWithdrawn {
        operator: AccountId,
        amount: Amount,
        at: DateTime<Utc>,
    },
    JackpotRolledOver {
        from_round: RoundId,
        to_round: RoundId,
        amount: Amount,
    },
    EmergencySweep {
        operator: AccountId,
        amount: Amount,
        at: DateTime<Utc>,
    },
}

impl LotteryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LotteryEvent::TicketPurchased { .. } => "ticket_purchased",
            LotteryEvent::RoundClosed { .. } => "round_closed",
            LotteryEvent::PrizeClaimed { .. } => "prize_claimed",
            LotteryEvent::FeesWithdrawn { .. } => "fees_withdrawn",
            LotteryEvent::JackpotRolledOver { .. } => "jackpot_rolled_over",
            LotteryEvent::EmergencySweep { .. } => "emergency_sweep",
        }
    }

    pub fn round_id(&self) -> Option<RoundId> {
        match self {
            LotteryEvent::TicketPurchased { round_id, .. }
            | LotteryEvent::RoundClosed { round_id, .. }
            | LotteryEvent::PrizeClaimed { round_id, .. } => Some(*round_id),
            LotteryEvent::JackpotRolledOver { from_round, .. } => Some(*from_round),
            LotteryEvent::FeesWithdrawn { .. } | LotteryEvent::EmergencySweep { .. } => None,
        }
    }

    fn log(&self) {
        match self {
            LotteryEvent::TicketPurchased {
                owner,
                round_id,
                ticket_index,
                numbers,
                ..
            } => tracing::info!(
                "Ticket #{} purchased by {} in round {}: {}",
                ticket_index,
                owner,
                round_id,
                numbers
            ),
            LotteryEvent::RoundClosed {
                round_id,
                winning_numbers,
                prize_pool,
                rollover,
                ..
            } => tracing::info!(
                "Round {} drawn: {} (pool {}, rollover {})",
                round_id,
                winning_numbers,
                prize_pool,
                rollover
            ),
            LotteryEvent::PrizeClaimed {
                owner,
                round_id,
                amount,
                ..
            } => tracing::info!("{} claimed {} from round {}", owner, amount, round_id),
            LotteryEvent::FeesWithdrawn {
                operator, amount, ..
            } => tracing::info!("Operator {} withdrew {} in fees", operator, amount),
            LotteryEvent::JackpotRolledOver {
                from_round,
                to_round,
                amount,
            } => tracing::info!(
                "Jackpot of {} rolled from round {} into round {}",
                amount,
                from_round,
                to_round
            ),
            LotteryEvent::EmergencySweep {
                operator, amount, ..
            } => tracing::warn!("Emergency sweep of {} to {}", amount, operator),
        }
    }
}

/// Fans committed events out to subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LotteryEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LotteryEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, events: impl IntoIterator<Item = LotteryEvent>) {
        for event in events {
            event.log();
            // no subscribers is fine
            let _ = self.sender.send(event);
        }
    }
}
