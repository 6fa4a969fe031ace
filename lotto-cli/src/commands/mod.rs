pub mod admin;
pub mod prize;
pub mod round;
pub mod ticket;

pub use admin::{handle_admin_command, AdminCommands};
pub use prize::{handle_prize_command, PrizeCommands};
pub use round::{handle_round_command, RoundCommands};
pub use ticket::{handle_ticket_command, TicketCommands};

use chrono::{DateTime, Utc};
use lotto_core::{AccountId, Amount, LotteryError, LotteryService, Result};

/// An opened lottery plus the account commands act as.
pub struct Session {
    pub service: LotteryService,
    account: Option<AccountId>,
}

impl Session {
    pub fn new(service: LotteryService, account: Option<AccountId>) -> Self {
        Self { service, account }
    }

    pub fn account(&self) -> Result<&AccountId> {
        self.account.as_ref().ok_or_else(|| {
            LotteryError::config("No account selected. Pass --account or run 'lotto use <account>'")
        })
    }
}

pub(crate) fn format_amount(amount: Amount) -> String {
    format!("{:.8} ({} units)", amount.to_coins(), amount)
}

pub(crate) fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub(crate) fn format_duration(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m {}s", minutes, secs % 60)
    }
}
