//! Lotto core - draw-and-settlement engine for a numbers lottery
//!
//! Players buy tickets of five numbers against a round's prize pool. When a
//! round's deadline passes it is drawn from a committed seed, settled across
//! match tiers, and whatever nobody won rolls into the next round's jackpot.

pub mod clock;
pub mod config;
pub mod constants;
pub mod draw;
pub mod engine;
pub mod error;
pub mod events;
pub mod round;
pub mod service;
pub mod stats;
pub mod storage;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LotteryConfig, TierShares};
pub use draw::{draw_numbers, FixedSeedSource, OsSeedSource, SeedSource};
pub use engine::{
    ClaimRecord, JackpotSnapshot, LotteryEngine, PendingPrize, Settlement, Transfer, TransferKind,
};
pub use error::{LotteryError, Result};
pub use events::LotteryEvent;
pub use round::{Round, RoundPhase, RoundSummary};
pub use service::{DrawOutcome, LotteryService, ServiceOptions};
pub use stats::PlayerStatistics;
pub use types::{AccountId, Amount, NumberSet, RoundId, Ticket};
