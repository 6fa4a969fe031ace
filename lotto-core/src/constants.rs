pub const NUMBERS_PER_TICKET: usize = 5;

pub const MIN_NUMBER: u8 = 1;
pub const MAX_NUMBER: u8 = 35;

/// Match counts that earn a share of the round pool, lowest first.
pub const PRIZE_TIERS: [u8; 4] = [2, 3, 4, 5];

pub const BPS_DENOMINATOR: u64 = 10_000;

pub const UNITS_PER_COIN: u64 = 100_000_000;

pub const DEFAULT_TICKET_PRICE: u64 = UNITS_PER_COIN; // 1 coin
pub const DEFAULT_FEE_BPS: u16 = 100; // 1%
pub const DEFAULT_ROUND_DURATION_SECS: u64 = 302_400; // 3.5 days
pub const MAX_ROUND_DURATION_SECS: u64 = 31_536_000; // 365 days

pub const DEFAULT_OPERATOR: &str = "operator";

pub const DB_FILE_NAME: &str = "lotto.db";
