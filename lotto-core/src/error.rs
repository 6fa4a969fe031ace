use crate::types::{Amount, RoundId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LotteryError>;

#[derive(Error, Debug)]
pub enum LotteryError {
    #[error("Incorrect ticket price: expected {expected}, got {offered}")]
    InvalidPrice { expected: Amount, offered: Amount },

    #[error("Invalid number range: {number} is outside {min}..={max}")]
    InvalidRange { number: u8, min: u8, max: u8 },

    #[error("Duplicate numbers not allowed: {number} appears more than once")]
    DuplicateNumber { number: u8 },

    #[error("Round {round_id} still active")]
    StillActive { round_id: RoundId },

    #[error("Round {round_id} already closed")]
    AlreadyClosed { round_id: RoundId },

    #[error("Round {round_id} not drawn yet")]
    RoundNotClosed { round_id: RoundId },

    #[error("Prize already claimed for round {round_id}")]
    AlreadyClaimed { round_id: RoundId },

    #[error("No prize to claim in round {round_id}")]
    NoPrize { round_id: RoundId },

    #[error("Not the owner: {caller}")]
    NotOwner { caller: String },

    #[error("No operator fees to withdraw")]
    NothingToWithdraw,

    #[error("Unknown round: {0}")]
    UnknownRound(RoundId),

    #[error("Insufficient funds: need {need}, have {available}")]
    InsufficientFunds { need: Amount, available: Amount },

    #[error("Arithmetic overflow in {0}")]
    MathOverflow(&'static str),

    #[error("Lottery not initialized in {0}")]
    NotInitialized(String),

    #[error("Lottery already initialized in {0}")]
    AlreadyInitialized(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dialog error: {0}")]
    Dialog(String),
}

impl LotteryError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn dialog(msg: impl Into<String>) -> Self {
        Self::Dialog(msg.into())
    }

    /// Failures that resolve on their own once time passes.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StillActive { .. } | Self::RoundNotClosed { .. } | Self::Storage(_) | Self::Io(_)
        )
    }

    /// Failures that will repeat for the same input and must not be retried unchanged.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::InvalidRange { .. }
                | Self::DuplicateNumber { .. }
                | Self::NotOwner { .. }
                | Self::AlreadyClosed { .. }
                | Self::AlreadyClaimed { .. }
                | Self::UnknownRound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(LotteryError::StillActive { round_id: 1 }.is_transient());
        assert!(!LotteryError::StillActive { round_id: 1 }.is_permanent());

        assert!(LotteryError::NotOwner {
            caller: "mallory".to_string()
        }
        .is_permanent());
        assert!(LotteryError::DuplicateNumber { number: 7 }.is_permanent());
        assert!(LotteryError::InvalidRange {
            number: 36,
            min: 1,
            max: 35
        }
        .is_permanent());

        let price = LotteryError::InvalidPrice {
            expected: Amount::from_units(100),
            offered: Amount::from_units(50),
        };
        assert!(!price.is_transient());
        assert!(!price.is_permanent());
    }
}
