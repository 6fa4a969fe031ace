use crate::error::{LotteryError, Result};
use crate::round::Round;
use crate::types::{AccountId, Amount, RoundId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JackpotState {
    /// Value carried out of closed rounds, waiting for the next round to open.
    pub rollover: Amount,
    /// Rollover merged into the currently open round.
    pub current_contribution: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub owner: AccountId,
    pub round_id: RoundId,
    pub claimed: bool,
    pub amount: Amount,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferKind {
    Prize,
    OperatorFees,
    EmergencySweep,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferKind::Prize => "prize",
            TransferKind::OperatorFees => "operator_fees",
            TransferKind::EmergencySweep => "emergency_sweep",
        }
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferKind {
    type Err = LotteryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "prize" => Ok(TransferKind::Prize),
            "operator_fees" => Ok(TransferKind::OperatorFees),
            "emergency_sweep" => Ok(TransferKind::EmergencySweep),
            other => Err(LotteryError::internal(format!(
                "Unknown transfer kind: {}",
                other
            ))),
        }
    }
}

/// Value leaving the engine. Executing the actual payment is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub recipient: AccountId,
    pub amount: Amount,
    pub kind: TransferKind,
    pub round_id: Option<RoundId>,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    pub fn new(
        recipient: AccountId,
        amount: Amount,
        kind: TransferKind,
        round_id: Option<RoundId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient,
            amount,
            kind,
            round_id,
            created_at,
        }
    }
}

/// Scalar balances of the ledger, cheap to copy and persist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerBalances {
    pub operator_balance: Amount,
    /// Everything paid in and not yet paid out.
    pub vault: Amount,
    pub jackpot: JackpotState,
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    balances: LedgerBalances,
    claims: HashMap<(AccountId, RoundId), ClaimRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restore(balances: LedgerBalances, claims: Vec<ClaimRecord>) -> Self {
        let claims = claims
            .into_iter()
            .map(|record| ((record.owner.clone(), record.round_id), record))
            .collect();
        Self { balances, claims }
    }

    pub fn balances(&self) -> LedgerBalances {
        self.balances
    }

    pub(crate) fn set_balances(&mut self, balances: LedgerBalances) {
        self.balances = balances;
    }

    pub fn operator_balance(&self) -> Amount {
        self.balances.operator_balance
    }

    pub fn vault(&self) -> Amount {
        self.balances.vault
    }

    pub fn jackpot(&self) -> JackpotState {
        self.balances.jackpot
    }

    pub fn claim_record(&self, owner: &AccountId, round_id: RoundId) -> Option<&ClaimRecord> {
        self.claims.get(&(owner.clone(), round_id))
    }

    pub fn is_claimed(&self, owner: &AccountId, round_id: RoundId) -> bool {
        self.claim_record(owner, round_id)
            .map_or(false, |record| record.claimed)
    }

    pub fn claims_of<'a>(&'a self, owner: &'a AccountId) -> impl Iterator<Item = &'a ClaimRecord> {
        self.claims
            .values()
            .filter(move |record| &record.owner == owner)
    }

    /// Books a ticket payment: the whole amount enters the vault, `fee` of it
    /// is owed to the operator.
    pub fn credit_ticket(&mut self, paid: Amount, fee: Amount) -> Result<()> {
        let operator_balance = self
            .balances
            .operator_balance
            .checked_add(fee)
            .ok_or(LotteryError::MathOverflow("operator balance"))?;
        let vault = self
            .balances
            .vault
            .checked_add(paid)
            .ok_or(LotteryError::MathOverflow("vault"))?;

        self.balances.operator_balance = operator_balance;
        self.balances.vault = vault;
        Ok(())
    }

    /// Pays `prize` for `round` to `owner`, at most once per (owner, round).
    pub fn claim(
        &mut self,
        owner: &AccountId,
        round: &mut Round,
        prize: Amount,
        now: DateTime<Utc>,
    ) -> Result<(ClaimRecord, Transfer)> {
        if !round.closed {
            return Err(LotteryError::RoundNotClosed { round_id: round.id });
        }

        if self.is_claimed(owner, round.id) {
            return Err(LotteryError::AlreadyClaimed { round_id: round.id });
        }

        if prize.is_zero() {
            return Err(LotteryError::NoPrize { round_id: round.id });
        }

        let vault = self
            .balances
            .vault
            .checked_sub(prize)
            .ok_or(LotteryError::InsufficientFunds {
                need: prize,
                available: self.balances.vault,
            })?;
        let distributed_total = round
            .distributed_total
            .checked_add(prize)
            .ok_or(LotteryError::MathOverflow("distributed total"))?;

        let record = ClaimRecord {
            owner: owner.clone(),
            round_id: round.id,
            claimed: true,
            amount: prize,
            claimed_at: now,
        };

        self.balances.vault = vault;
        round.distributed_total = distributed_total;
        self.claims
            .insert((owner.clone(), round.id), record.clone());

        let transfer = Transfer::new(
            owner.clone(),
            prize,
            TransferKind::Prize,
            Some(round.id),
            now,
        );
        Ok((record, transfer))
    }

    pub fn withdraw_fees(
        &mut self,
        caller: &AccountId,
        operator: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<Transfer> {
        ensure_operator(caller, operator)?;

        let amount = self.balances.operator_balance;
        if amount.is_zero() {
            return Err(LotteryError::NothingToWithdraw);
        }

        let vault = self
            .balances
            .vault
            .checked_sub(amount)
            .ok_or(LotteryError::InsufficientFunds {
                need: amount,
                available: self.balances.vault,
            })?;

        self.balances.vault = vault;
        self.balances.operator_balance = Amount::ZERO;

        Ok(Transfer::new(
            caller.clone(),
            amount,
            TransferKind::OperatorFees,
            None,
            now,
        ))
    }

    /// Moves everything held to the operator. Succeeds with a zero transfer
    /// when the vault is empty. The carried jackpot left with the vault, so
    /// it is reset as well.
    pub fn emergency_withdraw(
        &mut self,
        caller: &AccountId,
        operator: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<Transfer> {
        ensure_operator(caller, operator)?;

        let amount = self.balances.vault;
        self.balances.vault = Amount::ZERO;
        self.balances.operator_balance = Amount::ZERO;
        self.balances.jackpot = JackpotState::default();

        Ok(Transfer::new(
            caller.clone(),
            amount,
            TransferKind::EmergencySweep,
            None,
            now,
        ))
    }

    pub(crate) fn remove_claim(&mut self, owner: &AccountId, round_id: RoundId) {
        self.claims.remove(&(owner.clone(), round_id));
    }

    pub fn absorb_rollover(&mut self, amount: Amount) -> Result<()> {
        self.balances.jackpot.rollover = self
            .balances
            .jackpot
            .rollover
            .checked_add(amount)
            .ok_or(LotteryError::MathOverflow("jackpot rollover"))?;
        Ok(())
    }

    /// Drains the rollover into the round that is opening and returns it.
    pub fn open_round_contribution(&mut self) -> Amount {
        let contribution = self.balances.jackpot.rollover;
        self.balances.jackpot = JackpotState {
            rollover: Amount::ZERO,
            current_contribution: contribution,
        };
        contribution
    }
}

fn ensure_operator(caller: &AccountId, operator: &AccountId) -> Result<()> {
    if caller != operator {
        return Err(LotteryError::NotOwner {
            caller: caller.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn closed_round(id: RoundId) -> Round {
        let mut round = Round::open(id, Utc::now(), Duration::hours(1), Amount::ZERO, String::new()).unwrap();
        round.closed = true;
        round
    }

    #[test]
    fn test_credit_ticket_splits_fee() {
        let mut ledger = Ledger::new();
        ledger
            .credit_ticket(Amount::from_units(100), Amount::from_units(1))
            .unwrap();
        ledger
            .credit_ticket(Amount::from_units(100), Amount::from_units(1))
            .unwrap();

        assert_eq!(ledger.operator_balance(), Amount::from_units(2));
        assert_eq!(ledger.vault(), Amount::from_units(200));
    }

    #[test]
    fn test_claim_once() {
        let alice = AccountId::new("alice");
        let mut ledger = Ledger::new();
        ledger
            .credit_ticket(Amount::from_units(1_000), Amount::from_units(10))
            .unwrap();
        let mut round = closed_round(1);

        let (record, transfer) = ledger
            .claim(&alice, &mut round, Amount::from_units(400), Utc::now())
            .unwrap();
        assert!(record.claimed);
        assert_eq!(record.amount, Amount::from_units(400));
        assert_eq!(transfer.kind, TransferKind::Prize);
        assert_eq!(transfer.round_id, Some(1));
        assert_eq!(round.distributed_total, Amount::from_units(400));
        assert_eq!(ledger.vault(), Amount::from_units(600));

        let again = ledger.claim(&alice, &mut round, Amount::from_units(400), Utc::now());
        assert!(matches!(again, Err(LotteryError::AlreadyClaimed { round_id: 1 })));
        assert_eq!(
            ledger.claim_record(&alice, 1).unwrap().amount,
            Amount::from_units(400)
        );
        assert_eq!(round.distributed_total, Amount::from_units(400));
    }

    #[test]
    fn test_claim_rejections() {
        let alice = AccountId::new("alice");
        let mut ledger = Ledger::new();
        ledger
            .credit_ticket(Amount::from_units(100), Amount::ZERO)
            .unwrap();

        let mut open = Round::open(2, Utc::now(), Duration::hours(1), Amount::ZERO, String::new()).unwrap();
        assert!(matches!(
            ledger.claim(&alice, &mut open, Amount::from_units(10), Utc::now()),
            Err(LotteryError::RoundNotClosed { round_id: 2 })
        ));

        let mut round = closed_round(1);
        assert!(matches!(
            ledger.claim(&alice, &mut round, Amount::ZERO, Utc::now()),
            Err(LotteryError::NoPrize { round_id: 1 })
        ));

        assert!(matches!(
            ledger.claim(&alice, &mut round, Amount::from_units(500), Utc::now()),
            Err(LotteryError::InsufficientFunds { .. })
        ));
        assert!(!ledger.is_claimed(&alice, 1));
        assert_eq!(round.distributed_total, Amount::ZERO);
    }

    #[test]
    fn test_withdraw_fees() {
        let operator = AccountId::new("operator");
        let mallory = AccountId::new("mallory");
        let mut ledger = Ledger::new();

        assert!(matches!(
            ledger.withdraw_fees(&operator, &operator, Utc::now()),
            Err(LotteryError::NothingToWithdraw)
        ));

        ledger
            .credit_ticket(Amount::from_units(100), Amount::from_units(1))
            .unwrap();
        assert!(matches!(
            ledger.withdraw_fees(&mallory, &operator, Utc::now()),
            Err(LotteryError::NotOwner { .. })
        ));

        let transfer = ledger.withdraw_fees(&operator, &operator, Utc::now()).unwrap();
        assert_eq!(transfer.amount, Amount::from_units(1));
        assert_eq!(transfer.kind, TransferKind::OperatorFees);
        assert_eq!(ledger.operator_balance(), Amount::ZERO);
        assert_eq!(ledger.vault(), Amount::from_units(99));
    }

    #[test]
    fn test_emergency_withdraw() {
        let operator = AccountId::new("operator");
        let mut ledger = Ledger::new();

        let empty = ledger
            .emergency_withdraw(&operator, &operator, Utc::now())
            .unwrap();
        assert_eq!(empty.amount, Amount::ZERO);

        ledger
            .credit_ticket(Amount::from_units(100), Amount::from_units(1))
            .unwrap();
        assert!(ledger
            .emergency_withdraw(&AccountId::new("mallory"), &operator, Utc::now())
            .is_err());

        let swept = ledger
            .emergency_withdraw(&operator, &operator, Utc::now())
            .unwrap();
        assert_eq!(swept.amount, Amount::from_units(100));
        assert_eq!(ledger.vault(), Amount::ZERO);
        assert_eq!(ledger.operator_balance(), Amount::ZERO);

        ledger
            .credit_ticket(Amount::from_units(100), Amount::from_units(1))
            .unwrap();
        ledger.absorb_rollover(Amount::from_units(40)).unwrap();
        ledger.open_round_contribution();
        ledger.absorb_rollover(Amount::from_units(10)).unwrap();
        ledger
            .emergency_withdraw(&operator, &operator, Utc::now())
            .unwrap();
        assert_eq!(ledger.jackpot(), JackpotState::default());
    }

    #[test]
    fn test_rollover_drains_into_contribution() {
        let mut ledger = Ledger::new();
        ledger.absorb_rollover(Amount::from_units(70)).unwrap();
        ledger.absorb_rollover(Amount::from_units(30)).unwrap();
        assert_eq!(ledger.jackpot().rollover, Amount::from_units(100));

        let contribution = ledger.open_round_contribution();
        assert_eq!(contribution, Amount::from_units(100));
        assert_eq!(
            ledger.jackpot(),
            JackpotState {
                rollover: Amount::ZERO,
                current_contribution: Amount::from_units(100),
            }
        );

        assert_eq!(ledger.open_round_contribution(), Amount::ZERO);
        assert_eq!(ledger.jackpot().current_contribution, Amount::ZERO);
    }

    #[test]
    fn test_transfer_kind_round_trip() {
        for kind in [
            TransferKind::Prize,
            TransferKind::OperatorFees,
            TransferKind::EmergencySweep,
        ] {
            assert_eq!(kind.as_str().parse::<TransferKind>().unwrap(), kind);
        }
        assert!("refund".parse::<TransferKind>().is_err());
    }
}
