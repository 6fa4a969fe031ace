use crate::config::LotteryConfig;
use crate::draw::{seed_from_hex, seed_to_hex};
use crate::engine::{ClaimRecord, EngineState, JackpotState, LedgerBalances, Transfer};
use crate::error::{LotteryError, Result};
use crate::storage::{amount_column, amount_param, from_millis, to_millis};
use crate::types::{AccountId, RoundId};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

/// Engine-wide state, claims and the transfer journal.
pub struct LedgerStore<'a> {
    conn: &'a Connection,
}

impl<'a> LedgerStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn state_exists(&self) -> Result<bool> {
        let row: Option<i64> = self
            .conn
            .query_row("SELECT id FROM engine_state WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        Ok(row.is_some())
    }

    pub fn insert_state(&self, config: &LotteryConfig, state: &EngineState) -> Result<()> {
        let now = to_millis(Utc::now());

        self.conn.execute(
            "INSERT INTO engine_state
             (id, config, current_round_id, operator_balance, vault, jackpot_rollover,
              jackpot_contribution, pending_seed, created_at, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                serde_json::to_string(config)?,
                state.current_round_id as i64,
                amount_param(state.balances.operator_balance),
                amount_param(state.balances.vault),
                amount_param(state.balances.jackpot.rollover),
                amount_param(state.balances.jackpot.current_contribution),
                seed_to_hex(&state.pending_seed),
                now,
            ],
        )?;

        Ok(())
    }

    pub fn update_state(&self, state: &EngineState) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE engine_state SET current_round_id = ?1, operator_balance = ?2, vault = ?3,
             jackpot_rollover = ?4, jackpot_contribution = ?5, pending_seed = ?6, updated_at = ?7
             WHERE id = 1",
            params![
                state.current_round_id as i64,
                amount_param(state.balances.operator_balance),
                amount_param(state.balances.vault),
                amount_param(state.balances.jackpot.rollover),
                amount_param(state.balances.jackpot.current_contribution),
                seed_to_hex(&state.pending_seed),
                to_millis(Utc::now()),
            ],
        )?;

        if updated == 0 {
            return Err(LotteryError::internal("Engine state row missing"));
        }
        Ok(())
    }

    pub fn load_state(&self) -> Result<Option<(LotteryConfig, EngineState)>> {
        let row = self
            .conn
            .query_row(
                "SELECT config, current_round_id, operator_balance, vault, jackpot_rollover,
                 jackpot_contribution, pending_seed FROM engine_state WHERE id = 1",
                [],
                |row| {
                    let config: String = row.get(0)?;
                    let seed: String = row.get(6)?;
                    let state = (
                        row.get::<_, i64>(1)? as RoundId,
                        LedgerBalances {
                            operator_balance: amount_column(row.get(2)?),
                            vault: amount_column(row.get(3)?),
                            jackpot: JackpotState {
                                rollover: amount_column(row.get(4)?),
                                current_contribution: amount_column(row.get(5)?),
                            },
                        },
                    );
                    Ok((config, state, seed))
                },
            )
            .optional()?;

        let Some((config_json, (current_round_id, balances), seed_hex)) = row else {
            return Ok(None);
        };

        let config: LotteryConfig = serde_json::from_str(&config_json)?;
        let state = EngineState {
            current_round_id,
            balances,
            pending_seed: seed_from_hex(&seed_hex)?,
        };
        Ok(Some((config, state)))
    }

    pub fn insert_claim(&self, claim: &ClaimRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO claims (owner, round_id, amount, claimed_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                claim.owner.as_str(),
                claim.round_id as i64,
                amount_param(claim.amount),
                to_millis(claim.claimed_at),
            ],
        )?;

        Ok(())
    }

    pub fn list_claims(&self) -> Result<Vec<ClaimRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT owner, round_id, amount, claimed_at FROM claims ORDER BY round_id ASC, owner ASC",
        )?;

        let claim_iter = stmt.query_map([], |row| {
            let owner: String = row.get(0)?;
            Ok(ClaimRecord {
                owner: AccountId::new(owner),
                round_id: row.get::<_, i64>(1)? as RoundId,
                claimed: true,
                amount: amount_column(row.get(2)?),
                claimed_at: from_millis(3, row.get(3)?)?,
            })
        })?;

        let mut claims = Vec::new();
        for claim in claim_iter {
            claims.push(claim?);
        }

        Ok(claims)
    }

    pub fn insert_transfer(&self, transfer: &Transfer) -> Result<()> {
        self.conn.execute(
            "INSERT INTO transfers (id, recipient, amount, kind, round_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                transfer.id.to_string(),
                transfer.recipient.as_str(),
                amount_param(transfer.amount),
                transfer.kind.as_str(),
                transfer.round_id.map(|id| id as i64),
                to_millis(transfer.created_at),
            ],
        )?;

        tracing::debug!(
            "Journaled {} transfer {} of {} to {}",
            transfer.kind,
            transfer.id,
            transfer.amount,
            transfer.recipient
        );
        Ok(())
    }

    /// Most recent first, optionally for a single recipient.
    pub fn list_transfers(
        &self,
        recipient: Option<&AccountId>,
        limit: usize,
    ) -> Result<Vec<Transfer>> {
        let limit = limit as i64;
        let mut transfers = Vec::new();

        match recipient {
            Some(recipient) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, recipient, amount, kind, round_id, created_at FROM transfers
                     WHERE recipient = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![recipient.as_str(), limit], transfer_from_row)?;
                for transfer in rows {
                    transfers.push(transfer?);
                }
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, recipient, amount, kind, round_id, created_at FROM transfers
                     ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit], transfer_from_row)?;
                for transfer in rows {
                    transfers.push(transfer?);
                }
            }
        }

        Ok(transfers)
    }
}

fn transfer_from_row(row: &Row<'_>) -> rusqlite::Result<Transfer> {
    let id: String = row.get(0)?;
    let recipient: String = row.get(1)?;
    let kind: String = row.get(3)?;
    let round_id: Option<i64> = row.get(4)?;

    Ok(Transfer {
        id: Uuid::parse_str(&id).map_err(|_| {
            rusqlite::Error::InvalidColumnType(0, "id".to_string(), rusqlite::types::Type::Text)
        })?,
        recipient: AccountId::new(recipient),
        amount: amount_column(row.get(2)?),
        kind: kind.parse().map_err(|_| {
            rusqlite::Error::InvalidColumnType(3, "kind".to_string(), rusqlite::types::Type::Text)
        })?,
        round_id: round_id.map(|id| id as RoundId),
        created_at: from_millis(5, row.get(5)?)?,
    })
}
