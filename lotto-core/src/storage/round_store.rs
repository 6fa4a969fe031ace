use crate::error::Result;
use crate::round::Round;
use crate::storage::{amount_column, amount_param, from_millis, json_column, to_millis};
use crate::types::RoundId;
use rusqlite::{params, Connection, OptionalExtension, Row};

const ROUND_COLUMNS: &str = "id, opened_at, closes_at, closed, closed_at, ticket_count, collected, \
     jackpot_contribution, winning_numbers, distributed_total, seed_commitment, revealed_seed, \
     settlement";

pub struct RoundStore<'a> {
    conn: &'a Connection,
}

impl<'a> RoundStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn save_round(&self, round: &Round) -> Result<()> {
        let winning_json = round
            .winning_numbers
            .map(|numbers| serde_json::to_string(&numbers))
            .transpose()?;
        let settlement_json = round
            .settlement
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.execute(
            "INSERT INTO rounds
             (id, opened_at, closes_at, closed, closed_at, ticket_count, collected,
              jackpot_contribution, winning_numbers, distributed_total, seed_commitment,
              revealed_seed, settlement)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(id) DO UPDATE SET
                closed = excluded.closed,
                closed_at = excluded.closed_at,
                ticket_count = excluded.ticket_count,
                collected = excluded.collected,
                jackpot_contribution = excluded.jackpot_contribution,
                winning_numbers = excluded.winning_numbers,
                distributed_total = excluded.distributed_total,
                revealed_seed = excluded.revealed_seed,
                settlement = excluded.settlement",
            params![
                round.id as i64,
                to_millis(round.opened_at),
                to_millis(round.closes_at),
                round.closed,
                round.closed_at.map(to_millis),
                round.ticket_count as i64,
                amount_param(round.collected),
                amount_param(round.jackpot_contribution),
                winning_json,
                amount_param(round.distributed_total),
                round.seed_commitment,
                round.revealed_seed,
                settlement_json,
            ],
        )?;

        Ok(())
    }

    pub fn load_round(&self, round_id: RoundId) -> Result<Option<Round>> {
        let round = self
            .conn
            .query_row(
                &format!("SELECT {} FROM rounds WHERE id = ?1", ROUND_COLUMNS),
                params![round_id as i64],
                round_from_row,
            )
            .optional()?;

        Ok(round)
    }

    pub fn list_rounds(&self) -> Result<Vec<Round>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM rounds ORDER BY id ASC", ROUND_COLUMNS))?;

        let round_iter = stmt.query_map([], round_from_row)?;

        let mut rounds = Vec::new();
        for round in round_iter {
            rounds.push(round?);
        }

        Ok(rounds)
    }
}

fn round_from_row(row: &Row<'_>) -> rusqlite::Result<Round> {
    let winning_json: Option<String> = row.get(8)?;
    let settlement_json: Option<String> = row.get(12)?;
    let closed_at: Option<i64> = row.get(4)?;

    Ok(Round {
        id: row.get::<_, i64>(0)? as RoundId,
        opened_at: from_millis(1, row.get(1)?)?,
        closes_at: from_millis(2, row.get(2)?)?,
        closed: row.get(3)?,
        closed_at: closed_at.map(|millis| from_millis(4, millis)).transpose()?,
        ticket_count: row.get::<_, i64>(5)? as u64,
        collected: amount_column(row.get(6)?),
        jackpot_contribution: amount_column(row.get(7)?),
        winning_numbers: winning_json
            .map(|json| json_column(8, "winning_numbers", &json))
            .transpose()?,
        distributed_total: amount_column(row.get(9)?),
        seed_commitment: row.get(10)?,
        revealed_seed: row.get(11)?,
        settlement: settlement_json
            .map(|json| json_column(12, "settlement", &json))
            .transpose()?,
    })
}
