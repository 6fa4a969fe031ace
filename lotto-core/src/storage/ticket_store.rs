use crate::error::Result;
use crate::storage::{from_millis, json_column, to_millis};
use crate::types::{AccountId, RoundId, Ticket};
use rusqlite::{params, Connection, Row};

pub struct TicketStore<'a> {
    conn: &'a Connection,
}

impl<'a> TicketStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Tickets are immutable, so a second insert of the same
    /// (round, index) is an error.
    pub fn insert_ticket(&self, ticket: &Ticket) -> Result<()> {
        let numbers_json = serde_json::to_string(&ticket.numbers)?;

        self.conn.execute(
            "INSERT INTO tickets (round_id, ticket_index, owner, numbers, purchased_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                ticket.round_id as i64,
                ticket.index as i64,
                ticket.owner.as_str(),
                numbers_json,
                to_millis(ticket.purchased_at),
            ],
        )?;

        Ok(())
    }

    pub fn list_tickets(&self) -> Result<Vec<Ticket>> {
        let mut stmt = self.conn.prepare(
            "SELECT round_id, ticket_index, owner, numbers, purchased_at
             FROM tickets ORDER BY round_id ASC, ticket_index ASC",
        )?;

        let ticket_iter = stmt.query_map([], ticket_from_row)?;

        let mut tickets = Vec::new();
        for ticket in ticket_iter {
            tickets.push(ticket?);
        }

        Ok(tickets)
    }

    pub fn tickets_of(&self, owner: &AccountId, round_id: RoundId) -> Result<Vec<Ticket>> {
        let mut stmt = self.conn.prepare(
            "SELECT round_id, ticket_index, owner, numbers, purchased_at
             FROM tickets WHERE owner = ?1 AND round_id = ?2 ORDER BY ticket_index ASC",
        )?;

        let ticket_iter = stmt.query_map(params![owner.as_str(), round_id as i64], ticket_from_row)?;

        let mut tickets = Vec::new();
        for ticket in ticket_iter {
            tickets.push(ticket?);
        }

        Ok(tickets)
    }
}

fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    let numbers_json: String = row.get(3)?;
    let owner: String = row.get(2)?;

    Ok(Ticket {
        round_id: row.get::<_, i64>(0)? as RoundId,
        index: row.get::<_, i64>(1)? as u64,
        owner: AccountId::new(owner),
        numbers: json_column(3, "numbers", &numbers_json)?,
        purchased_at: from_millis(4, row.get(4)?)?,
    })
}
