pub mod ledger_store;
pub mod round_store;
pub mod ticket_store;

pub use ledger_store::LedgerStore;
pub use round_store::RoundStore;
pub use ticket_store::TicketStore;

use crate::config::LotteryConfig;
use crate::engine::{ChangeSet, EngineParts, Transfer};
use crate::error::{LotteryError, Result};
use crate::types::{AccountId, Amount};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LotteryError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        let storage = Self {
            conn: Mutex::new(conn),
            path: db_path.to_path_buf(),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        // Singleton row with config and engine-wide balances
        conn.execute(
            "CREATE TABLE IF NOT EXISTS engine_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                config TEXT NOT NULL,
                current_round_id INTEGER NOT NULL,
                operator_balance INTEGER NOT NULL,
                vault INTEGER NOT NULL,
                jackpot_rollover INTEGER NOT NULL,
                jackpot_contribution INTEGER NOT NULL,
                pending_seed TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS rounds (
                id INTEGER PRIMARY KEY,
                opened_at INTEGER NOT NULL,
                closes_at INTEGER NOT NULL,
                closed INTEGER NOT NULL,
                closed_at INTEGER,
                ticket_count INTEGER NOT NULL,
                collected INTEGER NOT NULL,
                jackpot_contribution INTEGER NOT NULL,
                winning_numbers TEXT,
                distributed_total INTEGER NOT NULL,
                seed_commitment TEXT NOT NULL,
                revealed_seed TEXT,
                settlement TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS tickets (
                round_id INTEGER NOT NULL,
                ticket_index INTEGER NOT NULL,
                owner TEXT NOT NULL,
                numbers TEXT NOT NULL,
                purchased_at INTEGER NOT NULL,
                FOREIGN KEY (round_id) REFERENCES rounds(id),
                PRIMARY KEY (round_id, ticket_index)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tickets_owner ON tickets (owner, round_id)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS claims (
                owner TEXT NOT NULL,
                round_id INTEGER NOT NULL,
                amount INTEGER NOT NULL,
                claimed_at INTEGER NOT NULL,
                FOREIGN KEY (round_id) REFERENCES rounds(id),
                PRIMARY KEY (owner, round_id)
            )",
            [],
        )?;

        // Outgoing value, for an external transport to execute
        conn.execute(
            "CREATE TABLE IF NOT EXISTS transfers (
                id TEXT PRIMARY KEY,
                recipient TEXT NOT NULL,
                amount INTEGER NOT NULL,
                kind TEXT NOT NULL,
                round_id INTEGER,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    pub async fn is_initialized(&self) -> Result<bool> {
        let conn = self.get_connection().await;
        let row: Option<i64> = conn
            .query_row("SELECT id FROM engine_state WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        Ok(row.is_some())
    }

    /// Writes the config and the freshly created engine in one transaction.
    pub async fn initialize(&self, config: &LotteryConfig, changes: &ChangeSet) -> Result<()> {
        let mut conn = self.get_connection().await;
        let tx = conn.transaction()?;

        let ledger = LedgerStore::new(&tx);
        if ledger.state_exists()? {
            return Err(LotteryError::AlreadyInitialized(
                self.path.display().to_string(),
            ));
        }
        ledger.insert_state(config, &changes.state)?;
        Self::apply(&tx, changes)?;

        tx.commit()?;
        tracing::info!("Initialized lottery database at {}", self.path.display());
        Ok(())
    }

    /// Persists one request's changes atomically.
    pub async fn commit(&self, changes: &ChangeSet) -> Result<()> {
        let mut conn = self.get_connection().await;
        let tx = conn.transaction()?;

        LedgerStore::new(&tx).update_state(&changes.state)?;
        Self::apply(&tx, changes)?;

        tx.commit()?;
        tracing::debug!(
            "Committed {} rounds, {} tickets, {} claims, {} transfers",
            changes.rounds.len(),
            changes.tickets.len(),
            changes.claims.len(),
            changes.transfers.len()
        );
        Ok(())
    }

    fn apply(conn: &Connection, changes: &ChangeSet) -> Result<()> {
        let rounds = RoundStore::new(conn);
        for round in &changes.rounds {
            rounds.save_round(round)?;
        }

        let tickets = TicketStore::new(conn);
        for ticket in &changes.tickets {
            tickets.insert_ticket(ticket)?;
        }

        let ledger = LedgerStore::new(conn);
        for claim in &changes.claims {
            ledger.insert_claim(claim)?;
        }
        for transfer in &changes.transfers {
            ledger.insert_transfer(transfer)?;
        }

        Ok(())
    }

    pub async fn load_parts(&self) -> Result<EngineParts> {
        let conn = self.get_connection().await;

        let ledger = LedgerStore::new(&conn);
        let (config, state) = ledger
            .load_state()?
            .ok_or_else(|| LotteryError::NotInitialized(self.path.display().to_string()))?;

        Ok(EngineParts {
            config,
            state,
            rounds: RoundStore::new(&conn).list_rounds()?,
            tickets: TicketStore::new(&conn).list_tickets()?,
            claims: ledger.list_claims()?,
        })
    }

    pub async fn list_transfers(
        &self,
        recipient: Option<&AccountId>,
        limit: usize,
    ) -> Result<Vec<Transfer>> {
        let conn = self.get_connection().await;
        LedgerStore::new(&conn).list_transfers(recipient, limit)
    }
}

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(idx: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}

pub(crate) fn amount_param(amount: Amount) -> i64 {
    amount.to_units() as i64
}

pub(crate) fn amount_column(units: i64) -> Amount {
    Amount::from_units(units as u64)
}

pub(crate) fn json_column<T: DeserializeOwned>(
    idx: usize,
    name: &str,
    text: &str,
) -> rusqlite::Result<T> {
    serde_json::from_str(text).map_err(|_| {
        rusqlite::Error::InvalidColumnType(idx, name.to_string(), rusqlite::types::Type::Text)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_initialize_and_load() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(&temp_dir.path().join("nested").join("lotto.db"))
            .await
            .unwrap();
        assert!(!storage.is_initialized().await.unwrap());
        assert!(matches!(
            storage.load_parts().await,
            Err(LotteryError::NotInitialized(_))
        ));

        let mut engine = engine();
        let changes = engine.take_changes();
        storage.initialize(engine.config(), &changes).await.unwrap();
        assert!(storage.is_initialized().await.unwrap());

        let parts = storage.load_parts().await.unwrap();
        assert_eq!(&parts.config, engine.config());
        assert_eq!(parts.state, engine.state());
        assert_eq!(parts.rounds, vec![engine.current_round().clone()]);

        assert!(matches!(
            storage.initialize(engine.config(), &changes).await,
            Err(LotteryError::AlreadyInitialized(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_round_trip() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(&temp_dir.path().join("lotto.db")).await.unwrap();

        let mut engine = engine();
        let changes = engine.take_changes();
        storage.initialize(engine.config(), &changes).await.unwrap();

        let alice = AccountId::new("alice");
        let price = engine.config().ticket_price;
        engine.buy(&alice, numbers_matching(5), price, start()).unwrap();
        engine.buy(&alice, numbers_matching(1), price, start()).unwrap();
        engine.draw(after_close(&engine)).unwrap();
        engine
            .claim(&alice, 1, engine.current_round().opened_at)
            .unwrap();
        storage.commit(&engine.take_changes()).await.unwrap();

        let parts = storage.load_parts().await.unwrap();
        assert_eq!(parts.state, engine.state());
        assert_eq!(parts.rounds, engine.rounds().cloned().collect::<Vec<_>>());
        assert_eq!(parts.tickets, engine.round_tickets(1).to_vec());
        assert_eq!(parts.claims.len(), 1);

        let transfers = storage.list_transfers(Some(&alice), 10).await.unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].amount, parts.claims[0].amount);
        assert!(storage
            .list_transfers(Some(&AccountId::new("bob")), 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_nothing_behind() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(&temp_dir.path().join("lotto.db")).await.unwrap();

        let mut engine = engine();
        let changes = engine.take_changes();
        storage.initialize(engine.config(), &changes).await.unwrap();

        let alice = AccountId::new("alice");
        let price = engine.config().ticket_price;
        engine.buy(&alice, numbers_matching(2), price, start()).unwrap();
        let changes = engine.take_changes();
        storage.commit(&changes).await.unwrap();

        // same ticket key again violates the primary key
        let mut replay = changes.clone();
        replay.state.balances.vault = Amount::from_units(1);
        assert!(storage.commit(&replay).await.is_err());

        let parts = storage.load_parts().await.unwrap();
        assert_eq!(parts.state, changes.state);
        assert_eq!(parts.tickets.len(), 1);
    }
}
