pub mod active_game_store;
pub mod balance_store;
pub mod group_store;
pub mod transaction_store;

pub use active_game_store::ActiveGameStore;
pub use balance_store::BalanceStore;
pub use group_store::GroupStore;
pub use transaction_store::TransactionStore;

use crate::error::Result;
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let conn = Connection::open(db_path)?;
        Self::with_connection(conn).await
    }

    /// Throwaway database, used by tests and dry runs.
    pub async fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?).await
    }

    async fn with_connection(conn: Connection) -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Group configuration, written once at registration
        conn.execute(
            "CREATE TABLE IF NOT EXISTS group_configs (
                group_id INTEGER PRIMARY KEY,
                prefix TEXT NOT NULL,
                enabled INTEGER NOT NULL,
                starting_balance INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        // One row per (player, group)
        conn.execute(
            "CREATE TABLE IF NOT EXISTS balances (
                player_id INTEGER NOT NULL,
                group_id INTEGER NOT NULL,
                amount INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (player_id, group_id)
            )",
            [],
        )?;

        // Append-only audit log
        conn.execute(
            "CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                player_id INTEGER NOT NULL,
                group_id INTEGER NOT NULL,
                amount INTEGER NOT NULL,
                kind TEXT NOT NULL,
                description TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        // Card duels and other rounds that span several calls
        conn.execute(
            "CREATE TABLE IF NOT EXISTS active_games (
                player_id INTEGER NOT NULL,
                group_id INTEGER NOT NULL,
                round_id TEXT NOT NULL,
                game TEXT NOT NULL,
                state TEXT NOT NULL,
                opened_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (player_id, group_id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_transactions_key
             ON transactions (player_id, group_id, id)",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
