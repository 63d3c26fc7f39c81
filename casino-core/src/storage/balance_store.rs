use crate::error::{LedgerError, Result};
use crate::types::{Balance, BalanceKey, GroupId, PlayerId};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Balance rows. Borrows a connection (or an open transaction) so that
/// callers can compose several stores into one atomic unit.
pub struct BalanceStore<'a> {
    conn: &'a Connection,
}

impl<'a> BalanceStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert the row if missing. The primary key makes concurrent
    /// creation collapse into a single row.
    pub fn ensure(&self, key: &BalanceKey, starting_amount: i64) -> Result<Balance> {
        self.conn.execute(
            "INSERT OR IGNORE INTO balances (player_id, group_id, amount, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                key.player.0 as i64,
                key.group.0 as i64,
                starting_amount,
                Utc::now().timestamp(),
            ],
        )?;

        self.load(key)?
            .ok_or_else(|| LedgerError::internal(format!("Balance {} vanished", key)))
    }

    pub fn load(&self, key: &BalanceKey) -> Result<Option<Balance>> {
        let balance = self
            .conn
            .query_row(
                "SELECT player_id, group_id, amount, created_at
                 FROM balances WHERE player_id = ?1 AND group_id = ?2",
                params![key.player.0 as i64, key.group.0 as i64],
                row_to_balance,
            )
            .optional()?;

        Ok(balance)
    }

    /// Add a signed delta and return the new amount.
    pub fn add(&self, key: &BalanceKey, delta: i64) -> Result<i64> {
        let amount: i64 = self.conn.query_row(
            "UPDATE balances SET amount = amount + ?3
             WHERE player_id = ?1 AND group_id = ?2
             RETURNING amount",
            params![key.player.0 as i64, key.group.0 as i64, delta],
            |row| row.get(0),
        )?;

        Ok(amount)
    }

    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM balances", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn row_to_balance(row: &Row<'_>) -> rusqlite::Result<Balance> {
    let player: i64 = row.get(0)?;
    let group: i64 = row.get(1)?;
    let created_at: i64 = row.get(3)?;

    Ok(Balance {
        key: BalanceKey {
            player: PlayerId(player as u64),
            group: GroupId(group as u64),
        },
        amount: row.get(2)?,
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
    })
}
