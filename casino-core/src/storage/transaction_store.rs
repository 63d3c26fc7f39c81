use crate::error::Result;
use crate::types::{BalanceKey, GroupId, PlayerId, TransactionKind, TransactionRecord};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

/// Append-only: there is no update or delete.
pub struct TransactionStore<'a> {
    conn: &'a Connection,
}

impl<'a> TransactionStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn append(
        &self,
        key: &BalanceKey,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<TransactionRecord> {
        let timestamp = Utc::now();

        self.conn.execute(
            "INSERT INTO transactions (player_id, group_id, amount, kind, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                key.player.0 as i64,
                key.group.0 as i64,
                amount,
                kind.as_str(),
                description,
                timestamp.timestamp(),
            ],
        )?;

        Ok(TransactionRecord {
            id: self.conn.last_insert_rowid(),
            key: *key,
            amount,
            kind,
            description: description.to_string(),
            timestamp,
        })
    }

    /// Newest first.
    pub fn list(&self, key: &BalanceKey, limit: usize) -> Result<Vec<TransactionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, player_id, group_id, amount, kind, description, created_at
             FROM transactions WHERE player_id = ?1 AND group_id = ?2
             ORDER BY id DESC LIMIT ?3",
        )?;

        let rows = stmt.query_map(
            params![key.player.0 as i64, key.group.0 as i64, limit as i64],
            row_to_record,
        )?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok(records)
    }

    pub fn sum_for(&self, key: &BalanceKey) -> Result<i64> {
        let sum = self.conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM transactions
             WHERE player_id = ?1 AND group_id = ?2",
            params![key.player.0 as i64, key.group.0 as i64],
            |row| row.get(0),
        )?;
        Ok(sum)
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<TransactionRecord> {
    let player: i64 = row.get(1)?;
    let group: i64 = row.get(2)?;
    let kind_str: String = row.get(4)?;
    let kind = kind_str.parse::<TransactionKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into())
    })?;
    let created_at: i64 = row.get(6)?;

    Ok(TransactionRecord {
        id: row.get(0)?,
        key: BalanceKey::new(PlayerId(player as u64), GroupId(group as u64)),
        amount: row.get(3)?,
        kind,
        description: row.get(5)?,
        timestamp: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
    })
}
