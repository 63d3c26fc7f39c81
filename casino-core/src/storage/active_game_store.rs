use crate::error::Result;
use crate::types::{ActiveGame, BalanceKey, GroupId, PlayerId};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Open multi-step rounds, at most one per (player, group).
pub struct ActiveGameStore<'a> {
    conn: &'a Connection,
}

impl<'a> ActiveGameStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn upsert(&self, game: &ActiveGame) -> Result<()> {
        self.conn.execute(
            "INSERT INTO active_games (player_id, group_id, round_id, game, state, opened_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (player_id, group_id) DO UPDATE SET
                round_id = excluded.round_id,
                game = excluded.game,
                state = excluded.state,
                updated_at = excluded.updated_at",
            params![
                game.key.player.0 as i64,
                game.key.group.0 as i64,
                game.round_id,
                game.game,
                game.state,
                game.opened_at.timestamp(),
                game.updated_at.timestamp(),
            ],
        )?;

        Ok(())
    }

    pub fn load(&self, key: &BalanceKey) -> Result<Option<ActiveGame>> {
        let game = self
            .conn
            .query_row(
                "SELECT player_id, group_id, round_id, game, state, opened_at, updated_at
                 FROM active_games WHERE player_id = ?1 AND group_id = ?2",
                params![key.player.0 as i64, key.group.0 as i64],
                row_to_game,
            )
            .optional()?;

        Ok(game)
    }

    pub fn list(&self) -> Result<Vec<ActiveGame>> {
        let mut stmt = self.conn.prepare(
            "SELECT player_id, group_id, round_id, game, state, opened_at, updated_at
             FROM active_games ORDER BY opened_at",
        )?;

        let rows = stmt.query_map([], row_to_game)?;

        let mut games = Vec::new();
        for row in rows {
            games.push(row?);
        }

        Ok(games)
    }

    /// Returns false unless the stored round is `round_id`.
    pub fn delete(&self, key: &BalanceKey, round_id: &str) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM active_games
             WHERE player_id = ?1 AND group_id = ?2 AND round_id = ?3",
            params![key.player.0 as i64, key.group.0 as i64, round_id],
        )?;

        Ok(deleted == 1)
    }
}

fn row_to_game(row: &Row<'_>) -> rusqlite::Result<ActiveGame> {
    let player: i64 = row.get(0)?;
    let group: i64 = row.get(1)?;
    let opened_at: i64 = row.get(5)?;
    let updated_at: i64 = row.get(6)?;

    Ok(ActiveGame {
        key: BalanceKey::new(PlayerId(player as u64), GroupId(group as u64)),
        round_id: row.get(2)?,
        game: row.get(3)?,
        state: row.get(4)?,
        opened_at: DateTime::from_timestamp(opened_at, 0).unwrap_or_else(Utc::now),
        updated_at: DateTime::from_timestamp(updated_at, 0).unwrap_or_else(Utc::now),
    })
}
