use crate::error::Result;
use crate::types::{GroupConfig, GroupId};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

pub struct GroupStore<'a> {
    conn: &'a Connection,
}

impl<'a> GroupStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Returns false when the group already had a row.
    pub fn insert(&self, config: &GroupConfig) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO group_configs (group_id, prefix, enabled, starting_balance, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                config.group.0 as i64,
                config.prefix,
                config.enabled,
                config.starting_balance,
                config.created_at.timestamp(),
            ],
        )?;

        Ok(inserted == 1)
    }

    pub fn load(&self, group: GroupId) -> Result<Option<GroupConfig>> {
        let config = self
            .conn
            .query_row(
                "SELECT group_id, prefix, enabled, starting_balance, created_at
                 FROM group_configs WHERE group_id = ?1",
                params![group.0 as i64],
                |row| {
                    let group_id: i64 = row.get(0)?;
                    let created_at: i64 = row.get(4)?;
                    Ok(GroupConfig {
                        group: GroupId(group_id as u64),
                        prefix: row.get(1)?,
                        enabled: row.get(2)?,
                        starting_balance: row.get(3)?,
                        created_at: DateTime::from_timestamp(created_at, 0)
                            .unwrap_or_else(Utc::now),
                    })
                },
            )
            .optional()?;

        Ok(config)
    }

    /// Returns false when the group is unknown.
    pub fn set_enabled(&self, group: GroupId, enabled: bool) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE group_configs SET enabled = ?2 WHERE group_id = ?1",
            params![group.0 as i64, enabled],
        )?;

        Ok(updated == 1)
    }
}
