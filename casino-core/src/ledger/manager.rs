use crate::error::{LedgerError, Result};
use crate::ledger::{KeyLocks, LedgerConfig};
use crate::storage::{ActiveGameStore, BalanceStore, GroupStore, Storage, TransactionStore};
use crate::types::{
    ActiveGame, Balance, BalanceKey, Funds, GroupConfig, GroupId, PlayerId, TransactionKind,
    TransactionRecord, TransferReceipt,
};
use chrono::Utc;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

/// Owns every balance and the audit log. Each mutation and its record
/// commit in one SQLite transaction, under the key's lock.
pub struct Ledger {
    storage: Arc<Storage>,
    config: LedgerConfig,
    locks: KeyLocks,
}

impl Ledger {
    pub async fn new(data_dir: &Path, config: LedgerConfig) -> Result<Self> {
        let db_path = data_dir.join("casino.db");
        let storage = Arc::new(Storage::new(&db_path).await?);
        Self::with_storage(storage, config)
    }

    pub async fn in_memory(config: LedgerConfig) -> Result<Self> {
        let storage = Arc::new(Storage::in_memory().await?);
        Self::with_storage(storage, config)
    }

    pub fn with_storage(storage: Arc<Storage>, config: LedgerConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            storage,
            config,
            locks: KeyLocks::new(),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn is_privileged(&self, player: PlayerId) -> bool {
        self.config.is_admin(player)
    }

    pub async fn register_group(
        &self,
        group: GroupId,
        prefix: Option<&str>,
        starting_balance: Option<i64>,
    ) -> Result<GroupConfig> {
        let starting_balance = starting_balance.unwrap_or(self.config.default_starting_balance);
        if starting_balance < 0 {
            return Err(LedgerError::InvalidAmount(starting_balance));
        }

        let prefix = prefix.unwrap_or(&self.config.default_prefix).trim();
        if prefix.is_empty() {
            return Err(LedgerError::config("Command prefix cannot be empty"));
        }

        let config = GroupConfig {
            group,
            prefix: prefix.to_string(),
            enabled: true,
            starting_balance,
            created_at: Utc::now(),
        };

        let conn = self.storage.get_connection().await;
        if !GroupStore::new(&conn).insert(&config)? {
            return Err(LedgerError::GroupAlreadyRegistered(group));
        }

        tracing::info!(
            "Registered group {} (prefix '{}', starting balance {})",
            group,
            config.prefix,
            starting_balance
        );
        Ok(config)
    }

    pub async fn group_config(&self, group: GroupId) -> Result<Option<GroupConfig>> {
        let conn = self.storage.get_connection().await;
        GroupStore::new(&conn).load(group)
    }

    pub async fn set_group_enabled(&self, group: GroupId, enabled: bool) -> Result<()> {
        let conn = self.storage.get_connection().await;
        if !GroupStore::new(&conn).set_enabled(group, enabled)? {
            return Err(LedgerError::config(format!(
                "Group {} is not registered",
                group
            )));
        }

        tracing::info!("Group {} enabled = {}", group, enabled);
        Ok(())
    }

    /// Unregistered groups run on defaults and count as enabled.
    pub async fn ensure_group_enabled(&self, group: GroupId) -> Result<()> {
        let conn = self.storage.get_connection().await;
        check_enabled(&conn, group)
    }

    pub async fn get_or_create(&self, key: &BalanceKey) -> Result<Balance> {
        let _guard = self.locks.lock(key).await;
        let conn = self.storage.get_connection().await;
        self.ensure_balance(&conn, key)
    }

    /// What the player may spend. Privileged players skip the lookup.
    pub async fn funds(&self, key: &BalanceKey) -> Result<Funds> {
        if self.is_privileged(key.player) {
            return Ok(Funds::Unlimited);
        }

        Ok(Funds::Limited(self.get_or_create(key).await?.amount))
    }

    /// Raw signed add without an audit row. Debits below zero are
    /// rejected for everyone except privileged players.
    pub async fn apply_delta(&self, key: &BalanceKey, delta: i64) -> Result<i64> {
        let _guard = self.locks.lock(key).await;
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let amount = self.add_checked(&tx, key, delta)?;
        tx.commit()?;

        tracing::debug!("Applied {} to {} -> {}", delta, key, amount);
        Ok(amount)
    }

    pub async fn record_transaction(
        &self,
        key: &BalanceKey,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<TransactionRecord> {
        let conn = self.storage.get_connection().await;
        TransactionStore::new(&conn).append(key, amount, kind, description)
    }

    /// Debit a stake and write the wager row.
    pub async fn place_wager(
        &self,
        key: &BalanceKey,
        amount: i64,
        description: &str,
    ) -> Result<Funds> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let funds = self
            .mutate(key, -amount, TransactionKind::Wager, description, true)
            .await?;
        tracing::info!("Wager {} from {}: {}", amount, key, description);
        Ok(funds)
    }

    /// Credit a settlement. A zero payout is still recorded so every
    /// round ends with exactly one payout row.
    pub async fn settle_payout(
        &self,
        key: &BalanceKey,
        amount: i64,
        description: &str,
    ) -> Result<Funds> {
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let funds = self
            .mutate(key, amount, TransactionKind::Payout, description, false)
            .await?;
        tracing::info!("Payout {} to {}: {}", amount, key, description);
        Ok(funds)
    }

    /// A single-step round: stake, payout and both rows commit together,
    /// so a round is either fully recorded or not at all.
    pub async fn settle_round(
        &self,
        key: &BalanceKey,
        wager: i64,
        payout: i64,
        wager_description: &str,
        payout_description: &str,
    ) -> Result<Funds> {
        if wager <= 0 {
            return Err(LedgerError::InvalidAmount(wager));
        }
        if payout < 0 {
            return Err(LedgerError::InvalidAmount(payout));
        }

        let _guard = self.locks.lock(key).await;
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        check_enabled(&tx, key.group)?;
        self.add_checked(&tx, key, -wager)?;
        let amount = self.add_checked(&tx, key, payout)?;

        let records = TransactionStore::new(&tx);
        records.append(key, -wager, TransactionKind::Wager, wager_description)?;
        records.append(key, payout, TransactionKind::Payout, payout_description)?;
        tx.commit()?;

        tracing::info!(
            "Round for {} settled: wager {} payout {}",
            key,
            wager,
            payout
        );
        Ok(self.funds_for(key, amount))
    }

    /// Debit a stake for a multi-step game and store the game's state in
    /// the same transaction. Used for the opening wager and for raises.
    pub async fn place_game_wager(
        &self,
        game: &ActiveGame,
        amount: i64,
        description: &str,
    ) -> Result<Funds> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let key = &game.key;
        let _guard = self.locks.lock(key).await;
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        check_enabled(&tx, key.group)?;
        let balance = self.add_checked(&tx, key, -amount)?;
        TransactionStore::new(&tx).append(key, -amount, TransactionKind::Wager, description)?;
        ActiveGameStore::new(&tx).upsert(game)?;
        tx.commit()?;

        tracing::info!("Wager {} from {}: {}", amount, key, description);
        Ok(self.funds_for(key, balance))
    }

    pub async fn save_active_game(&self, game: &ActiveGame) -> Result<()> {
        let conn = self.storage.get_connection().await;
        ActiveGameStore::new(&conn).upsert(game)?;

        tracing::debug!("Saved {} round {} for {}", game.game, game.round_id, game.key);
        Ok(())
    }

    /// Pay out an open game and close it. Fails with `RoundNotOpen` if
    /// the round was already settled, leaving the balance untouched.
    pub async fn settle_active_game(
        &self,
        key: &BalanceKey,
        round_id: &str,
        payout: i64,
        description: &str,
    ) -> Result<Funds> {
        if payout < 0 {
            return Err(LedgerError::InvalidAmount(payout));
        }

        let _guard = self.locks.lock(key).await;
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        if !ActiveGameStore::new(&tx).delete(key, round_id)? {
            return Err(LedgerError::RoundNotOpen(round_id.to_string()));
        }
        let amount = self.add_checked(&tx, key, payout)?;
        TransactionStore::new(&tx).append(key, payout, TransactionKind::Payout, description)?;
        tx.commit()?;

        tracing::info!("Payout {} to {}: {}", payout, key, description);
        Ok(self.funds_for(key, amount))
    }

    pub async fn active_games(&self) -> Result<Vec<ActiveGame>> {
        let conn = self.storage.get_connection().await;
        ActiveGameStore::new(&conn).list()
    }

    pub async fn transfer(
        &self,
        from: PlayerId,
        to: PlayerId,
        group: GroupId,
        amount: i64,
    ) -> Result<TransferReceipt> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if from == to {
            return Err(LedgerError::SelfTransfer);
        }

        let from_key = BalanceKey::new(from, group);
        let to_key = BalanceKey::new(to, group);

        let _guards = self.locks.lock_pair(&from_key, &to_key).await;
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        check_enabled(&tx, group)?;
        self.ensure_balance(&tx, &to_key)?;
        let from_amount = self.add_checked(&tx, &from_key, -amount)?;
        let to_amount = BalanceStore::new(&tx).add(&to_key, amount)?;

        let records = TransactionStore::new(&tx);
        records.append(
            &from_key,
            -amount,
            TransactionKind::TransferOut,
            &format!("transfer to {}", to),
        )?;
        records.append(
            &to_key,
            amount,
            TransactionKind::TransferIn,
            &format!("transfer from {}", from),
        )?;

        tx.commit()?;

        tracing::info!("Transferred {} from {} to {}", amount, from_key, to_key);
        Ok(TransferReceipt {
            from: from_key,
            to: to_key,
            amount,
            from_funds: self.funds_for(&from_key, from_amount),
            to_funds: self.funds_for(&to_key, to_amount),
        })
    }

    pub async fn admin_credit(
        &self,
        actor: PlayerId,
        key: &BalanceKey,
        amount: i64,
        reason: &str,
    ) -> Result<i64> {
        self.require_privileged(actor)?;
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let _guard = self.locks.lock(key).await;
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        self.ensure_balance(&tx, key)?;
        let balance = BalanceStore::new(&tx).add(key, amount)?;
        TransactionStore::new(&tx).append(
            key,
            amount,
            TransactionKind::AdminCredit,
            &admin_description(actor, reason),
        )?;
        tx.commit()?;

        tracing::info!("Admin {} credited {} to {}", actor, amount, key);
        Ok(balance)
    }

    /// Removes at most the current balance. Returns what was removed.
    pub async fn admin_debit(
        &self,
        actor: PlayerId,
        key: &BalanceKey,
        amount: i64,
        reason: &str,
    ) -> Result<i64> {
        self.require_privileged(actor)?;
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let _guard = self.locks.lock(key).await;
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let current = self.ensure_balance(&tx, key)?.amount;
        let removed = amount.min(current.max(0));
        if removed == 0 {
            tx.commit()?;
            return Ok(0);
        }

        BalanceStore::new(&tx).add(key, -removed)?;
        TransactionStore::new(&tx).append(
            key,
            -removed,
            TransactionKind::AdminDebit,
            &admin_description(actor, reason),
        )?;
        tx.commit()?;

        tracing::info!("Admin {} debited {} from {}", actor, removed, key);
        Ok(removed)
    }

    /// Records the difference as a credit or debit.
    pub async fn admin_set_balance(
        &self,
        actor: PlayerId,
        key: &BalanceKey,
        amount: i64,
        reason: &str,
    ) -> Result<i64> {
        self.require_privileged(actor)?;
        if amount < 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let _guard = self.locks.lock(key).await;
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let current = self.ensure_balance(&tx, key)?.amount;
        let diff = amount
            .checked_sub(current)
            .ok_or(LedgerError::InvalidAmount(amount))?;
        if diff == 0 {
            tx.commit()?;
            return Ok(current);
        }

        let kind = if diff > 0 {
            TransactionKind::AdminCredit
        } else {
            TransactionKind::AdminDebit
        };

        let balance = BalanceStore::new(&tx).add(key, diff)?;
        TransactionStore::new(&tx).append(key, diff, kind, &admin_description(actor, reason))?;
        tx.commit()?;

        tracing::info!("Admin {} set {} to {} ({:+})", actor, key, balance, diff);
        Ok(balance)
    }

    pub async fn history(&self, key: &BalanceKey, limit: usize) -> Result<Vec<TransactionRecord>> {
        let conn = self.storage.get_connection().await;
        TransactionStore::new(&conn).list(key, limit)
    }

    /// Balance change plus its audit row, committed together.
    async fn mutate(
        &self,
        key: &BalanceKey,
        delta: i64,
        kind: TransactionKind,
        description: &str,
        require_enabled: bool,
    ) -> Result<Funds> {
        let _guard = self.locks.lock(key).await;
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        if require_enabled {
            check_enabled(&tx, key.group)?;
        }
        let amount = self.add_checked(&tx, key, delta)?;
        TransactionStore::new(&tx).append(key, delta, kind, description)?;
        tx.commit()?;

        Ok(self.funds_for(key, amount))
    }

    fn ensure_balance(&self, conn: &Connection, key: &BalanceKey) -> Result<Balance> {
        let starting = GroupStore::new(conn)
            .load(key.group)?
            .map(|group| group.starting_balance)
            .unwrap_or(self.config.default_starting_balance);

        BalanceStore::new(conn).ensure(key, starting)
    }

    fn add_checked(&self, conn: &Connection, key: &BalanceKey, delta: i64) -> Result<i64> {
        let current = self.ensure_balance(conn, key)?.amount;

        if delta < 0 && !self.is_privileged(key.player) && current < -delta {
            return Err(LedgerError::InsufficientFunds {
                need: -delta,
                available: current,
            });
        }
        if current.checked_add(delta).is_none() {
            return Err(LedgerError::InvalidAmount(delta));
        }

        BalanceStore::new(conn).add(key, delta)
    }

    fn funds_for(&self, key: &BalanceKey, amount: i64) -> Funds {
        if self.is_privileged(key.player) {
            Funds::Unlimited
        } else {
            Funds::Limited(amount)
        }
    }

    fn require_privileged(&self, actor: PlayerId) -> Result<()> {
        if self.is_privileged(actor) {
            Ok(())
        } else {
            Err(LedgerError::NotPrivileged(actor))
        }
    }
}

fn check_enabled(conn: &Connection, group: GroupId) -> Result<()> {
    match GroupStore::new(conn).load(group)? {
        Some(config) if !config.enabled => Err(LedgerError::GroupDisabled(group)),
        _ => Ok(()),
    }
}

fn admin_description(actor: PlayerId, reason: &str) -> String {
    if reason.is_empty() {
        format!("admin {}", actor)
    } else {
        format!("admin {}: {}", actor, reason)
    }
}
