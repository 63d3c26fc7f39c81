use crate::card_duel::CardDuel;
use crate::error::{GameError, Result};
use casino_core::BalanceKey;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// One live duel. `duel` stays empty while the opening wager is being
/// debited; `settled` flips once the payout row is written.
#[derive(Debug)]
pub struct DuelSession {
    pub key: BalanceKey,
    pub round_id: Uuid,
    pub duel: Option<CardDuel>,
    pub opened_at: DateTime<Utc>,
    pub last_action_at: DateTime<Utc>,
    pub settled: bool,
}

impl DuelSession {
    fn pending(key: BalanceKey) -> Self {
        let now = Utc::now();
        Self {
            key,
            round_id: Uuid::new_v4(),
            duel: None,
            opened_at: now,
            last_action_at: now,
            settled: false,
        }
    }

    pub fn touch(&mut self) {
        self.last_action_at = Utc::now();
    }

    pub fn is_idle_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_action_at < cutoff
    }
}

struct Entry {
    round_id: Uuid,
    session: Arc<Mutex<DuelSession>>,
}

/// At most one open duel per (player, group).
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<BalanceKey, Entry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the key and returns the new session already locked, so
    /// nobody can act on it before it is dealt.
    pub fn reserve(&self, key: BalanceKey) -> Result<OwnedMutexGuard<DuelSession>> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&key) {
            return Err(GameError::GameAlreadyOpen);
        }

        let session = DuelSession::pending(key);
        let round_id = session.round_id;
        let session = Arc::new(Mutex::new(session));
        let guard = session
            .clone()
            .try_lock_owned()
            .map_err(|_| GameError::Internal("Fresh session already locked".to_string()))?;

        sessions.insert(key, Entry { round_id, session });
        Ok(guard)
    }

    /// Re-registers a duel loaded from storage. Returns false when the key
    /// already holds a session.
    pub fn restore(
        &self,
        key: BalanceKey,
        round_id: Uuid,
        duel: CardDuel,
        opened_at: DateTime<Utc>,
        last_action_at: DateTime<Utc>,
    ) -> bool {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&key) {
            return false;
        }

        let session = DuelSession {
            key,
            round_id,
            duel: Some(duel),
            opened_at,
            last_action_at,
            settled: false,
        };
        sessions.insert(
            key,
            Entry {
                round_id,
                session: Arc::new(Mutex::new(session)),
            },
        );
        true
    }

    pub fn get(&self, key: &BalanceKey) -> Option<Arc<Mutex<DuelSession>>> {
        self.sessions.read().get(key).map(|e| e.session.clone())
    }

    /// Only removes the entry if it still belongs to `round_id`.
    pub fn remove(&self, key: &BalanceKey, round_id: Uuid) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get(key) {
            Some(entry) if entry.round_id == round_id => {
                sessions.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, key: &BalanceKey) -> bool {
        self.sessions.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<(BalanceKey, Arc<Mutex<DuelSession>>)> {
        self.sessions
            .read()
            .iter()
            .map(|(k, e)| (*k, e.session.clone()))
            .collect()
    }
}
