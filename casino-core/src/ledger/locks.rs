use crate::types::BalanceKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per balance key. Distinct keys never contend.
#[derive(Default)]
pub struct KeyLocks {
    slots: Mutex<HashMap<BalanceKey, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &BalanceKey) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock();
        slots
            .entry(*key)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub async fn lock(&self, key: &BalanceKey) -> OwnedMutexGuard<()> {
        self.slot(key).lock_owned().await
    }

    /// Locks both keys, always in key order, so two opposing transfers
    /// cannot deadlock.
    pub async fn lock_pair(
        &self,
        a: &BalanceKey,
        b: &BalanceKey,
    ) -> (OwnedMutexGuard<()>, OwnedMutexGuard<()>) {
        if a <= b {
            let first = self.lock(a).await;
            let second = self.lock(b).await;
            (first, second)
        } else {
            let second = self.lock(b).await;
            let first = self.lock(a).await;
            (first, second)
        }
    }

    /// Drop slots nobody is holding.
    pub fn prune(&self) {
        self.slots.lock().retain(|_, slot| Arc::strong_count(slot) > 1);
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
