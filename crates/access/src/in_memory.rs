//! In-memory user store and usage ledger for tests and ephemeral runs.

use async_trait::async_trait;
use memochat_core::error::StoreError;
use memochat_core::provider::Usage;
use memochat_core::user::{UsageLedger, UserRecord, UserStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keeps user records and per-user token totals in process memory.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<i64, UserRecord>>>,
    usage: Arc<RwLock<HashMap<i64, u64>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self, user_id: i64) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn upsert(&self, record: &UserRecord) -> Result<(), StoreError> {
        self.users
            .write()
            .await
            .insert(record.user_id, record.clone());
        Ok(())
    }
}

#[async_trait]
impl UsageLedger for InMemoryUserStore {
    async fn lifetime_tokens_used(&self, user_id: i64) -> Result<u64, StoreError> {
        Ok(self.usage.read().await.get(&user_id).copied().unwrap_or(0))
    }

    async fn record_usage(&self, user_id: i64, usage: &Usage) -> Result<(), StoreError> {
        let mut totals = self.usage.write().await;
        let total = totals.entry(user_id).or_insert(0);
        *total = total.saturating_add(u64::from(usage.total_tokens));
        Ok(())
    }
}
