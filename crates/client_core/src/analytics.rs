//! Usage counters over the local store, keyed by user and action name.

use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use storage::Storage;
use tracing::debug;

use shared::domain::UserId;

pub struct AnalyticsRepository {
    storage: Storage,
}

impl AnalyticsRepository {
    pub fn new(storage: Storage) -> Arc<Self> {
        Arc::new(Self { storage })
    }

    /// Increments the counter for `action` and returns the new count.
    pub async fn log_action(&self, user_id: &UserId, action: &str) -> Result<i64> {
        let count = self.storage.log_action(user_id, action).await?;
        debug!(user_id = %user_id, action, count, "analytics: action logged");
        Ok(count)
    }

    pub async fn summary(&self, user_id: &UserId) -> Result<BTreeMap<String, i64>> {
        let rows = self.storage.analytics_summary(user_id).await?;
        Ok(rows.into_iter().collect())
    }

    /// Resets this user's counters; other users' rows are untouched.
    pub async fn clear(&self, user_id: &UserId) -> Result<()> {
        let removed = self.storage.clear_analytics(user_id).await?;
        debug!(user_id = %user_id, removed, "analytics: cleared");
        Ok(())
    }

    pub async fn clear_action(&self, user_id: &UserId, action: &str) -> Result<()> {
        self.storage.clear_action(user_id, action).await
    }
}
