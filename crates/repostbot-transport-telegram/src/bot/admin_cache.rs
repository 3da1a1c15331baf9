//! Short-lived cache of group administrator lists
//!
//! `/reset` needs the admin list of a chat; caching it briefly keeps repeated
//! requests from hitting `getChatAdministrators` every time.

use moka::future::Cache;
use repostbot_core::GroupId;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Administrator ids per chat with automatic expiry
#[derive(Clone)]
pub struct AdminCache {
    cache: Cache<GroupId, Arc<HashSet<i64>>>,
}

impl AdminCache {
    /// Creates a cache whose entries expire after `ttl_secs`.
    #[must_use]
    pub fn new(ttl_secs: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        Self { cache }
    }

    /// Whether `user_id` administers `chat`, loading the list with `load` on
    /// a miss. Failed loads are not cached.
    ///
    /// # Errors
    ///
    /// Returns the error of `load`.
    pub async fn is_admin<F, Fut, E>(&self, chat: GroupId, user_id: i64, load: F) -> Result<bool, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<HashSet<i64>, E>>,
    {
        if let Some(admins) = self.cache.get(&chat).await {
            return Ok(admins.contains(&user_id));
        }
        let admins = Arc::new(load().await?);
        debug!(chat = %chat, count = admins.len(), "Cached administrator list");
        let is_admin = admins.contains(&user_id);
        self.cache.insert(chat, admins).await;
        Ok(is_admin)
    }
}
