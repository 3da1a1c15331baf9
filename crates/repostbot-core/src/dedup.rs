//! Repost detection over the group state store.

use crate::group::{GroupId, MessageId, RepostMap};
use crate::keys::ContentKey;
use crate::state_store::GroupStateStore;
use crate::storage::StorageError;
use std::sync::Arc;

/// Records content keys and reports their histories
#[derive(Clone)]
pub struct DedupEngine {
    states: Arc<GroupStateStore>,
}

impl DedupEngine {
    /// Engine writing through `states`.
    #[must_use]
    pub const fn new(states: Arc<GroupStateStore>) -> Self {
        Self { states }
    }

    /// Appends `message_id` to the history of every key, then returns the
    /// full history of each key that is not whitelisted. Whitelisted keys
    /// are still recorded. The whole step is atomic per group.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the group record cannot be loaded or saved.
    pub async fn process(
        &self,
        group_id: GroupId,
        message_id: MessageId,
        keys: &[ContentKey],
    ) -> Result<RepostMap, StorageError> {
        if keys.is_empty() {
            return Ok(RepostMap::new());
        }
        self.states
            .update(group_id, |state| {
                state.record(message_id, keys);
                keys.iter()
                    .filter(|key| !state.is_whitelisted(key))
                    .filter_map(|key| {
                        state
                            .history(key)
                            .map(|history| (key.clone(), history.to_vec()))
                    })
                    .collect()
            })
            .await
    }
}

/// Entries whose history holds more than the original post.
#[must_use]
pub fn reposts_only(histories: RepostMap) -> RepostMap {
    histories
        .into_iter()
        .filter(|(_, history)| history.len() > 1)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileGroupStore, MemoryGroupStore};
    use crate::toggles::ToggleSet;

    fn engine() -> (Arc<GroupStateStore>, DedupEngine) {
        let states = Arc::new(GroupStateStore::new(
            Arc::new(MemoryGroupStore::new()),
            ToggleSet::default(),
        ));
        (states.clone(), DedupEngine::new(states))
    }

    #[tokio::test]
    async fn test_first_then_repeat() -> Result<(), StorageError> {
        let (_, engine) = engine();
        let key = ContentKey::picture("abc123");

        let first = engine
            .process(GroupId(42), MessageId(1), std::slice::from_ref(&key))
            .await?;
        assert_eq!(first.get(&key), Some(&vec![MessageId(1)]));
        assert!(reposts_only(first).is_empty());

        let second = engine
            .process(GroupId(42), MessageId(7), std::slice::from_ref(&key))
            .await?;
        assert_eq!(second.get(&key), Some(&vec![MessageId(1), MessageId(7)]));
        assert_eq!(reposts_only(second).len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_whitelisted_keys_recorded_but_hidden() -> Result<(), StorageError> {
        let (states, engine) = engine();
        let url = ContentKey::url("http://x.com");
        let pic = ContentKey::picture("p");
        states
            .toggle_whitelist(GroupId(1), std::slice::from_ref(&url))
            .await?;

        let result = engine
            .process(GroupId(1), MessageId(3), &[pic.clone(), url.clone()])
            .await?;

        assert!(result.contains_key(&pic));
        assert!(!result.contains_key(&url));
        let state = states.snapshot(GroupId(1)).await?;
        assert_eq!(state.history(&url), Some(&[MessageId(3)][..]));
        Ok(())
    }

    #[tokio::test]
    async fn test_groups_are_independent() -> Result<(), StorageError> {
        let (_, engine) = engine();
        let key = ContentKey::url("http://x.com");
        engine
            .process(GroupId(1), MessageId(1), std::slice::from_ref(&key))
            .await?;
        let other = engine
            .process(GroupId(2), MessageId(1), std::slice::from_ref(&key))
            .await?;
        assert_eq!(other.get(&key).map(Vec::len), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_no_keys_touches_nothing() -> Result<(), StorageError> {
        let (states, engine) = engine();
        let result = engine.process(GroupId(5), MessageId(1), &[]).await?;
        assert!(result.is_empty());
        assert!(states.snapshot(GroupId(5)).await?.reposts.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_legacy_url_history_counts_as_original() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let key = ContentKey::url("http://x.com");
        let digest = &key.as_str()[ContentKey::URL_PREFIX.len()..];
        std::fs::write(
            dir.path().join("42.json"),
            serde_json::to_vec(&serde_json::json!({"reposts": {digest: [5]}}))?,
        )?;
        let states = Arc::new(GroupStateStore::new(
            Arc::new(FileGroupStore::new(dir.path())),
            ToggleSet::default(),
        ));

        let result = DedupEngine::new(states)
            .process(GroupId(42), MessageId(9), std::slice::from_ref(&key))
            .await?;

        assert_eq!(result.get(&key), Some(&vec![MessageId(5), MessageId(9)]));
        Ok(())
    }
}
