//! Serialized access to group records.
//!
//! Every read-modify-write of a group runs under that group's lock, so two
//! updates for the same group never interleave. Different groups do not
//! contend.

use crate::group::{GroupId, GroupState, MessageId, RepostStats, WhitelistStatus};
use crate::keys::ContentKey;
use crate::storage::{GroupStore, StorageError};
use crate::toggles::{Toggle, ToggleSet, Toggles};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Group records behind per-group locks
pub struct GroupStateStore {
    store: Arc<dyn GroupStore>,
    defaults: ToggleSet,
    locks: RwLock<HashMap<GroupId, Arc<Mutex<()>>>>,
}

impl GroupStateStore {
    /// Wraps `store`; new groups start with `defaults`.
    #[must_use]
    pub fn new(store: Arc<dyn GroupStore>, defaults: ToggleSet) -> Self {
        Self {
            store,
            defaults,
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Process-wide toggle defaults.
    #[must_use]
    pub const fn defaults(&self) -> ToggleSet {
        self.defaults
    }

    /// Backend health check.
    ///
    /// # Errors
    ///
    /// Returns the backend's error message.
    pub async fn check_connection(&self) -> Result<(), String> {
        self.store.check_connection().await
    }

    async fn lock_for(&self, group_id: GroupId) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(&group_id) {
                return lock.clone();
            }
        }
        let mut locks = self.locks.write().await;
        locks.entry(group_id).or_default().clone()
    }

    /// Loaded record, or a fresh one flagged as new.
    async fn load_or_create(&self, group_id: GroupId) -> Result<(GroupState, bool), StorageError> {
        match self.store.load(group_id).await? {
            Some(state) => Ok((state, false)),
            None => {
                info!(group_id = %group_id, "Creating repost data for new group");
                Ok((GroupState::blank(group_id, &self.defaults), true))
            }
        }
    }

    /// Runs `f` on the group's record and persists the result, all under the
    /// group's lock.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be loaded or saved. Nothing
    /// is saved when loading fails.
    pub async fn update<T, F>(&self, group_id: GroupId, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut GroupState) -> T + Send,
        T: Send,
    {
        let lock = self.lock_for(group_id).await;
        let _guard = lock.lock().await;
        let (mut state, _) = self.load_or_create(group_id).await?;
        let out = f(&mut state);
        self.store.save(&state).await?;
        debug!(group_id = %group_id, "Group record updated");
        Ok(out)
    }

    /// Current record. A group seen for the first time is created and saved.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be loaded or created.
    pub async fn snapshot(&self, group_id: GroupId) -> Result<GroupState, StorageError> {
        let lock = self.lock_for(group_id).await;
        let _guard = lock.lock().await;
        let (state, created) = self.load_or_create(group_id).await?;
        if created {
            self.store.save(&state).await?;
        }
        Ok(state)
    }

    /// Resolved toggles of a group.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be loaded.
    pub async fn toggles(&self, group_id: GroupId) -> Result<ToggleSet, StorageError> {
        Ok(self.snapshot(group_id).await?.toggles.resolve(&self.defaults))
    }

    /// Flips each requested toggle once and returns the new values in
    /// display order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be loaded or saved.
    pub async fn flip_toggles(
        &self,
        group_id: GroupId,
        requested: &[Toggle],
    ) -> Result<Vec<(Toggle, bool)>, StorageError> {
        let defaults = self.defaults;
        self.update(group_id, |state| {
            let current = state.toggles.resolve(&defaults);
            Toggle::ALL
                .into_iter()
                .filter(|toggle| requested.contains(toggle))
                .map(|toggle| {
                    let value = !current.get(toggle);
                    state.toggles.set(toggle, value);
                    (toggle, value)
                })
                .collect()
        })
        .await
    }

    /// Merges a partial toggle update into the stored toggles.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be loaded or saved.
    pub async fn save_toggles(
        &self,
        group_id: GroupId,
        update: &Toggles,
    ) -> Result<ToggleSet, StorageError> {
        let defaults = self.defaults;
        self.update(group_id, |state| {
            state.toggles = state.toggles.merged(update);
            state.toggles.resolve(&defaults)
        })
        .await
    }

    /// Flips whitelist membership of `keys`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be loaded or saved.
    pub async fn toggle_whitelist(
        &self,
        group_id: GroupId,
        keys: &[ContentKey],
    ) -> Result<WhitelistStatus, StorageError> {
        if keys.is_empty() {
            return Ok(WhitelistStatus::Fail);
        }
        self.update(group_id, |state| state.toggle_whitelist(keys))
            .await
    }

    /// Clears history, whitelist and deletion ledger; toggles survive.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be loaded or saved.
    pub async fn reset(&self, group_id: GroupId) -> Result<(), StorageError> {
        self.update(group_id, GroupState::reset).await?;
        info!(group_id = %group_id, "Group repost data reset");
        Ok(())
    }

    /// Messages already auto-deleted in a group.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be loaded.
    pub async fn deleted(&self, group_id: GroupId) -> Result<BTreeSet<MessageId>, StorageError> {
        Ok(self.snapshot(group_id).await?.deleted)
    }

    /// Adds messages to the deletion ledger.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be loaded or saved.
    pub async fn mark_deleted(
        &self,
        group_id: GroupId,
        message_ids: Vec<MessageId>,
    ) -> Result<(), StorageError> {
        if message_ids.is_empty() {
            return Ok(());
        }
        self.update(group_id, |state| state.mark_deleted(message_ids))
            .await
    }

    /// Repost counts of a group.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be loaded.
    pub async fn stats(&self, group_id: GroupId) -> Result<RepostStats, StorageError> {
        Ok(self.snapshot(group_id).await?.stats())
    }
}
