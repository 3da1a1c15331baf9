use super::{GroupStore, StorageError};
use crate::group::{GroupId, GroupState};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local store; records are lost on restart
#[derive(Default)]
pub struct MemoryGroupStore {
    groups: RwLock<HashMap<GroupId, GroupState>>,
}

impl MemoryGroupStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored groups
    pub async fn len(&self) -> usize {
        self.groups.read().await.len()
    }

    /// Whether no group has been stored
    pub async fn is_empty(&self) -> bool {
        self.groups.read().await.is_empty()
    }
}

#[async_trait]
impl GroupStore for MemoryGroupStore {
    async fn load(&self, group_id: GroupId) -> Result<Option<GroupState>, StorageError> {
        Ok(self.groups.read().await.get(&group_id).cloned())
    }

    async fn save(&self, state: &GroupState) -> Result<(), StorageError> {
        self.groups
            .write()
            .await
            .insert(state.group_id, state.clone());
        Ok(())
    }

    async fn check_connection(&self) -> Result<(), String> {
        Ok(())
    }
}
