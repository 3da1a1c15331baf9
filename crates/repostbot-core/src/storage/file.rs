use super::{parse_record, GroupStore, StorageError};
use crate::group::{GroupId, GroupState};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, error, info};

/// One JSON file per group under a data directory
pub struct FileGroupStore {
    dir: PathBuf,
}

impl FileGroupStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, group_id: GroupId) -> PathBuf {
        self.dir.join(format!("{group_id}.json"))
    }
}

#[async_trait]
impl GroupStore for FileGroupStore {
    async fn load(&self, group_id: GroupId) -> Result<Option<GroupState>, StorageError> {
        let path = self.path_for(group_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => parse_record(group_id, &bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn save(&self, state: &GroupState) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let body = serde_json::to_vec_pretty(state)?;
        let path = self.path_for(state.group_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(group_id = %state.group_id, path = %path.display(), "Group record written");
        Ok(())
    }

    async fn check_connection(&self) -> Result<(), String> {
        match tokio::fs::create_dir_all(&self.dir).await {
            Ok(()) => {
                info!("Using group data directory {}", self.dir.display());
                Ok(())
            }
            Err(e) => {
                let err_msg = format!(
                    "Group data directory {} is not usable: {e}",
                    self.dir.display()
                );
                error!("{}", err_msg);
                Err(err_msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::MessageId;
    use crate::keys::ContentKey;
    use crate::toggles::ToggleSet;

    #[tokio::test]
    async fn test_missing_file_is_none() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = FileGroupStore::new(dir.path().join("groups"));
        assert!(store.load(GroupId(1)).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_save_then_load() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = FileGroupStore::new(dir.path().join("groups"));
        let mut state = GroupState::blank(GroupId(-100_123), &ToggleSet::default());
        state.record(MessageId(1), &[ContentKey::url("http://x.com")]);

        store.save(&state).await?;
        let loaded = store.load(GroupId(-100_123)).await?;

        assert_eq!(loaded, Some(state));
        assert!(dir.path().join("groups/-100123.json").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("5.json"), b"{ not json")?;
        let store = FileGroupStore::new(dir.path());

        let result = store.load(GroupId(5)).await;

        assert!(matches!(
            result,
            Err(StorageError::Corrupt {
                group_id: GroupId(5),
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_group_id_comes_from_file_name() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        std::fs::write(
            dir.path().join("77.json"),
            br#"{"reposts": {}, "whitelist": [], "toggles": {"picture": true}}"#,
        )?;
        let store = FileGroupStore::new(dir.path());

        let loaded = store.load(GroupId(77)).await?;

        assert_eq!(loaded.map(|s| s.group_id), Some(GroupId(77)));
        Ok(())
    }
}
