//! Storage layer for group records
//!
//! Provides persistent storage for [`GroupState`] records on the local file
//! system or in Cloudflare R2 / AWS S3, plus an in-memory store.

mod file;
mod memory;
mod r2;

pub use file::FileGroupStore;
pub use memory::MemoryGroupStore;
pub use r2::R2GroupStore;

use crate::group::{GroupId, GroupState};
use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Error retrieving object from S3
    #[error("S3 Get error: {0}")]
    S3Get(Box<SdkError<GetObjectError>>),
    /// Error putting object into S3
    #[error("S3 put error: {0}")]
    S3Put(String),
    /// Error during JSON serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration error (missing credentials, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
    /// A record exists but cannot be parsed
    #[error("Group {group_id} record is corrupt: {source}")]
    Corrupt {
        /// Group whose record failed to parse
        group_id: GroupId,
        /// Parse failure
        source: serde_json::Error,
    },
}

/// Interface for group record backends
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Load a group record; `Ok(None)` when none was ever saved
    async fn load(&self, group_id: GroupId) -> Result<Option<GroupState>, StorageError>;
    /// Persist a group record, replacing any previous one
    async fn save(&self, state: &GroupState) -> Result<(), StorageError>;
    /// Check connection to the backend
    async fn check_connection(&self) -> Result<(), String>;
}

/// Parses a stored record. The group id always comes from the caller since
/// older records do not carry one.
pub(crate) fn parse_record(group_id: GroupId, bytes: &[u8]) -> Result<GroupState, StorageError> {
    let mut state: GroupState = serde_json::from_slice(bytes)
        .map_err(|source| StorageError::Corrupt { group_id, source })?;
    state.group_id = group_id;
    Ok(state)
}

/// Returns the object key / file stem for a group's record
#[must_use]
pub fn group_record_key(group_id: GroupId) -> String {
    format!("groups/{group_id}.json")
}
