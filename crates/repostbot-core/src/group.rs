//! Per-group repost record.
//!
//! A [`GroupState`] is the persisted source of truth for one chat: repost
//! history, whitelist, toggles and the ledger of auto-deleted messages.

use crate::keys::{ContentKey, ContentKind};
use crate::toggles::{ToggleSet, Toggles};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Chat identifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message identifier within a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i32);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message history per content key; the first id is the original post.
pub type RepostMap = BTreeMap<ContentKey, Vec<MessageId>>;

/// Result of toggling keys on a group's whitelist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhitelistStatus {
    /// Every key was added
    Success,
    /// Every key was already whitelisted and has been removed
    AlreadyExists,
    /// Some keys were added, others removed
    AddedAndRemoved,
    /// No keys were given
    Fail,
}

/// Repost counts split by content kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepostStats {
    /// Distinct picture keys seen
    pub unique_images: usize,
    /// Picture occurrences beyond the original
    pub image_reposts: usize,
    /// Distinct URL keys seen
    pub unique_urls: usize,
    /// URL occurrences beyond the original
    pub url_reposts: usize,
}

/// Persisted state of one chat group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "GroupRecord", into = "GroupRecord")]
pub struct GroupState {
    /// Chat identifier
    pub group_id: GroupId,
    /// Every message id observed per key
    pub reposts: RepostMap,
    /// Keys exempt from callouts and auto-delete
    pub whitelist: BTreeSet<ContentKey>,
    /// Stored toggles
    pub toggles: Toggles,
    /// Messages already auto-deleted
    pub deleted: BTreeSet<MessageId>,
}

impl GroupState {
    /// Empty record using `defaults` as the group's toggles.
    #[must_use]
    pub fn blank(group_id: GroupId, defaults: &ToggleSet) -> Self {
        Self {
            group_id,
            reposts: RepostMap::new(),
            whitelist: BTreeSet::new(),
            toggles: Toggles::from(*defaults),
            deleted: BTreeSet::new(),
        }
    }

    /// Appends `message_id` to the history of every key. Recording the same
    /// message twice for a key has no effect.
    pub fn record(&mut self, message_id: MessageId, keys: &[ContentKey]) {
        for key in keys {
            let history = self.reposts.entry(key.clone()).or_default();
            if !history.contains(&message_id) {
                history.push(message_id);
            }
        }
    }

    /// Recorded history of a key.
    #[must_use]
    pub fn history(&self, key: &ContentKey) -> Option<&[MessageId]> {
        self.reposts.get(key).map(Vec::as_slice)
    }

    /// Whether a key is whitelisted.
    #[must_use]
    pub fn is_whitelisted(&self, key: &ContentKey) -> bool {
        self.whitelist.contains(key)
    }

    /// Flips whitelist membership of every distinct key in `keys`.
    pub fn toggle_whitelist(&mut self, keys: &[ContentKey]) -> WhitelistStatus {
        let distinct: BTreeSet<&ContentKey> = keys.iter().collect();
        let mut added = false;
        let mut removed = false;
        for key in distinct {
            if self.whitelist.remove(key) {
                removed = true;
            } else {
                self.whitelist.insert(key.clone());
                added = true;
            }
        }
        match (added, removed) {
            (true, false) => WhitelistStatus::Success,
            (false, true) => WhitelistStatus::AlreadyExists,
            (true, true) => WhitelistStatus::AddedAndRemoved,
            (false, false) => WhitelistStatus::Fail,
        }
    }

    /// Clears history, whitelist and deletion ledger. Toggles are kept.
    pub fn reset(&mut self) {
        self.reposts.clear();
        self.whitelist.clear();
        self.deleted.clear();
    }

    /// Adds messages to the deletion ledger.
    pub fn mark_deleted(&mut self, message_ids: impl IntoIterator<Item = MessageId>) {
        self.deleted.extend(message_ids);
    }

    /// Counts unique keys and reposts per content kind.
    #[must_use]
    pub fn stats(&self) -> RepostStats {
        let mut stats = RepostStats::default();
        for (key, history) in &self.reposts {
            let reposts = history.len().saturating_sub(1);
            match key.kind() {
                ContentKind::Picture => {
                    stats.unique_images += 1;
                    stats.image_reposts += reposts;
                }
                ContentKind::Url => {
                    stats.unique_urls += 1;
                    stats.url_reposts += reposts;
                }
            }
        }
        stats
    }
}

/// Every non-original occurrence across `reposts` not yet in `deleted`.
#[must_use]
pub fn deletion_candidates(reposts: &RepostMap, deleted: &BTreeSet<MessageId>) -> Vec<MessageId> {
    let mut seen = BTreeSet::new();
    reposts
        .values()
        .flat_map(|history| history.iter().skip(1))
        .filter(|id| !deleted.contains(id) && seen.insert(**id))
        .copied()
        .collect()
}

/// One `(hash_value, message_id)` row of the persisted repost list
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RepostEntry {
    hash_value: ContentKey,
    message_id: MessageId,
}

/// Repost list as stored, or the older `{hash: [ids]}` map
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StoredReposts {
    Pairs(Vec<RepostEntry>),
    Legacy(BTreeMap<ContentKey, Vec<MessageId>>),
}

impl Default for StoredReposts {
    fn default() -> Self {
        Self::Pairs(Vec::new())
    }
}

impl Serialize for StoredReposts {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Pairs(pairs) => pairs.serialize(serializer),
            Self::Legacy(map) => map.serialize(serializer),
        }
    }
}

/// On-disk layout of a group record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GroupRecord {
    #[serde(default)]
    group_id: GroupId,
    #[serde(default)]
    reposts: StoredReposts,
    #[serde(default)]
    whitelist: Vec<ContentKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    toggles: Option<Toggles>,
    #[serde(default, skip_serializing)]
    track: Option<Toggles>,
    #[serde(default)]
    deleted: Vec<MessageId>,
}

impl From<GroupRecord> for GroupState {
    fn from(record: GroupRecord) -> Self {
        let entries: Vec<(ContentKey, MessageId)> = match record.reposts {
            StoredReposts::Pairs(pairs) => pairs
                .into_iter()
                .map(|entry| (entry.hash_value, entry.message_id))
                .collect(),
            StoredReposts::Legacy(map) => map
                .into_iter()
                .flat_map(|(key, history)| history.into_iter().map(move |id| (key.clone(), id)))
                .collect(),
        };
        let mut reposts = RepostMap::new();
        for (key, message_id) in entries {
            let history = reposts.entry(key.upgrade_legacy()).or_default();
            if !history.contains(&message_id) {
                history.push(message_id);
            }
        }
        let toggles = match (record.toggles, record.track) {
            (Some(toggles), _) => toggles,
            (None, Some(track)) => track,
            (None, None) => Toggles::default(),
        };
        Self {
            group_id: record.group_id,
            reposts,
            whitelist: record
                .whitelist
                .into_iter()
                .map(ContentKey::upgrade_legacy)
                .collect(),
            toggles,
            deleted: record.deleted.into_iter().collect(),
        }
    }
}

impl From<GroupState> for GroupRecord {
    fn from(state: GroupState) -> Self {
        let pairs = state
            .reposts
            .into_iter()
            .flat_map(|(hash_value, history)| {
                history.into_iter().map(move |message_id| RepostEntry {
                    hash_value: hash_value.clone(),
                    message_id,
                })
            })
            .collect();
        Self {
            group_id: state.group_id,
            reposts: StoredReposts::Pairs(pairs),
            whitelist: state.whitelist.into_iter().collect(),
            toggles: Some(state.toggles),
            track: None,
            deleted: state.deleted.into_iter().collect(),
        }
    }
}
