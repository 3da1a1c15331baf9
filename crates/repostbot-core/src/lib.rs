#![deny(missing_docs)]
//! Repost Bot core library.
//!
//! Transport-agnostic repost detection: content keys, per-group state,
//! storage backends, flood protection, callouts and the reset flow.

/// Callout strategies for detected reposts.
pub mod callout;
/// Configuration management.
pub mod config;
/// Dedup engine recording keys and reporting reposts.
pub mod dedup;
/// Rate limiting of bot actions per actor.
pub mod flood;
/// Outbound gateway contract and inbound message model.
pub mod gateway;
/// Per-group persisted state.
pub mod group;
/// Content key derivation from images and URLs.
pub mod keys;
/// Reset confirmation conversations.
pub mod reset;
/// Command and message service.
pub mod service;
/// Serialized per-group access to the store.
pub mod state_store;
/// Storage backends (file, memory, R2/S3).
pub mod storage;
/// User-facing message strings.
pub mod strings;
/// Tracking and automation toggles.
pub mod toggles;

pub use group::{GroupId, GroupState, MessageId, RepostMap};
pub use keys::{ContentKey, ContentKind};
