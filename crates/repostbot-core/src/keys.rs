//! Content key derivation.
//!
//! Pictures are keyed by a perceptual (mean) hash of the largest photo
//! variant, URLs by the SHA-256 digest of the exact entity substring. Each
//! key carries a type prefix so the two key spaces never overlap.

use crate::gateway::{ChatGateway, GatewayError};
use image_hasher::{HashAlg, HasherConfig};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// Length of a hex encoded SHA-256 digest; legacy unprefixed URL keys have it.
const URL_DIGEST_LEN: usize = 64;

/// Errors raised while fetching or hashing message content
#[derive(Error, Debug)]
pub enum ContentFetchError {
    /// File could not be downloaded
    #[error("Download error: {0}")]
    Download(#[from] GatewayError),
    /// Bytes are not a decodable image
    #[error("Decode error: {0}")]
    Decode(#[from] image::ImageError),
    /// Hashing task did not complete
    #[error("Hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Category of a content key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// Perceptual image hash
    Picture,
    /// URL digest
    Url,
}

/// Opaque identifier of a piece of repostable content
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentKey(String);

impl ContentKey {
    /// Prefix of picture keys.
    pub const PICTURE_PREFIX: &'static str = "p:";
    /// Prefix of URL keys.
    pub const URL_PREFIX: &'static str = "u:";

    /// Key for an already computed perceptual hash.
    #[must_use]
    pub fn picture(hash: &str) -> Self {
        Self(format!("{}{hash}", Self::PICTURE_PREFIX))
    }

    /// Key for a URL substring.
    #[must_use]
    pub fn url(url: &str) -> Self {
        let digest = Sha256::digest(url.as_bytes());
        Self(format!("{}{digest:x}", Self::URL_PREFIX))
    }

    /// Wraps a stored key value as-is.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Stored representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classifies the key by its prefix. Keys written before prefixes existed
    /// are classified by length: 64 characters is a URL digest.
    #[must_use]
    pub fn kind(&self) -> ContentKind {
        if self.0.starts_with(Self::URL_PREFIX) {
            ContentKind::Url
        } else if self.0.starts_with(Self::PICTURE_PREFIX) {
            ContentKind::Picture
        } else if self.0.len() == URL_DIGEST_LEN {
            ContentKind::Url
        } else {
            ContentKind::Picture
        }
    }

    /// Rewrites a key stored before prefixes existed into its prefixed form.
    /// Prefixed keys are returned unchanged.
    #[must_use]
    pub fn upgrade_legacy(self) -> Self {
        if self.0.starts_with(Self::URL_PREFIX) || self.0.starts_with(Self::PICTURE_PREFIX) {
            return self;
        }
        let prefix = match self.kind() {
            ContentKind::Url => Self::URL_PREFIX,
            ContentKind::Picture => Self::PICTURE_PREFIX,
        };
        Self(format!("{prefix}{}", self.0))
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Repostable content referenced by a message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageContent {
    /// File id of the highest-resolution photo variant
    pub photo_file_id: Option<String>,
    /// URL entity substrings from text and caption, in message order
    pub urls: Vec<String>,
}

impl MessageContent {
    /// Whether the message references no picture and no URL.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.photo_file_id.is_none() && self.urls.is_empty()
    }
}

/// Keys derived from one message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedKeys {
    /// Picture key, if a picture was hashed
    pub picture: Option<ContentKey>,
    /// URL keys in message order, without duplicates
    pub urls: Vec<ContentKey>,
}

impl ExtractedKeys {
    /// Picture key followed by URL keys.
    #[must_use]
    pub fn all(&self) -> Vec<ContentKey> {
        self.picture.iter().chain(&self.urls).cloned().collect()
    }
}

/// Derives content keys from inbound messages
#[derive(Debug, Clone, Copy)]
pub struct ContentKeyExtractor {
    hash_size: u32,
}

impl ContentKeyExtractor {
    /// Extractor producing `hash_size` x `hash_size` bit perceptual hashes.
    #[must_use]
    pub const fn new(hash_size: u32) -> Self {
        Self { hash_size }
    }

    /// Extracts every key regardless of toggles.
    ///
    /// # Errors
    ///
    /// Returns `ContentFetchError` if the picture cannot be fetched or decoded.
    pub async fn extract_all<G: ChatGateway + ?Sized>(
        &self,
        gateway: &G,
        content: &MessageContent,
    ) -> Result<ExtractedKeys, ContentFetchError> {
        Ok(ExtractedKeys {
            picture: self.picture_key(gateway, content).await?,
            urls: Self::url_keys(content),
        })
    }

    /// Downloads and hashes the message picture. The bytes are dropped once
    /// hashed.
    ///
    /// # Errors
    ///
    /// Returns `ContentFetchError` if the picture cannot be fetched or decoded.
    pub async fn picture_key<G: ChatGateway + ?Sized>(
        &self,
        gateway: &G,
        content: &MessageContent,
    ) -> Result<Option<ContentKey>, ContentFetchError> {
        let Some(file_id) = content.photo_file_id.as_deref() else {
            return Ok(None);
        };
        let started = Instant::now();
        info!("Getting file...");
        let bytes = gateway.fetch_file(file_id).await?;
        info!(
            "Done (took {:.2} seconds)",
            started.elapsed().as_secs_f64()
        );
        self.hash_image(bytes).await.map(Some)
    }

    /// One key per distinct URL substring, in first-occurrence order.
    #[must_use]
    pub fn url_keys(content: &MessageContent) -> Vec<ContentKey> {
        let mut keys: Vec<ContentKey> = Vec::with_capacity(content.urls.len());
        for url in &content.urls {
            let key = ContentKey::url(url);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Computes the perceptual key of encoded image bytes off the async runtime.
    ///
    /// # Errors
    ///
    /// Returns `ContentFetchError::Decode` if the bytes are not an image.
    pub async fn hash_image(&self, bytes: Vec<u8>) -> Result<ContentKey, ContentFetchError> {
        let hash_size = self.hash_size;
        let hash = tokio::task::spawn_blocking(move || -> Result<String, image::ImageError> {
            let image = image::load_from_memory(&bytes)?;
            let hasher = HasherConfig::new()
                .hash_size(hash_size, hash_size)
                .hash_alg(HashAlg::Mean)
                .to_hasher();
            Ok(hasher.hash_image(&image).to_base64())
        })
        .await??;
        debug!(hash = %hash, "Computed picture hash");
        Ok(ContentKey::picture(&hash))
    }
}
