use super::{group_record_key, parse_record, GroupStore, StorageError};
use crate::config::RepostSettings;
use crate::group::{GroupId, GroupState};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// R2-backed group store
pub struct R2GroupStore {
    client: Client,
    bucket: String,
    cache: Cache<String, Arc<Vec<u8>>>,
}

impl R2GroupStore {
    /// Create a new R2 storage instance
    ///
    /// # Errors
    ///
    /// Returns an error if R2 configuration is missing.
    pub async fn new(settings: &RepostSettings) -> Result<Self, StorageError> {
        let endpoint_url = settings
            .r2_endpoint_url
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_ENDPOINT_URL is missing".into()))?;
        let access_key = settings
            .r2_access_key_id
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_ACCESS_KEY_ID is missing".into()))?;
        let secret_key = settings
            .r2_secret_access_key
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_SECRET_ACCESS_KEY is missing".into()))?;
        let bucket = settings
            .r2_bucket_name
            .as_ref()
            .ok_or_else(|| StorageError::Config("R2_BUCKET_NAME is missing".into()))?;

        let credentials = Credentials::new(access_key, secret_key, None, None, "r2-storage");

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new("auto"))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .endpoint_url(endpoint_url)
            .force_path_style(true)
            .build();

        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_idle(Duration::from_secs(30 * 60))
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: bucket.clone(),
            cache,
        })
    }

    async fn fetch(&self, key: &str) -> Result<Option<Arc<Vec<u8>>>, StorageError> {
        if let Some(cached) = self.cache.get(key).await {
            return Ok(Some(cached));
        }

        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let data = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
                    .into_bytes();
                let data = Arc::new(data.to_vec());
                // Read-Through: populate cache on miss
                self.cache.insert(key.to_string(), data.clone()).await;
                Ok(Some(data))
            }
            Err(SdkError::ServiceError(err)) if err.err().is_no_such_key() => Ok(None),
            Err(e) => Err(StorageError::S3Get(Box::new(e))),
        }
    }
}

#[async_trait]
impl GroupStore for R2GroupStore {
    async fn load(&self, group_id: GroupId) -> Result<Option<GroupState>, StorageError> {
        let key = group_record_key(group_id);
        let Some(data) = self.fetch(&key).await? else {
            return Ok(None);
        };
        match parse_record(group_id, &data) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!("Cached record for {} failed to parse, refetching: {}", key, e);
                self.cache.invalidate(&key).await;
                match self.fetch(&key).await? {
                    Some(data) => parse_record(group_id, &data).map(Some),
                    None => Ok(None),
                }
            }
        }
    }

    async fn save(&self, state: &GroupState) -> Result<(), StorageError> {
        let key = group_record_key(state.group_id);
        let body = serde_json::to_vec_pretty(state)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body.clone()))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| StorageError::S3Put(e.to_string()))?;

        // Write-Through: cache only what the bucket accepted
        self.cache.insert(key, Arc::new(body)).await;
        Ok(())
    }

    async fn check_connection(&self) -> Result<(), String> {
        match self.client.list_buckets().send().await {
            Ok(_) => {
                info!("Successfully connected to R2 storage.");
                Ok(())
            }
            Err(e) => {
                let err_msg = format!("R2 connectivity test failed: {e:#?}");
                error!("{}", err_msg);
                Err(err_msg)
            }
        }
    }
}
