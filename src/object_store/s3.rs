use super::{ListPage, ObjectStore, ObjectStoreError};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3 as s3;

/// [`ObjectStore`] backed by the AWS S3 API (ListObjectsV2 / GetObject).
pub struct S3ObjectStore {
    client: s3::Client,
}

impl S3ObjectStore {
    /// Build a client from the default credential chain (environment,
    /// profile, instance role) in the given region.
    pub async fn from_env(region: &str) -> Self {
        let conf = aws_config::defaults(BehaviorVersion::latest())
            .region(s3::config::Region::new(region.to_string()))
            .load()
            .await;

        tracing::info!(region = %region, "S3 client initialized");

        Self {
            client: s3::Client::new(&conf),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
        max_keys: Option<i32>,
    ) -> Result<ListPage, ObjectStoreError> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_continuation_token(continuation)
            .set_max_keys(max_keys)
            .send()
            .await
            .map_err(|e| ObjectStoreError::List {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
                source: s3::error::DisplayErrorContext(e).to_string().into(),
            })?;

        let keys = resp
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(str::to_string))
            .collect();

        // S3 only returns a token while the listing is truncated.
        let next = resp.next_continuation_token().map(str::to_string);

        Ok(ListPage { keys, next })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let not_found = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                if not_found {
                    ObjectStoreError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    ObjectStoreError::Get {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                        source: s3::error::DisplayErrorContext(e).to_string().into(),
                    }
                }
            })?;

        let body = resp.body.collect().await.map_err(|e| ObjectStoreError::Get {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source: Box::new(e),
        })?;

        Ok(body.into_bytes().to_vec())
    }
}
