use s3::creds::Credentials;
use s3::{Bucket, Region};

/// Client for the creative asset bucket (Cloudflare R2, S3-compatible).
pub struct R2Client {
    bucket: Box<Bucket>,
    url_ttl_secs: u32,
}

impl R2Client {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        url_ttl_secs: u32,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self {
            bucket,
            url_ttl_secs,
        })
    }

    /// Time-limited GET URL the analysis services can fetch the asset from.
    pub async fn playable_url(&self, key: &str) -> Result<String, StorageError> {
        self.bucket
            .presign_get(key, self.url_ttl_secs, None)
            .await
            .map_err(StorageError::S3)
    }

    /// Size of a stored object in bytes, if the store reports one.
    pub async fn object_size(&self, key: &str) -> Result<Option<u64>, StorageError> {
        let (head, status) = self.bucket.head_object(key).await.map_err(StorageError::S3)?;
        if status == 404 {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(head.content_length.and_then(|len| u64::try_from(len).ok()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Asset object not found: {0}")]
    NotFound(String),

    #[error("Storage configuration error: {0}")]
    Config(String),
}
