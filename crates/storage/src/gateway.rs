use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ObjectStore, RetryConfig};
use tracing::{debug, info};

use unload_core::Session;

use crate::error::StorageError;
use crate::retry::{retry_transient, RetryPolicy};

/// Byte-level access to one bucket, under one session's credentials.
#[derive(Clone)]
pub struct ObjectStoreGateway {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for ObjectStoreGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreGateway")
            .field("bucket", &self.bucket)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ObjectStoreGateway {
    /// Build an S3 store for `bucket` from the assumed-role session.
    ///
    /// `endpoint` points at an S3-compatible service instead of AWS.
    pub fn for_session(
        session: &Session,
        bucket: &str,
        endpoint: Option<&str>,
        retry: RetryPolicy,
    ) -> Result<Self, StorageError> {
        if bucket.is_empty() {
            return Err(StorageError::NotConfigured("destination bucket not set".into()));
        }

        let mut builder = AmazonS3Builder::new()
            .with_region(&session.region)
            .with_access_key_id(&session.access_key_id)
            .with_secret_access_key(&session.secret_access_key)
            .with_token(&session.session_token)
            .with_retry(s3_retry_config());

        match endpoint.filter(|e| !e.is_empty()) {
            Some(endpoint) => {
                // object_store requires an absolute URL
                let endpoint_url =
                    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
                        endpoint.to_string()
                    } else {
                        format!("https://{endpoint}")
                    };
                builder = builder
                    .with_bucket_name(bucket)
                    .with_endpoint(&endpoint_url)
                    .with_allow_http(endpoint_url.starts_with("http://"));
            }
            None => {
                builder = builder.with_url(format!("s3://{bucket}"));
            }
        }

        let store = builder.build()?;
        info!(bucket, region = %session.region, "object store gateway ready");

        Ok(Self::with_store(Arc::new(store), bucket, retry))
    }

    /// Wrap an existing store, e.g. `object_store::memory::InMemory` in tests.
    pub fn with_store(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            retry,
        }
    }

    /// `s3://bucket/key` for log lines and summaries.
    pub fn uri(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }

    pub async fn put(&self, key: &str, payload: Bytes) -> Result<(), StorageError> {
        let path = Path::from(key);
        let size = payload.len();

        retry_transient("put", self.retry, || {
            let path = path.clone();
            let payload = payload.clone();
            async move {
                self.store
                    .put(&path, payload.into())
                    .await
                    .map(|_| ())
                    .map_err(|e| classify(key, e))
            }
        })
        .await?;

        debug!(key, size, "object written");
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = Path::from(key);

        let bytes = retry_transient("get", self.retry, || {
            let path = path.clone();
            async move {
                let result = self.store.get(&path).await.map_err(|e| classify(key, e))?;
                result.bytes().await.map_err(|e| classify(key, e))
            }
        })
        .await?;

        debug!(key, size = bytes.len(), "object read");
        Ok(bytes)
    }
}

/// Request settings for the S3 client. Retries are left to [`retry_transient`]
/// so a failing put costs at most `RetryPolicy::max_attempts` requests.
pub(crate) fn s3_retry_config() -> RetryConfig {
    RetryConfig {
        max_retries: 0,
        retry_timeout: Duration::from_secs(30),
        ..RetryConfig::default()
    }
}

/// Sort an `object_store` error into the gateway's error classes.
pub(crate) fn classify(key: &str, err: object_store::Error) -> StorageError {
    use object_store::Error;

    match err {
        Error::NotFound { .. } => StorageError::NotFound { key: key.to_string() },
        Error::PermissionDenied { .. } | Error::Unauthenticated { .. } => {
            StorageError::AccessDenied {
                key: key.to_string(),
                message: err.to_string(),
            }
        }
        // The S3 client already maps 401 and 403 responses to the variants above.
        Error::Generic { .. } => StorageError::Transient {
            key: key.to_string(),
            attempts: 1,
            message: err.to_string(),
        },
        other => StorageError::ObjectStore(other),
    }
}

#[cfg(test)]
mod tests {
    use object_store::memory::InMemory;

    use super::*;

    fn gateway() -> ObjectStoreGateway {
        ObjectStoreGateway::with_store(Arc::new(InMemory::new()), "test-bucket", RetryPolicy::none())
    }

    fn boxed(msg: &str) -> Box<dyn std::error::Error + Send + Sync> {
        Box::new(std::io::Error::other(msg.to_string()))
    }

    #[tokio::test]
    async fn put_then_get() {
        let gw = gateway();
        gw.put("out/processed_data_0.csv", Bytes::from_static(b"a,b\n1,2\n"))
            .await
            .unwrap();

        let bytes = gw.get("out/processed_data_0.csv").await.unwrap();
        assert_eq!(&bytes[..], b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn put_overwrites() {
        let gw = gateway();
        gw.put("k", Bytes::from_static(b"one")).await.unwrap();
        gw.put("k", Bytes::from_static(b"two")).await.unwrap();
        assert_eq!(&gw.get("k").await.unwrap()[..], b"two");
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let err = gateway().get("nope.json").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { ref key } if key == "nope.json"));
        assert!(!err.is_transient());
        assert!(!err.is_fatal());
    }

    #[test]
    fn uri_includes_bucket() {
        assert_eq!(gateway().uri("a/b.parquet"), "s3://test-bucket/a/b.parquet");
    }

    #[test]
    fn classify_permission_errors_as_fatal() {
        let err = classify(
            "k",
            object_store::Error::PermissionDenied {
                path: "k".into(),
                source: boxed("denied"),
            },
        );
        assert!(err.is_fatal());

        let err = classify(
            "k",
            object_store::Error::Unauthenticated {
                path: "k".into(),
                source: boxed("expired token"),
            },
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn classify_generic_as_transient() {
        let err = classify(
            "k",
            object_store::Error::Generic {
                store: "S3",
                source: boxed("connection reset by peer"),
            },
        );
        assert!(err.is_transient());
    }

    #[test]
    fn generic_error_mentioning_a_date_key_stays_transient() {
        let key = "daily/20250403/processed_data_0.csv";
        let err = classify(
            key,
            object_store::Error::Generic {
                store: "S3",
                source: boxed(
                    "error sending request for url \
                     (https://b.s3.amazonaws.com/daily/20250403/processed_data_0.csv): \
                     connection reset by peer",
                ),
            },
        );
        assert!(err.is_transient());
        assert!(!err.is_fatal());
    }

    #[test]
    fn s3_client_does_not_retry_on_its_own() {
        let config = s3_retry_config();
        assert_eq!(config.max_retries, 0);
        assert!(config.retry_timeout <= Duration::from_secs(30));
    }

    #[test]
    fn empty_bucket_is_rejected() {
        let session = Session {
            access_key_id: "AKIA".into(),
            secret_access_key: "secret".into(),
            session_token: "token".into(),
            expires_at: None,
            region: "us-east-1".into(),
        };
        let err = ObjectStoreGateway::for_session(&session, "", None, RetryPolicy::default())
            .unwrap_err();
        assert!(matches!(err, StorageError::NotConfigured(_)));
    }
}
