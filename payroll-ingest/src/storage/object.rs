//! Object storage backend (S3-compatible)
//!
//! Key layout: `{IDENTIFIER}/{employee_key}/{file_name}` inside the
//! configured bucket. Artifacts are stored with content type
//! `application/pdf`.

use super::{validate_component, StorageBackend, StorageError, StorageLocator, RECEIPT_CONTENT_TYPE};
use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use payroll_common::config::{StorageConfig, StorageKind};
use std::sync::Arc;

pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStorage {
    /// Wrap an existing store that serves `bucket`
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Build an S3 client from configuration
    ///
    /// Standard `AWS_*` environment variables are honored; explicit
    /// configuration values take precedence over them.
    pub fn s3(config: &StorageConfig) -> Result<Self, StorageError> {
        let bucket = config
            .bucket
            .clone()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| StorageError::Config("object backend requires a bucket".to_string()))?;

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(&bucket);
        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        if let Some(key_id) = &config.access_key_id {
            builder = builder.with_access_key_id(key_id);
        }
        if let Some(secret) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }

        let store = builder.build()?;
        Ok(Self::new(Arc::new(store), bucket))
    }

    /// In-process store, for tests and dry runs
    pub fn in_memory(bucket: impl Into<String>) -> Self {
        Self::new(Arc::new(InMemory::new()), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Underlying store handle
    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    /// Object key for an artifact
    pub fn object_key(identifier: &str, employee_key: &str, file_name: &str) -> Result<String, StorageError> {
        validate_component(identifier)?;
        validate_component(employee_key)?;
        validate_component(file_name)?;
        Ok(format!("{}/{}/{}", identifier.to_uppercase(), employee_key, file_name))
    }

    /// Key of a locator in this store's bucket
    fn addressable_key<'a>(&self, locator: &'a StorageLocator) -> Option<&'a str> {
        match locator {
            StorageLocator::Object { bucket, key } if bucket == &self.bucket => Some(key.as_str()),
            StorageLocator::Object { bucket, .. } => {
                tracing::debug!(%bucket, configured = %self.bucket, "Locator names another bucket");
                None
            }
            StorageLocator::File { .. } => None,
        }
    }
}

fn object_path(key: &str) -> Result<ObjectPath, StorageError> {
    ObjectPath::parse(key).map_err(|e| StorageError::InvalidName(format!("{}: {}", key, e)))
}

#[async_trait]
impl StorageBackend for ObjectStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Object
    }

    async fn exists(&self, locator: &StorageLocator) -> Result<bool, StorageError> {
        let Some(key) = self.addressable_key(locator) else {
            return Ok(false);
        };

        match self.store.head(&object_path(key)?).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::Object(e)),
        }
    }

    async fn persist(
        &self,
        bytes: &[u8],
        identifier: &str,
        employee_key: &str,
        file_name: &str,
    ) -> Result<StorageLocator, StorageError> {
        let key = Self::object_key(identifier, employee_key, file_name)?;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, RECEIPT_CONTENT_TYPE.into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&object_path(&key)?, PutPayload::from(bytes.to_vec()), options)
            .await?;

        tracing::debug!(bucket = %self.bucket, %key, size = bytes.len(), "Stored artifact in object storage");

        Ok(StorageLocator::Object {
            bucket: self.bucket.clone(),
            key,
        })
    }

    async fn fetch(&self, locator: &StorageLocator) -> Result<Vec<u8>, StorageError> {
        let Some(key) = self.addressable_key(locator) else {
            return Err(StorageError::NotFound(locator.to_string()));
        };

        let result = match self.store.get(&object_path(key)?).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound(locator.to_string()))
            }
            Err(e) => return Err(StorageError::Object(e)),
        };
        Ok(result.bytes().await?.to_vec())
    }
}
