use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::memory::MemoryStore;
use super::{Key, ObjectBody, ObjectStore, PutBody, Result};
use super::S3;

/// Selects and configures one of the available [`ObjectStore`] backends.
#[derive(Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Config {
    S3(super::s3::S3Config),
    Memory,
}

impl Config {
    pub async fn new_objects(&self) -> Result<AnyObjectStore> {
        match self {
            Self::S3(cfg) => Ok(AnyObjectStore::S3(cfg.new_objects().await?)),
            Self::Memory => Ok(AnyObjectStore::Memory(MemoryStore::new())),
        }
    }
}

/// Either of the concrete backends [`Config`] can produce.
#[derive(Clone)]
pub enum AnyObjectStore {
    S3(S3),
    Memory(MemoryStore),
}

#[async_trait]
impl ObjectStore for AnyObjectStore {
    async fn put(&self, bucket: &str, key: &Key, body: PutBody) -> Result<()> {
        match self {
            Self::S3(s) => s.put(bucket, key, body).await,
            Self::Memory(m) => m.put(bucket, key, body).await,
        }
    }

    async fn get(&self, bucket: &str, key: &Key) -> Result<ObjectBody> {
        match self {
            Self::S3(s) => s.get(bucket, key).await,
            Self::Memory(m) => m.get(bucket, key).await,
        }
    }

    async fn exists(&self, bucket: &str, key: &Key) -> Result<bool> {
        match self {
            Self::S3(s) => s.exists(bucket, key).await,
            Self::Memory(m) => m.exists(bucket, key).await,
        }
    }

    async fn signed_url(&self, bucket: &str, key: &Key, ttl: Duration) -> Result<String> {
        match self {
            Self::S3(s) => s.signed_url(bucket, key, ttl).await,
            Self::Memory(m) => m.signed_url(bucket, key, ttl).await,
        }
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self {
            Self::S3(s) => s.bucket_exists(bucket).await,
            Self::Memory(m) => m.bucket_exists(bucket).await,
        }
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<()> {
        match self {
            Self::S3(s) => s.create_bucket(bucket, region).await,
            Self::Memory(m) => m.create_bucket(bucket, region).await,
        }
    }
}
