use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, StreamExt};
use url::Url;

use super::errors::{Error, Result};
use super::{Key, ObjectBody, ObjectStore, PutBody};

type Buckets = HashMap<String, HashMap<String, Bytes>>;

/// In-process [`ObjectStore`], useful for development setups and tests.
///
/// Signed URLs take the form `memory://<bucket>?key=<key>&expires=<unix-millis>` and can be
/// resolved with [`MemoryStore::get_signed`], which enforces the expiry.
#[derive(Clone, Default)]
pub struct MemoryStore {
    buckets: Arc<RwLock<Buckets>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects stored in `bucket`.
    pub fn object_count(&self, bucket: &str) -> usize {
        self.read()
            .get(bucket)
            .map(|objects| objects.len())
            .unwrap_or(0)
    }

    /// Every key stored in `bucket`, in no particular order.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.read()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Fetch the object a signed URL points at, as an anonymous client holding only the URL would.
    pub async fn get_signed(&self, url: &str) -> Result<ObjectBody> {
        let invalid = || Error::InvalidSignedUrl(url.to_string());
        let parsed = Url::parse(url).map_err(|_| invalid())?;
        if parsed.scheme() != "memory" {
            return Err(invalid());
        }
        let bucket = parsed.host_str().ok_or_else(invalid)?;

        let mut key = None;
        let mut expires = None;
        for (name, value) in parsed.query_pairs() {
            match &*name {
                "key" => key = Some(Key::try_from(&*value)?),
                "expires" => expires = value.parse::<i64>().ok(),
                _ => {}
            }
        }
        let (key, expires) = key.zip(expires).ok_or_else(invalid)?;

        if chrono::Utc::now().timestamp_millis() >= expires {
            return Err(Error::SignedUrlExpired);
        }
        self.get(bucket, &key).await
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Buckets> {
        self.buckets
            .read()
            .expect("memory store lock should never be poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Buckets> {
        self.buckets
            .write()
            .expect("memory store lock should never be poisoned")
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, bucket: &str, key: &Key, mut body: PutBody) -> Result<()> {
        if !self.read().contains_key(bucket) {
            return Err(Error::BucketNotFound(bucket.to_string()));
        }

        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk.map_err(Error::ObjectBody)?);
        }

        let mut buckets = self.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::BucketNotFound(bucket.to_string()))?;
        objects.insert(String::from(key), buf.freeze());
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &Key) -> Result<ObjectBody> {
        let bytes = self
            .read()
            .get(bucket)
            .and_then(|objects| objects.get(key.as_str()))
            .cloned()
            .ok_or_else(|| Error::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        Ok(stream::once(async move { Ok(bytes) }).boxed())
    }

    async fn exists(&self, bucket: &str, key: &Key) -> Result<bool> {
        Ok(self
            .read()
            .get(bucket)
            .map(|objects| objects.contains_key(key.as_str()))
            .unwrap_or(false))
    }

    async fn signed_url(&self, bucket: &str, key: &Key, ttl: Duration) -> Result<String> {
        let ttl = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires = chrono::Utc::now().timestamp_millis().saturating_add(ttl);
        let mut url = Url::parse(&format!("memory://{bucket}"))
            .map_err(|_| Error::InvalidSignedUrl(format!("memory://{bucket}")))?;
        url.query_pairs_mut()
            .append_pair("key", key.as_str())
            .append_pair("expires", &expires.to_string());
        Ok(url.into())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.read().contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<()> {
        let mut buckets = self.write();
        if buckets.contains_key(bucket) {
            return Err(Error::BucketAlreadyExists(bucket.to_string()));
        }
        tracing::debug!("creating in-memory bucket {bucket} in region {region}");
        buckets.insert(bucket.to_string(), HashMap::new());
        Ok(())
    }
}
