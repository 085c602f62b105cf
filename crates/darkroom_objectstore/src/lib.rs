use std::path::Component;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use once_cell::sync::Lazy;
use regex::Regex;

mod chunked;
pub use chunked::PartChunker;
mod config;
pub use config::{AnyObjectStore, Config};
mod errors;
pub use errors::{Error, KeyError, Result};
mod memory;
pub use memory::MemoryStore;
pub(crate) mod s3;
pub use s3::S3Config;
pub use s3::S3;

/// Boxed error carried by upload bodies, so producers (eg a payload decoder) can surface their
/// own error types through an [`ObjectStore::put`] and callers can downcast them back out.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A wrapper around [`std::path::PathBuf`] that rejects unsavory key names.
///
/// The following rules applied during the [`TryFrom<PathBuf>`] implementation:
///
/// * paths must not start with `/`
/// * paths are delimited by `/`
/// * paths are normalized (`//` are replaced with `/` and never end in `/`)
/// * paths must not contain relative segments (ie `.` or `..`)
/// * path segments must be valid unicode without control characters; anything else (spaces,
///   non-ASCII letters) is left for the backend to encode
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Key {
    key: PathBuf,
}

impl Key {
    /// Build a key out of a namespace prefix and an object name, eg `vacation/<uuid>.png`.
    pub fn namespaced(namespace: &str, name: &str) -> Result<Key> {
        Key::try_from(PathBuf::from(namespace).join(name))
    }

    /// Check that a single path segment would be accepted as part of a [`Key`].
    pub fn validate_segment(segment: &str) -> std::result::Result<(), KeyError> {
        // `Path` would quietly drop a trailing `/`
        if segment.contains('/') {
            return Err(KeyError::MultipleSegments(segment.to_string()));
        }
        let mut components = std::path::Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(c), None) => validate_component(PathBuf::new(), c).map(|_| ()),
            (None, _) => Err(KeyError::EmptySegment),
            (Some(_), Some(_)) => Err(KeyError::MultipleSegments(segment.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        // keys are only ever built out of unicode segments
        self.key.to_str().unwrap_or_default()
    }
}

impl From<&Key> for String {
    fn from(k: &Key) -> String {
        format!("{}", k.key.display())
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.key.display())
    }
}

impl TryFrom<PathBuf> for Key {
    type Error = Error;

    fn try_from(pb: PathBuf) -> Result<Key> {
        let key = pb
            .components()
            .try_fold(PathBuf::new(), validate_component)?;
        if key.as_os_str().is_empty() {
            return Err(KeyError::EmptySegment.into());
        }
        Ok(Key { key })
    }
}

impl TryFrom<&str> for Key {
    type Error = Error;

    fn try_from(s: &str) -> Result<Key> {
        Key::try_from(PathBuf::from(s))
    }
}

fn validate_component(
    mut pb: PathBuf,
    c: Component<'_>,
) -> std::result::Result<PathBuf, KeyError> {
    static RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[^\p{Cc}]+$").expect("key regex should compile"));
    match c {
        Component::Prefix(_) => return Err(KeyError::PrefixNotAllowed),
        Component::RootDir => return Err(KeyError::RootDirNotAllowed),
        Component::CurDir => return Err(KeyError::CurDirNotAllowed),
        Component::ParentDir => return Err(KeyError::ParentDirNotAllowed),
        Component::Normal(s) => {
            if let Some(s) = s.to_str() {
                if !RE.is_match(s) {
                    return Err(KeyError::PathComponentsMustMatchRegex(
                        RE.as_str().to_string(),
                    ));
                }
            } else {
                return Err(KeyError::PathComponentsMustBeValidUnicode);
            }
        }
    }
    pb.push(c);
    Ok(pb)
}

/// Object contents as returned by [`ObjectStore::get`].
pub type ObjectBody = BoxStream<'static, Result<Bytes>>;

/// Object contents handed to [`ObjectStore::put`]. The total length is not known up front.
pub type PutBody = BoxStream<'static, std::result::Result<Bytes, BoxError>>;

/// Provides a common interface for interacting with different kinds of backend object stores.
///
/// Object retrieval methods return [`futures::stream::Stream`] over [`bytes::Bytes`] and object
/// upload methods take a stream of unknown total length.
///
/// Implementations are cheap to clone and safe to share across concurrent callers.
#[async_trait]
pub trait ObjectStore: Clone + Send + Sync + 'static {
    /// Upload `body` under `key`. If the body stream yields an error the upload is abandoned and
    /// [`Error::ObjectBody`] is returned with the original error as its source.
    async fn put(&self, bucket: &str, key: &Key, body: PutBody) -> Result<()>;

    /// Fetch an object. Missing objects produce [`Error::NotFound`].
    async fn get(&self, bucket: &str, key: &Key) -> Result<ObjectBody>;

    async fn exists(&self, bucket: &str, key: &Key) -> Result<bool>;

    /// Produce a URL granting anonymous read access to one object for `ttl`.
    async fn signed_url(&self, bucket: &str, key: &Key, ttl: Duration) -> Result<String>;

    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Create a bucket. A bucket that already exists produces [`Error::BucketAlreadyExists`].
    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<()>;
}
