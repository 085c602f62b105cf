use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use uuid::Uuid;

use darkroom_objectstore::{Key, ObjectBody, ObjectStore};

use crate::config::PhotoServiceConfig;
use crate::errors::{Error, Result, StoreError};
use crate::identifier::{IdGenerator, UuidV4Generator};
use crate::metadata::MetadataStore;
use crate::payload::{DecodeError, PayloadBody, PayloadDecoder};
use crate::types::{Album, NewAlbum, NewPhoto, Photo};

/// Extension given to every stored object, whatever the actual image format.
pub const OBJECT_EXTENSION: &str = "png";

/// Upload, retrieval and album management on top of an [`ObjectStore`] and a [`MetadataStore`].
///
/// Both stores are injected at construction and shared by every clone of the service.
#[derive(Clone)]
pub struct PhotoService<O, M, G = UuidV4Generator> {
    objects: O,
    metadata: M,
    ids: G,
    config: PhotoServiceConfig,
}

impl<O: ObjectStore, M: MetadataStore> PhotoService<O, M> {
    pub async fn new(objects: O, metadata: M, config: PhotoServiceConfig) -> Result<Self> {
        Self::with_generator(objects, metadata, UuidV4Generator, config).await
    }
}

impl<O, M, G> PhotoService<O, M, G>
where
    O: ObjectStore,
    M: MetadataStore,
    G: IdGenerator,
{
    /// Build the service, creating the configured bucket if it does not exist yet.
    pub async fn with_generator(
        objects: O,
        metadata: M,
        ids: G,
        config: PhotoServiceConfig,
    ) -> Result<Self> {
        ensure_bucket(&objects, &config).await?;
        Ok(Self {
            objects,
            metadata,
            ids,
            config,
        })
    }

    /// Store the image carried by `payload` in `album`.
    ///
    /// The object is written before the photo record. If the record cannot be saved the object
    /// stays behind as an orphan and [`Error::MetadataWriteFailed`] is returned; retrying is safe
    /// since every attempt writes under a fresh token.
    pub async fn upload_photo(&self, payload: PayloadBody, album: &Album) -> Result<Photo> {
        let decoded = PayloadDecoder::open(payload).await?;

        let token = self.ids.new_id()?;
        let hash = format!("{token}.{OBJECT_EXTENSION}");
        let key = album.object_key(&hash).map_err(Error::StorageWriteFailed)?;

        tracing::debug!("writing object {key}");
        self.objects
            .put(&self.config.bucket_name, &key, decoded.into_body())
            .await
            .map_err(put_error)?;

        let photo = self
            .metadata
            .save_photo(NewPhoto {
                hash,
                album_id: album.id,
            })
            .await
            .map_err(|e| {
                tracing::warn!("object {key} orphaned, failed to save photo record: {e}");
                Error::MetadataWriteFailed(e)
            })?;

        tracing::info!("stored photo {} as {key}", photo.id);
        Ok(photo)
    }

    /// [`PhotoService::upload_photo`] for a payload that is already in memory.
    pub async fn upload_photo_bytes(
        &self,
        payload: impl Into<Bytes>,
        album: &Album,
    ) -> Result<Photo> {
        let payload = payload.into();
        self.upload_photo(stream::once(async move { Ok(payload) }).boxed(), album)
            .await
    }

    /// Stream the bytes of the photo stored as `hash` in `album`.
    ///
    /// The returned stream holds on to the underlying connection until it is drained or dropped.
    pub async fn fetch_photo_bytes(&self, album: &Album, hash: &str) -> Result<ObjectBody> {
        let key = self.read_key(album, hash)?;
        self.objects
            .get(&self.config.bucket_name, &key)
            .await
            .map_err(read_error)
    }

    /// Whether an object is stored as `hash` in `album`, whatever the metadata says.
    pub async fn photo_exists(&self, album: &Album, hash: &str) -> Result<bool> {
        let key = match album.object_key(hash) {
            Ok(key) => key,
            Err(_) => return Ok(false),
        };
        self.objects
            .exists(&self.config.bucket_name, &key)
            .await
            .map_err(Error::StorageReadFailed)
    }

    /// Signed URL for the photo stored as `hash` in `album`, valid for `ttl` or the configured
    /// default.
    pub async fn fetch_signed_url(
        &self,
        album: &Album,
        hash: &str,
        ttl: Option<Duration>,
    ) -> Result<String> {
        let key = self.read_key(album, hash)?;
        let ttl = ttl.unwrap_or_else(|| self.config.signed_url_ttl());
        self.objects
            .signed_url(&self.config.bucket_name, &key, ttl)
            .await
            .map_err(read_error)
    }

    pub async fn get_album(&self, name: &str) -> Result<Album> {
        self.metadata
            .find_album_by_name(name)
            .await
            .map_err(Error::MetadataReadFailed)?
            .ok_or_else(|| Error::NotFound(format!("album {name}")))
    }

    pub async fn get_photo(&self, id: &Uuid) -> Result<Photo> {
        self.metadata
            .find_photo_by_id(id)
            .await
            .map_err(Error::MetadataReadFailed)?
            .ok_or_else(|| Error::NotFound(format!("photo {id}")))
    }

    /// Every photo in `album`, in no particular order. An album without photos is not an error.
    pub async fn list_album_photos(&self, album: &Album) -> Result<Vec<Photo>> {
        self.metadata
            .list_photos_of_album(album)
            .await
            .map_err(Error::MetadataReadFailed)
    }

    /// Create an album. The name becomes the key namespace of the album's objects, so it has to
    /// form a single key segment (not empty, `.` or `..`, no `/`, no control characters), and it
    /// has to be unused.
    pub async fn create_album(&self, name: &str) -> Result<Album> {
        Key::validate_segment(name).map_err(|source| Error::InvalidAlbumName {
            name: name.to_string(),
            source,
        })?;

        if self
            .metadata
            .find_album_by_name(name)
            .await
            .map_err(Error::MetadataReadFailed)?
            .is_some()
        {
            return Err(Error::AlbumAlreadyExists(name.to_string()));
        }

        match self
            .metadata
            .save_album(NewAlbum {
                name: name.to_string(),
            })
            .await
        {
            Ok(album) => {
                tracing::info!("created album {name} ({})", album.id);
                Ok(album)
            }
            // lost a race with a concurrent create
            Err(StoreError::Conflict(_)) => Err(Error::AlbumAlreadyExists(name.to_string())),
            Err(e) => Err(Error::MetadataWriteFailed(e)),
        }
    }

    fn read_key(&self, album: &Album, hash: &str) -> Result<Key> {
        // a hash that cannot form a valid key cannot name a stored object either
        album
            .object_key(hash)
            .map_err(|_| Error::NotFound(format!("{}/{hash}", album.name)))
    }
}

async fn ensure_bucket<O: ObjectStore>(objects: &O, config: &PhotoServiceConfig) -> Result<()> {
    let bucket = config.bucket_name.as_str();
    let configuration_error = |source| Error::ConfigurationError {
        bucket: bucket.to_string(),
        source,
    };

    if objects
        .bucket_exists(bucket)
        .await
        .map_err(configuration_error)?
    {
        tracing::debug!("bucket {bucket} exists");
        return Ok(());
    }

    match objects.create_bucket(bucket, &config.region).await {
        Ok(()) => {
            tracing::info!("created bucket {bucket} in {}", config.region);
            Ok(())
        }
        Err(darkroom_objectstore::Error::BucketAlreadyExists(_)) => {
            tracing::info!("bucket {bucket} already exists");
            Ok(())
        }
        Err(e) => Err(configuration_error(e)),
    }
}

fn put_error(e: darkroom_objectstore::Error) -> Error {
    match e {
        darkroom_objectstore::Error::ObjectBody(source) => match source.downcast::<DecodeError>() {
            Ok(decode_error) => Error::MalformedPayload(*decode_error),
            Err(source) => Error::StorageWriteFailed(darkroom_objectstore::Error::ObjectBody(source)),
        },
        e => Error::StorageWriteFailed(e),
    }
}

fn read_error(e: darkroom_objectstore::Error) -> Error {
    match e {
        darkroom_objectstore::Error::NotFound { bucket, key } => {
            Error::NotFound(format!("{bucket}/{key}"))
        }
        e => Error::StorageReadFailed(e),
    }
}
