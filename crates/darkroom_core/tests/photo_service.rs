use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use uuid::Uuid;

use darkroom_core::{
    Album, Error, IdGenerator, MemoryMetadata, MetadataStore, NewAlbum, NewPhoto, Photo,
    PhotoService, PhotoServiceConfig, StoreError, StoreResult, Token,
};
use darkroom_objectstore::{Key, MemoryStore, ObjectBody, ObjectStore, PutBody};

const BUCKET: &str = "photos";

/// Counts every call that would change the object store and can be told to fail writes or
/// bucket lookups.
#[derive(Clone, Default)]
struct Objects {
    inner: MemoryStore,
    puts: Arc<AtomicUsize>,
    fail_puts: bool,
    fail_bucket_exists: bool,
    hide_bucket: bool,
}

#[async_trait]
impl ObjectStore for Objects {
    async fn put(&self, bucket: &str, key: &Key, body: PutBody) -> darkroom_objectstore::Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts {
            return Err(darkroom_objectstore::Error::BucketNotFound(bucket.to_string()));
        }
        self.inner.put(bucket, key, body).await
    }

    async fn get(&self, bucket: &str, key: &Key) -> darkroom_objectstore::Result<ObjectBody> {
        self.inner.get(bucket, key).await
    }

    async fn exists(&self, bucket: &str, key: &Key) -> darkroom_objectstore::Result<bool> {
        self.inner.exists(bucket, key).await
    }

    async fn signed_url(
        &self,
        bucket: &str,
        key: &Key,
        ttl: Duration,
    ) -> darkroom_objectstore::Result<String> {
        self.inner.signed_url(bucket, key, ttl).await
    }

    async fn bucket_exists(&self, bucket: &str) -> darkroom_objectstore::Result<bool> {
        if self.fail_bucket_exists {
            return Err(darkroom_objectstore::Error::InvalidSignedUrl(
                "connection refused".into(),
            ));
        }
        if self.hide_bucket {
            return Ok(false);
        }
        self.inner.bucket_exists(bucket).await
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> darkroom_objectstore::Result<()> {
        self.inner.create_bucket(bucket, region).await
    }
}

/// Metadata store whose photo saves can be made to fail.
#[derive(Clone, Default)]
struct Metadata {
    inner: MemoryMetadata,
    fail_photo_saves: bool,
}

#[async_trait]
impl MetadataStore for Metadata {
    async fn save_album(&self, album: NewAlbum) -> StoreResult<Album> {
        self.inner.save_album(album).await
    }

    async fn save_photo(&self, photo: NewPhoto) -> StoreResult<Photo> {
        if self.fail_photo_saves {
            return Err(StoreError::Backend("database unavailable".into()));
        }
        self.inner.save_photo(photo).await
    }

    async fn find_album_by_name(&self, name: &str) -> StoreResult<Option<Album>> {
        self.inner.find_album_by_name(name).await
    }

    async fn find_photo_by_id(&self, id: &Uuid) -> StoreResult<Option<Photo>> {
        self.inner.find_photo_by_id(id).await
    }

    async fn list_photos_of_album(&self, album: &Album) -> StoreResult<Vec<Photo>> {
        self.inner.list_photos_of_album(album).await
    }
}

#[derive(Clone)]
struct ExhaustedIds;

impl IdGenerator for ExhaustedIds {
    fn new_id(&self) -> darkroom_core::Result<Token> {
        Err(Error::IdGeneration("entropy source exhausted".into()))
    }
}

/// Hands out a fixed token, so tests can predict object keys.
#[derive(Clone)]
struct FixedId(Uuid);

impl IdGenerator for FixedId {
    fn new_id(&self) -> darkroom_core::Result<Token> {
        Ok(self.0.into())
    }
}

async fn service(objects: Objects, metadata: Metadata) -> PhotoService<Objects, Metadata> {
    PhotoService::new(objects, metadata, PhotoServiceConfig::new(BUCKET))
        .await
        .expect("service should start")
}

async fn read_all(body: ObjectBody) -> Vec<u8> {
    let chunks: Vec<Bytes> = body.try_collect().await.expect("object should be readable");
    chunks.concat()
}

#[tokio::test]
async fn vacation_scenario() {
    let photos = service(Objects::default(), Metadata::default()).await;

    photos.create_album("vacation").await.unwrap();
    let vacation = photos.get_album("vacation").await.unwrap();

    let photo = photos
        .upload_photo_bytes("data:image/png;base64,aGVsbG8=", &vacation)
        .await
        .unwrap();
    assert!(photo.hash.ends_with(".png"));
    assert_eq!(photo.album_id, vacation.id);

    let listed = photos.list_album_photos(&vacation).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].hash, photo.hash);

    assert_eq!(photos.get_photo(&photo.id).await.unwrap(), photo);
}

#[tokio::test]
async fn round_trip() {
    let objects = Objects::default();
    let photos = service(objects.clone(), Metadata::default()).await;
    let album = photos.create_album("vacation").await.unwrap();

    let photo = photos
        .upload_photo_bytes("data:image/png;base64,aGVsbG8gd29ybGQ=", &album)
        .await
        .unwrap();

    let key = Key::try_from(format!("vacation/{}", photo.hash).as_str()).unwrap();
    assert!(objects.exists(BUCKET, &key).await.unwrap());

    let body = photos.fetch_photo_bytes(&album, &photo.hash).await.unwrap();
    assert_eq!(read_all(body).await, b"hello world");
}

#[tokio::test]
async fn streamed_payload_round_trip() {
    let photos = service(Objects::default(), Metadata::default()).await;
    let album = photos.create_album("vacation").await.unwrap();

    let payload = stream::iter(
        ["data:image/png;", "base64,aGV", "sbG8gd2", "9ybGQ="]
            .into_iter()
            .map(|p| Ok(Bytes::from_static(p.as_bytes()))),
    )
    .boxed();
    let photo = photos.upload_photo(payload, &album).await.unwrap();

    let body = photos.fetch_photo_bytes(&album, &photo.hash).await.unwrap();
    assert_eq!(read_all(body).await, b"hello world");
}

#[tokio::test]
async fn malformed_payloads_have_no_side_effects() {
    let objects = Objects::default();
    let metadata = Metadata::default();
    let photos = service(objects.clone(), metadata.clone()).await;
    let album = photos.create_album("vacation").await.unwrap();

    for payload in ["", "aGVsbG8=", "data:image/png;base64,"] {
        match photos.upload_photo_bytes(payload, &album).await {
            Err(Error::MalformedPayload(_)) => {}
            other => panic!("expected MalformedPayload for {payload:?} got {other:?}"),
        }
    }

    assert_eq!(objects.puts.load(Ordering::SeqCst), 0);
    assert_eq!(objects.inner.object_count(BUCKET), 0);
    assert_eq!(metadata.inner.photo_count(), 0);
}

#[tokio::test]
async fn invalid_base64_is_malformed_and_stores_nothing() {
    let objects = Objects::default();
    let metadata = Metadata::default();
    let photos = service(objects.clone(), metadata.clone()).await;
    let album = photos.create_album("vacation").await.unwrap();

    match photos
        .upload_photo_bytes("data:image/png;base64,aGV$bG8=", &album)
        .await
    {
        Err(Error::MalformedPayload(_)) => {}
        other => panic!("expected MalformedPayload got {other:?}"),
    }

    assert_eq!(objects.inner.object_count(BUCKET), 0);
    assert_eq!(metadata.inner.photo_count(), 0);
}

#[tokio::test]
async fn failed_object_write_creates_no_record() {
    let objects = Objects {
        fail_puts: true,
        ..Default::default()
    };
    let metadata = Metadata::default();
    let photos = service(objects, metadata.clone()).await;
    let album = photos.create_album("vacation").await.unwrap();

    match photos
        .upload_photo_bytes("data:image/png;base64,aGVsbG8=", &album)
        .await
    {
        Err(Error::StorageWriteFailed(_)) => {}
        other => panic!("expected StorageWriteFailed got {other:?}"),
    }
    assert_eq!(metadata.inner.photo_count(), 0);
}

#[tokio::test]
async fn failed_id_generation_aborts_upload() {
    let objects = Objects::default();
    let photos = PhotoService::with_generator(
        objects.clone(),
        Metadata::default(),
        ExhaustedIds,
        PhotoServiceConfig::new(BUCKET),
    )
    .await
    .unwrap();
    let album = photos.create_album("vacation").await.unwrap();

    assert!(matches!(
        photos
            .upload_photo_bytes("data:image/png;base64,aGVsbG8=", &album)
            .await,
        Err(Error::IdGeneration(_))
    ));
    assert_eq!(objects.puts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn orphaned_object_on_metadata_failure() {
    let objects = Objects::default();
    let metadata = Metadata {
        fail_photo_saves: true,
        ..Default::default()
    };
    let photos = service(objects.clone(), metadata).await;
    let album = photos.create_album("vacation").await.unwrap();

    match photos
        .upload_photo_bytes("data:image/png;base64,aGVsbG8=", &album)
        .await
    {
        Err(Error::MetadataWriteFailed(_)) => {}
        other => panic!("expected MetadataWriteFailed got {other:?}"),
    }

    // the object is still there and readable by its key
    let keys = objects.inner.keys(BUCKET);
    assert_eq!(keys.len(), 1);
    let hash = keys[0]
        .strip_prefix("vacation/")
        .expect("object should live in the album namespace");
    let body = photos.fetch_photo_bytes(&album, hash).await.unwrap();
    assert_eq!(read_all(body).await, b"hello");

    // but no record points at it
    assert!(photos.list_album_photos(&album).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_uploads_get_distinct_keys() {
    const N: usize = 64;
    let objects = Objects::default();
    let photos = service(objects.clone(), Metadata::default()).await;
    let album = photos.create_album("vacation").await.unwrap();

    let handles: Vec<_> = (0..N)
        .map(|_| {
            let photos = photos.clone();
            let album = album.clone();
            tokio::spawn(async move {
                photos
                    .upload_photo_bytes("data:image/png;base64,aGVsbG8=", &album)
                    .await
            })
        })
        .collect();

    let mut hashes = HashSet::new();
    for handle in handles {
        let photo = handle.await.unwrap().unwrap();
        hashes.insert(photo.hash);
    }

    assert_eq!(hashes.len(), N);
    assert_eq!(objects.inner.object_count(BUCKET), N);
    assert_eq!(photos.list_album_photos(&album).await.unwrap().len(), N);
}

#[tokio::test]
async fn signed_url_grants_access_until_expiry() {
    let objects = Objects::default();
    let photos = service(objects.clone(), Metadata::default()).await;
    let album = photos.create_album("vacation").await.unwrap();
    let photo = photos
        .upload_photo_bytes("data:image/png;base64,aGVsbG8=", &album)
        .await
        .unwrap();

    let url = photos
        .fetch_signed_url(&album, &photo.hash, Some(Duration::from_millis(100)))
        .await
        .unwrap();
    assert_eq!(read_all(objects.inner.get_signed(&url).await.unwrap()).await, b"hello");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(matches!(
        objects.inner.get_signed(&url).await,
        Err(darkroom_objectstore::Error::SignedUrlExpired)
    ));
}

#[tokio::test]
async fn signed_url_uses_configured_default_ttl() {
    let objects = Objects::default();
    let photos = PhotoService::new(
        objects.clone(),
        Metadata::default(),
        PhotoServiceConfig::new(BUCKET).with_signed_url_ttl(Duration::from_secs(600)),
    )
    .await
    .unwrap();
    let album = photos.create_album("vacation").await.unwrap();
    let photo = photos
        .upload_photo_bytes("data:image/png;base64,aGVsbG8=", &album)
        .await
        .unwrap();

    let url = photos
        .fetch_signed_url(&album, &photo.hash, None)
        .await
        .unwrap();
    let expires: i64 = url
        .rsplit_once("expires=")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap();
    let remaining = expires - now_millis();
    assert!(remaining > 500_000 && remaining <= 600_000, "{remaining}");
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

#[tokio::test]
async fn missing_things_are_not_found() {
    let photos = service(Objects::default(), Metadata::default()).await;
    assert!(matches!(
        photos.get_album("nonexistent").await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        photos.get_photo(&Uuid::new_v4()).await,
        Err(Error::NotFound(_))
    ));

    let album = photos.create_album("vacation").await.unwrap();
    assert!(matches!(
        photos.fetch_photo_bytes(&album, "missing.png").await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        photos.fetch_photo_bytes(&album, "../escape.png").await,
        Err(Error::NotFound(_))
    ));
    assert!(photos.list_album_photos(&album).await.unwrap().is_empty());
}

#[tokio::test]
async fn album_names_are_validated_and_unique() {
    let photos = service(Objects::default(), Metadata::default()).await;
    photos.create_album("vacation").await.unwrap();

    assert!(matches!(
        photos.create_album("vacation").await,
        Err(Error::AlbumAlreadyExists(_))
    ));
    assert!(matches!(
        photos.create_album("summer/vacation").await,
        Err(Error::InvalidAlbumName { .. })
    ));
    for name in ["", ".", "..", "vacation/", "tab\tname"] {
        assert!(
            matches!(
                photos.create_album(name).await,
                Err(Error::InvalidAlbumName { .. })
            ),
            "{name:?}"
        );
    }
}

#[tokio::test]
async fn album_names_with_spaces_and_unicode() {
    let objects = Objects::default();
    let photos = service(objects.clone(), Metadata::default()).await;

    for name in ["summer vacation", "été"] {
        let album = photos.create_album(name).await.unwrap();
        assert_eq!(photos.get_album(name).await.unwrap(), album);

        let photo = photos
            .upload_photo_bytes("data:image/png;base64,aGVsbG8=", &album)
            .await
            .unwrap();
        assert!(photos.photo_exists(&album, &photo.hash).await.unwrap());

        let body = photos.fetch_photo_bytes(&album, &photo.hash).await.unwrap();
        assert_eq!(read_all(body).await, b"hello");

        let url = photos
            .fetch_signed_url(&album, &photo.hash, None)
            .await
            .unwrap();
        assert_eq!(read_all(objects.inner.get_signed(&url).await.unwrap()).await, b"hello");
    }
}

#[tokio::test]
async fn wrapped_payload_file_uploads() {
    let photos = service(Objects::default(), Metadata::default()).await;
    let album = photos.create_album("vacation").await.unwrap();

    // what `base64 -w 8 photo.png` followed by a trailing newline would produce
    let photo = photos
        .upload_photo_bytes("data:image/png;base64,aGVsbG8g\nd29ybGQ=\n", &album)
        .await
        .unwrap();

    let body = photos.fetch_photo_bytes(&album, &photo.hash).await.unwrap();
    assert_eq!(read_all(body).await, b"hello world");
}

#[tokio::test]
async fn object_is_named_after_the_generated_token() {
    let token = Uuid::new_v4();
    let photos = PhotoService::with_generator(
        Objects::default(),
        Metadata::default(),
        FixedId(token),
        PhotoServiceConfig::new(BUCKET),
    )
    .await
    .unwrap();
    let album = photos.create_album("vacation").await.unwrap();

    let photo = photos
        .upload_photo_bytes("data:image/png;base64,aGVsbG8=", &album)
        .await
        .unwrap();
    assert_eq!(photo.hash, format!("{token}.png"));
    assert!(photos.photo_exists(&album, &photo.hash).await.unwrap());
    assert!(!photos.photo_exists(&album, "missing.png").await.unwrap());
    assert!(!photos.photo_exists(&album, "../escape.png").await.unwrap());
}

#[tokio::test]
async fn bootstrap_creates_missing_bucket() {
    let objects = Objects::default();
    assert!(!objects.bucket_exists(BUCKET).await.unwrap());
    service(objects.clone(), Metadata::default()).await;
    assert!(objects.bucket_exists(BUCKET).await.unwrap());

    // a second service over the same store finds the bucket in place
    service(objects, Metadata::default()).await;
}

#[tokio::test]
async fn bootstrap_tolerates_bucket_created_concurrently() {
    let objects = Objects {
        hide_bucket: true,
        ..Default::default()
    };
    objects.inner.create_bucket(BUCKET, "us-east-2").await.unwrap();

    // bucket_exists says no, create_bucket says it already exists
    assert!(
        PhotoService::new(objects, Metadata::default(), PhotoServiceConfig::new(BUCKET))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn bootstrap_failure_is_a_configuration_error() {
    let objects = Objects {
        fail_bucket_exists: true,
        ..Default::default()
    };
    match PhotoService::new(objects, Metadata::default(), PhotoServiceConfig::new(BUCKET)).await {
        Err(Error::ConfigurationError { bucket, .. }) => assert_eq!(bucket, BUCKET),
        Err(e) => panic!("expected ConfigurationError got {e:?}"),
        Ok(_) => panic!("expected ConfigurationError got Ok"),
    }
}
