//! # Metadata Abstractions
//!
//! Album and photo records live behind [`MetadataStore`]. Each record kind has its own save
//! operation; a store assigns ids on save and hands back the saved record.
//!
//! ## Known Implementations
//!
//! * [`MemoryMetadata`] keeps everything in process memory
//! * `darkroom_backend_postgres::PgMetadata` stores records in Postgres
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::{StoreError, StoreResult};
use crate::types::{Album, NewAlbum, NewPhoto, Photo};

#[async_trait]
pub trait MetadataStore: Clone + Send + Sync + 'static {
    /// Save a new album. Album names are unique; saving a duplicate name produces
    /// [`StoreError::Conflict`].
    async fn save_album(&self, album: NewAlbum) -> StoreResult<Album>;

    /// Save a new photo record belonging to an existing album.
    async fn save_photo(&self, photo: NewPhoto) -> StoreResult<Photo>;

    async fn find_album_by_name(&self, name: &str) -> StoreResult<Option<Album>>;

    async fn find_photo_by_id(&self, id: &Uuid) -> StoreResult<Option<Photo>>;

    /// All photos of `album`, in no particular order.
    async fn list_photos_of_album(&self, album: &Album) -> StoreResult<Vec<Photo>>;
}

#[derive(Default)]
struct Tables {
    albums: HashMap<Uuid, Album>,
    photos: HashMap<Uuid, Photo>,
}

/// [`MetadataStore`] held entirely in process memory.
#[derive(Clone, Default)]
pub struct MemoryMetadata {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn album_count(&self) -> usize {
        self.read().albums.len()
    }

    pub fn photo_count(&self) -> usize {
        self.read().photos.len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables
            .read()
            .expect("metadata lock should never be poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables
            .write()
            .expect("metadata lock should never be poisoned")
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadata {
    async fn save_album(&self, album: NewAlbum) -> StoreResult<Album> {
        let mut tables = self.write();
        if tables.albums.values().any(|a| a.name == album.name) {
            return Err(StoreError::Conflict(format!("album {}", album.name)));
        }
        let album = Album {
            id: Uuid::new_v4(),
            name: album.name,
        };
        tables.albums.insert(album.id, album.clone());
        Ok(album)
    }

    async fn save_photo(&self, photo: NewPhoto) -> StoreResult<Photo> {
        let mut tables = self.write();
        if !tables.albums.contains_key(&photo.album_id) {
            return Err(StoreError::Backend(
                format!("album {} does not exist", photo.album_id).into(),
            ));
        }
        let photo = Photo {
            id: Uuid::new_v4(),
            hash: photo.hash,
            album_id: photo.album_id,
        };
        tables.photos.insert(photo.id, photo.clone());
        Ok(photo)
    }

    async fn find_album_by_name(&self, name: &str) -> StoreResult<Option<Album>> {
        Ok(self
            .read()
            .albums
            .values()
            .find(|a| a.name == name)
            .cloned())
    }

    async fn find_photo_by_id(&self, id: &Uuid) -> StoreResult<Option<Photo>> {
        Ok(self.read().photos.get(id).cloned())
    }

    async fn list_photos_of_album(&self, album: &Album) -> StoreResult<Vec<Photo>> {
        Ok(self
            .read()
            .photos
            .values()
            .filter(|p| p.album_id == album.id)
            .cloned()
            .collect())
    }
}
