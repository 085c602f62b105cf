use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use darkroom_backend_postgres::{PgMetadata, PostgresConfig};
use darkroom_core::{
    Album, MemoryMetadata, MetadataStore, NewAlbum, NewPhoto, Photo, PhotoServiceConfig,
    StoreResult,
};

#[derive(Clone, Deserialize)]
pub struct Config {
    pub objects: darkroom_objectstore::Config,
    pub metadata: MetadataBackend,
    pub photos: PhotoServiceConfig,
}

#[derive(Clone, Deserialize)]
#[serde(tag = "type")]
pub enum MetadataBackend {
    Postgres(PostgresConfig),
    Memory,
}

impl MetadataBackend {
    pub async fn new_metadata(&self) -> anyhow::Result<AnyMetadata> {
        match self {
            Self::Postgres(cfg) => Ok(AnyMetadata::Postgres(cfg.new_metadata().await?)),
            Self::Memory => Ok(AnyMetadata::Memory(MemoryMetadata::new())),
        }
    }
}

#[derive(Clone)]
pub enum AnyMetadata {
    Postgres(PgMetadata),
    Memory(MemoryMetadata),
}

#[async_trait]
impl MetadataStore for AnyMetadata {
    async fn save_album(&self, album: NewAlbum) -> StoreResult<Album> {
        match self {
            Self::Postgres(m) => m.save_album(album).await,
            Self::Memory(m) => m.save_album(album).await,
        }
    }

    async fn save_photo(&self, photo: NewPhoto) -> StoreResult<Photo> {
        match self {
            Self::Postgres(m) => m.save_photo(photo).await,
            Self::Memory(m) => m.save_photo(photo).await,
        }
    }

    async fn find_album_by_name(&self, name: &str) -> StoreResult<Option<Album>> {
        match self {
            Self::Postgres(m) => m.find_album_by_name(name).await,
            Self::Memory(m) => m.find_album_by_name(name).await,
        }
    }

    async fn find_photo_by_id(&self, id: &Uuid) -> StoreResult<Option<Photo>> {
        match self {
            Self::Postgres(m) => m.find_photo_by_id(id).await,
            Self::Memory(m) => m.find_photo_by_id(id).await,
        }
    }

    async fn list_photos_of_album(&self, album: &Album) -> StoreResult<Vec<Photo>> {
        match self {
            Self::Postgres(m) => m.list_photos_of_album(album).await,
            Self::Memory(m) => m.list_photos_of_album(album).await,
        }
    }
}
