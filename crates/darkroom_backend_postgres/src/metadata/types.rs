use sea_query::Iden;
use uuid::Uuid;

use darkroom_core::{Album, Photo};

#[derive(sqlx::FromRow, Clone)]
pub struct AlbumRow {
    pub id: Uuid,
    pub name: String,
}

impl From<AlbumRow> for Album {
    fn from(row: AlbumRow) -> Album {
        Album {
            id: row.id,
            name: row.name,
        }
    }
}

#[derive(Iden)]
pub enum Albums {
    Table,
    Id,
    Name,
}

#[derive(sqlx::FromRow, Clone)]
pub struct PhotoRow {
    pub id: Uuid,
    pub hash: String,
    pub album_id: Uuid,
}

impl From<PhotoRow> for Photo {
    fn from(row: PhotoRow) -> Photo {
        Photo {
            id: row.id,
            hash: row.hash,
            album_id: row.album_id,
        }
    }
}

#[derive(Iden)]
pub enum Photos {
    Table,
    Id,
    Hash,
    AlbumId,
}
