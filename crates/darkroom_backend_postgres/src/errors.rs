use thiserror;
use uuid::Uuid;

use darkroom_core::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("sqlx error")]
    SQLXError(#[from] sqlx::Error),
    #[error("sqlx migration error")]
    SQLXMigrateError(#[from] sqlx::migrate::MigrateError),
    #[error("sea-query error")]
    SeaQueryError(#[from] sea_query::error::Error),

    #[error("album name already taken: {0}")]
    AlbumNameTaken(String),
    #[error("unknown album: {0}")]
    UnknownAlbum(Uuid),
}

impl From<Error> for StoreError {
    fn from(e: Error) -> Self {
        match e {
            Error::AlbumNameTaken(name) => StoreError::Conflict(format!("album {name}")),
            _ => StoreError::Backend(Box::new(e)),
        }
    }
}
