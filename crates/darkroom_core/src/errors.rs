use darkroom_objectstore::{BoxError, KeyError};
use thiserror;

use crate::payload::DecodeError;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by [`crate::PhotoService`] operations.
///
/// Storage and metadata failures keep their source so callers can tell a failed object write
/// (nothing was stored) from a failed metadata write (an orphaned object was left behind).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] DecodeError),

    #[error("identifier generation failed: {0}")]
    IdGeneration(String),

    #[error("object write failed: {0}")]
    StorageWriteFailed(#[source] darkroom_objectstore::Error),
    #[error("object read failed: {0}")]
    StorageReadFailed(#[source] darkroom_objectstore::Error),

    #[error("metadata write failed: {0}")]
    MetadataWriteFailed(#[source] StoreError),
    #[error("metadata read failed: {0}")]
    MetadataReadFailed(#[source] StoreError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("album already exists: {0}")]
    AlbumAlreadyExists(String),
    #[error("invalid album name {name:?}: {source}")]
    InvalidAlbumName {
        name: String,
        #[source]
        source: KeyError,
    },

    #[error("unable to set up bucket {bucket}: {source}")]
    ConfigurationError {
        bucket: String,
        #[source]
        source: darkroom_objectstore::Error,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error type shared by all [`crate::MetadataStore`] implementations.
///
/// Backends convert their own error types into this one, mapping uniqueness violations to
/// [`StoreError::Conflict`].
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(#[source] BoxError),
}
