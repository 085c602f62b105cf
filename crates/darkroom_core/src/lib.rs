//! # darkroom core
//!
//! Orchestrates photo uploads and retrievals across two independent stores:
//!
//! * an [`ObjectStore`](darkroom_objectstore::ObjectStore) holding the image bytes, keyed
//!   `<album-name>/<token>.png`
//! * a [`MetadataStore`] holding album and photo records
//!
//! [`PhotoService`] always writes the object before the metadata record that points at it, so a
//! photo record never references a missing object. The reverse (an object with no record) can
//! happen when the metadata write fails and is tolerated as a leak.
mod config;
pub use config::PhotoServiceConfig;

pub mod errors;
pub use errors::{Error, Result, StoreError, StoreResult};

mod identifier;
pub use identifier::{IdGenerator, Token, UuidV4Generator};

pub mod metadata;
pub use metadata::{MemoryMetadata, MetadataStore};

mod payload;
pub use payload::{DecodeError, DecodedPayload, PayloadBody, PayloadDecoder};

mod photos;
pub use photos::{PhotoService, OBJECT_EXTENSION};

mod types;
pub use types::{Album, NewAlbum, NewPhoto, Photo};
