//! Postgres implementation of [`darkroom_core::MetadataStore`].
mod config;
mod errors;
mod metadata;

pub use config::PostgresConfig;
pub use errors::{Error, Result};
pub use metadata::PgMetadata;
