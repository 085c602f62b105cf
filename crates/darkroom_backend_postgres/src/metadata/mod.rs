mod postgres;
pub use postgres::PgMetadata;
pub use postgres::PostgresMetadataPool;

mod types;
