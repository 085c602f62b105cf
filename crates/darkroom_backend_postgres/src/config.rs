use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;

use super::errors::Result;
use super::metadata::{PgMetadata, PostgresMetadataPool};

fn default_true() -> bool {
    true
}

#[derive(Clone, Deserialize)]
pub struct PostgresConfig {
    connection_string: String,
    #[serde(default)]
    max_connections: Option<u32>,
    /// apply the embedded migrations when connecting
    #[serde(default = "default_true")]
    run_migrations: bool,
}

impl PostgresConfig {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            max_connections: None,
            run_migrations: true,
        }
    }

    pub async fn new_metadata(&self) -> Result<PgMetadata> {
        let mut options = PgPoolOptions::new();
        if let Some(max) = self.max_connections {
            options = options.max_connections(max);
        }
        let pool = options.connect(&self.connection_string).await?;

        if self.run_migrations {
            tracing::debug!("running metadata migrations");
            sqlx::migrate!("./migrations").run(&pool).await?;
        }

        Ok(PgMetadata::new(PostgresMetadataPool::new(pool)))
    }
}
