use async_trait::async_trait;
use sea_query::{Expr, PostgresQueryBuilder, Query, Value};
use sea_query_binder::{SqlxBinder, SqlxValues};
use sqlx::{pool::PoolConnection, postgres::Postgres, Pool};
use uuid::Uuid;

use darkroom_core::{Album, MetadataStore, NewAlbum, NewPhoto, Photo, StoreResult};

use super::types::{AlbumRow, Albums, PhotoRow, Photos};
use crate::errors::{Error, Result};

#[derive(Clone)]
pub struct PostgresMetadataPool {
    pool: Pool<Postgres>,
}

impl PostgresMetadataPool {
    pub(crate) fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_conn(&self) -> Result<PostgresMetadataConn> {
        Ok(PostgresMetadataConn {
            conn: self.pool.acquire().await?,
        })
    }
}

pub struct PostgresMetadataConn {
    conn: PoolConnection<Postgres>,
}

// Statement builders, kept apart from execution so the generated SQL can be inspected without a
// database.
struct Queries {}

impl Queries {
    fn insert_album(id: &Uuid, name: &str) -> Result<(String, SqlxValues)> {
        Ok(Query::insert()
            .into_table(Albums::Table)
            .columns([Albums::Id, Albums::Name])
            .values([Value::from(*id).into(), Value::from(name).into()])?
            .returning(Query::returning().columns([Albums::Id, Albums::Name]))
            .build_sqlx(PostgresQueryBuilder))
    }

    fn insert_photo(id: &Uuid, photo: &NewPhoto) -> Result<(String, SqlxValues)> {
        Ok(Query::insert()
            .into_table(Photos::Table)
            .columns([Photos::Id, Photos::Hash, Photos::AlbumId])
            .values([
                Value::from(*id).into(),
                Value::from(photo.hash.as_str()).into(),
                Value::from(photo.album_id).into(),
            ])?
            .returning(Query::returning().columns([Photos::Id, Photos::Hash, Photos::AlbumId]))
            .build_sqlx(PostgresQueryBuilder))
    }

    fn select_album_by_name(name: &str) -> (String, SqlxValues) {
        Query::select()
            .from(Albums::Table)
            .columns([Albums::Id, Albums::Name])
            .and_where(Expr::col(Albums::Name).eq(name))
            .build_sqlx(PostgresQueryBuilder)
    }

    fn select_photo_by_id(id: &Uuid) -> (String, SqlxValues) {
        Query::select()
            .from(Photos::Table)
            .columns([Photos::Id, Photos::Hash, Photos::AlbumId])
            .and_where(Expr::col(Photos::Id).eq(*id))
            .build_sqlx(PostgresQueryBuilder)
    }

    fn select_photos_of_album(album_id: &Uuid) -> (String, SqlxValues) {
        Query::select()
            .from(Photos::Table)
            .columns([Photos::Id, Photos::Hash, Photos::AlbumId])
            .and_where(Expr::col(Photos::AlbumId).eq(*album_id))
            .build_sqlx(PostgresQueryBuilder)
    }
}

impl PostgresMetadataConn {
    pub async fn insert_album(&mut self, name: &str) -> Result<AlbumRow> {
        let (sql, values) = Queries::insert_album(&Uuid::new_v4(), name)?;
        match sqlx::query_as_with::<_, AlbumRow, _>(&sql, values)
            .fetch_one(&mut *self.conn)
            .await
        {
            Ok(row) => Ok(row),
            Err(sqlx::Error::Database(dberr)) => match dberr.kind() {
                sqlx::error::ErrorKind::UniqueViolation => {
                    tracing::debug!("unique violation error: {dberr}");
                    Err(Error::AlbumNameTaken(name.to_string()))
                }
                _ => Err(sqlx::Error::Database(dberr).into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    pub async fn insert_photo(&mut self, photo: &NewPhoto) -> Result<PhotoRow> {
        let (sql, values) = Queries::insert_photo(&Uuid::new_v4(), photo)?;
        match sqlx::query_as_with::<_, PhotoRow, _>(&sql, values)
            .fetch_one(&mut *self.conn)
            .await
        {
            Ok(row) => Ok(row),
            Err(sqlx::Error::Database(dberr)) => match dberr.kind() {
                sqlx::error::ErrorKind::ForeignKeyViolation => {
                    tracing::warn!("foreign key violation error: {dberr}");
                    Err(Error::UnknownAlbum(photo.album_id))
                }
                _ => Err(sqlx::Error::Database(dberr).into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_album(&mut self, name: &str) -> Result<Option<AlbumRow>> {
        let (sql, values) = Queries::select_album_by_name(name);
        Ok(sqlx::query_as_with::<_, AlbumRow, _>(&sql, values)
            .fetch_optional(&mut *self.conn)
            .await?)
    }

    pub async fn get_photo(&mut self, id: &Uuid) -> Result<Option<PhotoRow>> {
        let (sql, values) = Queries::select_photo_by_id(id);
        Ok(sqlx::query_as_with::<_, PhotoRow, _>(&sql, values)
            .fetch_optional(&mut *self.conn)
            .await?)
    }

    pub async fn get_photos(&mut self, album_id: &Uuid) -> Result<Vec<PhotoRow>> {
        let (sql, values) = Queries::select_photos_of_album(album_id);
        Ok(sqlx::query_as_with::<_, PhotoRow, _>(&sql, values)
            .fetch_all(&mut *self.conn)
            .await?)
    }
}

/// [`MetadataStore`] backed by a Postgres connection pool.
#[derive(Clone)]
pub struct PgMetadata {
    pool: PostgresMetadataPool,
}

impl PgMetadata {
    pub fn new(pool: PostgresMetadataPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataStore for PgMetadata {
    async fn save_album(&self, album: NewAlbum) -> StoreResult<Album> {
        let row = self.pool.get_conn().await?.insert_album(&album.name).await?;
        Ok(row.into())
    }

    async fn save_photo(&self, photo: NewPhoto) -> StoreResult<Photo> {
        let row = self.pool.get_conn().await?.insert_photo(&photo).await?;
        Ok(row.into())
    }

    async fn find_album_by_name(&self, name: &str) -> StoreResult<Option<Album>> {
        let row = self.pool.get_conn().await?.get_album(name).await?;
        Ok(row.map(Album::from))
    }

    async fn find_photo_by_id(&self, id: &Uuid) -> StoreResult<Option<Photo>> {
        let row = self.pool.get_conn().await?.get_photo(id).await?;
        Ok(row.map(Photo::from))
    }

    async fn list_photos_of_album(&self, album: &Album) -> StoreResult<Vec<Photo>> {
        let rows = self.pool.get_conn().await?.get_photos(&album.id).await?;
        Ok(rows.into_iter().map(Photo::from).collect())
    }
}
