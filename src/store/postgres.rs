use anyhow::Context;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgRow},
    Connection, PgConnection, PgPool, Postgres, Row, Transaction,
};
use std::str::FromStr;
use std::time::Duration;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::logic::chunker::{reassemble, ChunkBuffer};
use crate::logic::merge::SetInstruction;
use crate::model::{Chunk, Document, FileRecord, ObjectId};
use crate::store::traits::{BlobStore, Connector, DocumentSession, UploadStream};

/// Timeouts and sizing for a `PostgresStore`.
#[derive(Debug, Clone)]
pub struct PostgresSettings {
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
    pub delete_timeout: Duration,
    pub transfer_timeout: Option<Duration>,
    pub pool_size: u32,
    pub pool_acquire_timeout: Duration,
    pub chunk_size: usize,
}

impl PostgresSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            connect_timeout: config.timeouts.metadata_connect(),
            operation_timeout: config.timeouts.metadata_operation(),
            delete_timeout: config.timeouts.delete_lookup(),
            transfer_timeout: config.timeouts.blob_transfer(),
            pool_size: config.recordings.pool_size,
            pool_acquire_timeout: Duration::from_secs(config.recordings.pool_acquire_secs),
            chunk_size: config.recordings.chunk_size,
        }
    }
}

/// PostgreSQL-backed documents and recordings.
///
/// Document requests each get a dedicated connection; recording requests
/// share a small pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    options: PgConnectOptions,
    blob_pool: PgPool,
    settings: PostgresSettings,
}

impl PostgresStore {
    pub async fn new(database_url: &str, settings: PostgresSettings) -> anyhow::Result<Self> {
        let options = PgConnectOptions::from_str(database_url).context("Invalid PostgreSQL connection URL")?;

        let blob_pool = PgPoolOptions::new()
            .max_connections(settings.pool_size)
            .acquire_timeout(settings.pool_acquire_timeout)
            .connect_with(options.clone())
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self {
            options,
            blob_pool,
            settings,
        })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.blob_pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }
}

fn row_to_document(row: &PgRow) -> AppResult<Document> {
    let id: Vec<u8> = row.try_get("id")?;
    let body: serde_json::Value = row.try_get("body")?;
    let serde_json::Value::Object(map) = body else {
        return Err(AppError::StoreUnavailable("stored body is not an object".to_string()));
    };
    Ok(Document::from_map(map).with_id(&ObjectId::from_slice(&id)?))
}

fn row_to_file(row: &PgRow) -> AppResult<FileRecord> {
    let id: Vec<u8> = row.try_get("id")?;
    let length: i64 = row.try_get("length")?;
    let chunk_size: i32 = row.try_get("chunk_size")?;
    Ok(FileRecord {
        id: ObjectId::from_slice(&id)?,
        filename: row.try_get("filename")?,
        length: length as u64,
        chunk_size: chunk_size as u32,
        upload_date: row.try_get("upload_date")?,
        sha256: row.try_get("sha256")?,
    })
}

pub struct PgSession {
    conn: PgConnection,
}

#[async_trait::async_trait]
impl Connector for PostgresStore {
    type Session = PgSession;

    fn operation_timeout(&self) -> Duration {
        self.settings.operation_timeout
    }

    async fn open_session(&self) -> AppResult<PgSession> {
        let timeout = self.settings.connect_timeout;
        let conn = tokio::time::timeout(timeout, PgConnection::connect_with(&self.options))
            .await
            .map_err(|_| AppError::ConnectionFailed(format!("no connection within {:?}", timeout)))?
            .map_err(|e| AppError::ConnectionFailed(e.to_string()))?;
        log::debug!("opened document session");
        Ok(PgSession { conn })
    }
}

#[async_trait::async_trait]
impl DocumentSession for PgSession {
    async fn find(&mut self, collection: &str, sort: Option<&str>) -> AppResult<Vec<Document>> {
        let rows = match sort {
            Some(field) => {
                sqlx::query(
                    "SELECT id, body FROM documents WHERE collection = $1 \
                     ORDER BY body -> $2 ASC NULLS FIRST, seq ASC",
                )
                .bind(collection)
                .bind(field)
                .fetch_all(&mut self.conn)
                .await?
            }
            None => {
                sqlx::query("SELECT id, body FROM documents WHERE collection = $1 ORDER BY seq")
                    .bind(collection)
                    .fetch_all(&mut self.conn)
                    .await?
            }
        };
        rows.iter().map(row_to_document).collect()
    }

    async fn find_one(&mut self, collection: &str, id: &ObjectId) -> AppResult<Option<Document>> {
        let row = sqlx::query("SELECT id, body FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id.bytes().as_slice())
            .fetch_optional(&mut self.conn)
            .await?;
        row.as_ref().map(row_to_document).transpose()
    }

    async fn insert_one(&mut self, collection: &str, id: &ObjectId, body: Document) -> AppResult<()> {
        sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(id.bytes().as_slice())
            .bind(serde_json::Value::Object(body.into_body()))
            .execute(&mut self.conn)
            .await?;
        Ok(())
    }

    async fn find_one_and_update(
        &mut self,
        collection: &str,
        id: &ObjectId,
        set: &SetInstruction,
    ) -> AppResult<Option<Document>> {
        // jsonb `||` replaces top-level keys, which is exactly a field-wise set.
        let row = sqlx::query(
            r#"
            UPDATE documents AS d
            SET body = d.body || $3
            FROM (
                SELECT id, body FROM documents
                WHERE collection = $1 AND id = $2
                FOR UPDATE
            ) AS prior
            WHERE d.collection = $1 AND d.id = prior.id
            RETURNING prior.id AS id, prior.body AS body
            "#,
        )
        .bind(collection)
        .bind(id.bytes().as_slice())
        .bind(serde_json::Value::Object(set.to_json()?))
        .fetch_optional(&mut self.conn)
        .await?;
        row.as_ref().map(row_to_document).transpose()
    }

    async fn find_one_and_delete(&mut self, collection: &str, id: &ObjectId) -> AppResult<Option<Document>> {
        let row = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2 RETURNING id, body")
            .bind(collection)
            .bind(id.bytes().as_slice())
            .fetch_optional(&mut self.conn)
            .await?;
        row.as_ref().map(row_to_document).transpose()
    }

    async fn count(&mut self, collection: &str) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = $1")
            .bind(collection)
            .fetch_one(&mut self.conn)
            .await?;
        Ok(count as u64)
    }

    async fn close(self) -> AppResult<()> {
        self.conn.close().await?;
        log::debug!("closed document session");
        Ok(())
    }
}

pub struct PgUpload {
    tx: Transaction<'static, Postgres>,
    id: ObjectId,
    filename: String,
    buffer: ChunkBuffer,
}

impl PgUpload {
    async fn insert_chunk(&mut self, chunk: Chunk) -> AppResult<()> {
        sqlx::query("INSERT INTO recording_chunks (files_id, n, data) VALUES ($1, $2, $3)")
            .bind(self.id.bytes().as_slice())
            .bind(chunk.n as i32)
            .bind(chunk.data)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl UploadStream for PgUpload {
    async fn write(&mut self, data: &[u8]) -> AppResult<()> {
        for chunk in self.buffer.push(data) {
            self.insert_chunk(chunk).await?;
        }
        Ok(())
    }

    async fn close(mut self) -> AppResult<FileRecord> {
        let chunk_size = self.buffer.chunk_size() as u32;
        let length = self.buffer.total();
        let buffer = std::mem::replace(&mut self.buffer, ChunkBuffer::new(1));
        let (tail, sha256) = buffer.finish();
        if let Some(chunk) = tail {
            self.insert_chunk(chunk).await?;
        }

        let record = FileRecord {
            id: self.id,
            filename: self.filename.clone(),
            length,
            chunk_size,
            upload_date: chrono::Utc::now(),
            sha256,
        };
        sqlx::query(
            "INSERT INTO recording_files (id, filename, length, chunk_size, upload_date, sha256) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(record.id.bytes().as_slice())
        .bind(&record.filename)
        .bind(record.length as i64)
        .bind(record.chunk_size as i32)
        .bind(record.upload_date)
        .bind(&record.sha256)
        .execute(&mut *self.tx)
        .await?;

        self.tx.commit().await?;
        Ok(record)
    }

    async fn abort(self) -> AppResult<()> {
        self.tx.rollback().await?;
        log::debug!("discarded partial upload of {}", self.filename);
        Ok(())
    }
}

#[async_trait::async_trait]
impl BlobStore for PostgresStore {
    type Upload = PgUpload;

    async fn open_upload_stream(&self, filename: &str) -> AppResult<PgUpload> {
        let tx = self.blob_pool.begin().await?;
        Ok(PgUpload {
            tx,
            id: ObjectId::new(),
            filename: filename.to_string(),
            buffer: ChunkBuffer::new(self.settings.chunk_size),
        })
    }

    async fn find_file(&self, filename: &str) -> AppResult<Option<FileRecord>> {
        let row = sqlx::query(
            "SELECT id, filename, length, chunk_size, upload_date, sha256 FROM recording_files \
             WHERE filename = $1 ORDER BY upload_date DESC, seq DESC LIMIT 1",
        )
        .bind(filename)
        .fetch_optional(&self.blob_pool)
        .await?;
        row.as_ref().map(row_to_file).transpose()
    }

    async fn download(&self, filename: &str) -> AppResult<Vec<u8>> {
        let record = self
            .find_file(filename)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no recording named {:?}", filename)))?;

        let rows = sqlx::query("SELECT n, data FROM recording_chunks WHERE files_id = $1 ORDER BY n")
            .bind(record.id.bytes().as_slice())
            .fetch_all(&self.blob_pool)
            .await?;
        let chunks = rows
            .iter()
            .map(|row| {
                let n: i32 = row.try_get("n")?;
                Ok(Chunk {
                    n: n as u32,
                    data: row.try_get("data")?,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        reassemble(chunks, record.expected_chunks(), record.length)
            .map_err(|e| AppError::StoreUnavailable(format!("recording {} is corrupt: {}", record.id, e)))
    }

    async fn delete(&self, id: &ObjectId) -> AppResult<()> {
        let mut tx = self.blob_pool.begin().await?;
        let chunks = sqlx::query("DELETE FROM recording_chunks WHERE files_id = $1")
            .bind(id.bytes().as_slice())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM recording_files WHERE id = $1")
            .bind(id.bytes().as_slice())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        log::debug!("removed {} chunk(s) of {}", chunks.rows_affected(), id);
        Ok(())
    }

    fn transfer_timeout(&self) -> Option<Duration> {
        self.settings.transfer_timeout
    }

    fn delete_timeout(&self) -> Duration {
        self.settings.delete_timeout
    }
}
