use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::model::FileRecord;
use crate::store::{BlobStore, UploadStream};

/// An incoming byte stream, consumed piece by piece.
#[async_trait::async_trait]
pub trait ChunkSource: Send {
    async fn next_piece(&mut self) -> AppResult<Option<Vec<u8>>>;
}

/// A fully buffered payload, handed out in one piece.
pub struct BufferedSource(Option<Vec<u8>>);

impl BufferedSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Some(bytes))
    }
}

#[async_trait::async_trait]
impl ChunkSource for BufferedSource {
    async fn next_piece(&mut self) -> AppResult<Option<Vec<u8>>> {
        Ok(self.0.take())
    }
}

async fn bounded<T, F>(limit: Option<Duration>, what: &str, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            AppError::StoreUnavailable(format!("{} timed out after {:?}", what, limit))
        })?,
        None => fut.await,
    }
}

/// Stream a recording into the chunked store under `filename`.
///
/// The upload stream is closed on success and aborted on any failure, so a
/// failed upload leaves neither chunks nor a metadata record behind.
pub async fn upload<B, R>(store: &B, filename: &str, mut source: R) -> AppResult<FileRecord>
where
    B: BlobStore + ?Sized,
    R: ChunkSource,
{
    let mut stream = store.open_upload_stream(filename).await?;

    let written = bounded(store.transfer_timeout(), "recording upload", async {
        while let Some(piece) = source.next_piece().await? {
            stream.write(&piece).await?;
        }
        Ok(())
    })
    .await;

    match written {
        Ok(()) => {
            let record = stream.close().await?;
            log::info!(
                "stored recording {} ({} bytes) as {}",
                record.filename,
                record.length,
                record.id
            );
            Ok(record)
        }
        Err(e) => {
            if let Err(abort_err) = stream.abort().await {
                log::warn!("failed to abort upload of {}: {}", filename, abort_err);
            }
            Err(e)
        }
    }
}

pub async fn download<B: BlobStore + ?Sized>(store: &B, filename: &str) -> AppResult<Vec<u8>> {
    bounded(store.transfer_timeout(), "recording download", store.download(filename)).await
}

/// Resolve `filename` to its metadata record, then delete its chunks and the record.
pub async fn delete_by_name<B: BlobStore + ?Sized>(store: &B, filename: &str) -> AppResult<FileRecord> {
    bounded(Some(store.delete_timeout()), "recording delete", async {
        let record = store
            .find_file(filename)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no recording named {:?}", filename)))?;
        store.delete(&record.id).await?;
        log::info!("deleted recording {} ({})", record.filename, record.id);
        Ok(record)
    })
    .await
}
