use std::time::Duration;

use crate::error::AppResult;
use crate::logic::merge::SetInstruction;
use crate::model::{Document, FileRecord, ObjectId};

/// A single request's exclusive handle to the document store.
///
/// Operations mirror the store's per-collection primitives; the generic
/// document operations in `logic::documents` are built on top of them.
#[async_trait::async_trait]
pub trait DocumentSession: Send + Sized {
    /// Every document in the collection, ascending by `sort` if given.
    async fn find(&mut self, collection: &str, sort: Option<&str>) -> AppResult<Vec<Document>>;
    async fn find_one(&mut self, collection: &str, id: &ObjectId) -> AppResult<Option<Document>>;
    async fn insert_one(&mut self, collection: &str, id: &ObjectId, body: Document) -> AppResult<()>;
    /// Apply `set` atomically and return the document as it was before.
    async fn find_one_and_update(
        &mut self,
        collection: &str,
        id: &ObjectId,
        set: &SetInstruction,
    ) -> AppResult<Option<Document>>;
    /// Remove the document atomically and return what was removed.
    async fn find_one_and_delete(&mut self, collection: &str, id: &ObjectId) -> AppResult<Option<Document>>;
    async fn count(&mut self, collection: &str) -> AppResult<u64>;
    /// Release the connection.
    async fn close(self) -> AppResult<()>;
}

/// Opens fresh document sessions, one per request.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    type Session: DocumentSession;

    /// Upper bound for the work done on one session, and for closing it.
    fn operation_timeout(&self) -> Duration;

    /// Connect within the configured metadata connect timeout.
    async fn open_session(&self) -> AppResult<Self::Session>;
}

/// An open write stream for one recording.
#[async_trait::async_trait]
pub trait UploadStream: Send + Sized {
    async fn write(&mut self, data: &[u8]) -> AppResult<()>;
    /// Flush the last chunk and persist the metadata record.
    async fn close(self) -> AppResult<FileRecord>;
    /// Discard everything written so far.
    async fn abort(self) -> AppResult<()>;
}

/// Chunked recording storage.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    type Upload: UploadStream;

    async fn open_upload_stream(&self, filename: &str) -> AppResult<Self::Upload>;
    /// Most recent metadata record with this filename.
    async fn find_file(&self, filename: &str) -> AppResult<Option<FileRecord>>;
    /// Reassembled bytes of the most recent upload under `filename`.
    async fn download(&self, filename: &str) -> AppResult<Vec<u8>>;
    /// Remove every chunk and the metadata record of a file.
    async fn delete(&self, id: &ObjectId) -> AppResult<()>;

    /// Upper bound for a single upload or download; `None` means unbounded.
    fn transfer_timeout(&self) -> Option<Duration>;
    /// Upper bound for the lookup-then-delete sequence.
    fn delete_timeout(&self) -> Duration;
}

pub trait Store: Connector + BlobStore + Send + Sync + 'static {}
impl<T: Connector + BlobStore + Send + Sync + 'static> Store for T {}
