use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::logic::chunker::{reassemble, ChunkBuffer};
use crate::logic::merge::SetInstruction;
use crate::model::{compare_field, Chunk, Document, FileRecord, ObjectId, DEFAULT_CHUNK_SIZE};
use crate::store::traits::{BlobStore, Connector, DocumentSession, UploadStream};

type Collection = Vec<(ObjectId, Map<String, Value>)>;

#[derive(Debug, Default)]
struct Inner {
    collections: RwLock<HashMap<String, Collection>>,
    files: RwLock<Vec<FileRecord>>,
    chunks: RwLock<HashMap<ObjectId, Vec<Chunk>>>,
    unreachable: AtomicBool,
    failing: AtomicBool,
    delay_ms: AtomicU64,
    open_sessions: AtomicUsize,
    sessions_opened: AtomicUsize,
    update_calls: AtomicUsize,
    chunk_deletions: AtomicUsize,
}

/// In-process store holding documents and recordings in memory.
///
/// Keeps insertion order as its natural order and counts sessions and
/// destructive calls so tests can assert on them.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
    chunk_size: usize,
    operation_timeout: Duration,
    transfer_timeout: Option<Duration>,
    delete_timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            inner: Arc::new(Inner::default()),
            chunk_size,
            operation_timeout: Duration::from_secs(2),
            transfer_timeout: None,
            delete_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_operation_timeout(mut self, limit: Duration) -> Self {
        self.operation_timeout = limit;
        self
    }

    pub fn with_transfer_timeout(mut self, limit: Duration) -> Self {
        self.transfer_timeout = Some(limit);
        self
    }

    pub fn with_delete_timeout(mut self, limit: Duration) -> Self {
        self.delete_timeout = limit;
        self
    }

    /// Make every session operation and recording lookup wait `delay` first.
    pub fn set_delay(&self, delay: Duration) {
        self.inner
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Make every subsequent `open_session` fail as if the store were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Make every session operation fail after the connection is established.
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    pub fn open_sessions(&self) -> usize {
        self.inner.open_sessions.load(Ordering::SeqCst)
    }

    pub fn sessions_opened(&self) -> usize {
        self.inner.sessions_opened.load(Ordering::SeqCst)
    }

    /// Number of update instructions that reached the store.
    pub fn update_calls(&self) -> usize {
        self.inner.update_calls.load(Ordering::SeqCst)
    }

    pub fn chunk_count(&self) -> usize {
        self.inner.chunks.read().values().map(Vec::len).sum()
    }

    pub fn chunk_deletions(&self) -> usize {
        self.inner.chunk_deletions.load(Ordering::SeqCst)
    }
}

pub struct MemorySession {
    inner: Arc<Inner>,
}

impl Inner {
    async fn pause(&self) {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

impl MemorySession {
    async fn check(&self) -> AppResult<()> {
        self.inner.pause().await;
        if self.inner.failing.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable("memory store is failing".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Connector for MemoryStore {
    type Session = MemorySession;

    fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    async fn open_session(&self) -> AppResult<MemorySession> {
        if self.inner.unreachable.load(Ordering::SeqCst) {
            return Err(AppError::ConnectionFailed("memory store is unreachable".to_string()));
        }
        self.inner.open_sessions.fetch_add(1, Ordering::SeqCst);
        self.inner.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession {
            inner: self.inner.clone(),
        })
    }
}

#[async_trait::async_trait]
impl DocumentSession for MemorySession {
    async fn find(&mut self, collection: &str, sort: Option<&str>) -> AppResult<Vec<Document>> {
        self.check().await?;
        let collections = self.inner.collections.read();
        let mut docs: Vec<Document> = collections
            .get(collection)
            .map(|c| {
                c.iter()
                    .map(|(id, body)| Document::from_map(body.clone()).with_id(id))
                    .collect()
            })
            .unwrap_or_default();
        if let Some(field) = sort {
            docs.sort_by(|a, b| compare_field(a.get(field), b.get(field)));
        }
        Ok(docs)
    }

    async fn find_one(&mut self, collection: &str, id: &ObjectId) -> AppResult<Option<Document>> {
        self.check().await?;
        let collections = self.inner.collections.read();
        Ok(collections.get(collection).and_then(|c| {
            c.iter()
                .find(|(doc_id, _)| doc_id == id)
                .map(|(doc_id, body)| Document::from_map(body.clone()).with_id(doc_id))
        }))
    }

    async fn insert_one(&mut self, collection: &str, id: &ObjectId, body: Document) -> AppResult<()> {
        self.check().await?;
        let mut collections = self.inner.collections.write();
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.iter().any(|(doc_id, _)| doc_id == id) {
            return Err(AppError::StoreUnavailable(format!("duplicate key {}", id)));
        }
        docs.push((*id, body.into_body()));
        Ok(())
    }

    async fn find_one_and_update(
        &mut self,
        collection: &str,
        id: &ObjectId,
        set: &SetInstruction,
    ) -> AppResult<Option<Document>> {
        self.check().await?;
        self.inner.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut collections = self.inner.collections.write();
        let Some(body) = collections
            .get_mut(collection)
            .and_then(|c| c.iter_mut().find(|(doc_id, _)| doc_id == id))
            .map(|(_, body)| body)
        else {
            return Ok(None);
        };

        let prior = Document::from_map(body.clone()).with_id(id);
        for (key, value) in set.to_json()? {
            body.insert(key, value);
        }
        Ok(Some(prior))
    }

    async fn find_one_and_delete(&mut self, collection: &str, id: &ObjectId) -> AppResult<Option<Document>> {
        self.check().await?;
        let mut collections = self.inner.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(None);
        };
        Ok(docs
            .iter()
            .position(|(doc_id, _)| doc_id == id)
            .map(|pos| {
                let (doc_id, body) = docs.remove(pos);
                Document::from_map(body).with_id(&doc_id)
            }))
    }

    async fn count(&mut self, collection: &str) -> AppResult<u64> {
        self.check().await?;
        let collections = self.inner.collections.read();
        Ok(collections.get(collection).map(|c| c.len() as u64).unwrap_or(0))
    }

    async fn close(self) -> AppResult<()> {
        self.inner.open_sessions.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MemoryUpload {
    inner: Arc<Inner>,
    id: ObjectId,
    filename: String,
    buffer: ChunkBuffer,
    chunks: Vec<Chunk>,
}

#[async_trait::async_trait]
impl UploadStream for MemoryUpload {
    async fn write(&mut self, data: &[u8]) -> AppResult<()> {
        let full = self.buffer.push(data);
        self.chunks.extend(full);
        Ok(())
    }

    async fn close(mut self) -> AppResult<FileRecord> {
        let chunk_size = self.buffer.chunk_size() as u32;
        let length = self.buffer.total();
        let (tail, sha256) = self.buffer.finish();
        self.chunks.extend(tail);

        let record = FileRecord {
            id: self.id,
            filename: self.filename,
            length,
            chunk_size,
            upload_date: chrono::Utc::now(),
            sha256,
        };
        self.inner.chunks.write().insert(self.id, self.chunks);
        self.inner.files.write().push(record.clone());
        Ok(record)
    }

    async fn abort(self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryStore {
    type Upload = MemoryUpload;

    async fn open_upload_stream(&self, filename: &str) -> AppResult<MemoryUpload> {
        Ok(MemoryUpload {
            inner: self.inner.clone(),
            id: ObjectId::new(),
            filename: filename.to_string(),
            buffer: ChunkBuffer::new(self.chunk_size),
            chunks: Vec::new(),
        })
    }

    async fn find_file(&self, filename: &str) -> AppResult<Option<FileRecord>> {
        self.inner.pause().await;
        let files = self.inner.files.read();
        Ok(files.iter().rev().find(|f| f.filename == filename).cloned())
    }

    async fn download(&self, filename: &str) -> AppResult<Vec<u8>> {
        let record = self
            .find_file(filename)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no recording named {:?}", filename)))?;
        let chunks = self
            .inner
            .chunks
            .read()
            .get(&record.id)
            .cloned()
            .unwrap_or_default();
        reassemble(chunks, record.expected_chunks(), record.length)
            .map_err(|e| AppError::StoreUnavailable(format!("recording {} is corrupt: {}", record.id, e)))
    }

    async fn delete(&self, id: &ObjectId) -> AppResult<()> {
        if let Some(removed) = self.inner.chunks.write().remove(id) {
            self.inner
                .chunk_deletions
                .fetch_add(removed.len(), Ordering::SeqCst);
        }
        self.inner.files.write().retain(|f| &f.id != id);
        Ok(())
    }

    fn transfer_timeout(&self) -> Option<Duration> {
        self.transfer_timeout
    }

    fn delete_timeout(&self) -> Duration {
        self.delete_timeout
    }
}
