use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ObjectId;

/// Default chunk size for stored recordings (255 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;

/// Metadata record of a stored recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub filename: String,
    /// Total bytes written.
    pub length: u64,
    #[serde(rename = "chunkSize")]
    pub chunk_size: u32,
    #[serde(rename = "uploadDate")]
    pub upload_date: DateTime<Utc>,
    /// Hex SHA-256 of the full payload.
    pub sha256: String,
}

impl FileRecord {
    /// Number of chunks a payload of this length is split into.
    pub fn expected_chunks(&self) -> u64 {
        if self.chunk_size == 0 {
            return 0;
        }
        self.length.div_ceil(self.chunk_size as u64)
    }
}

/// One stored piece of a recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub n: u32,
    pub data: Vec<u8>,
}
