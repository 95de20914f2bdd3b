use sha2::{Digest, Sha256};

use crate::model::Chunk;

/// Splits an incoming byte stream into fixed-size, sequentially numbered chunks.
///
/// Only the last chunk may be shorter than the chunk size. A stream of zero
/// bytes produces no chunks.
pub struct ChunkBuffer {
    chunk_size: usize,
    pending: Vec<u8>,
    next_n: u32,
    total: u64,
    hasher: Sha256,
}

impl ChunkBuffer {
    pub fn new(chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            pending: Vec::with_capacity(chunk_size),
            next_n: 0,
            total: 0,
            hasher: Sha256::new(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Accept more bytes and return every chunk that is now full.
    pub fn push(&mut self, mut data: &[u8]) -> Vec<Chunk> {
        self.total += data.len() as u64;
        self.hasher.update(data);

        let mut full = Vec::new();
        while !data.is_empty() {
            let room = self.chunk_size - self.pending.len();
            let take = room.min(data.len());
            self.pending.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.pending.len() == self.chunk_size {
                full.push(self.take_pending());
            }
        }
        full
    }

    /// Flush the trailing partial chunk and return it with the payload digest.
    pub fn finish(mut self) -> (Option<Chunk>, String) {
        let tail = if self.pending.is_empty() {
            None
        } else {
            Some(self.take_pending())
        };
        (tail, hex::encode(self.hasher.finalize()))
    }

    fn take_pending(&mut self) -> Chunk {
        let data = std::mem::replace(&mut self.pending, Vec::with_capacity(self.chunk_size));
        let chunk = Chunk {
            n: self.next_n,
            data,
        };
        self.next_n += 1;
        chunk
    }
}

/// Reassemble chunks read back in sequence order, checking that none is missing.
pub fn reassemble(chunks: Vec<Chunk>, expected: u64, length: u64) -> Result<Vec<u8>, String> {
    if chunks.len() as u64 != expected {
        return Err(format!(
            "expected {} chunks, found {}",
            expected,
            chunks.len()
        ));
    }
    let mut out = Vec::with_capacity(length as usize);
    for (i, chunk) in chunks.into_iter().enumerate() {
        if chunk.n as usize != i {
            return Err(format!("chunk {} missing", i));
        }
        out.extend_from_slice(&chunk.data);
    }
    if out.len() as u64 != length {
        return Err(format!(
            "reassembled {} bytes, metadata says {}",
            out.len(),
            length
        ));
    }
    Ok(out)
}
