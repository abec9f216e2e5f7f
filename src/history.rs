//! Received chunks and the append-only history they are kept in.

use std::ops::Range;
use std::sync::Arc;

/// One timestamped unit of received bytes, as delivered by a single read.
///
/// The payload is shared, so cloning a chunk into the pending queue does not
/// copy the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Arrival time, milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    data: Arc<[u8]>,
}

impl Chunk {
    pub fn new(timestamp_ms: i64, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            timestamp_ms,
            data: data.into(),
        }
    }

    /// Stamp a chunk with the current wall-clock time.
    pub fn now(data: impl Into<Arc<[u8]>>) -> Self {
        Self::new(chrono::Utc::now().timestamp_millis(), data)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Ordered log of every received chunk for the current session.
///
/// Single source of truth for repaint and export.
#[derive(Debug, Default)]
pub struct HistoryStore {
    chunks: Vec<Chunk>,
    total_bytes: usize,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, chunk: Chunk) {
        self.total_bytes += chunk.len();
        self.chunks.push(chunk);
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.total_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Chunks in `range`, clamped to the stored length.
    pub fn slice(&self, range: Range<usize>) -> &[Chunk] {
        let end = range.end.min(self.chunks.len());
        let start = range.start.min(end);
        &self.chunks[start..end]
    }

    /// Fixed-size batches in insertion order.
    pub fn batches(&self, batch_size: usize) -> std::slice::Chunks<'_, Chunk> {
        self.chunks.chunks(batch_size.max(1))
    }

    /// Every received byte concatenated in order.
    pub fn concat_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_bytes);
        for chunk in &self.chunks {
            out.extend_from_slice(chunk.data());
        }
        out
    }
}
