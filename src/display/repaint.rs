//! Repaint progress tracking.
//!
//! A repaint replays the whole history through a fresh formatter state in
//! fixed-size batches. The controller only tracks the replay cursor; the
//! pipeline owns the history, state and sink and performs each step.

use std::ops::Range;

/// Chunks replayed per repaint step.
pub const DEFAULT_REPAINT_BATCH: usize = 2000;

#[derive(Debug, Clone)]
pub struct RepaintController {
    batch_size: usize,
    cursor: Option<usize>,
}

impl Default for RepaintController {
    fn default() -> Self {
        Self::new(DEFAULT_REPAINT_BATCH)
    }
}

impl RepaintController {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            cursor: None,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Start (or restart) a replay from the first chunk.
    pub fn begin(&mut self) {
        self.cursor = Some(0);
    }

    pub fn cancel(&mut self) {
        self.cursor = None;
    }

    pub fn in_progress(&self) -> bool {
        self.cursor.is_some()
    }

    /// Chunks replayed so far in the current repaint.
    pub fn position(&self) -> Option<usize> {
        self.cursor
    }

    /// The next history range to replay.
    ///
    /// `history_len` is read on every step so chunks appended mid-repaint are
    /// replayed too. Returns `None`, and ends the repaint, once the cursor has
    /// caught up.
    pub fn next_batch(&mut self, history_len: usize) -> Option<Range<usize>> {
        let start = self.cursor?;
        if start >= history_len {
            self.cursor = None;
            return None;
        }
        let end = (start + self.batch_size).min(history_len);
        self.cursor = Some(end);
        Some(start..end)
    }
}
