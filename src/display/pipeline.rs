//! The receive pipeline: history, pending queue, formatter state and sink
//! behind a single owner.
//!
//! Live flushes and repaint steps both go through `&mut self`, so sharing the
//! pipeline behind one mutex ([`SharedPipeline`]) is enough to keep a repaint
//! from interleaving with live formatting.

use super::repaint::RepaintController;
use super::scheduler::PendingQueue;
use super::sink::DisplaySink;
use crate::bytes::hex_dump_row;
use crate::history::{Chunk, HistoryStore};
use crate::render::{DisplayMode, FormatterState, RenderFormatter, RenderSettings, ERASE_LINE};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Pipeline shared between the read loop and the display loop.
pub type SharedPipeline<S> = Arc<Mutex<ReceivePipeline<S>>>;

/// What a display tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing pending.
    Idle,
    /// Rendered this many pending chunks.
    Flushed(usize),
    /// Replayed one repaint batch; more remain.
    Repainting,
    /// Replayed the final repaint batch.
    RepaintComplete,
}

impl TickOutcome {
    pub fn is_repainting(self) -> bool {
        matches!(self, TickOutcome::Repainting)
    }
}

pub struct ReceivePipeline<S: DisplaySink> {
    history: HistoryStore,
    pending: PendingQueue,
    formatter: RenderFormatter,
    state: FormatterState,
    repaint: RepaintController,
    sink: S,
}

impl<S: DisplaySink> ReceivePipeline<S> {
    pub fn new(sink: S, settings: RenderSettings, repaint_batch: usize) -> Self {
        let formatter = RenderFormatter::new(settings, sink.supports_erase());
        Self {
            history: HistoryStore::new(),
            pending: PendingQueue::new(),
            formatter,
            state: FormatterState::default(),
            repaint: RepaintController::new(repaint_batch),
            sink,
        }
    }

    pub fn shared(self) -> SharedPipeline<S> {
        Arc::new(Mutex::new(self))
    }

    pub fn settings(&self) -> RenderSettings {
        self.formatter.settings()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn state(&self) -> &FormatterState {
        &self.state
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_repainting(&self) -> bool {
        self.repaint.in_progress()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Record a received chunk and queue it for the next tick.
    pub fn ingest(&mut self, chunk: Chunk) {
        self.history.append(chunk.clone());
        self.pending.push(chunk);
    }

    /// One display tick: advance a running repaint, else flush pending chunks.
    pub fn tick(&mut self) -> TickOutcome {
        if self.repaint.in_progress() {
            return self.repaint_step();
        }

        let batch = self.pending.take();
        if batch.is_empty() {
            return TickOutcome::Idle;
        }
        let output = self.formatter.format(&mut self.state, &batch);
        self.emit(&output);
        TickOutcome::Flushed(batch.len())
    }

    /// Switch settings. Returns `true` and starts a repaint if they changed.
    pub fn apply_settings(&mut self, settings: RenderSettings) -> bool {
        if settings == self.formatter.settings() {
            return false;
        }
        debug!(
            "Render settings changed to mode={} timestamps={}",
            settings.mode, settings.timestamps
        );
        self.formatter = RenderFormatter::new(settings, self.sink.supports_erase());
        self.begin_repaint();
        true
    }

    /// Clear the sink, reset formatter state and start replaying history.
    ///
    /// Pending chunks are dropped: they are already in history and the replay
    /// covers them.
    pub fn begin_repaint(&mut self) {
        if let Err(e) = self.sink.reset() {
            warn!("Display reset failed: {}", e);
        }
        self.state.reset();
        self.pending.clear();
        self.repaint.begin();
        debug!("Repaint started over {} chunks", self.history.len());
    }

    /// Replay one batch of history.
    pub fn repaint_step(&mut self) -> TickOutcome {
        match self.repaint.next_batch(self.history.len()) {
            Some(range) => {
                let output = self
                    .formatter
                    .format(&mut self.state, self.history.slice(range));
                self.emit(&output);
                if self.repaint.position() == Some(self.history.len()) {
                    self.complete_repaint()
                } else {
                    TickOutcome::Repainting
                }
            }
            None => self.complete_repaint(),
        }
    }

    /// Run a full repaint to completion, one sink write per batch.
    pub fn repaint_now(&mut self) {
        self.begin_repaint();
        while self.repaint_step().is_repainting() {}
    }

    fn complete_repaint(&mut self) -> TickOutcome {
        self.repaint.cancel();
        // Everything appended during the replay has been rendered by it.
        self.pending.clear();
        debug!("Repaint complete");
        TickOutcome::RepaintComplete
    }

    /// Drop all history and start from a blank display.
    pub fn clear(&mut self) {
        self.history.clear();
        self.pending.clear();
        self.state.reset();
        self.repaint.cancel();
        if let Err(e) = self.sink.reset() {
            warn!("Display reset failed: {}", e);
        }
        if let Err(e) = self.sink.fit() {
            debug!("Display fit failed: {}", e);
        }
    }

    /// Flush pending chunks and whatever the formatter still holds.
    pub fn finish(&mut self) {
        while self.repaint.in_progress() {
            self.repaint_step();
        }
        self.tick();
        let tail = self.formatter.finish(&mut self.state);
        self.emit(&tail);
    }

    /// Write a system message to the sink after any pending data.
    ///
    /// A speculative hex row is erased and redrawn below the message so the
    /// next batch still finds it on the last line. In text mode a message
    /// ending in a newline leaves the cursor at a line start, so the next
    /// character gets a fresh timestamp tag.
    pub fn notice(&mut self, text: &str) {
        if !self.repaint.in_progress() {
            self.tick();
        }
        if self.state.partial_row_pending {
            let row = hex_dump_row(self.state.hex_row_offset, &self.state.hex_carry);
            self.emit(&format!("{ERASE_LINE}{text}{row}"));
        } else {
            self.emit(text);
            if self.formatter.settings().mode == DisplayMode::Text && text.ends_with('\n') {
                self.state.last_line_is_start = true;
            }
        }
    }

    fn emit(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Err(e) = self.sink.write(text) {
            warn!("Display write failed: {}", e);
        }
    }
}
