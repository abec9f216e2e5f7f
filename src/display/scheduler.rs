//! Frame-paced display loop and its pending queue.
//!
//! Received chunks are queued as they arrive and rendered together once per
//! tick, so a burst of tiny reads costs one sink write instead of hundreds.

use super::pipeline::SharedPipeline;
use super::sink::DisplaySink;
use crate::history::Chunk;
use crate::render::RenderSettings;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

pub const DEFAULT_TICK_RATE_HZ: u32 = 60;

/// Chunks received since the last tick.
#[derive(Debug, Default)]
pub struct PendingQueue {
    chunks: Vec<Chunk>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: Chunk) {
        self.chunks.push(chunk);
    }

    /// Take the whole queue, leaving it empty.
    pub fn take(&mut self) -> Vec<Chunk> {
        std::mem::take(&mut self.chunks)
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Drives a [`SharedPipeline`] at a fixed frame rate.
#[derive(Debug, Clone, Copy)]
pub struct DisplayScheduler {
    period: Duration,
}

impl Default for DisplayScheduler {
    fn default() -> Self {
        Self::from_rate_hz(DEFAULT_TICK_RATE_HZ)
    }
}

impl DisplayScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
        }
    }

    pub fn from_rate_hz(hz: u32) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / f64::from(hz.max(1))))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// Settings published on `settings` trigger a repaint. Repaint batches are
    /// advanced back to back with a yield between them, releasing the lock so
    /// the read loop can keep appending.
    pub async fn run<S>(
        self,
        pipeline: SharedPipeline<S>,
        mut settings: watch::Receiver<RenderSettings>,
        mut shutdown: watch::Receiver<bool>,
    ) where
        S: DisplaySink + 'static,
    {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!("Display loop started ({:?} per frame)", self.period);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    loop {
                        let outcome = pipeline.lock().tick();
                        if !outcome.is_repainting() {
                            trace!("Display tick: {:?}", outcome);
                            break;
                        }
                        tokio::task::yield_now().await;
                    }
                }
                changed = settings.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let next = *settings.borrow_and_update();
                    pipeline.lock().apply_settings(next);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        pipeline.lock().finish();
        debug!("Display loop stopped");
    }
}
