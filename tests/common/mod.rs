//! Shared test utilities for the serial terminal tests.
//!
//! This module provides common test infrastructure including:
//! - Render settings builders
//! - Helpers that split a byte stream into chunks at chosen boundaries
//! - Live and repaint rendering onto an in-memory screen
//! - Mock-backed terminals

#![allow(dead_code)]

use serial_terminal::bytes::Timezone;
use serial_terminal::display::{ReceivePipeline, Transcript};
use serial_terminal::{
    Chunk, DisplayMode, MockSerialPort, PortConfiguration, RenderSettings, SerialSession,
    SerialTerminal, TerminalOptions,
};
use std::time::Duration;

/// Fixed epoch (2024-01-02 03:04:05.000 UTC) so timestamp tags are predictable.
pub const T0: i64 = 1_704_164_645_000;

pub fn settings(mode: DisplayMode, timestamps: bool) -> RenderSettings {
    RenderSettings {
        mode,
        timestamps,
        timezone: Timezone::Utc,
    }
}

/// Split `data` at the given cut points, one chunk per piece, timestamps one
/// millisecond apart.
pub fn split_at(data: &[u8], cuts: &[usize]) -> Vec<Chunk> {
    let mut points: Vec<usize> = cuts.iter().map(|&c| c.min(data.len())).collect();
    points.sort_unstable();
    points.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for point in points.into_iter().chain(std::iter::once(data.len())) {
        if point > start {
            chunks.push(Chunk::new(T0 + chunks.len() as i64, data[start..point].to_vec()));
            start = point;
        }
    }
    chunks
}

/// One chunk per byte.
pub fn bytewise(data: &[u8]) -> Vec<Chunk> {
    data.iter()
        .enumerate()
        .map(|(i, b)| Chunk::new(T0 + i as i64, vec![*b]))
        .collect()
}

/// Feed chunks live, ticking after every `per_tick` chunks, and return the
/// pipeline (screen in its sink).
pub fn render_live(
    chunks: &[Chunk],
    settings: RenderSettings,
    per_tick: usize,
) -> ReceivePipeline<Transcript> {
    let mut pipeline = ReceivePipeline::new(Transcript::new(), settings, 2000);
    for group in chunks.chunks(per_tick.max(1)) {
        for chunk in group {
            pipeline.ingest(chunk.clone());
        }
        pipeline.tick();
    }
    pipeline
}

/// Ingest everything, then rebuild the screen with a batched repaint.
pub fn render_repaint(
    chunks: &[Chunk],
    settings: RenderSettings,
    batch: usize,
) -> ReceivePipeline<Transcript> {
    let mut pipeline = ReceivePipeline::new(Transcript::new(), settings, batch);
    for chunk in chunks {
        pipeline.ingest(chunk.clone());
    }
    pipeline.repaint_now();
    pipeline
}

pub fn fast_options() -> TerminalOptions {
    TerminalOptions {
        tick_rate_hz: 200,
        ..TerminalOptions::default()
    }
}

/// A terminal connected to a fresh mock port.
pub fn connected_terminal(
    options: TerminalOptions,
    config: PortConfiguration,
) -> (MockSerialPort, SerialTerminal<Transcript>) {
    let port = MockSerialPort::new("MOCK0");
    let mut terminal = SerialTerminal::new(Transcript::new(), options);
    let session = SerialSession::from_mock(&port, config).expect("mock split");
    terminal.connect(session).expect("connect");
    (port, terminal)
}

/// Current screen text of a terminal.
pub fn screen(terminal: &SerialTerminal<Transcript>) -> String {
    terminal.with_pipeline(|p| p.sink().text().to_string())
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
