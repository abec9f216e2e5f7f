//! Receive-side display: sinks, the frame-paced scheduler and repaint.

pub mod pipeline;
pub mod repaint;
pub mod scheduler;
pub mod sink;

pub use pipeline::{ReceivePipeline, SharedPipeline, TickOutcome};
pub use repaint::{RepaintController, DEFAULT_REPAINT_BATCH};
pub use scheduler::{DisplayScheduler, PendingQueue, DEFAULT_TICK_RATE_HZ};
pub use sink::{error_notice, notice, DisplaySink, LogFileSink, TeeSink, TerminalSink, Transcript};
