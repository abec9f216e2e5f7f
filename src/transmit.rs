//! Paced bulk transmit.
//!
//! A payload is written in fixed-size chunks with a minimum delay per chunk
//! derived from the line rate, so a slow receiver is not overrun. Only one
//! bulk send may run per scheduler; a second one is rejected.

use crate::port::{PortConfiguration, PortError, PortWriter};
use crate::session::SerialSession;
use futures::Stream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_CHUNK_SIZE: usize = 2048;
pub const DEFAULT_SAFETY_FACTOR: f64 = 1.2;

#[derive(Debug, Error)]
pub enum TransmitError {
    #[error("A transmit is already in progress")]
    Busy,

    #[error("Write failed after {sent} of {total} bytes: {source}")]
    Write {
        sent: usize,
        total: usize,
        #[source]
        source: PortError,
    },

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("Transmit task aborted: {0}")]
    Aborted(String),
}

/// Minimum time one chunk occupies the line.
///
/// `ceil(chunk_size * bits_per_byte / baud_rate * 1000 * safety_factor)` ms.
/// A zero baud rate disables pacing.
pub fn pacing_delay(
    chunk_size: usize,
    bits_per_byte: u32,
    baud_rate: u32,
    safety_factor: f64,
) -> Duration {
    if baud_rate == 0 {
        return Duration::ZERO;
    }
    let ms = (chunk_size as f64 * f64::from(bits_per_byte) / f64::from(baud_rate)
        * 1000.0
        * safety_factor)
        .ceil();
    Duration::from_millis(ms.max(0.0) as u64)
}

/// Cooperative cancellation shared between a transmit and its owner.
///
/// Checked only between chunks; a write in flight always completes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Progress and terminal outcome of one bulk send.
#[derive(Debug, Clone, PartialEq)]
pub enum TransmitEvent {
    /// Emitted after every chunk.
    Progress { sent: usize, total: usize },
    Completed { total: usize, elapsed: Duration },
    Cancelled { sent: usize, total: usize },
    Failed { sent: usize, total: usize, error: String },
}

impl TransmitEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransmitEvent::Progress { .. })
    }

    /// Human-readable one-liner for the display.
    pub fn summary(&self) -> String {
        match self {
            TransmitEvent::Progress { sent, total } => {
                format!("Sending {}/{} bytes ({:.0}%)", sent, total, percent(*sent, *total))
            }
            TransmitEvent::Completed { total, elapsed } => {
                format!("Sent {} bytes in {:.2}s", total, elapsed.as_secs_f64())
            }
            TransmitEvent::Cancelled { sent, total } => {
                format!("Transmit cancelled after {}/{} bytes", sent, total)
            }
            TransmitEvent::Failed { sent, total, error } => {
                format!("Transmit failed after {}/{} bytes: {}", sent, total, error)
            }
        }
    }
}

fn percent(sent: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        sent as f64 * 100.0 / total as f64
    }
}

/// Result of a send that was not aborted by an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitReport {
    pub sent: usize,
    pub total: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// Releases the scheduler's busy flag when the send ends.
struct ActivePermit(Arc<AtomicBool>);

impl Drop for ActivePermit {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone)]
pub struct TransmitScheduler {
    chunk_size: usize,
    delay: Duration,
    active: Arc<AtomicBool>,
}

impl TransmitScheduler {
    pub fn new(chunk_size: usize, delay: Duration) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            delay,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Pace for a port's line rate and frame format.
    pub fn for_port(config: &PortConfiguration, chunk_size: usize, safety_factor: f64) -> Self {
        let delay = pacing_delay(
            chunk_size,
            config.bits_per_frame(),
            config.baud_rate,
            safety_factor,
        );
        debug!(
            "Transmit pacing: {} byte chunks, {:?} per chunk at {}",
            chunk_size, delay, config
        );
        Self::new(chunk_size, delay)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> Result<ActivePermit, TransmitError> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| TransmitError::Busy)?;
        Ok(ActivePermit(Arc::clone(&self.active)))
    }

    /// Send `payload` through `writer`, reporting on `events`.
    pub async fn send<W>(
        &self,
        writer: &mut W,
        payload: &[u8],
        cancel: &CancelToken,
        events: &mpsc::UnboundedSender<TransmitEvent>,
    ) -> Result<TransmitReport, TransmitError>
    where
        W: PortWriter + ?Sized,
    {
        let _permit = self.try_begin()?;
        self.pump(writer, payload, cancel, events).await
    }

    /// Start a bulk send over `session` in its own task.
    ///
    /// The busy check and writer acquisition happen before returning, so a
    /// rejected request never spawns anything.
    pub fn spawn(
        &self,
        session: &SerialSession,
        payload: Vec<u8>,
    ) -> Result<TransmitHandle, TransmitError> {
        let permit = self.try_begin()?;
        let mut writer = session.acquire_writer()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelToken::new();

        let scheduler = self.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let _permit = permit;
            scheduler
                .pump(&mut *writer, &payload, &task_cancel, &tx)
                .await
        });

        Ok(TransmitHandle {
            events: rx,
            cancel,
            task,
        })
    }

    async fn pump<W>(
        &self,
        writer: &mut W,
        payload: &[u8],
        cancel: &CancelToken,
        events: &mpsc::UnboundedSender<TransmitEvent>,
    ) -> Result<TransmitReport, TransmitError>
    where
        W: PortWriter + ?Sized,
    {
        let total = payload.len();
        let started = Instant::now();
        let mut sent = 0usize;
        let mut cancelled = false;
        info!("Transmitting {} bytes", total);

        let mut chunks = payload.chunks(self.chunk_size).peekable();
        while let Some(chunk) = chunks.next() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let write_started = Instant::now();
            let written = match writer.write_all(chunk).await {
                Ok(()) => writer.flush().await,
                Err(e) => Err(e),
            };
            if let Err(source) = written {
                warn!("Transmit failed after {}/{} bytes: {}", sent, total, source);
                let _ = events.send(TransmitEvent::Failed {
                    sent,
                    total,
                    error: source.to_string(),
                });
                return Err(TransmitError::Write {
                    sent,
                    total,
                    source,
                });
            }

            sent += chunk.len();
            let _ = events.send(TransmitEvent::Progress { sent, total });

            if chunks.peek().is_none() {
                break;
            }
            let spent = write_started.elapsed();
            if spent < self.delay {
                tokio::select! {
                    _ = tokio::time::sleep(self.delay - spent) => {}
                    _ = cancel.cancelled() => {}
                }
            } else {
                tokio::task::yield_now().await;
            }
        }

        let elapsed = started.elapsed();
        if cancelled {
            info!("Transmit cancelled after {}/{} bytes", sent, total);
            let _ = events.send(TransmitEvent::Cancelled { sent, total });
        } else {
            info!("Transmitted {} bytes in {:?}", total, elapsed);
            let _ = events.send(TransmitEvent::Completed { total, elapsed });
        }

        Ok(TransmitReport {
            sent,
            total,
            cancelled,
            elapsed,
        })
    }
}

/// A bulk send running in the background.
#[derive(Debug)]
pub struct TransmitHandle {
    events: mpsc::UnboundedReceiver<TransmitEvent>,
    cancel: CancelToken,
    task: JoinHandle<Result<TransmitReport, TransmitError>>,
}

impl TransmitHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub async fn next_event(&mut self) -> Option<TransmitEvent> {
        self.events.recv().await
    }

    /// Progress events as a stream, ending after the terminal event.
    pub fn events(&mut self) -> impl Stream<Item = TransmitEvent> + '_ {
        futures::stream::poll_fn(move |cx| self.events.poll_recv(cx))
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the send to end.
    pub async fn join(self) -> Result<TransmitReport, TransmitError> {
        self.task
            .await
            .map_err(|e| TransmitError::Aborted(e.to_string()))?
    }
}
