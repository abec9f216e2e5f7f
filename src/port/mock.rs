//! Mock serial port implementation for testing.
//!
//! Provides a `MockSerialPort` that simulates serial port behavior without
//! requiring actual hardware. Every `enqueue_read` call is delivered to the
//! reader as exactly one read event, so tests control chunk boundaries.

use super::error::PortError;
use super::traits::{PortReader, PortWriter};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A scripted read event.
#[derive(Debug)]
enum MockRead {
    Data(Vec<u8>),
    Error(std::io::ErrorKind),
}

/// Inner state of the mock port's write side.
#[derive(Debug, Default)]
struct MockPortState {
    /// Log of all byte buffers written to the port.
    write_log: Vec<Vec<u8>>,
    /// Whether the next write operations should fail.
    fail_writes: bool,
    /// Artificial latency applied to every write.
    write_delay: Option<Duration>,
}

/// Mock serial port implementation for testing.
///
/// This implementation allows you to:
/// - Enqueue data to be returned by read operations, one read per call
/// - Signal end-of-stream or inject read errors
/// - Inspect what data was written
/// - Simulate write failures and slow writes
///
/// # Example
/// ```
/// use serial_terminal::port::{MockSerialPort, PortReader, PortWriter};
///
/// # tokio_test::block_on(async {
/// let port = MockSerialPort::new("MOCK0");
/// let (mut reader, mut writer) = port.split().unwrap();
///
/// port.enqueue_read(b"Hello");
/// let mut buffer = [0u8; 16];
/// let n = reader.read_chunk(&mut buffer).await.unwrap();
/// assert_eq!(&buffer[..n], b"Hello");
///
/// writer.write_all(b"Response").await.unwrap();
/// assert_eq!(port.get_write_log(), vec![b"Response".to_vec()]);
/// # });
/// ```
pub struct MockSerialPort {
    name: String,
    reads: Mutex<Option<mpsc::UnboundedSender<MockRead>>>,
    pending_reader: Mutex<Option<mpsc::UnboundedReceiver<MockRead>>>,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            reads: Mutex::new(Some(tx)),
            pending_reader: Mutex::new(Some(rx)),
            state: Arc::new(Mutex::new(MockPortState::default())),
        }
    }

    /// The port name/identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take the reader and writer halves. Only the first call succeeds.
    pub fn split(&self) -> Option<(MockReader, MockWriter)> {
        let rx = self.pending_reader.lock().take()?;
        Some((
            MockReader {
                rx,
                leftover: Vec::new(),
            },
            MockWriter {
                state: Arc::clone(&self.state),
            },
        ))
    }

    /// Enqueue bytes to be returned by one subsequent read operation.
    pub fn enqueue_read(&self, data: &[u8]) {
        if let Some(tx) = self.reads.lock().as_ref() {
            let _ = tx.send(MockRead::Data(data.to_vec()));
        }
    }

    /// Make a subsequent read fail with the given I/O error kind.
    pub fn enqueue_read_error(&self, kind: std::io::ErrorKind) {
        if let Some(tx) = self.reads.lock().as_ref() {
            let _ = tx.send(MockRead::Error(kind));
        }
    }

    /// Signal end-of-stream once all queued reads have been consumed.
    pub fn close_input(&self) {
        self.reads.lock().take();
    }

    /// Get a copy of all data written to the port.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// All written bytes concatenated in order.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.state.lock().write_log.concat()
    }

    /// Clear the write log.
    pub fn clear_write_log(&self) {
        self.state.lock().write_log.clear();
    }

    /// Set whether write operations should fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Delay every write by the given duration.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        self.state.lock().write_delay = delay;
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("writes", &self.state.lock().write_log.len())
            .finish()
    }
}

/// Read half of a [`MockSerialPort`].
#[derive(Debug)]
pub struct MockReader {
    rx: mpsc::UnboundedReceiver<MockRead>,
    leftover: Vec<u8>,
}

#[async_trait]
impl PortReader for MockReader {
    async fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        if self.leftover.is_empty() {
            match self.rx.recv().await {
                Some(MockRead::Data(data)) => self.leftover = data,
                Some(MockRead::Error(kind)) => {
                    return Err(PortError::Io(std::io::Error::new(kind, "mock read error")))
                }
                None => return Ok(0),
            }
        }

        let n = self.leftover.len().min(buffer.len());
        buffer[..n].copy_from_slice(&self.leftover[..n]);
        self.leftover.drain(..n);
        Ok(n)
    }
}

/// Write half of a [`MockSerialPort`].
#[derive(Debug)]
pub struct MockWriter {
    state: Arc<Mutex<MockPortState>>,
}

#[async_trait]
impl PortWriter for MockWriter {
    async fn write_all(&mut self, data: &[u8]) -> Result<(), PortError> {
        let delay = self.state.lock().write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock write failure",
            )));
        }
        state.write_log.push(data.to_vec());
        Ok(())
    }
}
