//! Connection session: owns an open port's read and write halves.
//!
//! Each half sits behind its own async mutex. Acquisition never waits: a
//! second reader or writer is rejected with `ReaderBusy` / `WriterBusy`.

use crate::port::{open_serial, MockSerialPort, PortConfiguration, PortError, PortReader, PortWriter};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tracing::{debug, info};

type BoxedReader = Box<dyn PortReader>;
type BoxedWriter = Box<dyn PortWriter>;

/// An open serial connection.
#[derive(Debug)]
pub struct SerialSession {
    name: String,
    config: PortConfiguration,
    reader: Arc<Mutex<Option<BoxedReader>>>,
    writer: Arc<Mutex<Option<BoxedWriter>>>,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl SerialSession {
    /// Open a hardware serial port.
    pub fn open(port_name: &str, config: &PortConfiguration) -> Result<Self, PortError> {
        let (reader, writer) = open_serial(port_name, config)?;
        info!("Opened {} at {}", port_name, config);
        Ok(Self::from_parts(
            port_name,
            *config,
            Box::new(reader),
            Box::new(writer),
        ))
    }

    /// Build a session from any reader/writer pair.
    pub fn from_parts(
        name: impl Into<String>,
        config: PortConfiguration,
        reader: BoxedReader,
        writer: BoxedWriter,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            name: name.into(),
            config,
            reader: Arc::new(Mutex::new(Some(reader))),
            writer: Arc::new(Mutex::new(Some(writer))),
            closed: AtomicBool::new(false),
            shutdown,
        }
    }

    /// Build a session over a [`MockSerialPort`].
    pub fn from_mock(port: &MockSerialPort, config: PortConfiguration) -> Result<Self, PortError> {
        let (reader, writer) = port
            .split()
            .ok_or_else(|| PortError::config("mock port halves already taken"))?;
        Ok(Self::from_parts(
            port.name(),
            config,
            Box::new(reader),
            Box::new(writer),
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &PortConfiguration {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Receiver that flips to `true` when the session is closed.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Take exclusive read access.
    pub fn acquire_reader(&self) -> Result<ReaderGuard, PortError> {
        if self.is_closed() {
            return Err(PortError::Closed);
        }
        let guard = Arc::clone(&self.reader)
            .try_lock_owned()
            .map_err(|_| PortError::ReaderBusy)?;
        if guard.is_none() {
            return Err(PortError::Closed);
        }
        Ok(ReaderGuard { guard })
    }

    /// Take exclusive write access.
    pub fn acquire_writer(&self) -> Result<WriterGuard, PortError> {
        if self.is_closed() {
            return Err(PortError::Closed);
        }
        let guard = Arc::clone(&self.writer)
            .try_lock_owned()
            .map_err(|_| PortError::WriterBusy)?;
        if guard.is_none() {
            return Err(PortError::Closed);
        }
        Ok(WriterGuard { guard })
    }

    /// Write a buffer through a short-lived writer lock.
    pub async fn write(&self, data: &[u8]) -> Result<(), PortError> {
        let mut writer = self.acquire_writer()?;
        writer.write_all(data).await?;
        writer.flush().await
    }

    /// Close the session, releasing both halves.
    ///
    /// Safe to call while a read loop or transmit holds a lock: the shutdown
    /// signal stops them, and each half is dropped once its holder lets go.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.shutdown.send(true);

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.flush().await {
                debug!("Ignoring flush error while closing {}: {}", self.name, e);
            }
        }
        self.reader.lock().await.take();
        info!("Closed {}", self.name);
    }
}

/// Exclusive access to the session's reader.
pub struct ReaderGuard {
    guard: OwnedMutexGuard<Option<BoxedReader>>,
}

impl Deref for ReaderGuard {
    type Target = dyn PortReader;

    fn deref(&self) -> &Self::Target {
        // Guards are only created over a populated slot.
        match self.guard.as_deref() {
            Some(reader) => reader,
            None => unreachable!("reader guard over empty slot"),
        }
    }
}

impl DerefMut for ReaderGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.guard.as_deref_mut() {
            Some(reader) => reader,
            None => unreachable!("reader guard over empty slot"),
        }
    }
}

/// Exclusive access to the session's writer.
pub struct WriterGuard {
    guard: OwnedMutexGuard<Option<BoxedWriter>>,
}

impl Deref for WriterGuard {
    type Target = dyn PortWriter;

    fn deref(&self) -> &Self::Target {
        match self.guard.as_deref() {
            Some(writer) => writer,
            None => unreachable!("writer guard over empty slot"),
        }
    }
}

impl DerefMut for WriterGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self.guard.as_deref_mut() {
            Some(writer) => writer,
            None => unreachable!("writer guard over empty slot"),
        }
    }
}
