//! Runtime orchestrator: one display, at most one connection.
//!
//! `SerialTerminal` owns the receive pipeline and its display loop for its
//! whole lifetime. A connection adds a read loop feeding the pipeline and a
//! transmit scheduler paced for the port's line settings.

use crate::config::Config;
use crate::display::{
    error_notice, notice, DisplayScheduler, DisplaySink, ReceivePipeline, SharedPipeline,
};
use crate::error::{AppError, AppResult};
use crate::export::ExportArtifact;
use crate::history::Chunk;
use crate::port::PortConfiguration;
use crate::render::{DisplayMode, RenderSettings};
use crate::send::ManualSend;
use crate::session::SerialSession;
use crate::transmit::{CancelToken, TransmitHandle, TransmitScheduler};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Runtime knobs, normally taken from [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalOptions {
    pub render: RenderSettings,
    pub tick_rate_hz: u32,
    pub repaint_batch_size: usize,
    pub read_buffer_size: usize,
    pub chunk_size: usize,
    pub safety_factor: f64,
    pub export_dir: PathBuf,
}

impl Default for TerminalOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for TerminalOptions {
    fn from(config: &Config) -> Self {
        Self {
            render: config.display.render_settings(),
            tick_rate_hz: config.display.tick_rate_hz,
            repaint_batch_size: config.display.repaint_batch_size,
            read_buffer_size: config.serial.read_buffer_size,
            chunk_size: config.transmit.chunk_size,
            safety_factor: config.transmit.safety_factor,
            export_dir: config.export.directory.clone(),
        }
    }
}

struct Connection {
    session: Arc<SerialSession>,
    transmit: TransmitScheduler,
    read_task: JoinHandle<()>,
}

pub struct SerialTerminal<S: DisplaySink + 'static> {
    pipeline: SharedPipeline<S>,
    settings: watch::Sender<RenderSettings>,
    display_stop: watch::Sender<bool>,
    display_task: JoinHandle<()>,
    options: TerminalOptions,
    connection: Option<Connection>,
    transmit_cancel: Option<CancelToken>,
}

impl<S: DisplaySink + 'static> SerialTerminal<S> {
    /// Create the terminal and start its display loop. Must be called from
    /// within a tokio runtime.
    pub fn new(sink: S, options: TerminalOptions) -> Self {
        let pipeline =
            ReceivePipeline::new(sink, options.render, options.repaint_batch_size).shared();
        let (settings, settings_rx) = watch::channel(options.render);
        let (display_stop, stop_rx) = watch::channel(false);
        let display_task = tokio::spawn(
            DisplayScheduler::from_rate_hz(options.tick_rate_hz).run(
                Arc::clone(&pipeline),
                settings_rx,
                stop_rx,
            ),
        );

        Self {
            pipeline,
            settings,
            display_stop,
            display_task,
            options,
            connection: None,
            transmit_cancel: None,
        }
    }

    pub fn options(&self) -> &TerminalOptions {
        &self.options
    }

    pub fn settings(&self) -> RenderSettings {
        *self.settings.borrow()
    }

    /// Subscribe to settings changes.
    pub fn settings_events(&self) -> watch::Receiver<RenderSettings> {
        self.settings.subscribe()
    }

    pub fn pipeline(&self) -> SharedPipeline<S> {
        Arc::clone(&self.pipeline)
    }

    /// Run `f` with the pipeline locked.
    pub fn with_pipeline<R>(&self, f: impl FnOnce(&mut ReceivePipeline<S>) -> R) -> R {
        f(&mut self.pipeline.lock())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn session(&self) -> Option<&Arc<SerialSession>> {
        self.connection.as_ref().map(|c| &c.session)
    }

    /// Open a hardware port and connect to it. Failures are shown on the
    /// display and leave the terminal disconnected.
    pub fn open(&mut self, port_name: &str, config: &PortConfiguration) -> AppResult<()> {
        match SerialSession::open(port_name, config) {
            Ok(session) => self.connect(session),
            Err(e) => {
                error!("Failed to open {}: {}", port_name, e);
                self.pipeline
                    .lock()
                    .notice(&error_notice(&format!("Failed to open {port_name}: {e}")));
                Err(e.into())
            }
        }
    }

    /// Attach an open session: clear history, start the read loop.
    pub fn connect(&mut self, session: SerialSession) -> AppResult<()> {
        if let Some(conn) = &self.connection {
            return Err(AppError::AlreadyConnected(conn.session.name().to_string()));
        }

        let session = Arc::new(session);
        let transmit = TransmitScheduler::for_port(
            session.config(),
            self.options.chunk_size,
            self.options.safety_factor,
        );

        {
            let mut pipeline = self.pipeline.lock();
            pipeline.clear();
            pipeline.notice(&notice(&format!(
                "Connected to {} at {}",
                session.name(),
                session.config()
            )));
        }

        // Subscribed before the task exists so a close racing its startup is seen.
        let shutdown = session.shutdown_signal();
        let read_task = tokio::spawn(read_loop(
            Arc::clone(&session),
            Arc::clone(&self.pipeline),
            shutdown,
            self.options.read_buffer_size,
        ));
        info!("Connected to {}", session.name());

        self.connection = Some(Connection {
            session,
            transmit,
            read_task,
        });
        Ok(())
    }

    /// Cancel any transmit, stop the read loop and close the session.
    /// Secondary errors are logged and swallowed.
    pub async fn disconnect(&mut self) {
        let Some(conn) = self.connection.take() else {
            return;
        };

        if let Some(cancel) = self.transmit_cancel.take() {
            cancel.cancel();
        }
        conn.session.close().await;
        if let Err(e) = conn.read_task.await {
            debug!("Read loop ended abnormally: {}", e);
        }

        self.pipeline
            .lock()
            .notice(&notice(&format!("Disconnected from {}", conn.session.name())));
        info!("Disconnected from {}", conn.session.name());
    }

    fn connection(&self) -> AppResult<&Connection> {
        self.connection.as_ref().ok_or(AppError::NotConnected)
    }

    /// Send typed text or hex. Invalid hex is rejected before touching the
    /// port. Returns the number of bytes written.
    pub async fn send(&self, request: &ManualSend) -> AppResult<usize> {
        let conn = self.connection()?;
        let bytes = request.to_bytes()?;
        if let Err(e) = conn.session.write(&bytes).await {
            warn!("Write to {} failed: {}", conn.session.name(), e);
            return Err(e.into());
        }
        debug!("Sent {} bytes", bytes.len());
        Ok(bytes.len())
    }

    /// Start a paced bulk send. A second bulk send, or any write while one is
    /// running, is rejected.
    pub fn send_bulk(&mut self, payload: Vec<u8>) -> AppResult<TransmitHandle> {
        let conn = self.connection()?;
        let handle = conn.transmit.spawn(&conn.session, payload)?;
        self.transmit_cancel = Some(handle.cancel_token());
        Ok(handle)
    }

    pub async fn send_file(&mut self, path: impl AsRef<Path>) -> AppResult<TransmitHandle> {
        let path = path.as_ref();
        self.connection()?;
        let payload = tokio::fs::read(path).await?;
        info!("Sending file {} ({} bytes)", path.display(), payload.len());
        self.send_bulk(payload)
    }

    /// Cancel the running bulk send, if any.
    pub fn cancel_transmit(&self) -> bool {
        match &self.transmit_cancel {
            Some(cancel) if !cancel.is_cancelled() => {
                cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Publish new settings; the display loop repaints if they differ.
    pub fn set_settings(&self, settings: RenderSettings) {
        self.settings.send_if_modified(|current| {
            if *current == settings {
                return false;
            }
            *current = settings;
            true
        });
    }

    pub fn set_mode(&self, mode: DisplayMode) {
        self.set_settings(RenderSettings {
            mode,
            ..self.settings()
        });
    }

    pub fn set_timestamps(&self, timestamps: bool) {
        self.set_settings(RenderSettings {
            timestamps,
            ..self.settings()
        });
    }

    /// Drop history and clear the display.
    pub fn clear(&self) {
        self.pipeline.lock().clear();
    }

    /// Export artifact for the current history and settings.
    pub fn export(&self) -> ExportArtifact {
        let settings = self.settings();
        let pipeline = self.pipeline.lock();
        ExportArtifact::build(pipeline.history(), settings, chrono::Local::now())
    }

    /// Export into the configured directory.
    pub fn export_to_dir(&self) -> AppResult<PathBuf> {
        Ok(self.export().save(&self.options.export_dir)?)
    }

    /// Post a system message to the display.
    pub fn notice(&self, message: &str) {
        self.pipeline.lock().notice(&notice(message));
    }

    pub fn error_notice(&self, message: &str) {
        self.pipeline.lock().notice(&error_notice(message));
    }

    /// Disconnect, flush the display and stop its loop.
    pub async fn shutdown(mut self) {
        self.disconnect().await;
        let _ = self.display_stop.send(true);
        if let Err(e) = self.display_task.await {
            debug!("Display loop ended abnormally: {}", e);
        }
    }
}

/// Read until end-of-stream, a fatal error or session shutdown. Each read
/// becomes one chunk, appended and queued in arrival order.
async fn read_loop<S: DisplaySink>(
    session: Arc<SerialSession>,
    pipeline: SharedPipeline<S>,
    mut shutdown: watch::Receiver<bool>,
    buffer_size: usize,
) {
    let mut reader = match session.acquire_reader() {
        Ok(reader) => reader,
        Err(e) => {
            warn!("Read loop could not start on {}: {}", session.name(), e);
            return;
        }
    };
    let mut buffer = vec![0u8; buffer_size.max(1)];
    debug!("Read loop started on {}", session.name());

    loop {
        let result = tokio::select! {
            result = reader.read_chunk(&mut buffer) => result,
            _ = shutdown.changed() => break,
        };

        match result {
            Ok(0) => {
                info!("End of stream on {}", session.name());
                pipeline.lock().notice(&notice("Connection closed by device"));
                break;
            }
            Ok(n) => pipeline.lock().ingest(Chunk::now(buffer[..n].to_vec())),
            Err(e) if e.is_timeout() => continue,
            Err(e) => {
                error!("Read failed on {}: {}", session.name(), e);
                pipeline
                    .lock()
                    .notice(&error_notice(&format!("Read failed: {e}")));
                break;
            }
        }
    }
    debug!("Read loop stopped on {}", session.name());
}
