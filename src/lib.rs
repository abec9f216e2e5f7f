//! Serial Terminal Library
//!
//! A serial terminal core: received bytes flow through a replayable rendering
//! pipeline (raw text, timestamped text or hex dump) into a display sink, and
//! outbound data is sent either directly or through a paced bulk transmitter.
//!
//! # Modules
//!
//! - `bytes`: hex encode/decode, timestamp and hex dump row formatting
//! - `history`: received chunks and the append-only history store
//! - `render`: the render formatter and its cross-call state
//! - `display`: display sinks, the frame-paced scheduler and repaint
//! - `transmit`: paced bulk transmit with progress and cancellation
//! - `send`: manual text/hex send parsing
//! - `export`: history export
//! - `port`: async port halves, tokio-serial backend and mock
//! - `session`: connection session with exclusive reader/writer access
//! - `terminal`: runtime orchestrator tying the above together
//! - `config`: configuration management with TOML support
//! - `logging`: tracing subscriber setup
//! - `error`: unified error handling

pub mod bytes;
pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod history;
pub mod logging;
pub mod port;
pub mod render;
pub mod send;
pub mod session;
pub mod terminal;
pub mod transmit;

// Re-export commonly used types for convenience
pub use error::{AppError, AppResult};
pub use history::{Chunk, HistoryStore};
pub use port::{
    DataBits, FlowControl, MockSerialPort, Parity, PortConfiguration, PortError, StopBits,
};
pub use render::{DisplayMode, FormatterState, RenderFormatter, RenderSettings};
pub use send::{ManualSend, SendError};
pub use session::SerialSession;
pub use terminal::{SerialTerminal, TerminalOptions};
pub use transmit::{
    CancelToken, TransmitError, TransmitEvent, TransmitHandle, TransmitReport, TransmitScheduler,
};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
