use crate::config::ConfigError;
use crate::port::PortError;
use crate::send::SendError;
use crate::transmit::TransmitError;
use thiserror::Error;

/// Unified application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not connected to a serial port")]
    NotConnected,

    #[error("Already connected to {0}; disconnect first")]
    AlreadyConnected(String),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transmit(#[from] TransmitError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error("An I/O error occurred: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
