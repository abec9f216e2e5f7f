//! Port abstraction layer for serial communication.
//!
//! Provides the async read/write halves consumed by the session, a
//! tokio-serial hardware backend, and a scripted mock for tests.

pub mod error;
pub mod mock;
pub mod serial;
pub mod traits;

pub use error::PortError;
pub use mock::{MockReader, MockSerialPort, MockWriter};
pub use serial::{list_ports, open_serial, PortInfo, SerialReader, SerialWriter};
pub use traits::*;
