//! Hardware serial port backend using tokio-serial.
//!
//! Opens a native async serial stream and splits it into the independent
//! read and write halves the session hands out.

use super::error::PortError;
use super::traits::{PortConfiguration, StreamReader, StreamWriter};
use serde::Serialize;
use tokio::io::{ReadHalf, WriteHalf};
use tokio_serial::SerialStream;

/// Read half of an open hardware port.
pub type SerialReader = StreamReader<ReadHalf<SerialStream>>;

/// Write half of an open hardware port.
pub type SerialWriter = StreamWriter<WriteHalf<SerialStream>>;

/// A serial port discovered on the system.
#[derive(Debug, Clone, Serialize)]
pub struct PortInfo {
    pub name: String,
    pub kind: String,
}

/// Open a serial port with async I/O support and split it into halves.
///
/// # Example
/// ```no_run
/// use serial_terminal::port::{open_serial, PortConfiguration};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PortConfiguration::default();
/// let (reader, writer) = open_serial("/dev/ttyUSB0", &config)?;
/// # Ok(())
/// # }
/// ```
pub fn open_serial(
    port_name: &str,
    config: &PortConfiguration,
) -> Result<(SerialReader, SerialWriter), PortError> {
    let builder = tokio_serial::new(port_name, config.baud_rate)
        .data_bits(config.data_bits.into())
        .flow_control(config.flow_control.into())
        .parity(config.parity.into())
        .stop_bits(config.stop_bits.into());

    let stream = SerialStream::open(&builder).map_err(|e| match e.kind {
        tokio_serial::ErrorKind::NoDevice => PortError::not_found(port_name),
        tokio_serial::ErrorKind::InvalidInput => PortError::config(e.to_string()),
        _ => PortError::Io(std::io::Error::other(e.to_string())),
    })?;

    let (read_half, write_half) = tokio::io::split(stream);
    Ok((StreamReader::new(read_half), StreamWriter::new(write_half)))
}

/// Enumerate serial ports present on the system.
pub fn list_ports() -> Result<Vec<PortInfo>, PortError> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| {
            let kind = match p.port_type {
                serialport::SerialPortType::UsbPort(usb) => match usb.product {
                    Some(product) => format!("usb {:04x}:{:04x} {product}", usb.vid, usb.pid),
                    None => format!("usb {:04x}:{:04x}", usb.vid, usb.pid),
                },
                serialport::SerialPortType::PciPort => "pci".to_string(),
                serialport::SerialPortType::BluetoothPort => "bluetooth".to_string(),
                serialport::SerialPortType::Unknown => "unknown".to_string(),
            };
            PortInfo {
                name: p.port_name,
                kind,
            }
        })
        .collect())
}
