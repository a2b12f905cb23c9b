use crate::{LinkHalves, PortInfo, Result, TransportError};
use serialport::{SerialPort, SerialPortType};
use std::time::Duration;
use tracing::debug;

/// Default read timeout; `LineReader` retries on expiry.
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// MySensors serial gateway attached over USB/UART.
pub struct SerialLink {
    path: String,
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(path, baud)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => TransportError::PortNotFound(path.to_string()),
                _ => TransportError::Io(e.to_string()),
            })?;
        debug!(path, baud, "serial port opened");
        Ok(SerialLink {
            path: path.to_string(),
            port,
        })
    }

    pub fn list() -> Result<Vec<PortInfo>> {
        let mut out = Vec::new();
        for p in serialport::available_ports().map_err(|e| TransportError::Io(e.to_string()))? {
            let driver = match p.port_type {
                SerialPortType::UsbPort(_) => "usb-serial",
                SerialPortType::PciPort => "pci-serial",
                SerialPortType::BluetoothPort => "bluetooth-serial",
                SerialPortType::Unknown => "serial",
            };
            out.push(PortInfo {
                name: p.port_name,
                driver: driver.to_string(),
            });
        }
        Ok(out)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Split into a reader and a writer backed by the same device.
    pub fn split(self) -> Result<LinkHalves> {
        let writer = self
            .port
            .try_clone()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(LinkHalves {
            reader: Box::new(self.port),
            writer: Box::new(writer),
        })
    }
}
