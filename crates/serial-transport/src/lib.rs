//! serial-transport: duplex line transport for MySensors serial gateways
//!
//! The gateway radio speaks a newline-terminated ASCII protocol over a serial
//! link. This crate opens that link, splits it into independent read and write
//! halves, and frames the read half into lines. The default build enables a
//! `mock` backend so binaries and tests work without hardware; the real
//! `serialport` backend sits behind the `serial` feature.

mod types;
pub use types::{LinkHalves, PortInfo};

mod error;
pub use error::{Result, TransportError};

mod framing;
pub use framing::{LineReader, FRAME_TERMINATOR, MAX_FRAME_LEN};

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockLink, MockWriter};

#[cfg(feature = "serial")]
mod serial;

#[cfg(feature = "serial")]
pub use serial::SerialLink;
