use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = GatewayError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("payload too long: {len} bytes (max {max})")]
    PayloadTooLong { len: usize, max: usize },
    #[error("payload contains a line terminator")]
    InvalidPayload,
    #[error("unknown sensor {sensor} on node {node}")]
    UnknownSensor { node: u8, sensor: u8 },
    #[error("unsupported message: {0}")]
    UnsupportedMessage(String),
    #[error("no free node id left to assign")]
    NoFreeNodeId,
    #[error("transmit failed: {0}")]
    TransmitFailed(String),
    #[error("reading snapshot {path}: {reason}")]
    SnapshotRead { path: PathBuf, reason: String },
    #[error("writing snapshot {path}: {reason}")]
    SnapshotWrite { path: PathBuf, reason: String },
    #[error("sink {sink}: {reason}")]
    Sink { sink: String, reason: String },
    #[error(transparent)]
    Transport(#[from] serial_transport::TransportError),
    #[error("metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}
