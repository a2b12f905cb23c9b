//! mysensors-core: protocol and state for a MySensors serial gateway
//!
//! - `codec`: `node;sensor;command;ack;type;payload` frames to and from [`Message`]
//! - [`Network`]: registry of nodes and sensors with their last values,
//!   persisted as a JSON snapshot
//! - [`Handler`]: serial read loop and serialised transmit path
//! - [`Fanout`]/[`EventSink`]: delivery of decoded messages to consumers
//! - [`MetricsHub`]: Prometheus view of the network

mod error;
pub use error::{GatewayError, Result};

mod types;
pub use types::{
    Message, MessageType, BROADCAST_ID, GATEWAY_NODE_ID, MAX_PAYLOAD_LEN, NODE_SENSOR_ID,
};

pub mod protocol;
pub use protocol::{InternalType, SensorType, ValueType};

pub mod codec;

mod model;
pub use model::{Node, Reading, Sensor};

mod config;
pub use config::{AckPolicy, NetworkConfig, UnitSystem};

mod network;
pub use network::Network;

mod snapshot;
pub use snapshot::SNAPSHOT_VERSION;

mod handler;
pub use handler::{Handler, HandlerStats};

mod sink;
pub use sink::{EventSink, Fanout};

mod metrics;
pub use metrics::{MetricsHub, SensorMetrics};
