//! Node/sensor registry.
//!
//! `Network` is the single source of truth for every node and sensor the
//! gateway has seen. The dispatch task mutates it through `handle_message`;
//! status pages, metrics scrapes and snapshot saves read it concurrently.
//! All state lives under one `RwLock`, so readers never observe a
//! half-applied message. Replies produced by a message are transmitted after
//! the write lock is released.

use crate::config::NetworkConfig;
use crate::model::{Node, Sensor};
use crate::protocol::InternalType;
use crate::{
    GatewayError, Message, MessageType, Result, BROADCAST_ID, GATEWAY_NODE_ID, NODE_SENSOR_ID,
};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

type Clock = Box<dyn Fn() -> OffsetDateTime + Send + Sync>;

const FIRST_ASSIGNABLE_ID: u8 = 1;
const LAST_ASSIGNABLE_ID: u8 = 254;

pub struct Network {
    config: NetworkConfig,
    nodes: RwLock<BTreeMap<u8, Node>>,
    clock: Clock,
    pub(crate) save_lock: Mutex<()>,
}

impl Default for Network {
    fn default() -> Self {
        Self::new(NetworkConfig::default())
    }
}

impl Network {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            nodes: RwLock::new(BTreeMap::new()),
            clock: Box::new(OffsetDateTime::now_utc),
            save_lock: Mutex::new(()),
        }
    }

    /// Replace the wall clock used for timestamps.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> OffsetDateTime + Send + Sync + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    /// Apply one inbound message and transmit any protocol replies.
    ///
    /// Replies are sent after the state change is committed. A failed
    /// transmit does not undo the change; the first failure is returned as
    /// `TransmitFailed` once every reply has been attempted.
    pub fn handle_message<F>(&self, msg: &Message, mut transmit: F) -> Result<()>
    where
        F: FnMut(&Message) -> Result<()>,
    {
        let replies = {
            let mut nodes = self.write();
            self.apply(&mut nodes, msg)?
        };

        let mut first_err = None;
        for reply in &replies {
            debug!(%reply, "sending reply");
            if let Err(e) = transmit(reply) {
                warn!(%reply, error = %e, "reply transmit failed");
                if first_err.is_none() {
                    first_err = Some(match e {
                        GatewayError::TransmitFailed(_) => e,
                        other => GatewayError::TransmitFailed(other.to_string()),
                    });
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn apply(&self, nodes: &mut BTreeMap<u8, Node>, msg: &Message) -> Result<Vec<Message>> {
        // A node without an id may only ask for one.
        if msg.node_id == BROADCAST_ID && msg.internal_type() != Some(InternalType::IdRequest) {
            return Err(unsupported(msg, "node 255 has no id yet"));
        }
        let now = (self.clock)();
        match msg.kind {
            MessageType::Presentation => self.apply_presentation(nodes, msg, now),
            MessageType::Set => self.apply_set(nodes, msg, now),
            MessageType::Request => self.apply_request(nodes, msg, now),
            MessageType::Internal => self.apply_internal(nodes, msg, now),
            MessageType::Stream => Err(unsupported(msg, "firmware streaming is not supported")),
        }
    }

    fn apply_presentation(
        &self,
        nodes: &mut BTreeMap<u8, Node>,
        msg: &Message,
        now: OffsetDateTime,
    ) -> Result<Vec<Message>> {
        let sensor_type = msg
            .sensor_type()
            .ok_or_else(|| unsupported(msg, "unknown sensor type"))?;

        if msg.sensor_id == NODE_SENSOR_ID {
            if !sensor_type.is_node() {
                return Err(unsupported(msg, "child 255 must present a node type"));
            }
            let node = node_entry(nodes, msg.node_id);
            node.protocol_version = msg.payload.clone();
            node.last_seen = Some(now);
            return Ok(Vec::new());
        }

        let node = node_entry(nodes, msg.node_id);
        node.last_seen = Some(now);
        match node.sensors.entry(msg.sensor_id) {
            Entry::Vacant(slot) => {
                info!(
                    node = msg.node_id,
                    sensor = msg.sensor_id,
                    kind = %sensor_type,
                    "registered sensor"
                );
                let mut sensor = Sensor::new(msg.sensor_id, sensor_type);
                sensor.description = msg.payload.clone();
                slot.insert(sensor);
            }
            Entry::Occupied(slot) => {
                let sensor = slot.into_mut();
                sensor.sensor_type = sensor_type;
                sensor.description = msg.payload.clone();
            }
        }
        Ok(Vec::new())
    }

    fn apply_set(
        &self,
        nodes: &mut BTreeMap<u8, Node>,
        msg: &Message,
        now: OffsetDateTime,
    ) -> Result<Vec<Message>> {
        let value_type = msg
            .value_type()
            .ok_or_else(|| unsupported(msg, "unknown value type"))?;
        let node = nodes.get_mut(&msg.node_id).ok_or(unknown_sensor(msg))?;
        let sensor = node
            .sensors
            .get_mut(&msg.sensor_id)
            .ok_or(unknown_sensor(msg))?;
        sensor.record(value_type, &msg.payload, now);
        node.last_seen = Some(now);

        if msg.ack && self.config.ack == crate::AckPolicy::Echo {
            return Ok(vec![msg.clone().with_ack(true)]);
        }
        Ok(Vec::new())
    }

    fn apply_request(
        &self,
        nodes: &mut BTreeMap<u8, Node>,
        msg: &Message,
        now: OffsetDateTime,
    ) -> Result<Vec<Message>> {
        let value_type = msg
            .value_type()
            .ok_or_else(|| unsupported(msg, "unknown value type"))?;
        let node = nodes.get_mut(&msg.node_id).ok_or(unknown_sensor(msg))?;
        let sensor = node
            .sensors
            .get(&msg.sensor_id)
            .ok_or(unknown_sensor(msg))?;
        let reply = sensor
            .reading(value_type)
            .map(|r| Message::set(msg.node_id, msg.sensor_id, value_type, r.value.clone()));
        node.last_seen = Some(now);
        if reply.is_none() {
            debug!(node = msg.node_id, sensor = msg.sensor_id, kind = %value_type, "no stored value to answer request");
        }
        Ok(reply.into_iter().collect())
    }

    fn apply_internal(
        &self,
        nodes: &mut BTreeMap<u8, Node>,
        msg: &Message,
        now: OffsetDateTime,
    ) -> Result<Vec<Message>> {
        let kind = msg
            .internal_type()
            .ok_or_else(|| unsupported(msg, "unknown internal type"))?;
        match kind {
            InternalType::IdRequest => {
                let id = (FIRST_ASSIGNABLE_ID..=LAST_ASSIGNABLE_ID)
                    .find(|id| !nodes.contains_key(id))
                    .ok_or(GatewayError::NoFreeNodeId)?;
                let mut node = Node::new(id);
                node.last_seen = Some(now);
                nodes.insert(id, node);
                info!(node = id, "assigned node id");
                Ok(vec![Message::internal(
                    BROADCAST_ID,
                    InternalType::IdResponse,
                    id.to_string(),
                )])
            }
            InternalType::Config => {
                touch(nodes, msg.node_id, now);
                Ok(vec![Message::internal(
                    msg.node_id,
                    InternalType::Config,
                    self.config.unit_system.code(),
                )])
            }
            InternalType::Time => {
                touch(nodes, msg.node_id, now);
                Ok(vec![Message::internal(
                    msg.node_id,
                    InternalType::Time,
                    now.unix_timestamp().to_string(),
                )])
            }
            InternalType::RegistrationRequest => {
                touch(nodes, msg.node_id, now);
                Ok(vec![Message::internal(
                    msg.node_id,
                    InternalType::RegistrationResponse,
                    "1",
                )])
            }
            InternalType::BatteryLevel => {
                let level = parse_u8_payload(msg)?;
                let node = node_entry(nodes, msg.node_id);
                node.battery_level = Some(level.min(100));
                node.last_seen = Some(now);
                Ok(Vec::new())
            }
            InternalType::SketchName => {
                let node = node_entry(nodes, msg.node_id);
                node.sketch_name = msg.payload.clone();
                node.last_seen = Some(now);
                Ok(Vec::new())
            }
            InternalType::SketchVersion => {
                let node = node_entry(nodes, msg.node_id);
                node.sketch_version = msg.payload.clone();
                node.last_seen = Some(now);
                Ok(Vec::new())
            }
            InternalType::DiscoverResponse => {
                let parent = parse_u8_payload(msg)?;
                let node = node_entry(nodes, msg.node_id);
                node.parent_id = Some(parent);
                node.last_seen = Some(now);
                Ok(Vec::new())
            }
            InternalType::HeartbeatResponse
            | InternalType::PreSleepNotification
            | InternalType::PostSleepNotification
            | InternalType::Presentation
            | InternalType::Pong
            | InternalType::SignalReportResponse
            | InternalType::FindParentResponse => {
                if !touch(nodes, msg.node_id, now) {
                    debug!(node = msg.node_id, kind = %kind, "traffic from unregistered node");
                }
                Ok(Vec::new())
            }
            InternalType::GatewayReady | InternalType::Version => {
                info!(node = msg.node_id, kind = %kind, payload = %msg.payload, "gateway");
                Ok(Vec::new())
            }
            InternalType::LogMessage | InternalType::Debug => {
                debug!(node = msg.node_id, payload = %msg.payload, "node log");
                Ok(Vec::new())
            }
            _ => Err(unsupported(msg, "internal command not handled by the controller")),
        }
    }

    /// Human-readable dump of every node and sensor, ordered by node id then
    /// sensor id.
    pub fn status_string(&self) -> String {
        let nodes = self.read();
        let mut out = String::new();
        if nodes.is_empty() {
            out.push_str("No nodes registered.\n");
            return out;
        }
        for node in nodes.values() {
            let _ = write!(out, "Node {}", node.id);
            if node.id == GATEWAY_NODE_ID {
                out.push_str(" (gateway)");
            }
            let name = node.display_name();
            if !name.is_empty() {
                let _ = write!(out, " \"{name}\"");
            }
            if !node.sketch_version.is_empty() {
                let _ = write!(out, " sketch={}", node.sketch_version);
            }
            if !node.protocol_version.is_empty() {
                let _ = write!(out, " protocol={}", node.protocol_version);
            }
            if let Some(level) = node.battery_level {
                let _ = write!(out, " battery={level}%");
            }
            if let Some(parent) = node.parent_id {
                let _ = write!(out, " parent={parent}");
            }
            let _ = writeln!(out, " last_seen={}", format_ts(node.last_seen));
            for sensor in node.sensors.values() {
                let _ = write!(out, "  Sensor {} {}", sensor.id, sensor.sensor_type);
                if !sensor.description.is_empty() {
                    let _ = write!(out, " \"{}\"", sensor.description);
                }
                out.push(':');
                if sensor.readings.is_empty() {
                    out.push_str(" no data");
                }
                for r in &sensor.readings {
                    let _ = write!(
                        out,
                        " {}={} ({})",
                        r.value_type,
                        r.value,
                        format_ts(Some(r.updated))
                    );
                }
                out.push('\n');
            }
        }
        out
    }

    /// Point-in-time copy of all nodes, ordered by id.
    pub fn nodes(&self) -> Vec<Node> {
        self.read().values().cloned().collect()
    }

    pub fn node(&self, id: u8) -> Option<Node> {
        self.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Set or clear the operator-assigned name. Returns false for unknown nodes.
    pub fn set_node_name(&self, id: u8, name: Option<String>) -> bool {
        match self.write().get_mut(&id) {
            Some(node) => {
                node.name = name;
                true
            }
            None => false,
        }
    }

    /// Forget a node and its sensors.
    pub fn remove_node(&self, id: u8) -> Option<Node> {
        let removed = self.write().remove(&id);
        if removed.is_some() {
            info!(node = id, "removed node");
        }
        removed
    }

    pub(crate) fn replace_all(&self, table: BTreeMap<u8, Node>) {
        *self.write() = table;
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, BTreeMap<u8, Node>> {
        self.nodes.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<u8, Node>> {
        self.nodes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn node_entry(nodes: &mut BTreeMap<u8, Node>, id: u8) -> &mut Node {
    nodes.entry(id).or_insert_with(|| {
        info!(node = id, "registered node");
        Node::new(id)
    })
}

/// Update last-seen for a known node; false if the node is not registered.
fn touch(nodes: &mut BTreeMap<u8, Node>, id: u8, now: OffsetDateTime) -> bool {
    match nodes.get_mut(&id) {
        Some(node) => {
            node.last_seen = Some(now);
            true
        }
        None => false,
    }
}

fn parse_u8_payload(msg: &Message) -> Result<u8> {
    msg.payload
        .trim()
        .parse::<u8>()
        .map_err(|_| unsupported(msg, "payload is not a number in 0-255"))
}

fn unsupported(msg: &Message, reason: &str) -> GatewayError {
    GatewayError::UnsupportedMessage(format!(
        "{reason} ({} {} from node {} sensor {})",
        msg.kind.as_str(),
        msg.sub_type_name(),
        msg.node_id,
        msg.sensor_id
    ))
}

fn unknown_sensor(msg: &Message) -> GatewayError {
    GatewayError::UnknownSensor {
        node: msg.node_id,
        sensor: msg.sensor_id,
    }
}

fn format_ts(ts: Option<OffsetDateTime>) -> String {
    match ts {
        Some(t) => t.format(&Rfc3339).unwrap_or_else(|_| t.to_string()),
        None => "never".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{SensorType, ValueType};
    use crate::{codec, AckPolicy, UnitSystem};
    use std::sync::Arc;
    use time::macros::datetime;

    fn fixed_network(config: NetworkConfig) -> Network {
        Network::new(config).with_clock(|| datetime!(2026-10-15 12:00 UTC))
    }

    fn no_transmit(m: &Message) -> Result<()> {
        panic!("unexpected transmit: {m}")
    }

    fn apply_all(net: &Network, lines: &[&str]) {
        for line in lines {
            let m = codec::decode(line).unwrap();
            net.handle_message(&m, no_transmit).unwrap();
        }
    }

    fn collect(net: &Network, line: &str) -> (Result<()>, Vec<Message>) {
        let m = codec::decode(line).unwrap();
        let mut sent = Vec::new();
        let res = net.handle_message(&m, |out| {
            sent.push(out.clone());
            Ok(())
        });
        (res, sent)
    }

    #[test]
    fn test_presentation_creates_node_and_sensor() {
        let net = fixed_network(NetworkConfig::default());
        apply_all(&net, &["5;255;0;0;17;2.3.2", "5;2;0;0;6;Outdoor"]);
        let node = net.node(5).unwrap();
        assert_eq!(node.protocol_version, "2.3.2");
        let sensor = &node.sensors[&2];
        assert_eq!(sensor.sensor_type, SensorType::Temp);
        assert_eq!(sensor.description, "Outdoor");
    }

    #[test]
    fn test_sensor_presentation_for_unknown_node_registers_both() {
        let net = fixed_network(NetworkConfig::default());
        apply_all(&net, &["9;1;0;0;7;"]);
        assert_eq!(net.len(), 1);
        assert!(net.node(9).unwrap().sensors.contains_key(&1));
    }

    #[test]
    fn test_presentation_is_idempotent() {
        let net = fixed_network(NetworkConfig::default());
        apply_all(&net, &["5;2;0;0;6;Outdoor"]);
        let once = net.nodes();
        apply_all(&net, &["5;2;0;0;6;Outdoor"]);
        assert_eq!(net.nodes(), once);
    }

    #[test]
    fn test_represent_updates_type() {
        let net = fixed_network(NetworkConfig::default());
        apply_all(&net, &["5;2;0;0;6;", "5;2;1;0;0;21.0", "5;2;0;0;7;Humidity"]);
        let sensor = net.node(5).unwrap().sensors[&2].clone();
        assert_eq!(sensor.sensor_type, SensorType::Hum);
        // Readings survive re-presentation
        assert_eq!(sensor.reading(ValueType::Temp).unwrap().value, "21.0");
    }

    #[test]
    fn test_set_updates_presented_sensor() {
        let net = fixed_network(NetworkConfig::default());
        apply_all(&net, &["5;2;0;0;6;", "5;2;1;0;0;23.5"]);
        let node = net.node(5).unwrap();
        let reading = node.sensors[&2].last_value().unwrap();
        assert_eq!(reading.value, "23.5");
        assert_eq!(reading.value_type, ValueType::Temp);
        assert_eq!(reading.updated, datetime!(2026-10-15 12:00 UTC));
        assert_eq!(node.last_seen, Some(datetime!(2026-10-15 12:00 UTC)));
    }

    #[test]
    fn test_set_for_unpresented_sensor_is_rejected() {
        let net = fixed_network(NetworkConfig::default());
        apply_all(&net, &["5;1;0;0;6;"]);
        let before = net.nodes();

        let (res, sent) = collect(&net, "5;2;1;0;0;23.5");
        assert!(matches!(
            res,
            Err(GatewayError::UnknownSensor { node: 5, sensor: 2 })
        ));
        assert!(sent.is_empty());
        assert_eq!(net.nodes(), before);

        let (res, _) = collect(&net, "6;2;1;0;0;23.5");
        assert!(matches!(res, Err(GatewayError::UnknownSensor { .. })));
        assert_eq!(net.nodes(), before);
    }

    #[test]
    fn test_unsupported_messages() {
        let net = fixed_network(NetworkConfig::default());
        apply_all(&net, &["5;2;0;0;6;"]);
        for line in [
            "5;2;0;0;99;",       // unknown sensor type
            "5;255;0;0;6;",      // node presentation with a sensor type
            "5;2;1;0;200;1",     // unknown value type
            "5;255;3;0;99;",     // unknown internal
            "5;255;3;0;13;",     // reboot is outbound only
            "5;2;4;0;0;0A0B",    // stream
        ] {
            let (res, sent) = collect(&net, line);
            assert!(
                matches!(res, Err(GatewayError::UnsupportedMessage(_))),
                "{line}: {res:?}"
            );
            assert!(sent.is_empty());
        }
    }

    #[test]
    fn test_ack_policy_echo() {
        let net = fixed_network(NetworkConfig {
            ack: AckPolicy::Echo,
            ..Default::default()
        });
        apply_all(&net, &["5;3;0;0;3;"]);
        let (res, sent) = collect(&net, "5;3;1;1;2;1");
        res.unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(codec::encode(&sent[0]).unwrap(), "5;3;1;1;2;1\n");

        let (_, sent) = collect(&net, "5;3;1;0;2;0");
        assert!(sent.is_empty());
    }

    #[test]
    fn test_ack_policy_disabled_by_default() {
        let net = fixed_network(NetworkConfig::default());
        apply_all(&net, &["5;3;0;0;3;"]);
        let (res, sent) = collect(&net, "5;3;1;1;2;1");
        res.unwrap();
        assert!(sent.is_empty());
    }

    #[test]
    fn test_request_replies_with_stored_value() {
        let net = fixed_network(NetworkConfig::default());
        apply_all(&net, &["7;1;0;0;3;", "7;1;1;0;2;1"]);
        let (res, sent) = collect(&net, "7;1;2;0;2;");
        res.unwrap();
        assert_eq!(sent, vec![Message::set(7, 1, ValueType::Status, "1")]);

        // Nothing stored for V_PERCENTAGE yet
        let (res, sent) = collect(&net, "7;1;2;0;3;");
        res.unwrap();
        assert!(sent.is_empty());

        let (res, _) = collect(&net, "7;9;2;0;2;");
        assert!(matches!(res, Err(GatewayError::UnknownSensor { .. })));
    }

    #[test]
    fn test_id_request_assigns_lowest_free_id() {
        let net = fixed_network(NetworkConfig::default());
        apply_all(&net, &["1;255;0;0;17;2.3.2", "3;255;0;0;17;2.3.2"]);
        let (res, sent) = collect(&net, "255;255;3;0;3;");
        res.unwrap();
        assert_eq!(codec::encode(&sent[0]).unwrap(), "255;255;3;0;4;2\n");
        let (_, sent) = collect(&net, "255;255;3;0;3;");
        assert_eq!(sent[0].payload, "4");
        assert!(net.node(2).is_some());
        assert!(net.node(4).is_some());
    }

    #[test]
    fn test_unassigned_node_only_requests_an_id() {
        let net = fixed_network(NetworkConfig::default());
        for line in [
            "255;255;0;0;17;2.3.2",
            "255;1;0;0;6;",
            "255;255;3;0;0;50",
            "255;255;3;0;11;Sketch",
            "255;1;1;0;0;21.0",
        ] {
            let (res, sent) = collect(&net, line);
            assert!(matches!(res, Err(GatewayError::UnsupportedMessage(_))), "{line}");
            assert!(sent.is_empty());
        }
        assert!(net.is_empty());
        assert_eq!(net.status_string(), "No nodes registered.\n");

        let (res, sent) = collect(&net, "255;255;3;0;3;");
        res.unwrap();
        assert_eq!(sent[0].payload, "1");
        assert_eq!(net.nodes().iter().map(|n| n.id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_id_request_when_full() {
        let net = fixed_network(NetworkConfig::default());
        for id in FIRST_ASSIGNABLE_ID..=LAST_ASSIGNABLE_ID {
            let m = Message::new(id, 255, MessageType::Presentation, 17, "2.3.2");
            net.handle_message(&m, no_transmit).unwrap();
        }
        let (res, sent) = collect(&net, "255;255;3;0;3;");
        assert!(matches!(res, Err(GatewayError::NoFreeNodeId)));
        assert!(sent.is_empty());
    }

    #[test]
    fn test_config_and_time_replies() {
        let net = fixed_network(NetworkConfig {
            unit_system: UnitSystem::Imperial,
            ..Default::default()
        });
        let (res, sent) = collect(&net, "4;255;3;0;6;0");
        res.unwrap();
        assert_eq!(codec::encode(&sent[0]).unwrap(), "4;255;3;0;6;I\n");

        let (res, sent) = collect(&net, "4;255;3;0;1;");
        res.unwrap();
        let expected = datetime!(2026-10-15 12:00 UTC).unix_timestamp().to_string();
        assert_eq!(sent[0].payload, expected);
        assert_eq!(sent[0].internal_type(), Some(InternalType::Time));
    }

    #[test]
    fn test_node_metadata_from_internal_messages() {
        let net = fixed_network(NetworkConfig::default());
        apply_all(
            &net,
            &[
                "8;255;3;0;11;Weather Station",
                "8;255;3;0;12;1.4",
                "8;255;3;0;0;87",
                "8;255;3;0;21;0",
            ],
        );
        let node = net.node(8).unwrap();
        assert_eq!(node.sketch_name, "Weather Station");
        assert_eq!(node.sketch_version, "1.4");
        assert_eq!(node.battery_level, Some(87));
        assert_eq!(node.parent_id, Some(0));
        assert!(node.sensors.is_empty());

        let (res, _) = collect(&net, "8;255;3;0;0;lots");
        assert!(matches!(res, Err(GatewayError::UnsupportedMessage(_))));
    }

    #[test]
    fn test_gateway_housekeeping_does_not_register_nodes() {
        let net = fixed_network(NetworkConfig::default());
        apply_all(
            &net,
            &[
                "0;255;3;0;14;Gateway startup complete.",
                "0;255;3;0;9;TSF:MSG:READ",
                "12;255;3;0;22;1234",
            ],
        );
        assert!(net.is_empty());
    }

    #[test]
    fn test_transmit_failure_keeps_state() {
        let net = fixed_network(NetworkConfig::default());
        let m = codec::decode("255;255;3;0;3;").unwrap();
        let res = net.handle_message(&m, |_| Err(GatewayError::TransmitFailed("link down".into())));
        assert!(matches!(res, Err(GatewayError::TransmitFailed(_))));
        assert!(net.node(1).is_some());

        let m = codec::decode("1;255;3;0;6;0").unwrap();
        let res = net.handle_message(&m, |_| Err(GatewayError::InvalidPayload));
        assert!(matches!(res, Err(GatewayError::TransmitFailed(_))));
    }

    #[test]
    fn test_status_string_is_sorted() {
        let net = fixed_network(NetworkConfig::default());
        apply_all(
            &net,
            &[
                "9;3;0;0;6;",
                "2;5;0;0;7;",
                "9;1;0;0;16;",
                "2;5;1;0;1;48",
                "2;255;3;0;11;Attic",
            ],
        );
        let status = net.status_string();
        let lines: Vec<&str> = status.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("Node 2 \"Attic\""));
        assert_eq!(lines[1], "  Sensor 5 S_HUM: V_HUM=48 (2026-10-15T12:00:00Z)");
        assert!(lines[2].starts_with("Node 9"));
        assert!(lines[3].starts_with("  Sensor 1 S_LIGHT_LEVEL"));
        assert!(lines[4].starts_with("  Sensor 3 S_TEMP"));
    }

    #[test]
    fn test_status_string_empty() {
        assert_eq!(Network::default().status_string(), "No nodes registered.\n");
    }

    #[test]
    fn test_rename_and_remove() {
        let net = fixed_network(NetworkConfig::default());
        apply_all(&net, &["3;255;0;0;17;2.3.2"]);
        assert!(net.set_node_name(3, Some("Kitchen".into())));
        assert!(!net.set_node_name(4, Some("Nowhere".into())));
        assert_eq!(net.node(3).unwrap().display_name(), "Kitchen");
        assert!(net.remove_node(3).is_some());
        assert!(net.remove_node(3).is_none());
        assert!(net.is_empty());
    }

    #[test]
    fn test_status_reads_during_updates_are_consistent() {
        use std::sync::atomic::{AtomicI64, Ordering};

        // Every message gets a distinct timestamp, and a Set stamps both the
        // reading and the node's last_seen with it. A reader that sees a
        // reading newer than last_seen has observed half an update.
        let tick = Arc::new(AtomicI64::new(0));
        let net = {
            let tick = Arc::clone(&tick);
            Arc::new(Network::new(NetworkConfig::default()).with_clock(move || {
                datetime!(2026-10-15 12:00 UTC)
                    + time::Duration::seconds(tick.fetch_add(1, Ordering::SeqCst))
            }))
        };
        apply_all(
            &net,
            &["1;1;0;0;6;", "1;2;0;0;7;", "1;1;1;0;0;0", "1;2;1;0;1;0"],
        );

        let writer = {
            let net = Arc::clone(&net);
            std::thread::spawn(move || {
                for i in 1..=500u32 {
                    let v = i.to_string();
                    net.handle_message(&Message::set(1, 1, ValueType::Temp, v.clone()), no_transmit)
                        .unwrap();
                    net.handle_message(&Message::set(1, 2, ValueType::Hum, v), no_transmit)
                        .unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let net = Arc::clone(&net);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let node = net.node(1).unwrap();
                        let newest = node
                            .sensors
                            .values()
                            .filter_map(|s| s.last_value())
                            .map(|r| r.updated)
                            .max();
                        assert_eq!(newest, node.last_seen);

                        let status = net.status_string();
                        let last_seen = status
                            .lines()
                            .next()
                            .and_then(|l| l.split("last_seen=").nth(1))
                            .unwrap()
                            .to_string();
                        let newest_line = status
                            .lines()
                            .filter(|l| l.starts_with("  Sensor"))
                            .filter_map(|l| l.rsplit('(').next())
                            .map(|ts| ts.trim_end_matches(')').to_string())
                            .max()
                            .unwrap();
                        assert_eq!(newest_line, last_seen, "{status}");
                    }
                })
            })
            .collect();
        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        let node = net.node(1).unwrap();
        assert_eq!(node.sensors[&1].last_value().unwrap().value, "500");
        assert_eq!(node.sensors[&2].last_value().unwrap().value, "500");
    }
}
