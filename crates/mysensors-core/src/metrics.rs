use crate::{EventSink, HandlerStats, Message, Network, Result};
use prometheus::{
    Encoder, GaugeVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct SensorMetrics {
    pub messages: IntCounterVec,
    pub sensor_value: GaugeVec,
    pub nodes: IntGauge,
    pub sensors: IntGauge,
    pub battery_level: IntGaugeVec,
    pub frames_rx: IntGauge,
    pub frames_tx: IntGauge,
    pub decode_errors: IntGauge,
}

/// Prometheus registry for the gateway.
///
/// The `EventSink` impl only counts traffic. Node and sensor gauges are
/// rebuilt from the `Network` at scrape time by `observe_network`, so they
/// never disagree with the registry.
#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub sensor: SensorMetrics,
}

impl MetricsHub {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let messages = IntCounterVec::new(
            Opts::new("mysensors_messages_total", "Messages received per node and type"),
            &["node", "type"],
        )?;
        let sensor_value = GaugeVec::new(
            Opts::new("mysensors_sensor_value", "Last numeric value reported by a sensor"),
            &["node", "sensor", "type"],
        )?;
        let nodes = IntGauge::new("mysensors_nodes", "Number of registered nodes")?;
        let sensors = IntGauge::new("mysensors_sensors", "Number of registered sensors")?;
        let battery_level = IntGaugeVec::new(
            Opts::new("mysensors_battery_level", "Last reported battery level in percent"),
            &["node"],
        )?;
        let frames_rx = IntGauge::new("mysensors_frames_rx", "Serial frames read")?;
        let frames_tx = IntGauge::new("mysensors_frames_tx", "Serial frames written")?;
        let decode_errors =
            IntGauge::new("mysensors_decode_errors", "Serial frames that failed to decode")?;
        let sensor = SensorMetrics {
            messages,
            sensor_value,
            nodes,
            sensors,
            battery_level,
            frames_rx,
            frames_tx,
            decode_errors,
        };
        registry.register(Box::new(sensor.messages.clone()))?;
        registry.register(Box::new(sensor.sensor_value.clone()))?;
        registry.register(Box::new(sensor.nodes.clone()))?;
        registry.register(Box::new(sensor.sensors.clone()))?;
        registry.register(Box::new(sensor.battery_level.clone()))?;
        registry.register(Box::new(sensor.frames_rx.clone()))?;
        registry.register(Box::new(sensor.frames_tx.clone()))?;
        registry.register(Box::new(sensor.decode_errors.clone()))?;
        Ok(Self { registry, sensor })
    }

    pub fn observe_network(&self, network: &Network) {
        let nodes = network.nodes();
        self.sensor.nodes.set(nodes.len() as i64);
        self.sensor
            .sensors
            .set(nodes.iter().map(|n| n.sensors.len() as i64).sum());
        self.sensor.battery_level.reset();
        self.sensor.sensor_value.reset();
        for node in &nodes {
            let node_label = node.id.to_string();
            if let Some(level) = node.battery_level {
                self.sensor
                    .battery_level
                    .with_label_values(&[node_label.as_str()])
                    .set(i64::from(level));
            }
            for sensor in node.sensors.values() {
                let sensor_label = sensor.id.to_string();
                for r in &sensor.readings {
                    let Ok(v) = r.value.trim().parse::<f64>() else {
                        continue;
                    };
                    self.sensor
                        .sensor_value
                        .with_label_values(&[
                            node_label.as_str(),
                            sensor_label.as_str(),
                            r.value_type.name(),
                        ])
                        .set(v);
                }
            }
        }
    }

    pub fn observe_handler(&self, stats: HandlerStats) {
        self.sensor.frames_rx.set(stats.frames_rx as i64);
        self.sensor.frames_tx.set(stats.frames_tx as i64);
        self.sensor.decode_errors.set(stats.decode_errors as i64);
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl EventSink for MetricsHub {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn deliver(&self, msg: &Message) -> Result<()> {
        self.sensor
            .messages
            .with_label_values(&[msg.node_id.to_string().as_str(), msg.kind.as_str()])
            .inc();
        Ok(())
    }
}
