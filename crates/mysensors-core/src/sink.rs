use crate::{Message, Result};
use std::sync::Arc;
use tracing::warn;

/// A consumer of decoded messages (MQTT bridge, metrics, console...).
pub trait EventSink: Send + Sync {
    fn name(&self) -> &str;

    fn deliver(&self, msg: &Message) -> Result<()>;
}

/// Delivers every message to each registered sink, in registration order.
#[derive(Clone, Default)]
pub struct Fanout {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.sinks.iter().map(|s| s.name().to_string()).collect()
    }

    /// Returns the number of sinks that failed. A failing sink is logged and
    /// does not stop delivery to the rest.
    pub fn deliver(&self, msg: &Message) -> usize {
        let mut failed = 0;
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(msg) {
                failed += 1;
                warn!(sink = sink.name(), %msg, error = %e, "sink delivery failed");
            }
        }
        failed
    }
}
