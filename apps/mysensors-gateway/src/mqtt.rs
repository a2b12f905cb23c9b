use crate::config::MqttConfig;
use mysensors_core::{codec, EventSink, GatewayError, Handler, Message};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const REQUEST_CAPACITY: usize = 64;
const MAX_POLL_ERRORS: u32 = 5;

/// Publishes every decoded message under
/// `<publish_prefix>/<node>/<sensor>/<command>/<ack>/<type>`.
pub struct MqttSink {
    client: AsyncClient,
    publish_prefix: String,
}

impl EventSink for MqttSink {
    fn name(&self) -> &str {
        "mqtt"
    }

    fn deliver(&self, msg: &Message) -> mysensors_core::Result<()> {
        let topic = publish_topic(&self.publish_prefix, msg);
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, msg.payload.clone())
            .map_err(|e| GatewayError::Sink {
                sink: "mqtt".to_string(),
                reason: e.to_string(),
            })
    }
}

/// Connect to the broker and spawn the event loop task.
///
/// Publishes on `<subscribe_prefix>/...` are decoded into messages and written
/// to the serial link through `handler`.
pub fn start(cfg: &MqttConfig, handler: Arc<Handler>) -> Arc<MqttSink> {
    let client_id = cfg
        .client_id
        .clone()
        .unwrap_or_else(|| format!("mysensors-gateway-{}", Uuid::new_v4()));
    let mut options = MqttOptions::new(&client_id, &cfg.host, cfg.port);
    options.set_keep_alive(Duration::from_secs(cfg.keep_alive_secs.max(5)));
    if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
        options.set_credentials(user, pass);
    }
    let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
    info!(host = %cfg.host, port = cfg.port, client_id = %client_id, "mqtt client started");

    let filter = subscribe_filter(&cfg.subscribe_prefix);
    tokio::spawn(run_event_loop(
        eventloop,
        client.clone(),
        filter,
        cfg.subscribe_prefix.clone(),
        handler,
    ));

    Arc::new(MqttSink {
        client,
        publish_prefix: cfg.publish_prefix.clone(),
    })
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    filter: String,
    prefix: String,
    handler: Arc<Handler>,
) {
    let mut error_count = 0;
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                error_count = 0;
                info!("mqtt connected");
                // Clean sessions drop subscriptions on reconnect.
                if let Err(e) = client.subscribe(filter.as_str(), QoS::AtLeastOnce).await {
                    warn!(topic = %filter, error = %e, "mqtt subscribe failed");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let payload = String::from_utf8_lossy(&publish.payload).into_owned();
                match command_from_topic(&prefix, &publish.topic, &payload) {
                    Ok(msg) => {
                        let handler = Arc::clone(&handler);
                        let res =
                            tokio::task::spawn_blocking(move || handler.transmit(&msg)).await;
                        match res {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => warn!(topic = %publish.topic, error = %e, "forwarding command failed"),
                            Err(e) => error!(error = %e, "transmit task failed"),
                        }
                    }
                    Err(e) => warn!(topic = %publish.topic, error = %e, "ignoring mqtt command"),
                }
            }
            Ok(other) => debug!(event = ?other, "mqtt event"),
            Err(e) => {
                error_count += 1;
                if error_count >= MAX_POLL_ERRORS {
                    error!(error = %e, attempts = error_count, "mqtt connection failing, backing off");
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    error_count = 0;
                } else {
                    warn!(error = %e, "mqtt connection error");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    }
}

pub fn publish_topic(prefix: &str, msg: &Message) -> String {
    format!(
        "{prefix}/{}/{}/{}/{}/{}",
        msg.node_id,
        msg.sensor_id,
        msg.kind.code(),
        u8::from(msg.ack),
        msg.sub_type
    )
}

pub fn subscribe_filter(prefix: &str) -> String {
    format!("{prefix}/+/+/+/+/+")
}

/// Turn `<prefix>/<node>/<sensor>/<command>/<ack>/<type>` plus a payload into
/// an outbound message, validated by the frame codec.
pub fn command_from_topic(
    prefix: &str,
    topic: &str,
    payload: &str,
) -> mysensors_core::Result<Message> {
    let rest = topic
        .strip_prefix(prefix)
        .and_then(|r| r.strip_prefix('/'))
        .ok_or_else(|| GatewayError::MalformedFrame(format!("unexpected topic {topic}")))?;
    let fields: Vec<&str> = rest.split('/').collect();
    if fields.len() != 5 {
        return Err(GatewayError::MalformedFrame(format!(
            "topic needs 5 address fields: {topic}"
        )));
    }
    let msg = codec::decode(&format!("{};{payload}", fields.join(";")))?;
    // Reject anything the wire could not carry before it reaches the link.
    codec::encode(&msg)?;
    Ok(msg)
}
