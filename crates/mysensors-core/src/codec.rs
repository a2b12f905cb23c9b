//! Serial frame codec: `node;sensor;command;ack;type;payload\n`.

use crate::{GatewayError, Message, MessageType, Result, MAX_PAYLOAD_LEN};

pub const FIELD_DELIMITER: char = ';';
const FIELD_COUNT: usize = 6;

/// Decode one line. Trailing `\r`/`\n` are ignored; the payload is everything
/// after the fifth delimiter, so it may itself contain `;`.
pub fn decode(line: &str) -> Result<Message> {
    let line = line.trim_end_matches(['\r', '\n']);
    let fields: Vec<&str> = line.splitn(FIELD_COUNT, FIELD_DELIMITER).collect();
    if fields.len() != FIELD_COUNT {
        return Err(GatewayError::MalformedFrame(format!(
            "expected {FIELD_COUNT} fields, got {}: {line:?}",
            fields.len()
        )));
    }
    let node_id = parse_u8(fields[0], "node id")?;
    let sensor_id = parse_u8(fields[1], "sensor id")?;
    let command = parse_u8(fields[2], "command")?;
    let kind = MessageType::from_u8(command)
        .ok_or_else(|| GatewayError::MalformedFrame(format!("command out of range: {command}")))?;
    let ack = match fields[3] {
        "0" => false,
        "1" => true,
        other => {
            return Err(GatewayError::MalformedFrame(format!(
                "ack must be 0 or 1: {other:?}"
            )))
        }
    };
    let sub_type = parse_u8(fields[4], "type")?;
    Ok(Message {
        node_id,
        sensor_id,
        kind,
        ack,
        sub_type,
        payload: fields[5].to_string(),
    })
}

/// Decode a raw transport frame.
pub fn decode_bytes(frame: &[u8]) -> Result<Message> {
    let line = std::str::from_utf8(frame)
        .map_err(|_| GatewayError::MalformedFrame("frame is not valid UTF-8".into()))?;
    decode(line)
}

/// Encode a message as a terminated wire line.
pub fn encode(msg: &Message) -> Result<String> {
    if msg.payload.len() > MAX_PAYLOAD_LEN {
        return Err(GatewayError::PayloadTooLong {
            len: msg.payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }
    if msg.payload.contains(['\r', '\n']) {
        return Err(GatewayError::InvalidPayload);
    }
    let mut out = String::with_capacity(16 + msg.payload.len());
    out.push_str(&msg.to_string());
    out.push('\n');
    Ok(out)
}

fn parse_u8(field: &str, what: &str) -> Result<u8> {
    // u8::from_str accepts a leading '+'; the wire format never carries one.
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GatewayError::MalformedFrame(format!(
            "{what} is not a number: {field:?}"
        )));
    }
    field
        .parse::<u8>()
        .map_err(|_| GatewayError::MalformedFrame(format!("{what} out of range: {field}")))
}
