use base64::Engine;
use modelmux_provider::{FrameData, FrameEvent};
use serde_json::Value;
use std::sync::OnceLock;

const PRELUDE_LEN: usize = 12;
const CRC_LEN: usize = 4;

/// Incremental parser for the AWS Event Stream binary framing used by
/// Bedrock response streams.
///
/// Each message: u32 BE total length, u32 BE headers length, u32 prelude
/// CRC, headers, payload, u32 message CRC. Payloads wrapped as
/// `{"chunk":{"bytes": b64}}` or `{"bytes": b64}` are unwrapped and
/// JSON-decoded.
#[derive(Default)]
pub struct EventStreamParser {
    buffer: Vec<u8>,
}

impl EventStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<FrameEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        loop {
            if self.buffer.len() < PRELUDE_LEN {
                break;
            }

            let total_len = read_u32(&self.buffer, 0) as usize;
            if total_len < PRELUDE_LEN + CRC_LEN {
                log::warn!("event stream frame declares impossible length {total_len}; dropping buffer");
                self.buffer.clear();
                break;
            }
            if self.buffer.len() < total_len {
                // Incomplete: fewer bytes than the prelude declares.
                break;
            }

            let message: Vec<u8> = self.buffer.drain(..total_len).collect();
            match decode_message(&message) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(reason) => log::warn!("skipping corrupt event stream frame: {reason}"),
            }
        }

        events
    }
}

fn decode_message(message: &[u8]) -> Result<Option<FrameEvent>, String> {
    let total_len = read_u32(message, 0) as usize;
    let headers_len = read_u32(message, 4) as usize;
    let prelude_crc = read_u32(message, 8);

    if crc32(&message[..8]) != prelude_crc {
        return Err("prelude CRC mismatch".to_string());
    }

    let declared_crc = read_u32(message, total_len - CRC_LEN);
    if crc32(&message[..total_len - CRC_LEN]) != declared_crc {
        return Err("message CRC mismatch".to_string());
    }

    if PRELUDE_LEN + headers_len > total_len - CRC_LEN {
        return Err("headers overrun payload".to_string());
    }

    let headers = &message[PRELUDE_LEN..PRELUDE_LEN + headers_len];
    let payload = &message[PRELUDE_LEN + headers_len..total_len - CRC_LEN];

    let event_type = parse_string_header(headers, ":event-type");

    if payload.is_empty() {
        return Ok(None);
    }

    let data = unwrap_payload(payload);
    Ok(Some(FrameEvent {
        data,
        event: event_type,
        id: None,
    }))
}

/// Strip `{"chunk":{"bytes": b64}}` / `{"bytes": b64}` wrapping, then
/// JSON-decode. Anything else is passed through as JSON or text.
fn unwrap_payload(payload: &[u8]) -> FrameData {
    let text = String::from_utf8_lossy(payload).into_owned();

    let value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(_) => return FrameData::Text(text),
    };

    let encoded = value
        .get("chunk")
        .and_then(|c| c.get("bytes"))
        .or_else(|| value.get("bytes"))
        .and_then(Value::as_str);

    match encoded {
        Some(b64) => match base64::engine::general_purpose::STANDARD.decode(b64) {
            Ok(decoded) => {
                let inner = String::from_utf8_lossy(&decoded).into_owned();
                match serde_json::from_str::<Value>(&inner) {
                    Ok(inner_value) => FrameData::Json(inner_value),
                    Err(_) => FrameData::Text(inner),
                }
            }
            Err(_) => FrameData::Json(value),
        },
        None => FrameData::Json(value),
    }
}

/// Extract a string-typed (type 7) header by name.
fn parse_string_header(mut headers: &[u8], wanted: &str) -> Option<String> {
    while !headers.is_empty() {
        let name_len = *headers.first()? as usize;
        headers = headers.get(1..)?;
        let name = headers.get(..name_len)?;
        headers = headers.get(name_len..)?;

        let value_type = *headers.first()?;
        headers = headers.get(1..)?;

        match value_type {
            // bool true / bool false carry no bytes
            0 | 1 => {}
            // byte
            2 => headers = headers.get(1..)?,
            // i16
            3 => headers = headers.get(2..)?,
            // i32
            4 => headers = headers.get(4..)?,
            // i64 / timestamp
            5 | 8 => headers = headers.get(8..)?,
            // byte array / string: u16 BE length prefix
            6 | 7 => {
                let len = u16::from_be_bytes([*headers.first()?, *headers.get(1)?]) as usize;
                let value = headers.get(2..2 + len)?;
                if value_type == 7 && name == wanted.as_bytes() {
                    return Some(String::from_utf8_lossy(value).into_owned());
                }
                headers = headers.get(2 + len..)?;
            }
            // uuid
            9 => headers = headers.get(16..)?,
            _ => return None,
        }
    }
    None
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

/// CRC-32 (ISO-HDLC), the checksum the event stream framing uses.
pub fn crc32(data: &[u8]) -> u32 {
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    let table = TABLE.get_or_init(|| {
        let mut table = [0u32; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let mut crc = i as u32;
            for _ in 0..8 {
                crc = if crc & 1 != 0 {
                    0xEDB8_8320 ^ (crc >> 1)
                } else {
                    crc >> 1
                };
            }
            *entry = crc;
        }
        table
    });

    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc = table[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8);
    }
    crc ^ 0xFFFF_FFFF
}

#[cfg(test)]
pub(crate) fn encode_message(headers: &[u8], payload: &[u8]) -> Vec<u8> {
    let total_len = (PRELUDE_LEN + headers.len() + payload.len() + CRC_LEN) as u32;
    let mut out = Vec::with_capacity(total_len as usize);
    out.extend_from_slice(&total_len.to_be_bytes());
    out.extend_from_slice(&(headers.len() as u32).to_be_bytes());
    let prelude_crc = crc32(&out);
    out.extend_from_slice(&prelude_crc.to_be_bytes());
    out.extend_from_slice(headers);
    out.extend_from_slice(payload);
    let message_crc = crc32(&out);
    out.extend_from_slice(&message_crc.to_be_bytes());
    out
}

#[cfg(test)]
pub(crate) fn encode_string_header(name: &str, value: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(name.len() as u8);
    out.extend_from_slice(name.as_bytes());
    out.push(7u8);
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value.as_bytes());
    out
}
