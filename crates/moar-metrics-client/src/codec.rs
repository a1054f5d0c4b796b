//! metricd wire payload (JSON).
//!
//! ```text
//! {
//!   "meta":    { "host": "...", "app": "...", ...extra },
//!   "metrics": { "<name>": "<value>|c", "<name>": "<v1>;<v2>|ms", ... }
//! }
//! ```
//!
//! The encoder escapes every non-ASCII character as `\uXXXX`, so the bytes
//! on the wire read the same whether the daemon decodes them as UTF-8 or
//! Latin-1.

use std::io;

use bytes::Bytes;
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{Map, Value};

use crate::error::ExportError;

/// Largest payload a single IPv4 UDP datagram can carry.
pub const MAX_DATAGRAM_BYTES: usize = 65_507;

/// Build the payload object.
///
/// `metrics` must serialize to a JSON object whose values are all strings;
/// anything else is rejected so that no malformed datagram goes out.
/// Keys of an object-valued `extra_meta` are merged over `meta`; any other
/// `extra_meta` is ignored.
pub fn build_payload<M: Serialize + ?Sized>(
    mut meta: Map<String, Value>,
    metrics: &M,
    extra_meta: Option<&Value>,
) -> Result<Value, ExportError> {
    let metrics = serde_json::to_value(metrics).map_err(|e| ExportError::Encode(e.to_string()))?;

    let Value::Object(entries) = &metrics else {
        return Err(ExportError::Encode(format!(
            "metrics must be a name -> value mapping, got {}",
            kind(&metrics)
        )));
    };
    if let Some((name, v)) = entries.iter().find(|(_, v)| !v.is_string()) {
        return Err(ExportError::Encode(format!(
            "metric {name} must have a string value, got {}",
            kind(v)
        )));
    }

    match extra_meta {
        Some(Value::Object(extra)) => {
            for (k, v) in extra {
                meta.insert(k.clone(), v.clone());
            }
        }
        Some(other) => {
            tracing::debug!(kind = kind(other), "ignoring non-object extra meta");
        }
        None => {}
    }

    let mut payload = Map::new();
    payload.insert("meta".into(), Value::Object(meta));
    payload.insert("metrics".into(), metrics);
    Ok(Value::Object(payload))
}

/// Serialize to ASCII-only JSON bytes.
pub fn encode(payload: &Value) -> Result<Bytes, ExportError> {
    let mut ser = serde_json::Serializer::with_formatter(Vec::with_capacity(256), AsciiFormatter);
    payload
        .serialize(&mut ser)
        .map_err(|e| ExportError::Encode(e.to_string()))?;
    Ok(Bytes::from(ser.into_inner()))
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Compact formatter that writes non-ASCII as UTF-16 `\u` escapes.
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..i])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}
