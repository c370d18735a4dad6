//! msgpack encoding of an [`ExchangeBuffer`].
//!
//! Encoding writes only the non-empty members, in the order ints, reals,
//! texts. Decoding accepts 0 to 3 members: three are read positionally,
//! fewer are matched to the earliest slot their element kind can fill.

use rmpv::Value;

use crate::buffer::ExchangeBuffer;
use crate::error::{ExchangeError, Result};

/// Nesting allowed while decoding. The message shape needs two levels.
pub const MAX_DECODE_DEPTH: usize = 8;

const SLOT_NAMES: [&str; 3] = ["ints", "reals", "texts"];

/// Encode a buffer into one wire message.
pub fn encode_message(buffer: &ExchangeBuffer) -> Result<Vec<u8>> {
    let mut members = Vec::with_capacity(3);
    if !buffer.ints().is_empty() {
        members.push(Value::Array(
            buffer.ints().iter().map(|&v| Value::from(v)).collect(),
        ));
    }
    if !buffer.reals().is_empty() {
        members.push(Value::Array(
            buffer.reals().iter().map(|&v| Value::from(v)).collect(),
        ));
    }
    if !buffer.texts().is_empty() {
        members.push(Value::Array(
            buffer
                .texts()
                .iter()
                .map(|v| Value::from(v.as_str()))
                .collect(),
        ));
    }

    let mut out = Vec::new();
    rmpv::encode::write_value(&mut out, &Value::Array(members))
        .map_err(|err| ExchangeError::Internal(format!("msgpack encode failed: {err}")))?;
    Ok(out)
}

/// Decode one wire message into a fresh buffer.
pub fn decode_message(bytes: &[u8]) -> Result<ExchangeBuffer> {
    let mut rd = bytes;
    let value = rmpv::decode::read_value_with_max_depth(&mut rd, MAX_DECODE_DEPTH)
        .map_err(map_decode_error)?;
    if !rd.is_empty() {
        return Err(ExchangeError::MalformedPayload(format!(
            "{} trailing bytes after message",
            rd.len()
        )));
    }

    let Value::Array(members) = value else {
        return Err(ExchangeError::MalformedPayload(
            "message is not an array".to_string(),
        ));
    };
    if members.len() > SLOT_NAMES.len() {
        return Err(ExchangeError::MalformedPayload(format!(
            "message has {} members, at most 3 allowed",
            members.len()
        )));
    }

    let positional = members.len() == SLOT_NAMES.len();
    let mut buffer = ExchangeBuffer::new();
    let mut cursor = 0usize;

    for (index, member) in members.into_iter().enumerate() {
        let Value::Array(items) = member else {
            return Err(ExchangeError::MalformedPayload(format!(
                "member {index} is not an array"
            )));
        };

        let slot = if positional {
            index
        } else {
            slot_for(&items, cursor, index)?
        };

        match slot {
            0 => buffer.set_ints(&convert_ints(items)?),
            1 => buffer.set_reals(&convert_reals(items)?),
            _ => buffer.set_texts(convert_texts(items)?),
        }
        cursor = slot + 1;
    }

    Ok(buffer)
}

fn slot_for(items: &[Value], cursor: usize, index: usize) -> Result<usize> {
    let slot = match items.first() {
        None => cursor,
        Some(Value::Integer(_)) if cursor == 0 => 0,
        Some(Value::Integer(_)) => 1,
        Some(Value::F32(_) | Value::F64(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(other) => {
            return Err(ExchangeError::MalformedPayload(format!(
                "member {index} holds unsupported element {other}"
            )))
        }
    };

    if slot < cursor || slot >= SLOT_NAMES.len() {
        return Err(ExchangeError::MalformedPayload(format!(
            "member {index} is out of order (no {} slot left)",
            SLOT_NAMES.get(slot).copied().unwrap_or("free")
        )));
    }
    Ok(slot)
}

fn convert_ints(items: Vec<Value>) -> Result<Vec<i64>> {
    let mut out = reserve(items.len())?;
    for item in items {
        match item {
            Value::Integer(v) => out.push(v.as_i64().ok_or_else(|| {
                ExchangeError::MalformedPayload(format!("integer {v:?} out of range"))
            })?),
            other => return Err(type_mismatch("ints", &other)),
        }
    }
    Ok(out)
}

fn convert_reals(items: Vec<Value>) -> Result<Vec<f64>> {
    let mut out = reserve(items.len())?;
    for item in items {
        let value = match item {
            Value::F64(v) => v,
            Value::F32(v) => f64::from(v),
            Value::Integer(v) => match (v.as_i64(), v.as_u64()) {
                (Some(i), _) => i as f64,
                (None, Some(u)) => u as f64,
                (None, None) => return Err(type_mismatch("reals", &Value::Integer(v))),
            },
            other => return Err(type_mismatch("reals", &other)),
        };
        out.push(value);
    }
    Ok(out)
}

fn convert_texts(items: Vec<Value>) -> Result<Vec<String>> {
    let mut out = reserve(items.len())?;
    for item in items {
        match item {
            Value::String(s) => out.push(s.into_str().ok_or_else(|| {
                ExchangeError::MalformedPayload("text is not valid UTF-8".to_string())
            })?),
            other => return Err(type_mismatch("texts", &other)),
        }
    }
    Ok(out)
}

fn reserve<T>(len: usize) -> Result<Vec<T>> {
    let mut out = Vec::new();
    out.try_reserve_exact(len).map_err(|_| {
        ExchangeError::ResourceExhausted(format!("cannot allocate {len} decoded elements"))
    })?;
    Ok(out)
}

fn type_mismatch(slot: &str, value: &Value) -> ExchangeError {
    ExchangeError::MalformedPayload(format!("unexpected element {value} in {slot}"))
}

fn map_decode_error(err: rmpv::decode::Error) -> ExchangeError {
    match err {
        rmpv::decode::Error::DepthLimitExceeded => ExchangeError::ResourceExhausted(format!(
            "message nesting exceeds {MAX_DECODE_DEPTH} levels"
        )),
        rmpv::decode::Error::InvalidMarkerRead(io) | rmpv::decode::Error::InvalidDataRead(io)
            if io.kind() == std::io::ErrorKind::OutOfMemory =>
        {
            ExchangeError::ResourceExhausted(format!("msgpack decode: {io}"))
        }
        other => ExchangeError::MalformedPayload(format!("msgpack decode: {other}")),
    }
}
