//! MessagePack serialisation helpers.

use std::time::{SystemTime, UNIX_EPOCH};

use rmp_serde::Serializer;
use serde::{Deserialize, Serialize};

use crate::item::{Batch, Options};

use super::TransportError;

/// Wire shape of a shipped batch.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct FramedBatch {
    pub lines: Vec<String>,
    pub options: Options,
    pub timestamp_ms: u64,
}

#[derive(Serialize)]
struct SerializableBatch<'a> {
    lines: &'a [String],
    options: &'a Options,
    timestamp_ms: u64,
}

/// Serialise a batch into a MessagePack payload.
pub fn serialise_batch(batch: &Batch) -> Result<Vec<u8>, TransportError> {
    let timestamp_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|dur| u64::try_from(dur.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default();
    let serialisable = SerializableBatch {
        lines: &batch.lines,
        options: &batch.options,
        timestamp_ms,
    };
    let mut buf = Vec::with_capacity(128);
    serialisable
        .serialize(&mut Serializer::new(&mut buf).with_struct_map())
        .map_err(|err| TransportError::Serialise(err.to_string()))?;
    Ok(buf)
}

/// Frame the payload with a big-endian length prefix.
pub fn frame_payload(payload: &[u8], max_size: usize) -> Option<Vec<u8>> {
    if payload.len() > max_size {
        return None;
    }
    let len = u32::try_from(payload.len()).ok()?;
    let capacity = payload.len().checked_add(4)?;
    let mut framed = Vec::with_capacity(capacity);
    framed.extend(len.to_be_bytes());
    framed.extend_from_slice(payload);
    Some(framed)
}
