//! Decoder for the consumer protocol member assignment.
//!
//! Group descriptions return each member's assignment as the opaque bytes the
//! group leader produced. For the `consumer` protocol the layout is:
//!
//! ```text
//! version          i16
//! topics           i32 count, then per topic:
//!   topic          i16 length + utf-8 bytes
//!   partitions     i32 count, then i32 per partition
//! user_data        i32 length (-1 for null) + bytes
//! ```
//!
//! Trailing fields added by newer protocol versions are ignored.

use bytes::Buf;

use crate::errors::{AdapterError, Result};
use crate::models::TopicPartitionSet;

/// Decodes a member assignment into the partitions it owns.
///
/// An empty payload is a member without assignment (group still rebalancing).
pub fn decode_member_assignment(bytes: &[u8]) -> Result<TopicPartitionSet> {
    let mut buf = bytes;
    let mut assignment = TopicPartitionSet::new();
    if !buf.has_remaining() {
        return Ok(assignment);
    }

    let version = read_i16(&mut buf, "version")?;
    if version < 0 {
        return Err(AdapterError::AssignmentDecodeError(format!(
            "unsupported version {version}"
        )));
    }

    let topic_count = read_len(&mut buf, "topic count")?;
    for _ in 0..topic_count {
        let topic = read_string(&mut buf)?;
        let partition_count = read_len(&mut buf, "partition count")?;
        if buf.remaining() < partition_count * 4 {
            return Err(eof("partitions"));
        }
        for _ in 0..partition_count {
            assignment.insert_partition(topic.as_str(), buf.get_i32());
        }
    }

    Ok(assignment)
}

fn eof(field: &str) -> AdapterError {
    AdapterError::AssignmentDecodeError(format!("unexpected end of input reading {field}"))
}

fn read_i16(buf: &mut &[u8], field: &str) -> Result<i16> {
    if buf.remaining() < 2 {
        return Err(eof(field));
    }
    Ok(buf.get_i16())
}

fn read_len(buf: &mut &[u8], field: &str) -> Result<usize> {
    if buf.remaining() < 4 {
        return Err(eof(field));
    }
    let len = buf.get_i32();
    // Null arrays are encoded as -1.
    Ok(usize::try_from(len).unwrap_or(0))
}

fn read_string(buf: &mut &[u8]) -> Result<String> {
    let len = read_i16(buf, "topic length")?;
    let len = usize::try_from(len)
        .map_err(|_| AdapterError::AssignmentDecodeError("null topic name".to_string()))?;
    if buf.remaining() < len {
        return Err(eof("topic name"));
    }
    let name = String::from_utf8(buf[..len].to_vec())
        .map_err(|err| AdapterError::AssignmentDecodeError(err.to_string()))?;
    buf.advance(len);
    Ok(name)
}
