//! Event ⇄ transport message translation.
//!
//! [`to_message`] is a pure function: the event is only read, and the only
//! output is the new message or the reason it could not be built.
//!
//! | metadata key | message field | accepted kinds |
//! |--------------|---------------|----------------|
//! | `partition`  | partition     | integer within `i32` |
//! | `key`        | key           | string |
//! | `headers`    | headers       | `k:v,k:v` string, or pairs |

use super::message::TransportMessage;
use crate::error::MappingError;
use crate::event::{Event, MetaValue, META_HEADERS, META_KEY, META_PARTITION};

/// Build the transport message for `event` on `topic`.
///
/// The payload is the whole event encoded as JSON, so a subscriber can
/// rebuild it with [`decode_event`].
pub fn to_message(topic: &str, event: &Event) -> Result<TransportMessage, MappingError> {
    // JSON writes NaN and infinities as null, which would not decode.
    if let Some((key, value)) = event.metadata().iter().find_map(|(key, value)| match value {
        MetaValue::Float(f) if !f.is_finite() => Some((key, *f)),
        _ => None,
    }) {
        return Err(MappingError::NonFinite {
            key: key.to_string(),
            value,
        });
    }

    let payload = serde_json::to_vec(event).map_err(|e| MappingError::Encode(e.to_string()))?;

    let partition = event
        .meta(META_PARTITION)
        .map(|value| value.as_i32(META_PARTITION))
        .transpose()?;

    let key = event
        .meta(META_KEY)
        .map(|value| value.as_str(META_KEY).map(str::to_string))
        .transpose()?;

    let headers = event
        .meta(META_HEADERS)
        .map(|value| value.as_pairs(META_HEADERS))
        .transpose()?;

    Ok(TransportMessage::new(
        topic.to_string(),
        payload,
        partition,
        key,
        headers,
    ))
}

/// Rebuild an event from a message payload produced by [`to_message`].
pub fn decode_event(payload: &[u8]) -> Result<Event, MappingError> {
    serde_json::from_slice(payload).map_err(|e| MappingError::Decode(e.to_string()))
}
