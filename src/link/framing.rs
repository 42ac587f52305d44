//! Newline-delimited JSON framing.
//!
//! Each frame is one compact JSON document followed by a single terminator
//! byte. JSON string escaping guarantees the terminator never appears inside
//! an encoded value, so a frame boundary is simply the next `\n`.
//!
//! # Wire Format
//!
//! ```text
//! {"Type":"cmd","Payload":"look"}\n
//! {"Type":"txt","Payload":"You see a door."}\n
//! ```

use bytes::{Buf, BytesMut};
use memchr::memchr;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::LinkError;

/// Byte that ends every frame.
pub const TERMINATOR: u8 = b'\n';

/// Serialize a message into a complete frame (payload plus terminator).
///
/// # Errors
///
/// Returns `LinkError::Encode` naming the message type if serialization
/// fails, e.g. a map with non-string keys.
pub fn encode_frame<T: Serialize + ?Sized>(message: &T) -> Result<Vec<u8>, LinkError> {
    let mut encoded = serde_json::to_vec(message).map_err(|source| LinkError::Encode {
        type_name: std::any::type_name::<T>(),
        source,
    })?;
    debug_assert!(memchr(TERMINATOR, &encoded).is_none());
    encoded.push(TERMINATOR);
    Ok(encoded)
}

/// Remove the next complete frame from the front of `buffer`.
///
/// Returns the payload without its terminator, or `None` if the buffer holds
/// no terminator yet. A partial frame is left untouched for the next call.
pub fn split_frame(buffer: &mut BytesMut) -> Option<BytesMut> {
    let end = memchr(TERMINATOR, &buffer[..])?;
    let payload = buffer.split_to(end);
    buffer.advance(1);
    Some(payload)
}

/// Decode the next complete frame in `buffer`.
///
/// # Errors
///
/// Returns `LinkError::Decode` if the frame is not valid JSON for `T`. The
/// malformed frame is consumed anyway so later frames stay aligned.
pub fn decode_next<T: DeserializeOwned>(buffer: &mut BytesMut) -> Result<Option<T>, LinkError> {
    let Some(payload) = split_frame(buffer) else {
        return Ok(None);
    };

    serde_json::from_slice(&payload)
        .map(Some)
        .map_err(|source| LinkError::Decode {
            len: payload.len(),
            source,
        })
}
