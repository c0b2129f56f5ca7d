//! Binary message framing for the chat wire protocol.
//!
//! A frame is `[type: 1 byte][content length: 4 bytes, i32 little-endian]
//! [content]`. Frames are encrypted whole before transmission, so this module
//! only ever sees plaintext buffers. Decoding is deliberately infallible: a
//! truncated or malformed frame degrades to a placeholder text message
//! instead of surfacing a parse error to the caller.

use std::borrow::Cow;

/// Size of the frame header: type byte plus length field.
pub const FRAME_HEADER_LEN: usize = 5;

/// Placeholder content produced when a frame cannot be parsed.
const FALLBACK_TEXT: &str = "Message too large.";

/// Kind of payload carried by a [`Message`].
///
/// The numeric mapping is part of the wire protocol and must match the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseType {
    /// UTF-8 text content.
    StringMessage = 0,
    /// Raw image bytes.
    Image = 1,
    /// Raw audio bytes.
    Audio = 2,
}

impl ResponseType {
    /// Parse a wire type byte. Unknown values are rejected.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::StringMessage),
            1 => Some(Self::Image),
            2 => Some(Self::Audio),
            _ => None,
        }
    }

    /// The wire byte for this type.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A logical message exchanged with the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Payload kind.
    pub response_type: ResponseType,
    /// Payload bytes. For [`ResponseType::StringMessage`] this is UTF-8.
    pub content: Vec<u8>,
}

impl Message {
    /// Create a message from a type and raw content bytes.
    pub fn new(response_type: ResponseType, content: Vec<u8>) -> Self {
        Self {
            response_type,
            content,
        }
    }

    /// Create a text message. The string is stored as UTF-8 bytes.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::StringMessage,
            content: text.into().into_bytes(),
        }
    }

    /// View the content as text, replacing invalid UTF-8 sequences.
    pub fn as_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    /// Total size of this message's frame on the wire.
    pub fn frame_len(&self) -> usize {
        FRAME_HEADER_LEN + self.content.len()
    }
}

/// Serialize a message into its wire frame.
///
/// Returns an empty vector when the frame would exceed `max_frame_len` (or
/// when the content length does not fit the 4-byte length field), the
/// "too large to send" signal. No partial frame is ever produced.
pub fn encode(message: &Message, max_frame_len: usize) -> Vec<u8> {
    if message.frame_len() > max_frame_len || message.content.len() > i32::MAX as usize {
        return Vec::new();
    }

    let mut frame = Vec::with_capacity(message.frame_len());
    frame.push(message.response_type.as_byte());
    frame.extend_from_slice(&(message.content.len() as i32).to_le_bytes());
    frame.extend_from_slice(&message.content);
    frame
}

/// Parse a wire frame back into a message.
///
/// Never fails: a buffer shorter than its declared content length, a negative
/// length field, a missing header, or an unknown type byte all yield the
/// fallback `"Message too large."` text message. A corrupted frame must not
/// propagate a parse error to the caller.
pub fn decode(buf: &[u8]) -> Message {
    if buf.len() < FRAME_HEADER_LEN {
        return Message::text(FALLBACK_TEXT);
    }

    let Some(response_type) = ResponseType::from_byte(buf[0]) else {
        return Message::text(FALLBACK_TEXT);
    };

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&buf[1..FRAME_HEADER_LEN]);
    let declared = i32::from_le_bytes(len_bytes);
    if declared < 0 {
        return Message::text(FALLBACK_TEXT);
    }

    let content_len = declared as usize;
    if buf.len() < FRAME_HEADER_LEN + content_len {
        return Message::text(FALLBACK_TEXT);
    }

    Message::new(
        response_type,
        buf[FRAME_HEADER_LEN..FRAME_HEADER_LEN + content_len].to_vec(),
    )
}
