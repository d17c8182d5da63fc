//! A complete deframed message.

use bytes::Bytes;

use crate::error::{NetconfError, Result};

/// One complete protocol message with framing removed.
///
/// Uses `bytes::Bytes` so the payload is shared, not copied, on its way from
/// the receive buffer to the waiting caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message bytes (all chunks concatenated).
    pub payload: Bytes,
    /// Number of wire chunks the message arrived in (0 for end-of-message framing).
    chunks: usize,
}

impl Message {
    pub fn new(payload: Bytes, chunks: usize) -> Self {
        Self { payload, chunks }
    }

    /// The message as UTF-8 text, surrounding whitespace removed.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.payload)
            .map(str::trim)
            .map_err(|e| NetconfError::Framing(format!("message is not valid UTF-8: {}", e)))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_is_trimmed() {
        let message = Message::new(Bytes::from_static(b"\n  <ok/>\n"), 1);
        assert_eq!(message.text().unwrap(), "<ok/>");
        assert_eq!(message.len(), 9);
        assert_eq!(message.chunk_count(), 1);
    }

    #[test]
    fn test_invalid_utf8() {
        let message = Message::new(Bytes::from_static(&[0x3c, 0xff, 0x3e]), 1);
        assert!(matches!(message.text(), Err(NetconfError::Framing(_))));
    }
}
