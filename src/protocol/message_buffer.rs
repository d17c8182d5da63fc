//! Receive buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for buffer management and a state machine for
//! chunked framing:
//! - `WaitingForHeader`: need a `#<size>\n` or `##\n` header
//! - `WaitingForChunk`: header parsed, need N more chunk bytes
//!
//! In end-of-message mode the buffer is scanned for `]]>]]>` instead.
//! Bytes are only removed once they belong to a complete message; anything
//! after the last complete message stays buffered for the next push.
//!
//! # Example
//!
//! ```
//! use netconf_client::protocol::{FramingMode, MessageBuffer};
//!
//! let mut buffer = MessageBuffer::new(FramingMode::Chunked);
//!
//! assert!(buffer.push(b"\n#6\n<ok/>").unwrap().is_empty());
//! let messages = buffer.push(b"\n\n##\n").unwrap();
//! assert_eq!(messages[0].text().unwrap(), "<ok/>");
//! ```

use bytes::BytesMut;

use super::wire_format::{
    decode_chunk_header, ChunkHeader, FramingMode, DEFAULT_MAX_MESSAGE_SIZE, EOM_DELIMITER,
};
use super::Message;
use crate::error::{NetconfError, Result};

/// State machine for chunk parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for a complete chunk header or end-of-chunks marker.
    WaitingForHeader,
    /// Header parsed, waiting for chunk data bytes.
    WaitingForChunk { remaining: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete messages.
pub struct MessageBuffer {
    /// Accumulated bytes from transport reads.
    buffer: BytesMut,
    /// Chunk data of the message being reassembled.
    assembled: BytesMut,
    /// Chunks seen for the message being reassembled.
    chunks: usize,
    mode: FramingMode,
    state: State,
    /// Maximum allowed size of one message.
    max_message_size: usize,
}

impl MessageBuffer {
    /// Create a new buffer with the default message size limit.
    pub fn new(mode: FramingMode) -> Self {
        Self::with_max_message_size(mode, DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a new buffer with a custom message size limit.
    pub fn with_max_message_size(mode: FramingMode, max_message_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            assembled: BytesMut::new(),
            chunks: 0,
            mode,
            state: State::WaitingForHeader,
            max_message_size,
        }
    }

    /// Push data into the buffer and extract all complete messages.
    ///
    /// Returns complete messages in arrival order (may be empty if still
    /// waiting for data). Pushing an empty slice re-scans what is buffered.
    ///
    /// # Errors
    ///
    /// Returns `Framing` on a malformed chunk header or an oversized message.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Message>> {
        self.buffer.extend_from_slice(data);

        let mut messages = Vec::new();
        while let Some(message) = self.try_extract_one()? {
            messages.push(message);
        }
        Ok(messages)
    }

    /// Switch framing, keeping buffered bytes for the new mode.
    ///
    /// Called once the hello exchange completes.
    pub fn set_mode(&mut self, mode: FramingMode) {
        self.mode = mode;
        self.state = State::WaitingForHeader;
        self.assembled.clear();
        self.chunks = 0;
    }

    #[inline]
    pub fn mode(&self) -> FramingMode {
        self.mode
    }

    fn try_extract_one(&mut self) -> Result<Option<Message>> {
        match self.mode {
            FramingMode::EndOfMessage => self.try_extract_delimited(),
            FramingMode::Chunked => self.try_extract_chunked(),
        }
    }

    fn try_extract_delimited(&mut self) -> Result<Option<Message>> {
        let position = self
            .buffer
            .windows(EOM_DELIMITER.len())
            .position(|window| window == EOM_DELIMITER);

        match position {
            Some(end) => {
                let payload = self.buffer.split_to(end).freeze();
                let _ = self.buffer.split_to(EOM_DELIMITER.len());
                Ok(Some(Message::new(payload, 0)))
            }
            None if self.buffer.len() > self.max_message_size => {
                Err(NetconfError::Framing(format!(
                    "no end-of-message delimiter within {} bytes",
                    self.max_message_size
                )))
            }
            None => Ok(None),
        }
    }

    fn try_extract_chunked(&mut self) -> Result<Option<Message>> {
        loop {
            match self.state {
                State::WaitingForHeader => {
                    // Newline before '#', plus any whitespace between messages.
                    let skip = self
                        .buffer
                        .iter()
                        .take_while(|b| b.is_ascii_whitespace())
                        .count();
                    let _ = self.buffer.split_to(skip);

                    let Some((header, consumed)) = decode_chunk_header(&self.buffer)? else {
                        return Ok(None);
                    };
                    let _ = self.buffer.split_to(consumed);

                    match header {
                        ChunkHeader::Data(size) => {
                            if self.assembled.len() + size > self.max_message_size {
                                return Err(NetconfError::Framing(format!(
                                    "message size exceeds maximum {}",
                                    self.max_message_size
                                )));
                            }
                            self.state = State::WaitingForChunk { remaining: size };
                        }
                        ChunkHeader::End => {
                            if self.chunks == 0 {
                                return Err(NetconfError::Framing(
                                    "end-of-chunks marker without chunk data".to_string(),
                                ));
                            }
                            let payload = self.assembled.split().freeze();
                            let chunks = std::mem::take(&mut self.chunks);
                            return Ok(Some(Message::new(payload, chunks)));
                        }
                    }
                }

                State::WaitingForChunk { remaining } => {
                    if self.buffer.len() < remaining {
                        return Ok(None);
                    }

                    let data = self.buffer.split_to(remaining);
                    self.assembled.extend_from_slice(&data);
                    self.chunks += 1;
                    self.state = State::WaitingForHeader;
                }
            }
        }
    }

    /// Get the number of buffered bytes not yet part of a complete message.
    pub fn len(&self) -> usize {
        self.buffer.len() + self.assembled.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForChunk { .. } => "WaitingForChunk",
        }
    }
}
