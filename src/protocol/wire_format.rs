//! Wire format encoding and decoding (RFC 6242).
//!
//! Two framings share the stream:
//! ```text
//! hello:      <xml>\n]]>]]>
//! afterwards: \n#<byte-length>\n<xml>\n##\n
//! ```
//! A chunked message may span several `\n#<len>\n<data>` chunks before the
//! closing `\n##\n`.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{NetconfError, Result};

/// End-of-message delimiter used for the hello exchange.
pub const EOM_DELIMITER: &[u8] = b"]]>]]>";

/// Marker closing a chunked message.
pub const END_OF_CHUNKS: &[u8] = b"\n##\n";

/// Base protocol namespace declared on every `<rpc>` and `<hello>`.
pub const BASE_NAMESPACE: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

/// Capability for NETCONF 1.0 (end-of-message framing).
pub const BASE_CAPABILITY_1_0: &str = "urn:ietf:params:netconf:base:1.0";

/// Capability for NETCONF 1.1 (chunked framing).
pub const BASE_CAPABILITY_1_1: &str = "urn:ietf:params:netconf:base:1.1";

/// Largest chunk size RFC 6242 allows.
pub const MAX_CHUNK_SIZE: u64 = 4_294_967_295;

/// Default limit for one reassembled message (256 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

/// Digits in the largest chunk size.
const MAX_CHUNK_SIZE_DIGITS: usize = 10;

/// Framing in effect on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingMode {
    /// Legacy `]]>]]>` delimiter, used until both hellos are exchanged.
    EndOfMessage,
    /// Length-prefixed chunks.
    Chunked,
}

/// A chunk header read from the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkHeader {
    /// `\n#<size>\n`: `size` bytes of message data follow.
    Data(usize),
    /// `\n##\n`: the message is complete.
    End,
}

/// Encode the chunk header for a payload of `len` bytes.
pub fn encode_chunk_header(len: usize) -> Bytes {
    Bytes::from(format!("\n#{}\n", len))
}

/// Frame a complete XML message for the wire.
pub fn encode_message(xml: &str, mode: FramingMode) -> Bytes {
    let mut out = BytesMut::with_capacity(xml.len() + 24);
    match mode {
        FramingMode::EndOfMessage => {
            out.put_slice(xml.as_bytes());
            out.put_u8(b'\n');
            out.put_slice(EOM_DELIMITER);
        }
        FramingMode::Chunked => {
            out.put_slice(&encode_chunk_header(xml.len()));
            out.put_slice(xml.as_bytes());
            out.put_slice(END_OF_CHUNKS);
        }
    }
    out.freeze()
}

/// Decode a chunk header at the start of `buf`.
///
/// `buf` must start at the `#` (the leading newline is consumed by the
/// caller together with any inter-message whitespace).
///
/// Returns:
/// - `Ok(Some((header, consumed)))` for a complete header
/// - `Ok(None)` if more bytes are needed
/// - `Err(...)` if the bytes cannot start a chunk header
pub fn decode_chunk_header(buf: &[u8]) -> Result<Option<(ChunkHeader, usize)>> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };
    if first != b'#' {
        return Err(NetconfError::Framing(format!(
            "expected chunk header, found byte 0x{:02x}",
            first
        )));
    }

    match buf.get(1) {
        None => Ok(None),
        Some(b'#') => match buf.get(2) {
            None => Ok(None),
            Some(b'\n') => Ok(Some((ChunkHeader::End, 3))),
            Some(other) => Err(NetconfError::Framing(format!(
                "malformed end-of-chunks marker (byte 0x{:02x})",
                other
            ))),
        },
        Some(b'1'..=b'9') => {
            let digits = buf[1..]
                .iter()
                .take(MAX_CHUNK_SIZE_DIGITS + 1)
                .take_while(|b| b.is_ascii_digit())
                .count();

            if digits > MAX_CHUNK_SIZE_DIGITS {
                return Err(NetconfError::Framing("chunk size too long".to_string()));
            }

            match buf.get(1 + digits) {
                None => Ok(None),
                Some(b'\n') => {
                    // Digits are ASCII by construction.
                    let text = std::str::from_utf8(&buf[1..1 + digits])
                        .map_err(|e| NetconfError::Framing(e.to_string()))?;
                    let size: u64 = text
                        .parse()
                        .map_err(|_| NetconfError::Framing(format!("bad chunk size {}", text)))?;
                    if size > MAX_CHUNK_SIZE {
                        return Err(NetconfError::Framing(format!(
                            "chunk size {} exceeds maximum {}",
                            size, MAX_CHUNK_SIZE
                        )));
                    }
                    let size = usize::try_from(size)
                        .map_err(|_| NetconfError::Framing(format!("chunk size {}", size)))?;
                    Ok(Some((ChunkHeader::Data(size), digits + 2)))
                }
                Some(other) => Err(NetconfError::Framing(format!(
                    "unexpected byte 0x{:02x} in chunk size",
                    other
                ))),
            }
        }
        Some(other) => Err(NetconfError::Framing(format!(
            "invalid chunk size start 0x{:02x}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_chunked() {
        let framed = encode_message("<rpc/>", FramingMode::Chunked);
        assert_eq!(&framed[..], b"\n#6\n<rpc/>\n##\n");
    }

    #[test]
    fn test_encode_chunked_uses_byte_length() {
        // "é" is two bytes in UTF-8.
        let framed = encode_message("<a>é</a>", FramingMode::Chunked);
        assert!(framed.starts_with(b"\n#9\n"));
    }

    #[test]
    fn test_encode_end_of_message() {
        let framed = encode_message("<hello/>", FramingMode::EndOfMessage);
        assert_eq!(&framed[..], b"<hello/>\n]]>]]>");
    }

    #[test]
    fn test_decode_data_header() {
        let (header, consumed) = decode_chunk_header(b"#42\n<rpc").unwrap().unwrap();
        assert_eq!(header, ChunkHeader::Data(42));
        assert_eq!(consumed, 4);
    }

    #[test]
    fn test_decode_end_marker() {
        let (header, consumed) = decode_chunk_header(b"##\n").unwrap().unwrap();
        assert_eq!(header, ChunkHeader::End);
        assert_eq!(consumed, 3);
    }

    #[test]
    fn test_decode_incomplete() {
        assert!(decode_chunk_header(b"").unwrap().is_none());
        assert!(decode_chunk_header(b"#").unwrap().is_none());
        assert!(decode_chunk_header(b"#12").unwrap().is_none());
        assert!(decode_chunk_header(b"##").unwrap().is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_chunk_header(b"<rpc-reply>").is_err());
        assert!(decode_chunk_header(b"#0\n").is_err());
        assert!(decode_chunk_header(b"#-1\n").is_err());
        assert!(decode_chunk_header(b"#12x\n").is_err());
        assert!(decode_chunk_header(b"##x").is_err());
        assert!(decode_chunk_header(b"#12345678901\n").is_err());
        assert!(decode_chunk_header(b"#4294967296\n").is_err());
    }

    #[test]
    fn test_decode_max_chunk() {
        let (header, _) = decode_chunk_header(b"#4294967295\n").unwrap().unwrap();
        assert_eq!(header, ChunkHeader::Data(4_294_967_295));
    }
}
