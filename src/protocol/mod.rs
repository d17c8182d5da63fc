//! Protocol module - wire format, framing, and message types.
//!
//! This module implements the NETCONF message layer:
//! - end-of-message and chunked framing (RFC 6242)
//! - message buffer for accumulating partial reads
//! - `<rpc>` envelope rendering and reply classification

mod envelope;
mod message;
mod message_buffer;
mod reply;
mod wire_format;

pub use envelope::Request;
pub use message::Message;
pub use message_buffer::MessageBuffer;
pub(crate) use reply::has_rpc_error;
pub use reply::{text_of, Hello, Reply, RpcErrorInfo, RpcFailure, RpcReply};
pub use wire_format::{
    decode_chunk_header, encode_chunk_header, encode_message, ChunkHeader, FramingMode,
    BASE_CAPABILITY_1_0, BASE_CAPABILITY_1_1, BASE_NAMESPACE, DEFAULT_MAX_MESSAGE_SIZE,
    END_OF_CHUNKS, EOM_DELIMITER, MAX_CHUNK_SIZE,
};
