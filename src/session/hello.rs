//! Hello exchange.
//!
//! Both sides announce their capabilities with an end-of-message framed
//! `<hello>` right after the subsystem opens. The peer's hello carries the
//! session identifier; everything after it uses chunked framing.
//!
//! # Example
//!
//! ```
//! use netconf_client::session::build_hello;
//!
//! let xml = build_hello().unwrap();
//! assert!(xml.contains("<capability>urn:ietf:params:netconf:base:1.1</capability>"));
//! ```

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::codec::{Element, ParseOptions, XmlCodec};
use crate::error::{NetconfError, Result};
use crate::protocol::{
    FramingMode, Message, MessageBuffer, Reply, BASE_CAPABILITY_1_1, BASE_NAMESPACE,
};

/// Read buffer size for the hello exchange.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Build our hello document advertising base 1.1.
pub fn build_hello() -> Result<String> {
    let hello = Element::new("hello")
        .with_attr("xmlns", BASE_NAMESPACE)
        .with_child(
            Element::new("capabilities")
                .with_child(Element::new("capability").with_text(BASE_CAPABILITY_1_1)),
        );
    XmlCodec::encode_document(&hello)
}

/// Session data taken from a valid peer hello.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerHello {
    pub session_id: u32,
    pub capabilities: Vec<String>,
}

/// Validate the first message of a session.
///
/// # Errors
///
/// - `Xml` if the message is not well-formed
/// - `SessionNotEstablished` if the root is not `hello` or the
///   `session-id` is missing, not positive or out of range
pub fn accept_hello(text: &str, options: &ParseOptions) -> Result<PeerHello> {
    let Reply::Hello(hello) = Reply::parse(text, options, false)? else {
        return Err(NetconfError::SessionNotEstablished);
    };

    let session_id = hello
        .session_id
        .filter(|id| *id > 0)
        .and_then(|id| u32::try_from(id).ok())
        .ok_or(NetconfError::SessionNotEstablished)?;

    Ok(PeerHello {
        session_id,
        capabilities: hello.capabilities,
    })
}

/// Read until the peer hello is complete, then switch `buffer` to chunked
/// framing.
///
/// Bytes that followed the hello stay in `buffer`.
///
/// # Errors
///
/// `ConnectionClosed` on end of stream, `Io` on a read failure and
/// `Framing` if no delimiter shows up within the message size limit.
pub async fn read_hello<R>(reader: &mut R, buffer: &mut MessageBuffer) -> Result<Message>
where
    R: AsyncRead + Unpin,
{
    buffer.set_mode(FramingMode::EndOfMessage);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Err(NetconfError::ConnectionClosed);
        }

        let mut messages = buffer.push(&buf[..n])?.into_iter();
        if let Some(hello) = messages.next() {
            let extra = messages.count();
            if extra > 0 {
                tracing::warn!("Dropping {} messages received before hello completed", extra);
            }
            buffer.set_mode(FramingMode::Chunked);
            return Ok(hello);
        }
    }
}
