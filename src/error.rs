//! Error types for netconf-client.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::RpcFailure;
use crate::session::SessionState;

/// Main error type for all NETCONF operations.
#[derive(Debug, Error)]
pub enum NetconfError {
    /// I/O error on the transport stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SSH connection, authentication or channel failure.
    #[error("SSH error: {0}")]
    Ssh(String),

    /// Inbound bytes violate the message framing.
    #[error("Framing error: {0}")]
    Framing(String),

    /// Inbound XML could not be parsed.
    #[error("XML error: {0}")]
    Xml(String),

    /// Outgoing request could not be serialized. The session stays usable.
    #[error("Encode error: {0}")]
    Encode(String),

    /// The peer answered with an `rpc-error`, either at the top level of the
    /// reply or inside a vendor result element.
    #[error("RPC error: {0}")]
    Rpc(RpcFailure),

    /// Well-formed message that makes no sense at this point of the session.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The peer hello did not carry a usable session identifier.
    #[error("NETCONF session not established")]
    SessionNotEstablished,

    /// Operation not allowed in the current session state.
    #[error("Invalid session state: {0:?}")]
    InvalidState(SessionState),

    /// Caller supplied an unusable argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No reply arrived within the call timeout.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The session ended before the reply arrived.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Backpressure timeout - write queue full.
    #[error("Backpressure timeout")]
    BackpressureTimeout,
}

impl NetconfError {
    /// The `rpc-error` payload, if this is a protocol error.
    pub fn rpc_failure(&self) -> Option<&RpcFailure> {
        match self {
            NetconfError::Rpc(failure) => Some(failure),
            _ => None,
        }
    }

    /// Whether the error ends the session (transport tier).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            NetconfError::Io(_)
                | NetconfError::Ssh(_)
                | NetconfError::Framing(_)
                | NetconfError::ConnectionClosed
        )
    }
}

/// Result type alias using NetconfError.
pub type Result<T> = std::result::Result<T, NetconfError>;
