//! Client configuration.
//!
//! Built through [`ClientBuilder`](crate::ClientBuilder); every field has a
//! usable default except the host and username needed by the SSH transport.

use std::fmt;
use std::time::Duration;

use crate::codec::ParseOptions;
use crate::protocol::DEFAULT_MAX_MESSAGE_SIZE;
use crate::writer::WriterConfig;

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Authentication material. Secrets are redacted from `Debug` output.
#[derive(Clone, Default)]
pub struct Credentials {
    pub password: Option<String>,
    /// PEM or OpenSSH encoded private key.
    pub private_key: Option<String>,
    pub passphrase: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("password", &redact(&self.password))
            .field("private_key", &redact(&self.private_key))
            .field("passphrase", &redact(&self.passphrase))
            .finish()
    }
}

/// Transport algorithm preferences, by name, most preferred first.
///
/// An empty list keeps the SSH library defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Algorithms {
    pub kex: Vec<String>,
    pub cipher: Vec<String>,
    pub mac: Vec<String>,
    pub host_key: Vec<String>,
}

impl Algorithms {
    pub fn is_default(&self) -> bool {
        self.kex.is_empty()
            && self.cipher.is_empty()
            && self.mac.is_empty()
            && self.host_key.is_empty()
    }
}

/// Settings for one client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub credentials: Credentials,
    pub algorithms: Algorithms,
    /// Log every message sent and received at `debug` level.
    pub debug: bool,
    /// Attach the original XML to every reply.
    pub raw: bool,
    /// Keep attributes under `"$"` in decoded replies.
    pub preserve_attributes: bool,
    /// Default bound for each RPC. `None` waits indefinitely.
    pub rpc_timeout: Option<Duration>,
    /// Largest inbound message accepted.
    pub max_message_size: usize,
    pub writer: WriterConfig,
}

impl ClientConfig {
    /// Decoder options derived from this configuration.
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            preserve_attributes: self.preserve_attributes,
            ..ParseOptions::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            username: String::new(),
            credentials: Credentials::default(),
            algorithms: Algorithms::default(),
            debug: false,
            raw: false,
            preserve_attributes: true,
            rpc_timeout: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            writer: WriterConfig::default(),
        }
    }
}
