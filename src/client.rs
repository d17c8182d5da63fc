//! Client builder and session runtime.
//!
//! The [`ClientBuilder`] provides a fluent API for configuring the client.
//! The [`Client`] manages the lifecycle:
//! 1. Open the transport (SSH `netconf` subsystem, or any duplex stream)
//! 2. Exchange hellos and record the session id
//! 3. Read messages and route replies to waiting callers by `message-id`
//! 4. Close the session and fail whatever is still outstanding
//!
//! # Example
//!
//! ```ignore
//! use netconf_client::{Client, Datastore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::builder()
//!         .host("192.0.2.1")
//!         .username("admin")
//!         .password("secret")
//!         .build();
//!
//!     client.open().await?;
//!     let reply = client.get_config(Datastore::Running).await?;
//!     println!("{}", reply.body());
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::task::JoinHandle;

use crate::codec::{ParseOptions, XmlCodec};
use crate::config::{Algorithms, ClientConfig};
use crate::error::{NetconfError, Result};
use crate::pending::PendingRequests;
use crate::protocol::{FramingMode, Message, MessageBuffer, Reply, Request, RpcReply};
use crate::session::{accept_hello, build_hello, read_hello, Session, SessionState};
use crate::transport::TransportGuard;
use crate::writer::{spawn_writer_task, OutboundMessage, WriterHandle};

/// Message ids are issued from here; the first RPC gets 101.
const INITIAL_MESSAGE_ID: u64 = 100;

/// Read buffer size for the receive loop.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Builder for configuring and creating a NETCONF client.
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Device address for the SSH transport.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Default: 22
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.credentials.password = Some(password.into());
        self
    }

    /// Private key in PEM or OpenSSH format. Tried before the password.
    pub fn private_key(mut self, key: impl Into<String>) -> Self {
        self.config.credentials.private_key = Some(key.into());
        self
    }

    /// Passphrase for an encrypted private key.
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.config.credentials.passphrase = Some(passphrase.into());
        self
    }

    /// Restrict SSH algorithm negotiation.
    pub fn algorithms(mut self, algorithms: Algorithms) -> Self {
        self.config.algorithms = algorithms;
        self
    }

    /// Log every message sent and received at `debug` level.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Attach the original XML text to every reply.
    pub fn raw(mut self, enabled: bool) -> Self {
        self.config.raw = enabled;
        self
    }

    /// Keep XML attributes in decoded replies.
    ///
    /// Default: true
    pub fn preserve_attributes(mut self, enabled: bool) -> Self {
        self.config.preserve_attributes = enabled;
        self
    }

    /// Default timeout applied to every `rpc` call.
    pub fn rpc_timeout(mut self, timeout: Duration) -> Self {
        self.config.rpc_timeout = Some(timeout);
        self
    }

    /// Largest inbound message accepted.
    ///
    /// Default: 256 MB
    pub fn max_message_size(mut self, limit: usize) -> Self {
        self.config.max_message_size = limit;
        self
    }

    /// Set the maximum queued outbound messages for backpressure.
    ///
    /// Default: 1024
    pub fn max_pending_messages(mut self, limit: usize) -> Self {
        self.config.writer.max_pending_messages = limit;
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.writer.channel_capacity = capacity;
        self
    }

    /// Set the backpressure timeout.
    ///
    /// Default: 5 seconds
    pub fn backpressure_timeout(mut self, timeout: Duration) -> Self {
        self.config.writer.backpressure_timeout = timeout;
        self
    }

    /// Build a disconnected client.
    pub fn build(self) -> Client {
        Client::new(self.config)
    }

    /// Build the client and open an SSH session.
    #[cfg(feature = "ssh")]
    pub async fn connect(self) -> Result<Client> {
        let mut client = self.build();
        client.open().await?;
        Ok(client)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Tasks and handles of an open transport.
///
/// Dropping it stops the read task and fails all outstanding requests. The
/// writer task finishes queued writes and shuts the write half down once
/// the last handle is gone.
struct Connection {
    writer: WriterHandle,
    pending: PendingRequests,
    read_task: JoinHandle<()>,
    supervisor: JoinHandle<()>,
    _guard: TransportGuard,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.read_task.abort();
        self.supervisor.abort();
        self.pending.fail_all();
    }
}

/// A NETCONF client.
///
/// `rpc` and the operations built on it take `&self`, so several calls may
/// be in flight at once; replies are matched by `message-id`.
pub struct Client {
    config: ClientConfig,
    session: Arc<Mutex<Session>>,
    connection: Option<Connection>,
    next_message_id: AtomicU64,
}

fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How a reply is decoded for one call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Decoding {
    pub options: ParseOptions,
    /// Keep the reply text on the decoded reply.
    pub keep_text: bool,
}

/// Decode and classify a reply.
fn decode(message: &Message, decoding: &Decoding) -> Result<RpcReply> {
    let text = message.text()?;
    match Reply::parse(text, &decoding.options, decoding.keep_text)? {
        Reply::RpcReply(reply) => Ok(reply),
        Reply::RpcError(failure) => Err(NetconfError::Rpc(failure)),
        Reply::Hello(_) => Err(NetconfError::Protocol(
            "hello received after session start".to_string(),
        )),
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            session: Arc::new(Mutex::new(Session::new())),
            connection: None,
            next_message_id: AtomicU64::new(INITIAL_MESSAGE_ID),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connect over SSH, open the `netconf` subsystem and exchange hellos.
    #[cfg(feature = "ssh")]
    pub async fn open(&mut self) -> Result<()> {
        lock(&self.session).begin_connect()?;

        let result = match crate::transport::ssh::connect(&self.config).await {
            Ok((stream, guard)) => self.start(stream, guard).await,
            Err(e) => Err(e),
        };
        if result.is_err() {
            lock(&self.session).fail();
        }
        result
    }

    /// Run the session over an already open duplex stream.
    ///
    /// The stream must deliver the NETCONF subsystem bytes (for instance an
    /// SSH channel opened elsewhere, or an in-memory device in tests).
    pub async fn open_with_stream<S>(&mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        lock(&self.session).begin_connect()?;

        let result = self.start(stream, TransportGuard::none()).await;
        if result.is_err() {
            lock(&self.session).fail();
        }
        result
    }

    async fn start<S>(&mut self, stream: S, guard: TransportGuard) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let debug = self.config.debug;
        let (mut reader, write_half) = tokio::io::split(stream);
        let (writer, writer_task) = spawn_writer_task(write_half, self.config.writer.clone());

        lock(&self.session).awaiting_hello()?;

        let hello = build_hello()?;
        if debug {
            tracing::debug!("Sending hello: {}", hello);
        }
        writer
            .send(OutboundMessage::new(&hello, FramingMode::EndOfMessage))
            .await?;

        let mut buffer =
            MessageBuffer::with_max_message_size(FramingMode::EndOfMessage, self.config.max_message_size);
        let message = read_hello(&mut reader, &mut buffer).await?;
        let text = message.text()?;
        if debug {
            tracing::debug!("Received hello: {}", text);
        }

        let peer = accept_hello(text, &self.config.parse_options())?;
        tracing::debug!(
            "Session {} established ({} capabilities)",
            peer.session_id,
            peer.capabilities.len()
        );
        lock(&self.session).establish(peer.session_id, peer.capabilities)?;

        let pending = PendingRequests::new();

        let read_task = {
            let pending = pending.clone();
            let session = self.session.clone();
            tokio::spawn(async move {
                match Self::read_loop(reader, buffer, &pending, debug).await {
                    Ok(()) => {
                        tracing::debug!("Transport closed by peer");
                        lock(&session).close();
                    }
                    Err(e) => {
                        tracing::error!("Read loop error: {}", e);
                        lock(&session).fail();
                    }
                }
                pending.fail_all();
            })
        };

        let supervisor = {
            let pending = pending.clone();
            let session = self.session.clone();
            tokio::spawn(async move {
                let failure = match writer_task.await {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(e) => Some(e.to_string()),
                };
                if let Some(reason) = failure {
                    tracing::error!("Writer task failed: {}", reason);
                    lock(&session).fail();
                    pending.fail_all();
                }
            })
        };

        self.connection = Some(Connection {
            writer,
            pending,
            read_task,
            supervisor,
            _guard: guard,
        });
        Ok(())
    }

    /// Main read loop - deframes messages and routes them to callers.
    ///
    /// Returns `Ok(())` on end of stream.
    async fn read_loop<R: AsyncRead + Unpin>(
        mut reader: R,
        mut buffer: MessageBuffer,
        pending: &PendingRequests,
        debug: bool,
    ) -> Result<()> {
        // Bytes that arrived together with the hello.
        for message in buffer.push(&[])? {
            Self::route_message(message, pending, debug);
        }

        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(e) => return Err(NetconfError::Io(e)),
            };

            for message in buffer.push(&buf[..n])? {
                Self::route_message(message, pending, debug);
            }
        }
    }

    /// Deliver one message to the request it answers.
    fn route_message(message: Message, pending: &PendingRequests, debug: bool) {
        let root = match message.text() {
            Ok(text) => {
                if debug {
                    tracing::debug!("Received: {}", text);
                }
                XmlCodec::peek_root(text)
            }
            Err(e) => Err(e),
        };

        let message_id = match root {
            Ok(Some(root)) if root.name == "notification" => {
                tracing::debug!("Ignoring notification");
                return;
            }
            Ok(Some(root)) => root
                .attr("message-id")
                .and_then(|id| id.trim().parse::<u64>().ok()),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!("Cannot read message root: {}", e);
                None
            }
        };

        let unmatched = match message_id {
            Some(id) => pending.resolve(id, message),
            None => pending.resolve_sole(message),
        };

        if let Some(message) = unmatched {
            match message_id {
                Some(id) => tracing::warn!("Dropping reply for unknown message-id {}", id),
                None => tracing::warn!(
                    "Dropping {} byte message without usable message-id",
                    message.len()
                ),
            }
        }
    }

    /// Send an RPC and wait for its reply.
    ///
    /// Uses the configured default timeout, if any.
    ///
    /// # Errors
    ///
    /// - `InvalidState` before the session is established or after it ended
    /// - `Encode` if the request cannot be serialized (nothing is sent)
    /// - `Rpc` if the reply carries `rpc-error`
    /// - `Xml` if the reply is not well-formed
    /// - `ConnectionClosed` if the session ends first
    pub async fn rpc(&self, request: impl Into<Request>) -> Result<RpcReply> {
        self.dispatch(request.into(), self.config.rpc_timeout, self.decoding())
            .await
    }

    /// Send an RPC, failing with `Timeout` if no reply arrives in time.
    pub async fn rpc_with_timeout(
        &self,
        request: impl Into<Request>,
        timeout: Duration,
    ) -> Result<RpcReply> {
        self.dispatch(request.into(), Some(timeout), self.decoding())
            .await
    }

    /// Send an RPC with decoding choices other than the session defaults.
    ///
    /// Used by operations that post-process the reply themselves.
    pub(crate) async fn rpc_decoded(
        &self,
        request: impl Into<Request>,
        decoding: Decoding,
    ) -> Result<RpcReply> {
        self.dispatch(request.into(), self.config.rpc_timeout, decoding)
            .await
    }

    /// Decoding choices from the session configuration.
    pub(crate) fn decoding(&self) -> Decoding {
        Decoding {
            options: self.config.parse_options(),
            keep_text: self.config.raw,
        }
    }

    async fn dispatch(
        &self,
        request: Request,
        timeout: Option<Duration>,
        decoding: Decoding,
    ) -> Result<RpcReply> {
        lock(&self.session).ensure_established()?;
        let connection = self
            .connection
            .as_ref()
            .ok_or_else(|| NetconfError::InvalidState(self.state()))?;

        let message_id = self.next_message_id.fetch_add(1, Ordering::Relaxed) + 1;
        let xml = request.render(message_id)?;
        if self.config.debug {
            tracing::debug!("Sending rpc {}: {}", message_id, xml);
        } else {
            tracing::trace!("Sending rpc {} ({})", message_id, request.operation_name());
        }

        let rx = connection.pending.register(message_id)?;
        let outbound = OutboundMessage::new(&xml, FramingMode::Chunked);
        if let Err(e) = connection.writer.send(outbound).await {
            connection.pending.remove(message_id);
            return Err(e);
        }

        let received = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    connection.pending.remove(message_id);
                    return Err(NetconfError::Timeout(limit));
                }
            },
            None => rx.await,
        };
        let message = received.map_err(|_| NetconfError::ConnectionClosed)?;

        decode(&message, &decoding)
    }

    /// Send `close-session`, then tear the session down.
    ///
    /// The session ends even if the peer rejects the request.
    pub async fn close(&mut self) -> Result<RpcReply> {
        let reply = self.rpc("close-session").await;
        self.teardown();
        reply
    }

    /// Drop the transport without sending `close-session`.
    ///
    /// Outstanding requests fail with `ConnectionClosed`.
    pub fn shutdown(&mut self) {
        self.teardown();
    }

    pub(crate) fn teardown(&mut self) {
        if self.connection.take().is_some() {
            tracing::debug!("Session torn down");
        }
        let mut session = lock(&self.session);
        if session.state() != SessionState::Disconnected {
            session.close();
        }
    }

    pub fn state(&self) -> SessionState {
        lock(&self.session).state()
    }

    /// Session id assigned by the peer hello.
    pub fn session_id(&self) -> Option<u32> {
        lock(&self.session).session_id()
    }

    /// Capabilities advertised by the peer.
    pub fn capabilities(&self) -> Vec<String> {
        lock(&self.session).capabilities().to_vec()
    }

    pub fn has_capability(&self, uri: &str) -> bool {
        lock(&self.session).capabilities().iter().any(|c| c == uri)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some() && self.state() == SessionState::Established
    }

    /// Toggle attaching the original XML to replies.
    pub fn set_raw(&mut self, enabled: bool) {
        self.config.raw = enabled;
    }

    /// Toggle keeping XML attributes in decoded replies.
    pub fn set_preserve_attributes(&mut self, enabled: bool) {
        self.config.preserve_attributes = enabled;
    }

    /// Number of RPCs waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.connection
            .as_ref()
            .map(|connection| connection.pending.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_default() {
        let client = ClientBuilder::default().build();

        assert_eq!(client.state(), SessionState::Disconnected);
        assert_eq!(client.config().port, 22);
        assert!(client.session_id().is_none());
        assert!(!client.is_connected());
        assert_eq!(client.pending_requests(), 0);
    }

    #[test]
    fn test_builder_configuration() {
        let client = Client::builder()
            .host("192.0.2.1")
            .port(830)
            .username("admin")
            .password("secret")
            .debug(true)
            .raw(true)
            .preserve_attributes(false)
            .rpc_timeout(Duration::from_secs(30))
            .max_message_size(1024)
            .max_pending_messages(2048)
            .channel_capacity(512)
            .backpressure_timeout(Duration::from_secs(10))
            .build();

        let config = client.config();
        assert_eq!(config.host, "192.0.2.1");
        assert_eq!(config.port, 830);
        assert_eq!(config.username, "admin");
        assert_eq!(config.credentials.password.as_deref(), Some("secret"));
        assert!(config.debug);
        assert!(config.raw);
        assert!(!config.preserve_attributes);
        assert_eq!(config.rpc_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.max_message_size, 1024);
        assert_eq!(config.writer.max_pending_messages, 2048);
        assert_eq!(config.writer.channel_capacity, 512);
        assert_eq!(config.writer.backpressure_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_runtime_toggles() {
        let mut client = Client::builder().build();
        client.set_raw(true);
        client.set_preserve_attributes(false);

        assert!(client.config().raw);
        assert!(!client.config().preserve_attributes);
    }

    #[tokio::test]
    async fn test_rpc_before_open() {
        let client = Client::builder().build();
        let result = client.rpc("get").await;

        assert!(matches!(
            result,
            Err(NetconfError::InvalidState(SessionState::Disconnected))
        ));
    }

    #[test]
    fn test_shutdown_when_disconnected() {
        let mut client = Client::builder().build();
        client.shutdown();
        assert_eq!(client.state(), SessionState::Disconnected);
    }
}
