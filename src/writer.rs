//! Dedicated writer task for outbound messages.
//!
//! The transport write half is owned by a single task fed through an mpsc
//! channel, so concurrent callers never contend for a lock and queued
//! messages can be written together in one vectored write.
//!
//! # Architecture
//!
//! ```text
//! rpc() 1 ─┐
//! rpc() 2 ─┼─► mpsc::Sender<OutboundMessage> ─► Writer Task ─► transport
//! rpc() N ─┘
//! ```
//!
//! When every handle is dropped the task shuts the write half down, which
//! the peer sees as end of stream.

use std::io::IoSlice;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{NetconfError, Result};
use crate::protocol::{encode_message, FramingMode};

/// Default maximum queued messages before backpressure kicks in.
pub const DEFAULT_MAX_PENDING_MESSAGES: usize = 1024;

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default backpressure timeout.
pub const DEFAULT_BACKPRESSURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum messages to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// A framed message ready to be written.
#[derive(Debug)]
pub struct OutboundMessage {
    frame: Bytes,
}

impl OutboundMessage {
    /// Frame `xml` for the wire in the given mode.
    pub fn new(xml: &str, mode: FramingMode) -> Self {
        Self {
            frame: encode_message(xml, mode),
        }
    }

    /// Total size on the wire.
    #[inline]
    pub fn size(&self) -> usize {
        self.frame.len()
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Maximum queued messages before backpressure kicks in.
    pub max_pending_messages: usize,
    /// Channel capacity for the message queue.
    pub channel_capacity: usize,
    /// Timeout when waiting for backpressure to clear.
    pub backpressure_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_pending_messages: DEFAULT_MAX_PENDING_MESSAGES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            backpressure_timeout: DEFAULT_BACKPRESSURE_TIMEOUT,
        }
    }
}

/// Handle for sending messages to the writer task.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundMessage>,
    /// Queued message count (for backpressure).
    pending: Arc<AtomicUsize>,
    max_pending: usize,
    timeout: Duration,
}

impl WriterHandle {
    fn new(
        tx: mpsc::Sender<OutboundMessage>,
        pending: Arc<AtomicUsize>,
        max_pending: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            tx,
            pending,
            max_pending,
            timeout,
        }
    }

    /// Queue a message for the writer task.
    ///
    /// Waits while backpressure is active, timing out after the configured
    /// duration.
    pub async fn send(&self, message: OutboundMessage) -> Result<()> {
        if self.pending.load(Ordering::Acquire) >= self.max_pending {
            self.wait_for_backpressure().await?;
        }

        // Count before sending so the writer never decrements below zero.
        self.pending.fetch_add(1, Ordering::AcqRel);

        self.tx.send(message).await.map_err(|_| {
            self.pending.fetch_sub(1, Ordering::Release);
            NetconfError::ConnectionClosed
        })
    }

    async fn wait_for_backpressure(&self) -> Result<()> {
        let start = Instant::now();
        let check_interval = Duration::from_micros(100);

        loop {
            if self.pending.load(Ordering::Acquire) < self.max_pending {
                return Ok(());
            }

            if start.elapsed() > self.timeout {
                return Err(NetconfError::BackpressureTimeout);
            }

            tokio::time::sleep(check_interval).await;
        }
    }
}

/// Spawn the writer task and return a handle for sending messages.
///
/// The `JoinHandle` resolves when the channel closes (`Ok`) or a write
/// fails (`Err`).
pub fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let pending = Arc::new(AtomicUsize::new(0));

    let handle = WriterHandle::new(
        tx,
        pending.clone(),
        config.max_pending_messages,
        config.backpressure_timeout,
    );

    let task = tokio::spawn(writer_loop(rx, writer, pending));

    (handle, task)
}

async fn writer_loop<W>(
    mut rx: mpsc::Receiver<OutboundMessage>,
    mut writer: W,
    pending: Arc<AtomicUsize>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let Some(first) = rx.recv().await else {
            // Channel closed, clean shutdown
            if let Err(e) = writer.shutdown().await {
                tracing::debug!("Writer shutdown error: {}", e);
            }
            return Ok(());
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);

        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(message) => batch.push(message),
                Err(_) => break,
            }
        }

        let batch_size = batch.len();
        if let Err(e) = write_batch(&mut writer, &batch).await {
            tracing::error!("Write error: {}", e);
            return Err(e);
        }

        pending.fetch_sub(batch_size, Ordering::Release);
    }
}

/// Write a batch of messages using scatter/gather I/O.
async fn write_batch<W>(writer: &mut W, batch: &[OutboundMessage]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if batch.is_empty() {
        return Ok(());
    }

    let total_size: usize = batch.iter().map(OutboundMessage::size).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        if slices.is_empty() {
            break;
        }

        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(NetconfError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }

        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for the data left after `skip_bytes` were written.
fn build_remaining_slices(batch: &[OutboundMessage], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len());
    let mut offset = 0;

    for message in batch {
        let end = offset + message.frame.len();
        if skip_bytes < end {
            let start = skip_bytes.saturating_sub(offset);
            slices.push(IoSlice::new(&message.frame[start..]));
        }
        offset = end;
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::{duplex, AsyncReadExt};

    fn chunked(xml: &str) -> OutboundMessage {
        OutboundMessage::new(xml, FramingMode::Chunked)
    }

    #[test]
    fn test_outbound_frames() {
        assert_eq!(&chunked("<rpc/>").frame[..], b"\n#6\n<rpc/>\n##\n");
        assert_eq!(chunked("<rpc/>").size(), 4 + 6 + 4);

        let hello = OutboundMessage::new("<hello/>", FramingMode::EndOfMessage);
        assert_eq!(&hello.frame[..], b"<hello/>\n]]>]]>");
    }

    #[test]
    fn test_writer_config_default() {
        let config = WriterConfig::default();
        assert_eq!(config.max_pending_messages, DEFAULT_MAX_PENDING_MESSAGES);
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.backpressure_timeout, DEFAULT_BACKPRESSURE_TIMEOUT);
    }

    #[tokio::test]
    async fn test_writer_handle_send() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, WriterConfig::default());

        handle.send(chunked("<rpc/>")).await.unwrap();

        let mut buf = vec![0u8; 14];
        server.read_exact(&mut buf).await.unwrap();

        assert_eq!(&buf, b"\n#6\n<rpc/>\n##\n");
    }

    #[tokio::test]
    async fn test_writer_batching() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, WriterConfig::default());

        for i in 0..10 {
            handle.send(chunked(&format!("<m{}/>", i))).await.unwrap();
        }
        drop(handle);

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();

        let expected: Vec<u8> = (0..10)
            .flat_map(|i| format!("\n#5\n<m{}/>\n##\n", i).into_bytes())
            .collect();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_send_waits_out_backpressure() {
        let (tx, _rx) = mpsc::channel::<OutboundMessage>(10);
        let pending = Arc::new(AtomicUsize::new(4));
        let handle = WriterHandle::new(tx, pending, 4, Duration::from_millis(20));

        let result = handle.send(chunked("<rpc/>")).await;
        assert!(matches!(result, Err(NetconfError::BackpressureTimeout)));
    }

    #[tokio::test]
    async fn test_send_after_writer_stopped() {
        let (tx, rx) = mpsc::channel::<OutboundMessage>(10);
        drop(rx);
        let pending = Arc::new(AtomicUsize::new(0));
        let handle = WriterHandle::new(tx, pending.clone(), 10, Duration::from_secs(1));

        let result = handle.send(chunked("<rpc/>")).await;
        assert!(matches!(result, Err(NetconfError::ConnectionClosed)));
        assert_eq!(pending.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_build_remaining_slices_no_skip() {
        let batch = vec![chunked("hello"), chunked("world")];

        let slices = build_remaining_slices(&batch, 0);
        assert_eq!(slices.len(), 2);
    }

    #[test]
    fn test_build_remaining_slices_partial() {
        let batch = vec![
            chunked("hello"),
            OutboundMessage::new("<hello/>", FramingMode::EndOfMessage),
        ];
        let first = batch[0].size();

        let slices = build_remaining_slices(&batch, 2);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].len(), first - 2);

        let slices = build_remaining_slices(&batch, first + 3);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].len(), batch[1].size() - 3);
    }

    #[tokio::test]
    async fn test_write_batch_multiple() {
        let mut buf = Cursor::new(Vec::new());

        let batch: Vec<_> = (0..5).map(|_| chunked("abc")).collect();

        write_batch(&mut buf, &batch).await.unwrap();

        let written = buf.into_inner();
        assert_eq!(written.len(), 5 * (4 + 3 + 4));
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_channel_close() {
        let (client, mut server) = duplex(4096);
        let (handle, task) = spawn_writer_task(client, WriterConfig::default());

        drop(handle);

        let result = task.await.unwrap();
        assert!(result.is_ok());

        // Peer sees end of stream.
        let mut buf = Vec::new();
        assert_eq!(server.read_to_end(&mut buf).await.unwrap(), 0);
    }
}
