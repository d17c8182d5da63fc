//! Transport module - byte streams carrying the NETCONF subsystem.
//!
//! The session engine runs over any `AsyncRead + AsyncWrite` stream. With
//! the `ssh` feature, [`ssh::connect`] opens one over SSH.

use tokio::sync::oneshot;

#[cfg(feature = "ssh")]
pub mod ssh;

/// Keeps the underlying connection alive for as long as the session runs.
///
/// Dropping the guard signals the transport to disconnect. Streams with no
/// separate connection object use [`TransportGuard::none`].
pub struct TransportGuard {
    shutdown: Option<oneshot::Sender<()>>,
}

impl TransportGuard {
    /// Guard that signals `shutdown` when dropped.
    pub fn new(shutdown: oneshot::Sender<()>) -> Self {
        Self {
            shutdown: Some(shutdown),
        }
    }

    pub fn none() -> Self {
        Self { shutdown: None }
    }
}

impl Drop for TransportGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
