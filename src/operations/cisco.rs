//! Cisco IOS operations.

use crate::client::Client;
use crate::protocol::RpcReply;

impl Client {
    /// Close a session on IOS devices that do not drop the connection after
    /// `close-session`.
    ///
    /// Sends `close-session` twice, ignoring errors from both, then tears the
    /// session down. Returns the second reply if one arrived.
    pub async fn ios_close(&mut self) -> Option<RpcReply> {
        if let Err(e) = self.rpc("close-session").await {
            tracing::debug!("First close-session failed: {}", e);
        }
        let reply = match self.rpc("close-session").await {
            Ok(reply) => Some(reply),
            Err(e) => {
                tracing::debug!("Second close-session failed: {}", e);
                None
            }
        };
        self.teardown();
        reply
    }
}
