//! Session lifecycle state.

use serde::Serialize;

use crate::error::{NetconfError, Result};

/// Lifecycle of a NETCONF session.
///
/// ```text
/// Disconnected → Connecting → AwaitingHello → Established → Closed
///                     └────────────┴──────────────┴──────→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    AwaitingHello,
    Established,
    Closed,
    Failed,
}

impl SessionState {
    /// Whether a transport is attached or being attached.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Connecting | SessionState::AwaitingHello | SessionState::Established
        )
    }
}

/// Negotiated session data.
///
/// `session_id` and the peer capabilities are set once, when the hello
/// exchange succeeds.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    session_id: Option<u32>,
    capabilities: Vec<String>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
            session_id: None,
            capabilities: Vec::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    pub fn session_id(&self) -> Option<u32> {
        self.session_id
    }

    #[inline]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Start connecting. Allowed from `Disconnected`, `Closed` or `Failed`;
    /// a reconnect clears the previous session data.
    pub fn begin_connect(&mut self) -> Result<()> {
        if self.state.is_active() {
            return Err(NetconfError::InvalidState(self.state));
        }
        self.state = SessionState::Connecting;
        self.session_id = None;
        self.capabilities.clear();
        Ok(())
    }

    /// The transport is up and our hello is on its way.
    pub fn awaiting_hello(&mut self) -> Result<()> {
        if self.state != SessionState::Connecting {
            return Err(NetconfError::InvalidState(self.state));
        }
        self.state = SessionState::AwaitingHello;
        Ok(())
    }

    /// Record the peer hello.
    pub fn establish(&mut self, session_id: u32, capabilities: Vec<String>) -> Result<()> {
        if self.state != SessionState::AwaitingHello || self.session_id.is_some() {
            return Err(NetconfError::InvalidState(self.state));
        }
        self.session_id = Some(session_id);
        self.capabilities = capabilities;
        self.state = SessionState::Established;
        Ok(())
    }

    /// Mark the session failed. A session that already ended stays as it is.
    pub fn fail(&mut self) {
        if self.state.is_active() || self.state == SessionState::Disconnected {
            self.state = SessionState::Failed;
        }
    }

    /// Mark the session closed. A failed session stays failed.
    pub fn close(&mut self) {
        if self.state != SessionState::Failed {
            self.state = SessionState::Closed;
        }
    }

    /// Require an established session.
    pub fn ensure_established(&self) -> Result<()> {
        if self.state == SessionState::Established {
            Ok(())
        } else {
            Err(NetconfError::InvalidState(self.state))
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
