//! Session module - lifecycle state and the hello exchange.
//!
//! A session moves from `Disconnected` to `Established` once the peer hello
//! has been validated. Only then may RPCs be issued.

mod hello;
mod state;

pub use hello::{accept_hello, build_hello, read_hello, PeerHello};
pub use state::{Session, SessionState};
