//! # netconf-client
//!
//! Async NETCONF client for network devices.
//!
//! ## Architecture
//!
//! - **Transport**: SSH `netconf` subsystem (`ssh` feature) or any duplex stream
//! - **Framing**: `]]>]]>` for the hello exchange, RFC 6242 chunks afterwards
//! - **Dispatch**: each `<rpc>` gets a `message-id`; replies are routed back by
//!   that id, so several calls may be in flight at once
//! - **Decoding**: replies become `serde_json::Value` trees with
//!   field-friendly names (`host-name` → `host_name`)
//!
//! ## Example
//!
//! ```ignore
//! use netconf_client::{Client, LoadOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::builder()
//!         .host("192.0.2.1")
//!         .username("admin")
//!         .password("secret")
//!         .connect()
//!         .await?;
//!
//!     client.junos_open_private().await?;
//!     client.junos_load(LoadOptions::set("set system host-name r1")).await?;
//!     println!("{}", client.junos_compare().await?);
//!     client.junos_commit().await?;
//!     client.junos_close_private().await?;
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod operations;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod writer;

mod client;
mod pending;

pub use client::{Client, ClientBuilder};
pub use config::{Algorithms, ClientConfig, Credentials};
pub use error::{NetconfError, Result};
pub use operations::{ConfigFormat, ConfigPayload, Datastore, Facts, LoadAction, LoadOptions};
pub use protocol::{Reply, Request, RpcErrorInfo, RpcFailure, RpcReply};
pub use session::SessionState;
