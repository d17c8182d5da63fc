//! Fetch the running configuration of a device.
//!
//! This example demonstrates:
//! - Connecting over SSH with the builder pattern
//! - Sending `get-config` and printing the reply XML
//! - Closing the session, with the IOS workaround when asked for
//!
//! # Running
//!
//! ```sh
//! NETCONF_HOST=192.0.2.1 NETCONF_USER=admin NETCONF_PASSWORD=secret \
//!     RUST_LOG=netconf_client=debug \
//!     cargo run --example netconf_get --features ssh
//! ```
//!
//! Set `NETCONF_IOS=1` for Cisco IOS devices.

use std::env;

use netconf_client::{Client, Datastore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let host = env::var("NETCONF_HOST")?;
    let port = env::var("NETCONF_PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(830);

    let mut client = Client::builder()
        .host(host)
        .port(port)
        .username(env::var("NETCONF_USER")?)
        .password(env::var("NETCONF_PASSWORD")?)
        .raw(true)
        .connect()
        .await?;

    tracing::info!("Connected, session {:?}", client.session_id());

    let reply = client.get_config(Datastore::Running).await?;
    println!("{}", reply.raw().unwrap_or_default());

    if env::var_os("NETCONF_IOS").is_some() {
        client.ios_close().await;
    } else {
        client.close().await?;
    }

    Ok(())
}
