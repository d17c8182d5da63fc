//! SSH transport using `russh`.
//!
//! Connects, authenticates (private key first, then password), opens a
//! session channel and requests the `netconf` subsystem. The returned
//! stream carries raw subsystem bytes.
//!
//! Server host keys are accepted without verification.

use std::borrow::Cow;
use std::sync::Arc;

use russh::client::{self, Handle, Msg};
use russh::{ChannelStream, Disconnect, Preferred};
use russh_keys::key;
use tokio::sync::oneshot;

use super::TransportGuard;
use crate::config::{Algorithms, ClientConfig};
use crate::error::{NetconfError, Result};

/// SSH subsystem name for NETCONF.
pub const SUBSYSTEM: &str = "netconf";

/// Stream type produced by [`connect`].
pub type SshStream = ChannelStream<Msg>;

struct DeviceHandler;

impl client::Handler for DeviceHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

fn ssh_error(e: impl std::fmt::Display) -> NetconfError {
    NetconfError::Ssh(e.to_string())
}

/// Open the `netconf` subsystem on `config.host`.
///
/// # Errors
///
/// - `InvalidArgument` if no configured algorithm is supported
/// - `Ssh` on connection, authentication or channel failure
pub async fn connect(config: &ClientConfig) -> Result<(SshStream, TransportGuard)> {
    let ssh_config = Arc::new(client::Config {
        preferred: preferred(&config.algorithms)?,
        ..Default::default()
    });

    tracing::debug!("Connecting to {}:{}", config.host, config.port);
    let mut handle = client::connect(
        ssh_config,
        (config.host.as_str(), config.port),
        DeviceHandler,
    )
    .await
    .map_err(ssh_error)?;

    authenticate(&mut handle, config).await?;

    let channel = handle.channel_open_session().await.map_err(ssh_error)?;
    channel
        .request_subsystem(true, SUBSYSTEM)
        .await
        .map_err(ssh_error)?;
    tracing::debug!("Opened {} subsystem", SUBSYSTEM);

    let stream = channel.into_stream();

    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let _ = rx.await;
        if let Err(e) = handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            tracing::debug!("SSH disconnect error: {}", e);
        }
    });

    Ok((stream, TransportGuard::new(tx)))
}

async fn authenticate(handle: &mut Handle<DeviceHandler>, config: &ClientConfig) -> Result<()> {
    let credentials = &config.credentials;

    if let Some(pem) = &credentials.private_key {
        let pair = russh_keys::decode_secret_key(pem, credentials.passphrase.as_deref())
            .map_err(|e| NetconfError::Ssh(format!("private key: {}", e)))?;
        let accepted = handle
            .authenticate_publickey(config.username.clone(), Arc::new(pair))
            .await
            .map_err(ssh_error)?;
        if accepted {
            return Ok(());
        }
        tracing::debug!("Public key rejected for {}", config.username);
    }

    if let Some(password) = &credentials.password {
        let accepted = handle
            .authenticate_password(config.username.clone(), password.clone())
            .await
            .map_err(ssh_error)?;
        if accepted {
            return Ok(());
        }
    }

    Err(NetconfError::Ssh(format!(
        "authentication failed for {}",
        config.username
    )))
}

/// Restrict the library defaults to the configured algorithm names.
fn preferred(algorithms: &Algorithms) -> Result<Preferred> {
    let defaults = Preferred::default();
    Ok(Preferred {
        kex: pick(&defaults.kex, &algorithms.kex, "kex")?,
        key: pick(&defaults.key, &algorithms.host_key, "host key")?,
        cipher: pick(&defaults.cipher, &algorithms.cipher, "cipher")?,
        mac: pick(&defaults.mac, &algorithms.mac, "mac")?,
        ..defaults
    })
}

fn pick<N>(supported: &[N], wanted: &[String], kind: &str) -> Result<Cow<'static, [N]>>
where
    N: AsRef<str> + Clone + 'static,
{
    if wanted.is_empty() {
        return Ok(Cow::Owned(supported.to_vec()));
    }

    let picked: Vec<N> = wanted
        .iter()
        .filter_map(|name| supported.iter().find(|n| n.as_ref() == name.as_str()).cloned())
        .collect();

    if picked.is_empty() {
        return Err(NetconfError::InvalidArgument(format!(
            "no supported {} algorithm in {:?}",
            kind, wanted
        )));
    }
    Ok(Cow::Owned(picked))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_keeps_order_of_wanted() {
        let supported = ["a", "b", "c"];
        let picked = pick(&supported[..], &["c".to_string(), "a".to_string()], "kex").unwrap();
        assert_eq!(picked.as_ref(), &["c", "a"]);
    }

    #[test]
    fn test_pick_defaults_and_unknown() {
        let supported = ["a", "b"];
        assert_eq!(pick(&supported[..], &[], "mac").unwrap().len(), 2);
        assert!(matches!(
            pick(&supported[..], &["z".to_string()], "mac"),
            Err(NetconfError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_preferred_default() {
        assert!(preferred(&Algorithms::default()).is_ok());
    }
}
