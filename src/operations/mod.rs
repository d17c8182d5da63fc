//! Operations module - typed calls built on [`Client::rpc`](crate::Client::rpc).
//!
//! - base protocol: `get-config`
//! - Cisco IOS: session close workaround
//! - Juniper Junos: load, commit, private candidate, compare, rollback, facts

mod base;
mod cisco;
mod junos;

pub use base::Datastore;
pub use junos::{ConfigFormat, ConfigPayload, Facts, LoadAction, LoadOptions};
