//! Base protocol operations.

use crate::client::Client;
use crate::codec::Element;
use crate::error::Result;
use crate::protocol::{Request, RpcReply};

/// A configuration datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datastore {
    Running,
    Candidate,
    Startup,
}

impl Datastore {
    pub fn as_str(self) -> &'static str {
        match self {
            Datastore::Running => "running",
            Datastore::Candidate => "candidate",
            Datastore::Startup => "startup",
        }
    }
}

/// `<get-config><source><{datastore}/></source></get-config>`
pub(crate) fn get_config_request(datastore: Datastore) -> Request {
    Request::operation(
        Element::new("get-config")
            .with_child(Element::new("source").with_child(Element::new(datastore.as_str()))),
    )
}

impl Client {
    /// Retrieve a whole configuration datastore.
    pub async fn get_config(&self, datastore: Datastore) -> Result<RpcReply> {
        self.rpc(get_config_request(datastore)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_config_request() {
        let xml = get_config_request(Datastore::Candidate).render(101).unwrap();
        assert!(xml.contains("<get-config><source><candidate/></source></get-config>"));
    }
}
