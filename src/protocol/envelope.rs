//! Outgoing `<rpc>` envelope.
//!
//! The envelope owns attribute injection: caller attributes survive,
//! `message-id` is always the dispatcher's value and the base namespace is
//! declared unless the caller chose its own.

use crate::codec::{Element, XmlCodec};
use crate::error::{NetconfError, Result};

use super::wire_format::BASE_NAMESPACE;

/// A request to send inside `<rpc>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Bare operation name, sent as an empty element (`<discard-changes/>`).
    Named(String),
    /// Operation tree with optional attributes for the `<rpc>` element itself.
    Structured {
        attributes: Vec<(String, String)>,
        operations: Vec<Element>,
    },
}

impl Request {
    pub fn named(name: impl Into<String>) -> Self {
        Request::Named(name.into())
    }

    /// A request carrying a single operation element.
    pub fn operation(element: Element) -> Self {
        Request::Structured {
            attributes: Vec::new(),
            operations: vec![element],
        }
    }

    /// Add an attribute to the `<rpc>` element.
    ///
    /// A `Named` request becomes `Structured`. A `message-id` given here is
    /// replaced when the request is rendered.
    pub fn with_rpc_attr(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let (mut attributes, operations) = match self {
            Request::Named(name) => (Vec::new(), vec![Element::new(name)]),
            Request::Structured {
                attributes,
                operations,
            } => (attributes, operations),
        };
        attributes.push((key.into(), value.into()));
        Request::Structured {
            attributes,
            operations,
        }
    }

    /// Name of the first operation, for logging.
    pub fn operation_name(&self) -> &str {
        match self {
            Request::Named(name) => name,
            Request::Structured { operations, .. } => {
                operations.first().map(Element::name).unwrap_or("")
            }
        }
    }

    /// Render the full `<rpc>` document for `message_id`.
    ///
    /// # Errors
    ///
    /// Returns `Encode` if the request has no operation or contains names
    /// that are not valid XML.
    pub fn render(&self, message_id: u64) -> Result<String> {
        let mut rpc = Element::new("rpc");

        match self {
            Request::Named(name) => {
                rpc = rpc.with_child(Element::new(name.as_str()));
            }
            Request::Structured {
                attributes,
                operations,
            } => {
                if operations.is_empty() {
                    return Err(NetconfError::Encode("rpc has no operation".to_string()));
                }
                for (key, value) in attributes {
                    rpc.set_attr(key.as_str(), value.as_str());
                }
                rpc = rpc.with_children(operations.iter().cloned());
            }
        }

        rpc.set_attr("message-id", message_id.to_string());
        if rpc.attr("xmlns").is_none() {
            rpc.set_attr("xmlns", BASE_NAMESPACE);
        }

        XmlCodec::encode(&rpc)
    }
}

impl From<&str> for Request {
    fn from(name: &str) -> Self {
        Request::Named(name.to_string())
    }
}

impl From<String> for Request {
    fn from(name: String) -> Self {
        Request::Named(name)
    }
}

impl From<Element> for Request {
    fn from(element: Element) -> Self {
        Request::operation(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_named() {
        let xml = Request::from("discard-changes").render(101).unwrap();
        assert_eq!(
            xml,
            r#"<rpc message-id="101" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><discard-changes/></rpc>"#
        );
    }

    #[test]
    fn test_render_structured() {
        let request = Request::operation(
            Element::new("get-config")
                .with_child(Element::new("source").with_child(Element::new("running"))),
        );
        let xml = request.render(102).unwrap();

        assert!(xml.starts_with(r#"<rpc message-id="102" xmlns="#));
        assert!(xml.contains("<get-config><source><running/></source></get-config>"));
        assert_eq!(request.operation_name(), "get-config");
    }

    #[test]
    fn test_caller_attributes_survive() {
        let request = Request::from("get")
            .with_rpc_attr("xmlns:junos", "http://xml.juniper.net/junos/*/junos")
            .with_rpc_attr("message-id", "1");
        let xml = request.render(105).unwrap();

        assert!(xml.contains(r#"xmlns:junos="http://xml.juniper.net/junos/*/junos""#));
        assert!(xml.contains(r#"message-id="105""#));
        assert!(!xml.contains(r#"message-id="1""#));
        assert!(xml.contains(r#"xmlns="urn:ietf:params:xml:ns:netconf:base:1.0""#));
        assert!(xml.contains("<get/>"));
    }

    #[test]
    fn test_caller_namespace_kept() {
        let xml = Request::from("get")
            .with_rpc_attr("xmlns", "urn:example")
            .render(101)
            .unwrap();

        assert!(xml.contains(r#"xmlns="urn:example""#));
        assert!(!xml.contains(BASE_NAMESPACE));
    }

    #[test]
    fn test_render_errors() {
        let empty = Request::Structured {
            attributes: Vec::new(),
            operations: Vec::new(),
        };
        assert!(matches!(empty.render(101), Err(NetconfError::Encode(_))));
        assert!(Request::from("bad name").render(101).is_err());
    }
}
