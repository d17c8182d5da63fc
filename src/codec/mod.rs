//! Codec module - XML serialization/deserialization for message payloads.
//!
//! - [`Element`] - typed request tree rendered into outgoing XML
//! - [`XmlCodec`] - `quick-xml` backed encode/decode
//!
//! # Design
//!
//! Codecs are marker structs with static methods rather than trait objects,
//! so the rest of the crate only sees a narrow `encode`/`decode` surface.
//!
//! # Example
//!
//! ```
//! use netconf_client::codec::{Element, ParseOptions, XmlCodec};
//!
//! let request = Element::new("get-config")
//!     .with_child(Element::new("source").with_child(Element::new("running")));
//! let xml = XmlCodec::encode(&request).unwrap();
//! assert_eq!(xml, "<get-config><source><running/></source></get-config>");
//!
//! let doc = XmlCodec::decode("<data><host-name>r1</host-name></data>", &ParseOptions::default()).unwrap();
//! assert_eq!(doc.value["data"]["host_name"], "r1");
//! ```

mod element;
mod xml;

pub use element::Element;
pub use xml::{sanitize_name, Document, ParseOptions, Root, XmlCodec, ATTRIBUTE_KEY, TEXT_KEY};
