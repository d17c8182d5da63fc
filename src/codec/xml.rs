//! XML codec using `quick-xml`.
//!
//! Decoding produces a `serde_json::Value` tree shaped for field-style access:
//!
//! - element and attribute names have `-` and `:` replaced by `_`
//! - text and attribute values are trimmed and numeric strings become numbers
//! - empty elements decode to `true` (`<ok/>` → `"ok": true`)
//! - repeated sibling elements collapse into an array
//! - attributes live under `"$"`, text of an element that also has
//!   attributes or children lives under `"_"`
//!
//! The document value is an object with a single key, the root name.

use std::fmt::Display;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::{Map, Number, Value};

use super::Element;
use crate::error::{NetconfError, Result};

/// Key holding an element's attributes.
pub const ATTRIBUTE_KEY: &str = "$";

/// Key holding the text of an element that also has attributes or children.
pub const TEXT_KEY: &str = "_";

static NULL: Value = Value::Null;

/// Normalization applied while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Keep attributes under `"$"`. When off, attributes are dropped.
    pub preserve_attributes: bool,
    /// Turn integer and decimal strings into JSON numbers.
    pub coerce_numbers: bool,
    /// Trim surrounding whitespace from text and attribute values.
    pub trim: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            preserve_attributes: true,
            coerce_numbers: true,
            trim: true,
        }
    }
}

/// A decoded XML document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Local name of the root element, as written (no prefix, not sanitized).
    pub root: String,
    /// Root attributes with their original names and unescaped values.
    pub root_attributes: Vec<(String, String)>,
    /// Normalized tree keyed by the sanitized root name.
    pub value: Value,
}

impl Document {
    /// Root attribute by local name (`message-id`, `xmlns`, ...).
    pub fn root_attr(&self, key: &str) -> Option<&str> {
        self.root_attributes
            .iter()
            .find(|(name, _)| local_name(name) == key)
            .map(|(_, value)| value.as_str())
    }

    /// Normalized content of the root element.
    pub fn body(&self) -> &Value {
        self.value
            .as_object()
            .and_then(|map| map.values().next())
            .unwrap_or(&NULL)
    }
}

/// Replace characters that prevent field-style navigation.
pub fn sanitize_name(name: &str) -> String {
    name.replace(['-', ':'], "_")
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn xml_error(e: impl Display) -> NetconfError {
    NetconfError::Xml(e.to_string())
}

fn encode_error(e: impl Display) -> NetconfError {
    NetconfError::Encode(e.to_string())
}

/// XML codec for NETCONF payloads.
pub struct XmlCodec;

impl XmlCodec {
    /// Serialize an element tree without an XML declaration.
    ///
    /// # Errors
    ///
    /// Returns `Encode` if an element or attribute name is not a valid XML
    /// name, or if text contains characters XML 1.0 cannot carry.
    pub fn encode(element: &Element) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        write_element(&mut writer, element)?;
        String::from_utf8(writer.into_inner()).map_err(encode_error)
    }

    /// Serialize an element tree preceded by `<?xml version="1.0" encoding="UTF-8"?>`.
    pub fn encode_document(element: &Element) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(encode_error)?;
        write_element(&mut writer, element)?;
        String::from_utf8(writer.into_inner()).map_err(encode_error)
    }

    /// Parse a complete document.
    ///
    /// # Errors
    ///
    /// Returns `Xml` for malformed input: mismatched or unclosed tags, text
    /// outside the root, no root, or more than one root.
    pub fn decode(xml: &str, options: &ParseOptions) -> Result<Document> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<Node> = Vec::new();
        let mut root: Option<(String, Vec<(String, String)>)> = None;
        let mut value: Option<Value> = None;

        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(start) => {
                    let node = open_node(&start, stack.is_empty(), &mut root, options)?;
                    stack.push(node);
                }
                Event::Empty(start) => {
                    let node = open_node(&start, stack.is_empty(), &mut root, options)?;
                    close_node(node, &mut stack, &mut value, options);
                }
                Event::End(_) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| xml_error("unexpected closing tag"))?;
                    close_node(node, &mut stack, &mut value, options);
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(xml_error)?;
                    append_text(&mut stack, &text)?;
                }
                Event::CData(data) => {
                    let bytes = data.into_inner();
                    let text = std::str::from_utf8(&bytes).map_err(xml_error)?;
                    append_text(&mut stack, text)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(xml_error("unexpected end of document"));
        }

        match (root, value) {
            (Some((root, root_attributes)), Some(value)) => Ok(Document {
                root,
                root_attributes,
                value,
            }),
            _ => Err(xml_error("no root element")),
        }
    }

    /// Read the root element name and attributes without decoding the document.
    ///
    /// Used to route replies by `message-id` before the caller decodes them.
    /// Returns `Ok(None)` when the input holds no element at all.
    pub fn peek_root(xml: &str) -> Result<Option<Root>> {
        let mut reader = Reader::from_str(xml);

        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(start) | Event::Empty(start) => {
                    let qualified = std::str::from_utf8(start.name().as_ref())
                        .map_err(xml_error)?
                        .to_string();
                    return Ok(Some(Root {
                        name: local_name(&qualified).to_string(),
                        attributes: read_attributes(&start)?,
                    }));
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }
}

/// Root element of a document, read without decoding the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    /// Local name, without namespace prefix.
    pub name: String,
    /// Attributes with their original names and unescaped values.
    pub attributes: Vec<(String, String)>,
}

impl Root {
    /// Attribute by local name.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| local_name(name) == key)
            .map(|(_, value)| value.as_str())
    }
}

/// An element being decoded.
struct Node {
    name: String,
    attributes: Map<String, Value>,
    children: Map<String, Value>,
    text: String,
}

impl Node {
    fn finish(self, options: &ParseOptions) -> Value {
        let Node {
            attributes,
            mut children,
            text,
            ..
        } = self;
        let text = if options.trim { text.trim() } else { text.as_str() };

        if children.is_empty() && attributes.is_empty() {
            if text.is_empty() {
                return Value::Bool(true);
            }
            return coerce(text, options);
        }

        if !attributes.is_empty() {
            children.insert(ATTRIBUTE_KEY.to_string(), Value::Object(attributes));
        }
        if !text.is_empty() {
            children.insert(TEXT_KEY.to_string(), coerce(text, options));
        }
        Value::Object(children)
    }
}

fn open_node(
    start: &BytesStart<'_>,
    is_root: bool,
    root: &mut Option<(String, Vec<(String, String)>)>,
    options: &ParseOptions,
) -> Result<Node> {
    let qualified = std::str::from_utf8(start.name().as_ref())
        .map_err(xml_error)?
        .to_string();
    let raw_attributes = read_attributes(start)?;

    if is_root {
        if root.is_some() {
            return Err(xml_error("multiple root elements"));
        }
        *root = Some((
            local_name(&qualified).to_string(),
            raw_attributes.clone(),
        ));
    }

    let mut attributes = Map::new();
    if options.preserve_attributes {
        for (key, value) in &raw_attributes {
            let value = if options.trim { value.trim() } else { value.as_str() };
            attributes.insert(sanitize_name(key), coerce(value, options));
        }
    }

    Ok(Node {
        name: sanitize_name(&qualified),
        attributes,
        children: Map::new(),
        text: String::new(),
    })
}

fn close_node(
    node: Node,
    stack: &mut [Node],
    value: &mut Option<Value>,
    options: &ParseOptions,
) {
    let key = node.name.clone();
    let decoded = node.finish(options);

    match stack.last_mut() {
        Some(parent) => insert_child(&mut parent.children, key, decoded),
        None => {
            let mut map = Map::new();
            map.insert(key, decoded);
            *value = Some(Value::Object(map));
        }
    }
}

fn insert_child(children: &mut Map<String, Value>, key: String, value: Value) {
    match children.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            children.insert(key, value);
        }
    }
}

fn append_text(stack: &mut [Node], text: &str) -> Result<()> {
    match stack.last_mut() {
        Some(node) => {
            node.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(xml_error("text outside the root element")),
    }
}

fn read_attributes(start: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    start
        .attributes()
        .map(|attr| {
            let attr = attr.map_err(xml_error)?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(xml_error)?
                .to_string();
            let value = attr.unescape_value().map_err(xml_error)?.into_owned();
            Ok((key, value))
        })
        .collect()
}

fn coerce(text: &str, options: &ParseOptions) -> Value {
    if !options.coerce_numbers {
        return Value::String(text.to_string());
    }
    if let Ok(n) = text.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(n) = text.parse::<u64>() {
        return Value::from(n);
    }

    // Digit strings too long for an integer stay text (serial numbers).
    let decimal = text.bytes().any(|b| matches!(b, b'.' | b'e' | b'E'))
        && text
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if decimal {
        if let Some(n) = text.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }

    Value::String(text.to_string())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    validate_name(element.name())?;

    let mut start = BytesStart::new(element.name());
    for (key, value) in element.attributes() {
        validate_name(key)?;
        validate_text(value)?;
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(encode_error)?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(encode_error)?;
    if let Some(text) = element.text() {
        validate_text(text)?;
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(encode_error)?;
    }
    for child in element.children() {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name())))
        .map_err(encode_error)?;
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_alphabetic() || first == '_')
                && chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(NetconfError::Encode(format!("invalid XML name: {:?}", name)))
    }
}

fn validate_text(text: &str) -> Result<()> {
    let bad = text
        .chars()
        .find(|c| (*c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r'));

    match bad {
        Some(c) => Err(NetconfError::Encode(format!(
            "control character U+{:04X} not allowed in XML",
            c as u32
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">
  <capabilities>
    <capability>urn:ietf:params:netconf:base:1.0</capability>
    <capability>urn:ietf:params:netconf:base:1.1</capability>
  </capabilities>
  <session-id>7</session-id>
</hello>"#;

    #[test]
    fn test_decode_hello() {
        let doc = XmlCodec::decode(HELLO, &ParseOptions::default()).unwrap();

        assert_eq!(doc.root, "hello");
        assert_eq!(
            doc.root_attr("xmlns"),
            Some("urn:ietf:params:xml:ns:netconf:base:1.0")
        );

        let hello = doc.body();
        assert_eq!(hello["session_id"], 7);
        let caps = hello["capabilities"]["capability"].as_array().unwrap();
        assert_eq!(caps.len(), 2);
        assert_eq!(caps[1], "urn:ietf:params:netconf:base:1.1");
    }

    #[test]
    fn test_names_sanitized() {
        let xml = r#"<rpc-reply><junos:host-name>r1</junos:host-name></rpc-reply>"#;
        let doc = XmlCodec::decode(xml, &ParseOptions::default()).unwrap();

        assert_eq!(doc.root, "rpc-reply");
        assert_eq!(doc.value["rpc_reply"]["junos_host_name"], "r1");
    }

    #[test]
    fn test_empty_element_is_true() {
        let doc = XmlCodec::decode("<rpc-reply><ok/></rpc-reply>", &ParseOptions::default())
            .unwrap();
        assert_eq!(doc.body()["ok"], Value::Bool(true));

        let doc = XmlCodec::decode("<rpc-reply></rpc-reply>", &ParseOptions::default()).unwrap();
        assert_eq!(doc.body(), &Value::Bool(true));
    }

    #[test]
    fn test_number_coercion() {
        let xml = "<r><a>42</a><b> 3.5 </b><c>15.1R7</c><d>007</d><e>123456789012345678901234</e></r>";
        let doc = XmlCodec::decode(xml, &ParseOptions::default()).unwrap();
        let body = doc.body();

        assert_eq!(body["a"], 42);
        assert_eq!(body["b"], 3.5);
        assert_eq!(body["c"], "15.1R7");
        assert_eq!(body["d"], 7);
        assert_eq!(body["e"], "123456789012345678901234");
    }

    #[test]
    fn test_number_coercion_disabled() {
        let options = ParseOptions {
            coerce_numbers: false,
            ..ParseOptions::default()
        };
        let doc = XmlCodec::decode("<r><a>42</a></r>", &options).unwrap();
        assert_eq!(doc.body()["a"], "42");
    }

    #[test]
    fn test_attributes_preserved_and_ignored() {
        let xml = r#"<rpc-reply message-id="101"><up-time seconds="3600">1 hour</up-time></rpc-reply>"#;

        let doc = XmlCodec::decode(xml, &ParseOptions::default()).unwrap();
        let body = doc.body();
        assert_eq!(body["$"]["message_id"], 101);
        assert_eq!(body["up_time"]["$"]["seconds"], 3600);
        assert_eq!(body["up_time"]["_"], "1 hour");

        let options = ParseOptions {
            preserve_attributes: false,
            ..ParseOptions::default()
        };
        let doc = XmlCodec::decode(xml, &options).unwrap();
        assert!(doc.body().get("$").is_none());
        assert_eq!(doc.body()["up_time"], "1 hour");
        // Root attributes stay available for routing.
        assert_eq!(doc.root_attr("message-id"), Some("101"));
    }

    #[test]
    fn test_escapes_and_cdata() {
        let xml = "<r><a>x &amp; y</a><b><![CDATA[<raw>]]></b></r>";
        let doc = XmlCodec::decode(xml, &ParseOptions::default()).unwrap();

        assert_eq!(doc.body()["a"], "x & y");
        assert_eq!(doc.body()["b"], "<raw>");
    }

    #[test]
    fn test_malformed_documents() {
        let options = ParseOptions::default();

        assert!(XmlCodec::decode("<rpc-reply><ok/>", &options).is_err());
        assert!(XmlCodec::decode("<a></b>", &options).is_err());
        assert!(XmlCodec::decode("not xml at all", &options).is_err());
        assert!(XmlCodec::decode("", &options).is_err());
        assert!(XmlCodec::decode("<a/><b/>", &options).is_err());

        let err = XmlCodec::decode("<rpc-reply>", &options).unwrap_err();
        assert!(matches!(err, NetconfError::Xml(_)));
    }

    #[test]
    fn test_peek_root() {
        let xml = r#"<nc:rpc-reply xmlns:nc="urn:x" nc:message-id="205"><ok/></nc:rpc-reply>"#;
        let root = XmlCodec::peek_root(xml).unwrap().unwrap();

        assert_eq!(root.name, "rpc-reply");
        assert_eq!(root.attr("message-id"), Some("205"));
        assert_eq!(root.attr("missing"), None);

        assert!(XmlCodec::peek_root("").unwrap().is_none());
        assert!(XmlCodec::peek_root("<?xml version=\"1.0\"?>").unwrap().is_none());
    }

    #[test]
    fn test_encode_escapes() {
        let el = Element::new("configuration-text")
            .with_attr("note", "a\"b")
            .with_text("set x <y> & z");
        let xml = XmlCodec::encode(&el).unwrap();

        assert!(xml.starts_with("<configuration-text note=\"a&quot;b\">"));
        assert!(xml.contains("set x &lt;y&gt; &amp; z"));
        assert!(xml.ends_with("</configuration-text>"));
    }

    #[test]
    fn test_encode_document_declaration() {
        let xml = XmlCodec::encode_document(&Element::new("hello")).unwrap();
        assert_eq!(xml, r#"<?xml version="1.0" encoding="UTF-8"?><hello/>"#);
    }

    #[test]
    fn test_encode_rejects_invalid_names() {
        assert!(matches!(
            XmlCodec::encode(&Element::new("")),
            Err(NetconfError::Encode(_))
        ));
        assert!(XmlCodec::encode(&Element::new("get config")).is_err());
        assert!(XmlCodec::encode(&Element::new("1st")).is_err());
        assert!(XmlCodec::encode(&Element::new("ok").with_attr("bad name", "v")).is_err());
        assert!(XmlCodec::encode(&Element::new("ok").with_text("bell\u{7}")).is_err());
    }

    #[test]
    fn test_encode_then_decode_tree() {
        let el = Element::new("get-config")
            .with_child(Element::new("source").with_child(Element::new("running")));
        let xml = XmlCodec::encode(&el).unwrap();
        let doc = XmlCodec::decode(&xml, &ParseOptions::default()).unwrap();

        assert_eq!(doc.body()["source"]["running"], Value::Bool(true));
    }
}
