//! Classified inbound messages.

use std::fmt;

use serde_json::Value;

use crate::codec::{ParseOptions, XmlCodec};
use crate::error::Result;

/// A decoded and classified inbound message.
#[derive(Debug, Clone)]
pub enum Reply {
    /// The peer's capability announcement.
    Hello(Hello),
    /// A successful `rpc-reply`.
    RpcReply(RpcReply),
    /// An `rpc-reply` carrying `rpc-error`.
    RpcError(RpcFailure),
}

impl Reply {
    /// Decode `text` and classify it.
    ///
    /// With `raw` set, the original text is kept on successful replies.
    ///
    /// # Errors
    ///
    /// Returns `Xml` if `text` is not a well-formed document.
    pub fn parse(text: &str, options: &ParseOptions, raw: bool) -> Result<Reply> {
        let document = XmlCodec::decode(text, options)?;
        let message_id = document
            .root_attr("message-id")
            .and_then(|id| id.trim().parse().ok());

        if document.root == "hello" {
            let body = document.body();
            return Ok(Reply::Hello(Hello {
                session_id: body
                    .get("session_id")
                    .and_then(text_of)
                    .and_then(|id| id.trim().parse().ok()),
                capabilities: capability_list(body),
                value: document.value,
            }));
        }

        if document.root == "rpc-reply" && has_rpc_error(document.body()) {
            return Ok(Reply::RpcError(RpcFailure {
                message_id,
                diagnostic: text.to_string(),
                value: document.value,
            }));
        }

        Ok(Reply::RpcReply(RpcReply {
            message_id,
            value: document.value,
            source: raw.then(|| text.to_string()),
        }))
    }
}

/// Content of a peer `hello`.
#[derive(Debug, Clone, PartialEq)]
pub struct Hello {
    /// `session-id` if present and numeric.
    pub session_id: Option<i64>,
    /// Advertised capability URIs in document order.
    pub capabilities: Vec<String>,
    /// The decoded document.
    pub value: Value,
}

fn capability_list(hello: &Value) -> Vec<String> {
    match hello.get("capabilities").and_then(|caps| caps.get("capability")) {
        Some(Value::Array(items)) => items.iter().filter_map(text_of).collect(),
        Some(single) => text_of(single).into_iter().collect(),
        None => Vec::new(),
    }
}

/// Whether `value` holds an `rpc-error` child, possibly namespace-prefixed.
pub(crate) fn has_rpc_error(value: &Value) -> bool {
    value
        .as_object()
        .map(|map| map.keys().any(|key| is_rpc_error_key(key)))
        .unwrap_or(false)
}

fn is_rpc_error_key(key: &str) -> bool {
    key == "rpc_error" || key.ends_with("_rpc_error")
}

/// A successful `rpc-reply`.
#[derive(Debug, Clone)]
pub struct RpcReply {
    message_id: Option<u64>,
    value: Value,
    /// Reply text, only kept when asked for.
    source: Option<String>,
}

impl RpcReply {
    /// `message-id` of the reply root.
    pub fn message_id(&self) -> Option<u64> {
        self.message_id
    }

    /// The decoded document, keyed by the root name (`rpc_reply`).
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Content of the root element.
    pub fn body(&self) -> &Value {
        self.value
            .as_object()
            .and_then(|map| map.values().next())
            .unwrap_or(&Value::Null)
    }

    /// Original XML text, when raw mode was on for this call.
    pub fn raw(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Whether the reply is a bare `<ok/>`.
    pub fn is_ok(&self) -> bool {
        self.body().get("ok") == Some(&Value::Bool(true))
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Drop the reply text unless `raw` is set.
    pub(crate) fn retain_raw(mut self, raw: bool) -> Self {
        if !raw {
            self.source = None;
        }
        self
    }

    /// Treat the reply as failed, keeping its text as the diagnostic.
    ///
    /// Used when an `rpc-error` sits below the top level of an otherwise
    /// successful reply.
    pub(crate) fn into_failure(self) -> RpcFailure {
        RpcFailure {
            message_id: self.message_id,
            diagnostic: self.source.unwrap_or_default(),
            value: self.value,
        }
    }
}

/// An `rpc-reply` reporting one or more errors.
#[derive(Debug, Clone)]
pub struct RpcFailure {
    message_id: Option<u64>,
    diagnostic: String,
    value: Value,
}

impl RpcFailure {
    pub fn message_id(&self) -> Option<u64> {
        self.message_id
    }

    /// The full reply text.
    pub fn diagnostic(&self) -> &str {
        &self.diagnostic
    }

    /// The decoded reply document.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Every `rpc-error` in the reply, at any depth.
    pub fn errors(&self) -> Vec<RpcErrorInfo> {
        let mut found = Vec::new();
        collect_errors(&self.value, &mut found);
        found
    }
}

impl fmt::Display for RpcFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .errors()
            .into_iter()
            .filter_map(|error| error.message)
            .collect();

        if messages.is_empty() {
            f.write_str(&self.diagnostic)
        } else {
            f.write_str(&messages.join("; "))
        }
    }
}

/// Fields of a single `rpc-error`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpcErrorInfo {
    pub error_type: Option<String>,
    pub tag: Option<String>,
    pub severity: Option<String>,
    pub message: Option<String>,
}

impl RpcErrorInfo {
    fn from_value(value: &Value) -> Self {
        let field = |name: &str| value.get(name).and_then(text_of);
        Self {
            error_type: field("error_type"),
            tag: field("error_tag"),
            severity: field("error_severity"),
            message: field("error_message"),
        }
    }
}

fn collect_errors(value: &Value, found: &mut Vec<RpcErrorInfo>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if is_rpc_error_key(key) {
                    match child {
                        Value::Array(items) => {
                            found.extend(items.iter().map(RpcErrorInfo::from_value))
                        }
                        other => found.push(RpcErrorInfo::from_value(other)),
                    }
                } else {
                    collect_errors(child, found);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_errors(item, found)),
        _ => {}
    }
}

/// Text content of a decoded element.
///
/// Numbers are rendered back to text; elements with attributes yield their
/// `"_"` text. Empty elements (`true`) have no text.
pub fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get(crate::codec::TEXT_KEY).and_then(text_of),
        _ => None,
    }
}
