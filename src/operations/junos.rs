//! Juniper Junos operations.
//!
//! Junos reports load and commit failures inside the result element rather
//! than at the top of the reply, so those calls check the reply a second
//! time.

use serde::Serialize;
use serde_json::Value;

use crate::client::{Client, Decoding};
use crate::codec::{Element, ParseOptions};
use crate::error::{NetconfError, Result};
use crate::protocol::{has_rpc_error, text_of, Request, RpcReply};

/// How a loaded configuration is combined with the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadAction {
    #[default]
    Merge,
    Replace,
    Override,
    Update,
    /// Configuration-mode `set` commands.
    Set,
}

impl LoadAction {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadAction::Merge => "merge",
            LoadAction::Replace => "replace",
            LoadAction::Override => "override",
            LoadAction::Update => "update",
            LoadAction::Set => "set",
        }
    }
}

/// Encoding of the loaded configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    #[default]
    Text,
    Xml,
}

impl ConfigFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigFormat::Text => "text",
            ConfigFormat::Xml => "xml",
        }
    }
}

/// Configuration content to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigPayload {
    /// Curly-brace text or `set` commands.
    Text(String),
    /// Children of `<configuration>`.
    Tree(Vec<Element>),
}

impl ConfigPayload {
    fn is_empty(&self) -> bool {
        match self {
            ConfigPayload::Text(text) => text.trim().is_empty(),
            ConfigPayload::Tree(elements) => elements.is_empty(),
        }
    }
}

/// Arguments of [`Client::junos_load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    pub config: ConfigPayload,
    pub action: LoadAction,
    pub format: ConfigFormat,
}

impl LoadOptions {
    /// Text configuration, merged.
    pub fn text(config: impl Into<String>) -> Self {
        Self {
            config: ConfigPayload::Text(config.into()),
            action: LoadAction::Merge,
            format: ConfigFormat::Text,
        }
    }

    /// XML configuration, merged.
    pub fn xml(elements: Vec<Element>) -> Self {
        Self {
            config: ConfigPayload::Tree(elements),
            action: LoadAction::Merge,
            format: ConfigFormat::Xml,
        }
    }

    /// `set` commands, one per line.
    pub fn set(commands: impl Into<String>) -> Self {
        Self {
            config: ConfigPayload::Text(commands.into()),
            action: LoadAction::Set,
            format: ConfigFormat::Text,
        }
    }

    pub fn with_action(mut self, action: LoadAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_format(mut self, format: ConfigFormat) -> Self {
        self.format = format;
        self
    }

    /// Element carrying the configuration.
    fn payload_tag(&self) -> &'static str {
        if self.action == LoadAction::Set {
            "configuration-set"
        } else if self.format == ConfigFormat::Xml {
            "configuration"
        } else {
            "configuration-text"
        }
    }

    fn to_request(&self) -> Result<Request> {
        if self.config.is_empty() {
            return Err(NetconfError::InvalidArgument(
                "configuration undefined".to_string(),
            ));
        }

        let payload = Element::new(self.payload_tag());
        let payload = match &self.config {
            ConfigPayload::Text(text) => payload.with_text(text.as_str()),
            ConfigPayload::Tree(elements) => payload.with_children(elements.iter().cloned()),
        };

        Ok(Request::operation(
            Element::new("load-configuration")
                .with_attr("action", self.action.as_str())
                .with_attr("format", self.format.as_str())
                .with_child(payload),
        ))
    }
}

impl From<&str> for LoadOptions {
    fn from(config: &str) -> Self {
        LoadOptions::text(config)
    }
}

impl From<String> for LoadOptions {
    fn from(config: String) -> Self {
        LoadOptions::text(config)
    }
}

/// Device summary gathered by [`Client::junos_facts`].
///
/// Fields the device did not report are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Facts {
    pub hostname: Option<String>,
    pub version: Option<String>,
    pub model: Option<String>,
    pub uptime: Option<String>,
    pub serial: Option<String>,
}

impl Facts {
    fn from_replies(software: &RpcReply, route_engine: &RpcReply, chassis: &RpcReply) -> Self {
        let software = &software.body()["software_information"];
        let engine = first(&route_engine.body()["route_engine_information"]["route_engine"]);
        let chassis = &chassis.body()["chassis_inventory"]["chassis"];

        Facts {
            hostname: text_of(&software["host_name"]),
            version: software_version(software),
            model: text_of(&software["product_model"]),
            uptime: text_of(&engine["up_time"]),
            serial: text_of(&chassis["serial_number"]),
        }
    }
}

/// First entry of a repeated element, or the element itself.
fn first(value: &Value) -> &Value {
    match value {
        Value::Array(items) => items.first().unwrap_or(&Value::Null),
        other => other,
    }
}

/// `junos-version` when reported, otherwise the first package comment.
fn software_version(software: &Value) -> Option<String> {
    text_of(&software["junos_version"])
        .or_else(|| text_of(&first(&software["package_information"])["comment"]))
}

impl Client {
    /// Send `request` and fail if `result` finds an `rpc-error` below the
    /// top level of the reply.
    async fn rpc_checked(
        &self,
        request: impl Into<Request>,
        result: impl Fn(&Value) -> bool,
    ) -> Result<RpcReply> {
        // The text is the diagnostic should the check fail.
        let decoding = Decoding {
            keep_text: true,
            ..self.decoding()
        };
        let reply = self.rpc_decoded(request, decoding).await?;
        if result(reply.body()) {
            return Err(NetconfError::Rpc(reply.into_failure()));
        }
        Ok(reply.retain_raw(self.config().raw))
    }

    /// Load configuration into the candidate.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty configuration (nothing is sent), `Rpc`
    /// if the reply or its `load-configuration-results` carries `rpc-error`.
    pub async fn junos_load(&self, options: impl Into<LoadOptions>) -> Result<RpcReply> {
        let request = options.into().to_request()?;
        self.rpc_checked(request, |body| {
            has_rpc_error(&body["load_configuration_results"])
        })
        .await
    }

    /// Commit the candidate configuration.
    ///
    /// Fails with `Rpc` if any routing engine reports an error.
    pub async fn junos_commit(&self) -> Result<RpcReply> {
        self.rpc_checked("commit-configuration", |body| {
            match &body["commit_results"]["routing_engine"] {
                Value::Array(engines) => engines.iter().any(has_rpc_error),
                engine => has_rpc_error(engine),
            }
        })
        .await
    }

    /// Open a private candidate configuration.
    pub async fn junos_open_private(&self) -> Result<RpcReply> {
        self.rpc(Element::new("open-configuration").with_child(Element::new("private")))
            .await
    }

    pub async fn junos_close_private(&self) -> Result<RpcReply> {
        self.rpc("close-configuration").await
    }

    /// Diff of the candidate against the active configuration, as text.
    ///
    /// Empty when there are no changes.
    pub async fn junos_compare(&self) -> Result<String> {
        let request = Element::new("get-configuration")
            .with_attr("compare", "rollback")
            .with_attr("format", "text");
        let reply = self.rpc(request).await?;
        let output = &reply.body()["configuration_information"]["configuration_output"];
        Ok(text_of(output).unwrap_or_default())
    }

    /// Discard uncommitted changes.
    pub async fn junos_rollback(&self) -> Result<RpcReply> {
        self.rpc("discard-changes").await
    }

    /// Collect hostname, version, model, uptime and serial number.
    ///
    /// The three underlying RPCs run concurrently; all of them complete
    /// before the first failure (in request order) is returned. Values are
    /// kept as reported (`0012345` stays `0012345`).
    pub async fn junos_facts(&self) -> Result<Facts> {
        let decoding = Decoding {
            options: ParseOptions {
                coerce_numbers: false,
                ..self.config().parse_options()
            },
            keep_text: false,
        };
        let (software, route_engine, chassis) = tokio::join!(
            self.rpc_decoded("get-software-information", decoding),
            self.rpc_decoded("get-route-engine-information", decoding),
            self.rpc_decoded("get-chassis-inventory", decoding),
        );

        Ok(Facts::from_replies(&software?, &route_engine?, &chassis?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Reply;

    fn reply(xml: &str) -> RpcReply {
        match Reply::parse(xml, &ParseOptions::default(), false).unwrap() {
            Reply::RpcReply(reply) => reply,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_payload_tags() {
        assert_eq!(LoadOptions::set("set system host-name r1").payload_tag(), "configuration-set");
        assert_eq!(LoadOptions::text("system {}").payload_tag(), "configuration-text");
        assert_eq!(LoadOptions::xml(vec![Element::new("system")]).payload_tag(), "configuration");
        assert_eq!(
            LoadOptions::xml(Vec::new()).with_action(LoadAction::Set).payload_tag(),
            "configuration-set"
        );
    }

    #[test]
    fn test_load_request_defaults() {
        let xml = LoadOptions::from("system { host-name r1; }")
            .to_request()
            .unwrap()
            .render(101)
            .unwrap();

        assert!(xml.contains(r#"<load-configuration action="merge" format="text">"#));
        assert!(xml.contains("<configuration-text>system { host-name r1; }</configuration-text>"));
    }

    #[test]
    fn test_load_request_xml_tree() {
        let options = LoadOptions::xml(vec![Element::new("system")
            .with_child(Element::new("host-name").with_text("r1"))])
        .with_action(LoadAction::Replace);
        let xml = options.to_request().unwrap().render(101).unwrap();

        assert!(xml.contains(r#"action="replace" format="xml""#));
        assert!(xml.contains("<configuration><system><host-name>r1</host-name></system></configuration>"));
    }

    #[test]
    fn test_load_empty_config() {
        for options in [LoadOptions::text("  "), LoadOptions::xml(Vec::new())] {
            let err = options.to_request().unwrap_err();
            assert!(matches!(err, NetconfError::InvalidArgument(ref m) if m == "configuration undefined"));
        }
    }

    #[test]
    fn test_facts_from_replies() {
        let software = reply("<rpc-reply><software-information><host-name>r1</host-name><product-model>mx480</product-model><package-information><name>junos</name><comment>JUNOS Software Release [15.1R7]</comment></package-information></software-information></rpc-reply>");
        let engine = reply(r#"<rpc-reply><route-engine-information><route-engine><slot>0</slot><up-time seconds="3600">1 hour</up-time></route-engine><route-engine><slot>1</slot></route-engine></route-engine-information></rpc-reply>"#);
        let chassis = reply("<rpc-reply><chassis-inventory><chassis><serial-number>JN1234</serial-number></chassis></chassis-inventory></rpc-reply>");

        let facts = Facts::from_replies(&software, &engine, &chassis);

        assert_eq!(facts.hostname.as_deref(), Some("r1"));
        assert_eq!(facts.model.as_deref(), Some("mx480"));
        assert_eq!(facts.version.as_deref(), Some("JUNOS Software Release [15.1R7]"));
        assert_eq!(facts.uptime.as_deref(), Some("1 hour"));
        assert_eq!(facts.serial.as_deref(), Some("JN1234"));
    }

    #[test]
    fn test_facts_prefer_junos_version() {
        let software = reply("<rpc-reply><software-information><junos-version>21.4R3</junos-version></software-information></rpc-reply>");
        let empty = reply("<rpc-reply/>");

        let facts = Facts::from_replies(&software, &empty, &empty);
        assert_eq!(facts.version.as_deref(), Some("21.4R3"));
        assert!(facts.hostname.is_none());
        assert!(facts.serial.is_none());
    }
}
