//! Typed XML element tree used to build outgoing requests.

/// An XML element: name, attributes, optional text and child elements.
///
/// Elements with neither text nor children are rendered self-closing
/// (`<running/>`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<Element>,
}

impl Element {
    /// Create an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set an attribute, replacing any previous value for the same key.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Set the text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Append a child element.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Append several child elements.
    pub fn with_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = Element>,
    {
        self.children.extend(children);
        self
    }

    /// Set an attribute in place.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Look up an attribute value.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    #[inline]
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Whether the element renders as `<name/>`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.children.is_empty()
    }
}

impl From<&str> for Element {
    fn from(name: &str) -> Self {
        Element::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let el = Element::new("load-configuration")
            .with_attr("action", "merge")
            .with_attr("format", "text")
            .with_child(Element::new("configuration-text").with_text("system {}"));

        assert_eq!(el.name(), "load-configuration");
        assert_eq!(el.attr("action"), Some("merge"));
        assert_eq!(el.attr("format"), Some("text"));
        assert_eq!(el.children().len(), 1);
        assert_eq!(el.children()[0].text(), Some("system {}"));
        assert!(!el.is_empty());
    }

    #[test]
    fn test_set_attr_replaces() {
        let mut el = Element::new("rpc").with_attr("message-id", "1");
        el.set_attr("message-id", "2");

        assert_eq!(el.attributes().len(), 1);
        assert_eq!(el.attr("message-id"), Some("2"));
    }

    #[test]
    fn test_empty_element() {
        let el = Element::from("running");
        assert!(el.is_empty());
        assert!(el.attr("missing").is_none());
    }
}
