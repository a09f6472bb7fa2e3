//! Opaque BOSH wire payloads.
//!
//! A [`Body`] models the `<body/>` wrapper element exchanged with the
//! connection manager: an immutable bag of namespaced attributes plus an
//! ordered sequence of child payload elements. The session engine treats the
//! payload contents as opaque; it only reads and stamps well-known
//! attributes. Values are cheap to clone and never mutated in place, which
//! is what makes byte-identical retransmission straightforward.

use std::{borrow::Cow, cmp::Ordering, collections::BTreeMap, fmt, hash::Hash};

use bytes::Bytes;

/// Namespace of the BOSH `<body/>` element.
pub const BOSH_XMLNS: &str = "http://jabber.org/protocol/httpbind";

/// Qualified name of a body attribute.
///
/// Equality and ordering consider only the namespace and local name; the
/// optional prefix is a serialization hint and does not affect identity.
#[derive(Debug, Clone)]
pub struct BodyQName {
    namespace: Cow<'static, str>,
    local: Cow<'static, str>,
    prefix: Option<Cow<'static, str>>,
}

impl BodyQName {
    /// Create a qualified name in an arbitrary namespace.
    #[must_use]
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: Cow::Owned(namespace.into()),
            local: Cow::Owned(local.into()),
            prefix: None,
        }
    }

    /// Create a qualified name carrying a serialization prefix.
    #[must_use]
    pub fn with_prefix(
        namespace: impl Into<String>,
        local: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            namespace: Cow::Owned(namespace.into()),
            local: Cow::Owned(local.into()),
            prefix: Some(Cow::Owned(prefix.into())),
        }
    }

    /// Create a qualified name in the BOSH body namespace.
    #[must_use]
    pub const fn bosh(local: &'static str) -> Self {
        Self {
            namespace: Cow::Borrowed(BOSH_XMLNS),
            local: Cow::Borrowed(local),
            prefix: None,
        }
    }

    /// Namespace URI of this name.
    #[must_use]
    pub fn namespace(&self) -> &str { &self.namespace }

    /// Local part of this name.
    #[must_use]
    pub fn local(&self) -> &str { &self.local }
}

impl PartialEq for BodyQName {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.local == other.local
    }
}

impl Eq for BodyQName {}

impl PartialOrd for BodyQName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for BodyQName {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.namespace.as_ref(), self.local.as_ref())
            .cmp(&(other.namespace.as_ref(), other.local.as_ref()))
    }
}

impl Hash for BodyQName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.local.hash(state);
    }
}

impl fmt::Display for BodyQName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.local)
    }
}

/// Well-known attribute names interpreted by the session engine.
pub mod attributes {
    use super::BodyQName;

    /// Session identifier assigned by the connection manager.
    pub static SID: BodyQName = BodyQName::bosh("sid");
    /// Request identifier (strictly increasing sequence number).
    pub static RID: BodyQName = BodyQName::bosh("rid");
    /// Longest time the connection manager may hold a request open.
    pub static WAIT: BodyQName = BodyQName::bosh("wait");
    /// Number of requests the connection manager may hold awaiting data.
    pub static HOLD: BodyQName = BodyQName::bosh("hold");
    /// Protocol version; presence in the creation response selects modern
    /// semantics.
    pub static VER: BodyQName = BodyQName::bosh("ver");
    /// Negotiated limit on concurrent outstanding requests.
    pub static REQUESTS: BodyQName = BodyQName::bosh("requests");
    /// Target domain of the session creation request.
    pub static TO: BodyQName = BodyQName::bosh("to");
    /// Response type: absent, `"error"`, or `"terminate"`.
    pub static TYPE: BodyQName = BodyQName::bosh("type");
    /// Terminal binding condition name, meaningful with `type="terminate"`.
    pub static CONDITION: BodyQName = BodyQName::bosh("condition");
}

/// Immutable `<body/>` wrapper value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Body {
    attributes: BTreeMap<BodyQName, String>,
    namespaces: BTreeMap<String, String>,
    payloads: Vec<String>,
}

impl Body {
    /// Start building a new body.
    #[must_use]
    pub fn builder() -> BodyBuilder { BodyBuilder::default() }

    /// Look up an attribute value by qualified name.
    #[must_use]
    pub fn attribute(&self, name: &BodyQName) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Return a copy of this body with `name` set to `value`.
    #[must_use]
    pub fn with_attribute(&self, name: BodyQName, value: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.attributes.insert(name, value.into());
        copy
    }

    /// Ordered child payload elements.
    #[must_use]
    pub fn payloads(&self) -> &[String] { &self.payloads }

    /// Canonical XML serialization.
    ///
    /// Attributes are emitted in a deterministic order, so two bodies with
    /// identical content always serialize identically. Retransmission
    /// equality is defined over this form.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<body");
        push_attr(&mut out, "xmlns", BOSH_XMLNS);
        for (prefix, uri) in &self.namespaces {
            push_attr(&mut out, &format!("xmlns:{prefix}"), uri);
        }
        for (name, value) in &self.attributes {
            match self.render_name(name) {
                Some(rendered) => push_attr(&mut out, &rendered, value),
                None => push_attr(&mut out, name.local(), value),
            }
        }
        if self.payloads.is_empty() {
            out.push_str("/>");
        } else {
            out.push('>');
            for payload in &self.payloads {
                out.push_str(payload);
            }
            out.push_str("</body>");
        }
        out
    }

    /// Canonical serialized form as bytes, for equality comparisons.
    #[must_use]
    pub fn canonical(&self) -> Bytes { Bytes::from(self.to_xml()) }

    /// Resolve the serialized attribute name, preferring the name's own
    /// prefix and falling back to a declared namespace prefix.
    fn render_name(&self, name: &BodyQName) -> Option<String> {
        if name.namespace() == BOSH_XMLNS {
            return Some(name.local().to_owned());
        }
        if let Some(prefix) = &name.prefix {
            return Some(format!("{prefix}:{}", name.local()));
        }
        self.namespaces
            .iter()
            .find(|(_, uri)| uri.as_str() == name.namespace())
            .map(|(prefix, _)| format!("{prefix}:{}", name.local()))
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape(value));
    out.push('"');
}

fn escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 8);
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

/// Builder for [`Body`] values.
#[derive(Debug, Default)]
pub struct BodyBuilder {
    attributes: BTreeMap<BodyQName, String>,
    namespaces: BTreeMap<String, String>,
    payloads: Vec<String>,
}

impl BodyBuilder {
    /// Set an attribute.
    #[must_use]
    pub fn attribute(mut self, name: BodyQName, value: impl Into<String>) -> Self {
        self.attributes.insert(name, value.into());
        self
    }

    /// Declare a namespace prefix used by attributes or payloads.
    #[must_use]
    pub fn namespace_definition(
        mut self,
        prefix: impl Into<String>,
        uri: impl Into<String>,
    ) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }

    /// Append a child payload element (serialized XML).
    #[must_use]
    pub fn payload(mut self, xml: impl Into<String>) -> Self {
        self.payloads.push(xml.into());
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> Body {
        Body {
            attributes: self.attributes,
            namespaces: self.namespaces,
            payloads: self.payloads,
        }
    }
}
