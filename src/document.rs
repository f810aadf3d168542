//! In-memory XML tree for WordPress export (WXR) files.
//!
//! The tree keeps every event exactly as it was read: element start tags with
//! their raw attributes, escaped text, CDATA sections, comments and
//! declarations. Serializing a document that was never touched yields the
//! input bytes back, so a migration only changes the nodes it rewrites.

use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

use crate::encoded_text;
use crate::export_version::ExportVersion;
use crate::record::Record;

/// Namespace URIs of the WordPress export vocabulary start with this prefix,
/// followed by the export version (`1.0/`, `1.1/`, `1.2/`).
pub const WXR_NAMESPACE_PREFIX: &str = "http://wordpress.org/export/";

/// RSS content module, home of `content:encoded`.
pub const CONTENT_NAMESPACE: &str = "http://purl.org/rss/1.0/modules/content/";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("XML parsing error: {0}")]
    Parse(String),

    #[error("XML serialization error: {0}")]
    Serialize(String),

    #[error("Element <{0}> is never closed")]
    Unclosed(String),

    #[error("Closing tag </{0}> has no matching start tag")]
    UnexpectedEnd(String),

    #[error("Document has no root element")]
    NoRoot,

    #[error("Missing <{node}> inside <{context}>")]
    MissingNode { node: String, context: String },

    #[error("Malformed content in <{node}>: {reason}")]
    Malformed { node: String, reason: String },
}

/// One node of the tree.
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    /// Text exactly as it appeared in the source, entity references unexpanded.
    Text(BytesText<'static>),
    CData(BytesCData<'static>),
    /// Declarations, comments, processing instructions and doctypes.
    Other(Event<'static>),
}

#[derive(Debug, Clone)]
pub struct Element {
    name: String,
    start: BytesStart<'static>,
    children: Vec<Node>,
    self_closing: bool,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            start: BytesStart::new(name.clone()),
            name,
            children: Vec::new(),
            self_closing: false,
        }
    }

    fn from_start(start: BytesStart<'static>, self_closing: bool) -> Self {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        Self {
            name,
            start,
            children: Vec::new(),
            self_closing,
        }
    }

    /// Qualified name, prefix included (`wp:postmeta`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Replaces every child node.
    pub fn set_children(&mut self, children: Vec<Node>) {
        self.children = children;
    }

    pub fn push(&mut self, node: Node) {
        self.children.push(node);
    }

    /// First direct child element with the given qualified name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|element| element.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(element) if element.name == name => Some(element),
            _ => None,
        })
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn children_named<'s>(&'s self, name: &'s str) -> impl Iterator<Item = &'s Element> + 's {
        self.elements().filter(move |element| element.name == name)
    }

    pub fn children_named_mut<'s>(
        &'s mut self,
        name: &'s str,
    ) -> impl Iterator<Item = &'s mut Element> + 's {
        self.children.iter_mut().filter_map(move |node| match node {
            Node::Element(element) if element.name == name => Some(element),
            _ => None,
        })
    }

    /// Drops the child elements for which `keep` answers false and returns how
    /// many were removed. Non-element children are always kept.
    pub fn try_retain_elements<E>(
        &mut self,
        mut keep: impl FnMut(&Element) -> Result<bool, E>,
    ) -> Result<usize, E> {
        let mut verdicts = Vec::with_capacity(self.children.len());
        for child in &self.children {
            verdicts.push(match child {
                Node::Element(element) => keep(element)?,
                _ => true,
            });
        }

        let before = self.children.len();
        let mut verdicts = verdicts.into_iter();
        self.children.retain(|_| verdicts.next().unwrap_or(true));
        Ok(before - self.children.len())
    }

    /// All attributes in source order, values unescaped.
    pub fn attributes(&self) -> Result<Vec<(String, String)>, DocumentError> {
        let mut attributes = Vec::new();
        for attribute in self.start.attributes() {
            let attribute = attribute.map_err(|e| self.malformed(e))?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value().map_err(|e| self.malformed(e))?;
            attributes.push((key, value.into_owned()));
        }
        Ok(attributes)
    }

    pub fn attribute(&self, key: &str) -> Result<Option<String>, DocumentError> {
        Ok(self
            .attributes()?
            .into_iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value))
    }

    /// Sets an attribute, keeping the position of an existing one.
    pub fn set_attribute(&mut self, key: &str, value: &str) -> Result<(), DocumentError> {
        let mut start = BytesStart::new(self.name.clone());
        let mut replaced = false;

        for attribute in self.start.attributes() {
            let attribute = attribute.map_err(|e| self.malformed(e))?;
            if attribute.key.as_ref() == key.as_bytes() {
                start.push_attribute((key, value));
                replaced = true;
            } else {
                start.push_attribute(attribute);
            }
        }
        if !replaced {
            start.push_attribute((key, value));
        }

        self.start = start;
        Ok(())
    }

    pub(crate) fn malformed(&self, reason: impl std::fmt::Display) -> DocumentError {
        DocumentError::Malformed {
            node: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn missing(&self, child: &str) -> DocumentError {
        DocumentError::MissingNode {
            node: child.to_string(),
            context: self.name.clone(),
        }
    }
}

/// Qualified element names of the two vocabularies an export uses, resolved
/// against the prefixes the export itself declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportNamespaces {
    wxr_uri: Option<String>,
    post_type: String,
    post_id: String,
    postmeta: String,
    meta_key: String,
    meta_value: String,
    term: String,
    term_taxonomy: String,
    wxr_version: String,
    content_encoded: String,
}

impl ExportNamespaces {
    pub fn new(wp_prefix: &str, content_prefix: &str) -> Self {
        let wp = |local: &str| qualify(wp_prefix, local);
        Self {
            wxr_uri: None,
            post_type: wp("post_type"),
            post_id: wp("post_id"),
            postmeta: wp("postmeta"),
            meta_key: wp("meta_key"),
            meta_value: wp("meta_value"),
            term: wp("term"),
            term_taxonomy: wp("term_taxonomy"),
            wxr_version: wp("wxr_version"),
            content_encoded: qualify(content_prefix, "encoded"),
        }
    }

    /// Reads the `xmlns` declarations of the root element. Undeclared
    /// vocabularies keep the conventional `wp` and `content` prefixes.
    pub fn resolve(root: &Element) -> Result<Self, DocumentError> {
        let mut wp_prefix = "wp".to_string();
        let mut content_prefix = "content".to_string();
        let mut wxr_uri = None;

        for (key, value) in root.attributes()? {
            let prefix = match key.strip_prefix("xmlns") {
                Some("") => "",
                Some(rest) => match rest.strip_prefix(':') {
                    Some(prefix) => prefix,
                    None => continue,
                },
                None => continue,
            };

            if value.starts_with(WXR_NAMESPACE_PREFIX) {
                wp_prefix = prefix.to_string();
                wxr_uri = Some(value);
            } else if value == CONTENT_NAMESPACE {
                content_prefix = prefix.to_string();
            }
        }

        let mut namespaces = Self::new(&wp_prefix, &content_prefix);
        namespaces.wxr_uri = wxr_uri;
        Ok(namespaces)
    }

    /// The declared WordPress export namespace URI, if any.
    pub fn wxr_uri(&self) -> Option<&str> {
        self.wxr_uri.as_deref()
    }

    pub fn post_type(&self) -> &str {
        &self.post_type
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn postmeta(&self) -> &str {
        &self.postmeta
    }

    pub fn meta_key(&self) -> &str {
        &self.meta_key
    }

    pub fn meta_value(&self) -> &str {
        &self.meta_value
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn term_taxonomy(&self) -> &str {
        &self.term_taxonomy
    }

    pub fn wxr_version(&self) -> &str {
        &self.wxr_version
    }

    pub fn content_encoded(&self) -> &str {
        &self.content_encoded
    }
}

impl Default for ExportNamespaces {
    fn default() -> Self {
        Self::new("wp", "content")
    }
}

fn qualify(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_string()
    } else {
        format!("{}:{}", prefix, local)
    }
}

/// A parsed export: `rss > channel > item*`.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    namespaces: ExportNamespaces,
}

impl Document {
    pub fn parse(xml: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(xml);
        let mut open: Vec<Element> = Vec::new();
        let mut nodes = Vec::new();

        loop {
            let event = reader
                .read_event()
                .map_err(|e| DocumentError::Parse(e.to_string()))?;

            let node = match event {
                Event::Start(start) => {
                    open.push(Element::from_start(start.into_owned(), false));
                    continue;
                }
                Event::End(end) => {
                    let element = open.pop().ok_or_else(|| {
                        DocumentError::UnexpectedEnd(
                            String::from_utf8_lossy(end.name().as_ref()).into_owned(),
                        )
                    })?;
                    Node::Element(element)
                }
                Event::Empty(start) => Node::Element(Element::from_start(start.into_owned(), true)),
                Event::Text(text) => Node::Text(text.into_owned()),
                Event::CData(cdata) => Node::CData(cdata.into_owned()),
                Event::Eof => break,
                other => Node::Other(other.into_owned()),
            };

            match open.last_mut() {
                Some(parent) => parent.push(node),
                None => nodes.push(node),
            }
        }

        if let Some(element) = open.pop() {
            return Err(DocumentError::Unclosed(element.name));
        }

        let root = nodes
            .iter()
            .find_map(|node| match node {
                Node::Element(element) => Some(element),
                _ => None,
            })
            .ok_or(DocumentError::NoRoot)?;
        let namespaces = ExportNamespaces::resolve(root)?;

        Ok(Self { nodes, namespaces })
    }

    /// Serializes the whole tree in one pass.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        let mut writer = Writer::new(Vec::new());
        for node in &self.nodes {
            write_node(&mut writer, node)?;
        }
        Ok(writer.into_inner())
    }

    pub fn namespaces(&self) -> &ExportNamespaces {
        &self.namespaces
    }

    pub fn root(&self) -> Option<&Element> {
        self.nodes.iter().find_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn root_mut(&mut self) -> Option<&mut Element> {
        self.nodes.iter_mut().find_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    fn channel(&self) -> Option<&Element> {
        self.root()?.child("channel")
    }

    fn channels_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.nodes
            .iter_mut()
            .filter_map(|node| match node {
                Node::Element(element) => Some(element),
                _ => None,
            })
            .take(1)
            .flat_map(|root| root.children_named_mut("channel"))
    }

    /// Every `channel/item`, in document order.
    pub fn records_mut(&mut self) -> impl Iterator<Item = Record<'_>> {
        let namespaces = &self.namespaces;
        self.nodes
            .iter_mut()
            .filter_map(|node| match node {
                Node::Element(element) => Some(element),
                _ => None,
            })
            .take(1)
            .flat_map(|root| root.children_named_mut("channel"))
            .flat_map(|channel| channel.children_named_mut("item"))
            .map(move |item| Record::new(item, namespaces))
    }

    pub fn record_count(&self) -> usize {
        self.channel()
            .map_or(0, |channel| channel.children_named("item").count())
    }

    /// Channel-level taxonomy term definitions (`wp:term`).
    pub fn terms_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        let term = self.namespaces.term().to_string();
        self.channels_mut()
            .flat_map(|channel| channel.children.iter_mut())
            .filter_map(move |node| match node {
                Node::Element(element) if element.name == term => Some(element),
                _ => None,
            })
    }

    /// The export format version, from `wp:wxr_version` or, failing that,
    /// from the namespace URI.
    pub fn export_version(&self) -> Option<ExportVersion> {
        let declared = self
            .channel()
            .and_then(|channel| channel.child(self.namespaces.wxr_version()))
            .and_then(|node| encoded_text::read(node).ok())
            .and_then(|text| text.trim().parse().ok());

        declared.or_else(|| {
            self.namespaces
                .wxr_uri()?
                .strip_prefix(WXR_NAMESPACE_PREFIX)?
                .trim_end_matches('/')
                .parse()
                .ok()
        })
    }
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), DocumentError> {
    match node {
        Node::Element(element) => {
            if element.children.is_empty() && element.self_closing {
                return emit(writer, Event::Empty(element.start.borrow()));
            }
            emit(writer, Event::Start(element.start.borrow()))?;
            for child in &element.children {
                write_node(writer, child)?;
            }
            emit(writer, Event::End(BytesEnd::new(element.name.as_str())))
        }
        Node::Text(text) => emit(writer, Event::Text(text.clone())),
        Node::CData(cdata) => emit(writer, Event::CData(cdata.clone())),
        Node::Other(event) => emit(writer, event.clone()),
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), DocumentError> {
    writer
        .write_event(event)
        .map_err(|e| DocumentError::Serialize(e.to_string()))
}
