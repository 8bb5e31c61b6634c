//! A small owned XML tree used for stanzas and payloads.
//!
//! Every element records its effective default namespace. Children added with
//! [`Element::with_child`] inherit the parent's namespace when they don't declare
//! their own, and serialization only emits `xmlns` where it changes, so a tree
//! built by hand and a tree parsed off the wire compare equal.
use std::{borrow::Cow, fmt, str::FromStr};

use quick_xml::{
    Reader,
    escape::escape,
    events::{BytesStart, Event},
};

use crate::error::Error;

/// A child of an [`Element`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// nested element
    Element(Element),
    /// character data, already unescaped
    Text(String),
}

/// An XML element with its attributes and children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    ns: Option<String>,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    /// create an element without a namespace of its own. It will inherit
    /// the namespace of whatever parent it is appended to.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ns: None,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// create an element in namespace `ns`
    pub fn with_ns(name: impl Into<String>, ns: impl Into<String>) -> Self {
        Self {
            ns: Some(ns.into()),
            ..Self::new(name)
        }
    }

    /// builder-style attribute setter
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// builder-style child append
    pub fn with_child(mut self, child: Element) -> Self {
        self.append_child(child);
        self
    }

    /// append every element of `children`
    pub fn with_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = Element>,
    {
        for child in children {
            self.append_child(child);
        }
        self
    }

    /// builder-style text append
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// set or replace an attribute
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((key, value)),
        }
    }

    /// append a child element, which inherits our namespace if it has none
    pub fn append_child(&mut self, mut child: Element) {
        child.inherit_ns(self.ns.as_deref());
        self.children.push(Node::Element(child));
    }

    fn inherit_ns(&mut self, ns: Option<&str>) {
        if self.ns.is_none() {
            self.ns = ns.map(str::to_owned);
            let ns = self.ns.clone();
            for child in self.children.iter_mut() {
                if let Node::Element(child) = child {
                    child.inherit_ns(ns.as_deref());
                }
            }
        }
    }

    /// qualified name as written, e.g. `stream:features`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// name with any prefix removed
    pub fn local_name(&self) -> &str {
        self.name
            .rsplit_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    /// effective default namespace
    pub fn ns(&self) -> Option<&str> {
        self.ns.as_deref()
    }

    /// is this element `name` in namespace `ns`?
    pub fn is(&self, name: &str, ns: &str) -> bool {
        self.local_name() == name && self.ns() == Some(ns)
    }

    /// attribute value by key
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// all attributes in document order
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// child elements, skipping text
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// all child nodes
    pub fn nodes(&self) -> &[Node] {
        &self.children
    }

    /// first child matching local name and namespace
    pub fn get_child(&self, name: &str, ns: &str) -> Option<&Element> {
        self.children().find(|child| child.is(name, ns))
    }

    /// all children matching local name and namespace
    pub fn children_named<'a>(
        &'a self,
        name: &'a str,
        ns: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children().filter(move |child| child.is(name, ns))
    }

    /// concatenated direct text content
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// parse a complete document containing a single root element. Anything
    /// but whitespace, comments or processing instructions after the root is
    /// an error.
    pub fn parse(input: &[u8]) -> Result<Self, Error> {
        let mut reader = Reader::from_reader(input);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event().map_err(xml_err)? {
                Event::Start(start) => {
                    if root.is_some() {
                        return Err(trailing_content());
                    }
                    let inherited = stack.last().and_then(|parent| parent.ns.clone());
                    stack.push(Element::from_start(&start, inherited)?);
                }
                Event::Empty(start) => {
                    if root.is_some() {
                        return Err(trailing_content());
                    }
                    let inherited = stack.last().and_then(|parent| parent.ns.clone());
                    let el = Element::from_start(&start, inherited)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(el)),
                        None => root = Some(el),
                    }
                }
                Event::End(_) => {
                    let el = stack
                        .pop()
                        .ok_or_else(|| Error::Xml("unbalanced end tag".into()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(el)),
                        None => root = Some(el),
                    }
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(xml_err)?;
                    if stack.is_empty() {
                        if !text.trim().is_empty() {
                            return Err(Error::Xml("text outside the root element".into()));
                        }
                    } else {
                        push_text(&mut stack, text);
                    }
                }
                Event::CData(data) => {
                    if stack.is_empty() {
                        return Err(Error::Xml("CDATA outside the root element".into()));
                    }
                    let data = data.into_inner();
                    push_text(&mut stack, String::from_utf8_lossy(&data));
                }
                Event::Eof => {
                    return root
                        .ok_or_else(|| Error::Xml("document has no complete root element".into()));
                }
                // declarations, comments, processing instructions
                _ => {}
            }
        }
    }

    /// parse only the opening tag of `input`, ignoring anything after it. Used
    /// for the stream header, which is never closed until the session ends.
    pub fn parse_open_tag(input: &[u8]) -> Result<Self, Error> {
        let mut reader = Reader::from_reader(input);
        loop {
            match reader.read_event().map_err(xml_err)? {
                Event::Start(start) | Event::Empty(start) => {
                    return Element::from_start(&start, None);
                }
                Event::Eof => return Err(Error::Xml("no opening tag found".into())),
                _ => {}
            }
        }
    }

    fn from_start(start: &BytesStart<'_>, inherited: Option<String>) -> Result<Self, Error> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(xml_err)?
            .to_owned();
        let mut ns = inherited;
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(xml_err)?;
            let key = std::str::from_utf8(attr.key.as_ref()).map_err(xml_err)?;
            let value = attr.unescape_value().map_err(xml_err)?.into_owned();
            if key == "xmlns" {
                ns = Some(value);
            } else {
                attrs.push((key.to_owned(), value));
            }
        }
        Ok(Self {
            name,
            ns,
            attrs,
            children: Vec::new(),
        })
    }

    /// write the opening tag only, e.g. for a stream header
    pub fn open_tag(&self) -> String {
        let mut out = String::new();
        self.write_start(&mut out, None);
        out.push('>');
        out
    }

    fn write_start(&self, out: &mut String, parent_ns: Option<&str>) {
        out.push('<');
        out.push_str(&self.name);
        if let Some(ns) = self.ns.as_deref() {
            if Some(ns) != parent_ns {
                push_attr(out, "xmlns", ns);
            }
        }
        for (key, value) in &self.attrs {
            push_attr(out, key, value);
        }
    }

    fn write_to(&self, out: &mut String, parent_ns: Option<&str>) {
        self.write_start(out, parent_ns);
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for node in &self.children {
            match node {
                Node::Element(child) => child.write_to(out, self.ns.as_deref()),
                Node::Text(text) => out.push_str(&escape(text.as_str())),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn push_text(stack: &mut [Element], text: Cow<'_, str>) {
    // inter-element whitespace carries no meaning in XMPP
    if text.trim().is_empty() {
        return;
    }
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Text(text.into_owned()));
    }
}

fn push_attr(out: &mut String, key: &str, value: &str) {
    out.push(' ');
    out.push_str(key);
    out.push_str("=\"");
    out.push_str(&escape(value));
    out.push('"');
}

fn trailing_content() -> Error {
    Error::Xml("content after the root element".into())
}

fn xml_err(err: impl fmt::Display) -> Error {
    Error::Xml(err.to_string())
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_to(&mut out, None);
        f.write_str(&out)
    }
}

impl FromStr for Element {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Element::parse(s.as_bytes())
    }
}
