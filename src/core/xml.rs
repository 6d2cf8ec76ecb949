//! XML Element Tree
//!
//! Namespace-aware element tree built with `quick-xml` for LinkedIn XML and
//! Google Atom payloads.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use crate::error::{ProtocolError, SocialAuthError};

pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
pub const GDATA_NS: &str = "http://schemas.google.com/g/2005";
pub const GPHOTO_NS: &str = "http://schemas.google.com/photos/2007";
pub const MEDIA_NS: &str = "http://search.yahoo.com/mrss/";

/// One XML element with its resolved namespace.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct XmlElement {
    pub namespace: Option<String>,
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    /// First child with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First child with the given namespace and local name.
    pub fn child_ns(&self, namespace: &str, name: &str) -> Option<&XmlElement> {
        self.children
            .iter()
            .find(|c| c.name == name && c.namespace.as_deref() == Some(namespace))
    }

    /// All children with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// All children with the given namespace and local name.
    pub fn children_ns<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> {
        self.children
            .iter()
            .filter(move |c| c.name == name && c.namespace.as_deref() == Some(namespace))
    }

    /// Follow a path of local names from this element.
    pub fn path(&self, path: &[&str]) -> Option<&XmlElement> {
        path.iter().try_fold(self, |element, name| element.child(name))
    }

    /// Trimmed, non-empty text at a path of local names.
    pub fn text_at(&self, path: &[&str]) -> Option<String> {
        self.path(path).and_then(XmlElement::text_value)
    }

    /// Trimmed, non-empty text of this element.
    pub fn text_value(&self) -> Option<String> {
        let text = self.text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    /// Attribute by local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse a document and return its root element.
pub fn parse_document(xml: &str) -> Result<XmlElement, SocialAuthError> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let (resolved, event) = reader.read_resolved_event().map_err(xml_error)?;
        match event {
            Event::Start(e) => {
                stack.push(start_element(resolved, &e)?);
            }
            Event::Empty(e) => {
                let element = start_element(resolved, &e)?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&e.unescape().map_err(xml_error)?);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    SocialAuthError::Protocol(ProtocolError::InvalidXml {
                        message: "unbalanced end tag".to_string(),
                    })
                })?;
                attach(&mut stack, &mut root, element);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(SocialAuthError::Protocol(ProtocolError::InvalidXml {
            message: "document ended inside an element".to_string(),
        }));
    }

    root.ok_or_else(|| {
        SocialAuthError::Protocol(ProtocolError::InvalidXml {
            message: "document has no root element".to_string(),
        })
    })
}

fn start_element(
    resolved: ResolveResult<'_>,
    start: &BytesStart<'_>,
) -> Result<XmlElement, SocialAuthError> {
    let namespace = match resolved {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        _ => None,
    };

    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(xml_error)?;
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(xml_error)?.into_owned();
        attributes.push((key, value));
    }

    Ok(XmlElement {
        namespace,
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

fn xml_error(error: impl std::fmt::Display) -> SocialAuthError {
    SocialAuthError::Protocol(ProtocolError::InvalidXml {
        message: error.to_string(),
    })
}
