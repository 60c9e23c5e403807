// Response decoding. The caller picks the encoding per request; the body
// is parsed into either a JSON value or an owned XML element tree.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::DispatchError;

/// Wire encoding of a controller request/response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Json,
    Xml,
}

impl Encoding {
    /// Value of the `content-type` header for this encoding.
    pub fn content_type(self) -> &'static str {
        match self {
            Encoding::Json => "application/json",
            Encoding::Xml => "application/xml",
        }
    }

    pub fn decode(self, body: &[u8]) -> Result<Decoded, DispatchError> {
        match self {
            Encoding::Json => Ok(Decoded::Json(serde_json::from_slice(body)?)),
            Encoding::Xml => Ok(Decoded::Xml(XmlElement::parse(body)?)),
        }
    }
}

/// A decoded response body, returned without normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Json(serde_json::Value),
    Xml(XmlElement),
}

impl Decoded {
    pub fn into_json(self) -> Result<serde_json::Value, DispatchError> {
        match self {
            Decoded::Json(value) => Ok(value),
            Decoded::Xml(_) => Err(DispatchError::UnexpectedEncoding("json")),
        }
    }

    pub fn into_xml(self) -> Result<XmlElement, DispatchError> {
        match self {
            Decoded::Xml(root) => Ok(root),
            Decoded::Json(_) => Err(DispatchError::UnexpectedEncoding("xml")),
        }
    }
}

/// Owned XML element: name, attributes in document order, child elements
/// and the concatenated text content directly under this element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    /// Parse a document and return its root element.
    pub fn parse(body: &[u8]) -> Result<Self, DispatchError> {
        let mut reader = Reader::from_reader(body);
        reader.trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;
        let mut buf = Vec::new();

        loop {
            let event = reader.read_event_into(&mut buf).map_err(xml_err)?;
            match event {
                Event::Start(start) => stack.push(Self::open(&start)?),
                Event::Empty(start) => {
                    let element = Self::open(&start)?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| DispatchError::Xml("unbalanced closing tag".into()))?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(xml_err)?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(DispatchError::Xml("unexpected end of document".into()));
        }
        root.ok_or_else(|| DispatchError::Xml("document has no root element".into()))
    }

    fn open(start: &BytesStart<'_>) -> Result<Self, DispatchError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(xml_err)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(xml_err)?.into_owned();
            attributes.push((key, value));
        }
        Ok(XmlElement {
            name,
            attributes,
            ..XmlElement::default()
        })
    }

    fn attach(
        stack: &mut [XmlElement],
        root: &mut Option<XmlElement>,
        element: XmlElement,
    ) -> Result<(), DispatchError> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None if root.is_none() => *root = Some(element),
            None => return Err(DispatchError::Xml("multiple root elements".into())),
        }
        Ok(())
    }

    /// First direct child with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn xml_err(err: impl std::fmt::Display) -> DispatchError {
    DispatchError::Xml(err.to_string())
}
