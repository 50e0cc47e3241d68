//! Namespace-stripped XML document model.
//!
//! Both the tree converter and the validator work from this model: element
//! and attribute names lose their prefixes, namespace declarations are
//! dropped, and direct text is kept only when it is not whitespace.

use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};

use crate::error::{NfoError, Result};

/// Deepest element nesting accepted, the same bound libxml2 applies
pub const MAX_DEPTH: usize = 256;

/// A parsed attribute, keeping the namespace its prefix was bound to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub namespace: Option<String>,
    /// Local name
    pub name: String,
    pub value: String,
}

/// A parsed XML element with document-order children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Local element name
    pub tag: String,
    /// Attributes in document order, namespace declarations excluded
    pub attributes: Vec<Attribute>,
    /// Trimmed direct text, absent when empty or whitespace-only
    pub text: Option<String>,
    /// Child elements in document order
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Look up an attribute by local name, whatever its namespace
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
            .map(|attribute| attribute.value.as_str())
    }

    /// Look up an attribute bound to `namespace`
    pub fn namespaced_attribute(&self, namespace: &str, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| {
                attribute.name == name && attribute.namespace.as_deref() == Some(namespace)
            })
            .map(|attribute| attribute.value.as_str())
    }

    /// First direct child with the given tag
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// First element with the given tag anywhere below this one (depth-first)
    pub fn find_descendant(&self, tag: &str) -> Option<&Element> {
        for child in &self.children {
            if child.tag == tag {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(tag) {
                return Some(found);
            }
        }
        None
    }

    /// True when the element has no attributes, text or children
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.text.is_none() && self.children.is_empty()
    }
}

/// Element under construction plus its raw direct text
struct OpenElement {
    element: Element,
    text: String,
}

impl OpenElement {
    fn finish(mut self) -> Element {
        let trimmed = self.text.trim();
        if !trimmed.is_empty() {
            self.element.text = Some(trimmed.to_string());
        }
        self.element
    }
}

/// Parse XML bytes into an [`Element`] tree.
///
/// Fails with a malformed-input error when the document is not well-formed
/// (mismatched or unclosed tags, a missing or repeated root element, text
/// outside the root) or nests elements deeper than [`MAX_DEPTH`].
pub fn parse_document(input: impl AsRef<[u8]>) -> Result<Element> {
    let mut reader = NsReader::from_reader(input.as_ref());

    let mut stack: Vec<OpenElement> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                if stack.is_empty() && root.is_some() {
                    return Err(malformed("document has more than one root element"));
                }
                check_depth(&stack)?;
                stack.push(OpenElement {
                    element: open_element(&reader, &start)?,
                    text: String::new(),
                });
            }
            Ok(Event::Empty(start)) => {
                check_depth(&stack)?;
                let element = open_element(&reader, &start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let open = stack
                    .pop()
                    .ok_or_else(|| malformed("closing tag without matching opening tag"))?;
                attach(&mut stack, &mut root, open.finish())?;
            }
            Ok(Event::Text(text)) => {
                let text = text.unescape()?;
                push_text(&mut stack, &text)?;
            }
            Ok(Event::CData(cdata)) => {
                let raw = cdata.into_inner();
                push_text(&mut stack, &String::from_utf8_lossy(&raw))?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(NfoError::MalformedXml {
                    details: format!("at position {}: {}", reader.buffer_position(), e),
                });
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(malformed(&format!(
            "unexpected end of document inside <{}>",
            open.element.tag
        )));
    }

    root.ok_or_else(|| malformed("document has no root element"))
}

fn check_depth(stack: &[OpenElement]) -> Result<()> {
    if stack.len() >= MAX_DEPTH {
        return Err(malformed(&format!(
            "elements nested deeper than {} levels",
            MAX_DEPTH
        )));
    }
    Ok(())
}

fn open_element(reader: &NsReader<&[u8]>, start: &BytesStart<'_>) -> Result<Element> {
    let mut element = Element::new(String::from_utf8_lossy(start.local_name().as_ref()));

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| malformed(&e.to_string()))?;
        let key = attribute.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }

        let (resolved, local_name) = reader.resolve_attribute(attribute.key);
        let namespace = match resolved {
            ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
            _ => None,
        };
        element.attributes.push(Attribute {
            namespace,
            name: String::from_utf8_lossy(local_name.as_ref()).into_owned(),
            value: attribute.unescape_value()?.into_owned(),
        });
    }

    Ok(element)
}

fn attach(stack: &mut [OpenElement], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.element.children.push(element),
        None if root.is_some() => {
            return Err(malformed("document has more than one root element"));
        }
        None => *root = Some(element),
    }
    Ok(())
}

fn push_text(stack: &mut [OpenElement], text: &str) -> Result<()> {
    match stack.last_mut() {
        Some(open) => open.text.push_str(text),
        None if !text.trim().is_empty() => {
            return Err(malformed("text content outside the root element"));
        }
        None => {}
    }
    Ok(())
}

fn malformed(details: &str) -> NfoError {
    NfoError::MalformedXml {
        details: details.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMESPACED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<root xmlns="NFOStandard" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
      xsi:schemaLocation="NFOStandard https://xsd.nfostandard.com/main.xsd">
  <media>
    <movie>
      <title>Foo &amp; Bar</title>
      <rating name="imdb" max="10">8.1</rating>
      <tag/>
    </movie>
  </media>
</root>"#;

    #[test]
    fn test_strips_namespaces_and_declarations() {
        let root = parse_document(NAMESPACED).unwrap();

        assert_eq!(root.tag, "root");
        assert_eq!(
            root.attributes,
            vec![Attribute {
                namespace: Some("http://www.w3.org/2001/XMLSchema-instance".to_string()),
                name: "schemaLocation".to_string(),
                value: "NFOStandard https://xsd.nfostandard.com/main.xsd".to_string(),
            }]
        );
        assert!(root.text.is_none());

        let movie = root.child("media").unwrap().child("movie").unwrap();
        assert_eq!(movie.child("title").unwrap().text.as_deref(), Some("Foo & Bar"));

        let rating = movie.child("rating").unwrap();
        assert_eq!(rating.attribute("name"), Some("imdb"));
        assert_eq!(rating.attribute("max"), Some("10"));
        assert_eq!(rating.text.as_deref(), Some("8.1"));

        assert!(movie.child("tag").unwrap().is_empty());
    }

    #[test]
    fn test_prefixed_element_names() {
        let root = parse_document(
            r#"<nfo:root xmlns:nfo="NFOStandard"><nfo:media><nfo:video/></nfo:media></nfo:root>"#,
        )
        .unwrap();
        assert_eq!(root.tag, "root");
        assert!(root.child("media").unwrap().child("video").is_some());
    }

    #[test]
    fn test_whitespace_only_text_is_absent() {
        let root = parse_document("<a>\n   <b> x </b>\n</a>").unwrap();
        assert!(root.text.is_none());
        assert_eq!(root.children[0].text.as_deref(), Some("x"));
    }

    #[test]
    fn test_cdata_is_text() {
        let root = parse_document("<plot><![CDATA[a <b> c]]></plot>").unwrap();
        assert_eq!(root.text.as_deref(), Some("a <b> c"));
    }

    #[test]
    fn test_find_descendant() {
        let root = parse_document(NAMESPACED).unwrap();
        assert_eq!(root.find_descendant("title").unwrap().tag, "title");
        assert!(root.find_descendant("director").is_none());
    }

    #[test]
    fn test_same_tag_order_preserved() {
        let root =
            parse_document("<m><actor>A</actor><actor>B</actor><actor>C</actor></m>").unwrap();
        let names: Vec<_> = root
            .children
            .iter()
            .map(|c| c.text.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_attribute_namespaces() {
        let root = parse_document(
            r#"<root xmlns:a="urn:a" a:id="1" id="2" schemaLocation="x"><b xmlns:a="urn:b" a:id="3"/></root>"#,
        )
        .unwrap();
        assert_eq!(root.namespaced_attribute("urn:a", "id"), Some("1"));
        assert_eq!(root.attribute("schemaLocation"), Some("x"));
        assert!(root.namespaced_attribute("urn:a", "schemaLocation").is_none());

        // Prefixes resolve against the innermost declaration
        let child = &root.children[0];
        assert_eq!(child.namespaced_attribute("urn:b", "id"), Some("3"));
        assert!(child.namespaced_attribute("urn:a", "id").is_none());
    }

    fn nested(depth: usize) -> String {
        format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth))
    }

    #[test]
    fn test_depth_limit() {
        assert!(parse_document(nested(MAX_DEPTH)).is_ok());

        let err = parse_document(nested(MAX_DEPTH + 1)).unwrap_err();
        assert!(err.is_malformed_input());
        assert!(err.to_string().contains("nested deeper than 256"));

        let self_closing = format!("{}<a/>{}", "<a>".repeat(MAX_DEPTH), "</a>".repeat(MAX_DEPTH));
        assert!(parse_document(self_closing).is_err());
    }

    #[test]
    fn test_very_deep_document_fails_cleanly() {
        let err = parse_document(nested(200_000)).unwrap_err();
        assert!(err.is_malformed_input());
    }

    #[test]
    fn test_malformed_documents() {
        for input in [
            "<a><b></a>",
            "<a>",
            "",
            "   ",
            "<a/><b/>",
            "text<a/>",
            "<a x=\"1\" x=\"2\"/>",
        ] {
            let err = parse_document(input).unwrap_err();
            assert!(err.is_malformed_input(), "{:?} gave {:?}", input, err);
        }
    }
}
