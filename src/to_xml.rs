//! Canonical tree → NFO XML writer.
//!
//! The root element always carries the NFO Standard namespace and schema
//! location. Fields of the media element are emitted in the media type's
//! field order first, then any remaining fields in input order.

use std::io::Cursor;
use std::str::FromStr;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{NfoError, Result};
use crate::media_type::MediaType;
use crate::tree::{ATTRIBUTE_PREFIX, CompactDocument, Fields, Node, TEXT_KEY};

pub const NFO_NAMESPACE: &str = "NFOStandard";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const SCHEMA_LOCATION: &str = "NFOStandard https://xsd.nfostandard.com/main.xsd";

/// Alternative text key accepted on nested objects. The media element
/// treats it as an ordinary `<_text>` child.
const ALT_TEXT_KEY: &str = "_text";

/// Formatting options for the XML writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToXmlConfig {
    pub pretty: bool,
    pub indent: usize,
}

impl Default for ToXmlConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            indent: 2,
        }
    }
}

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Serialize a compact document to a complete NFO XML document.
///
/// Fails with `UnsupportedMediaType` when the document's type is unknown and
/// with `MalformedStructure` when the tree cannot be expressed as XML.
pub fn serialize(document: &CompactDocument, config: ToXmlConfig) -> Result<String> {
    let media_type = MediaType::from_str(&document.media_type)?;

    let mut writer = if config.pretty {
        Writer::new_with_indent(Cursor::new(Vec::new()), b' ', config.indent)
    } else {
        Writer::new(Cursor::new(Vec::new()))
    };

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("root");
    root.push_attribute(("xmlns", NFO_NAMESPACE));
    root.push_attribute(("xmlns:xsi", XSI_NAMESPACE));
    root.push_attribute(("xsi:schemaLocation", SCHEMA_LOCATION));
    writer.write_event(Event::Start(root))?;

    writer.write_event(Event::Start(BytesStart::new("media")))?;
    write_ordered(&mut writer, media_type.as_str(), &document.media, media_type.field_order())?;
    writer.write_event(Event::End(BytesEnd::new("media")))?;

    if let Some(library) = &document.library {
        write_node(&mut writer, "library", library)?;
    }

    writer.write_event(Event::End(BytesEnd::new("root")))?;

    String::from_utf8(writer.into_inner().into_inner()).map_err(|e| NfoError::MalformedStructure {
        details: format!("generated XML is not UTF-8: {}", e),
    })
}

/// Write the media element, placing known fields in table order
fn write_ordered(writer: &mut XmlWriter, tag: &str, node: &Node, order: &[&str]) -> Result<()> {
    let Node::Object(fields) = node else {
        return write_node(writer, tag, node);
    };

    let mut ordered = Fields::new();
    for name in order {
        if let Some(value) = fields.get(name) {
            ordered.insert(*name, value.clone());
        }
    }
    for (name, value) in fields.iter() {
        if !ordered.contains_key(name) {
            ordered.insert(name, value.clone());
        }
    }

    write_fields(writer, tag, &ordered, false)
}

fn write_node(writer: &mut XmlWriter, tag: &str, node: &Node) -> Result<()> {
    match node {
        Node::Scalar(text) => write_text_element(writer, tag, &[], Some(text)),
        Node::List(items) => {
            for item in items {
                if matches!(item, Node::List(_)) {
                    return Err(NfoError::MalformedStructure {
                        details: format!("nested list under <{}>", tag),
                    });
                }
                write_node(writer, tag, item)?;
            }
            Ok(())
        }
        Node::Object(fields) => write_fields(writer, tag, fields, true),
    }
}

fn write_fields(
    writer: &mut XmlWriter,
    tag: &str,
    fields: &Fields,
    accept_alt_text: bool,
) -> Result<()> {
    let mut attributes = Vec::new();
    let mut text = None;
    let mut children = Vec::new();

    for (key, value) in fields.iter() {
        if let Some(name) = key.strip_prefix(ATTRIBUTE_PREFIX) {
            let Node::Scalar(value) = value else {
                return Err(NfoError::MalformedStructure {
                    details: format!("attribute '{}' on <{}> must be a scalar", name, tag),
                });
            };
            attributes.push((name, value.as_str()));
        } else if key == TEXT_KEY || (accept_alt_text && key == ALT_TEXT_KEY) {
            let Node::Scalar(value) = value else {
                return Err(NfoError::MalformedStructure {
                    details: format!("text of <{}> must be a scalar", tag),
                });
            };
            text = Some(value.as_str());
        } else {
            children.push((key, value));
        }
    }

    if children.is_empty() {
        return write_text_element(writer, tag, &attributes, text);
    }

    writer.write_event(Event::Start(start_tag(tag, &attributes)))?;
    if let Some(text) = text {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }
    for (key, value) in children {
        write_node(writer, key, value)?;
    }
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn write_text_element(
    writer: &mut XmlWriter,
    tag: &str,
    attributes: &[(&str, &str)],
    text: Option<&str>,
) -> Result<()> {
    let start = start_tag(tag, attributes);
    match text {
        Some(text) if !text.is_empty() => {
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Text(BytesText::new(text)))?;
            writer.write_event(Event::End(BytesEnd::new(tag)))?;
        }
        _ => writer.write_event(Event::Empty(start))?,
    }
    Ok(())
}

fn start_tag<'a>(tag: &'a str, attributes: &[(&'a str, &'a str)]) -> BytesStart<'a> {
    let mut start = BytesStart::new(tag);
    for attribute in attributes {
        start.push_attribute(*attribute);
    }
    start
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_document;

    fn compact(json: &str) -> CompactDocument {
        CompactDocument::from_json(json, None).unwrap()
    }

    fn tags_in_order(xml: &str) -> Vec<String> {
        let root = parse_document(xml).unwrap();
        let movie = &root.child("media").unwrap().children[0];
        movie.children.iter().map(|c| c.tag.clone()).collect()
    }

    #[test]
    fn test_root_carries_namespace_and_schema_location() {
        let xml = serialize(&compact(r#"{"title": "Foo"}"#), ToXmlConfig::default()).unwrap();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"xmlns="NFOStandard""#));
        assert!(xml.contains(r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#));
        assert!(xml.contains(SCHEMA_LOCATION));

        let root = parse_document(&xml).unwrap();
        assert_eq!(root.attribute("schemaLocation"), Some(SCHEMA_LOCATION));
    }

    #[test]
    fn test_known_fields_follow_table_order() {
        let xml = serialize(
            &compact(r#"{"type": "movie", "movie": {"plot": "P", "custom": "C", "title": "T", "year": "2020"}}"#),
            ToXmlConfig::default(),
        )
        .unwrap();
        assert_eq!(tags_in_order(&xml), vec!["title", "year", "plot", "custom"]);
    }

    #[test]
    fn test_unknown_fields_keep_input_order() {
        let xml = serialize(
            &compact(r#"{"type": "video", "video": {"zeta": "1", "alpha": "2", "title": "T"}}"#),
            ToXmlConfig::default(),
        )
        .unwrap();
        assert_eq!(tags_in_order(&xml), vec!["zeta", "alpha", "title"]);
    }

    #[test]
    fn test_list_becomes_siblings_in_order() {
        let xml = serialize(
            &compact(r#"{"movie": {"genre": ["Action", "Drama"], "title": "Foo"}}"#),
            ToXmlConfig { pretty: false, indent: 0 },
        )
        .unwrap();
        assert!(xml.contains("<title>Foo</title><genre>Action</genre><genre>Drama</genre>"));
    }

    #[test]
    fn test_singleton_list_matches_scalar() {
        let config = ToXmlConfig::default();
        let from_scalar = serialize(&compact(r#"{"genre": "Action"}"#), config).unwrap();
        let from_list = serialize(&compact(r#"{"genre": ["Action"]}"#), config).unwrap();
        assert_eq!(from_scalar, from_list);
    }

    #[test]
    fn test_attributes_text_and_nested() {
        let xml = serialize(
            &compact(
                r##"{"movie": {"rating": {"@name": "imdb", "@max": 10, "#text": "8.1"},
                    "actor": [{"name": "A", "order": 1}, {"name": "B", "order": 2}],
                    "thumb": {"@aspect": "poster", "_text": "p.jpg"}}}"##,
            ),
            ToXmlConfig { pretty: false, indent: 0 },
        )
        .unwrap();

        assert!(xml.contains(r#"<rating name="imdb" max="10">8.1</rating>"#));
        assert!(xml.contains(r#"<thumb aspect="poster">p.jpg</thumb>"#));
        assert!(xml.contains(
            "<actor><name>A</name><order>1</order></actor><actor><name>B</name><order>2</order></actor>"
        ));
    }

    #[test]
    fn test_underscore_text_is_an_element_on_media() {
        let xml = serialize(
            &compact(r#"{"movie": {"title": "T", "_text": "x"}}"#),
            ToXmlConfig { pretty: false, indent: 0 },
        )
        .unwrap();
        assert!(xml.contains("<movie><title>T</title><_text>x</_text></movie>"));
    }

    #[test]
    fn test_empty_values_become_empty_elements() {
        let xml = serialize(
            &compact(r#"{"movie": {"title": "T", "tag": null, "set": {}}}"#),
            ToXmlConfig { pretty: false, indent: 0 },
        )
        .unwrap();
        assert!(xml.contains("<tag/>"));
        assert!(xml.contains("<set/>"));
    }

    #[test]
    fn test_library_is_sibling_of_media() {
        let xml = serialize(
            &compact(r#"{"type": "movie", "movie": {"title": "T"}, "library": {"path": "/m"}}"#),
            ToXmlConfig::default(),
        )
        .unwrap();
        let root = parse_document(&xml).unwrap();
        let tags: Vec<_> = root.children.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, vec!["media", "library"]);
    }

    #[test]
    fn test_special_characters_are_escaped() {
        let xml = serialize(&compact(r#"{"title": "Tom & Jerry <3>"}"#), ToXmlConfig::default()).unwrap();
        let root = parse_document(&xml).unwrap();
        assert_eq!(
            root.find_descendant("title").unwrap().text.as_deref(),
            Some("Tom & Jerry <3>")
        );
    }

    #[test]
    fn test_unsupported_media_type() {
        let err = serialize(&compact(r#"{"type": "book", "book": {}}"#), ToXmlConfig::default())
            .unwrap_err();
        assert_eq!(err.code(), "UnsupportedMediaTypeError");
    }

    #[test]
    fn test_non_scalar_attribute_is_rejected() {
        let err = serialize(
            &compact(r#"{"movie": {"rating": {"@name": ["a", "b"]}}}"#),
            ToXmlConfig::default(),
        )
        .unwrap_err();
        assert!(err.is_malformed_input());
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let doc = compact(r#"{"movie": {"plot": "P", "genre": ["A", "B"], "title": "T"}}"#);
        let first = serialize(&doc, ToXmlConfig::default()).unwrap();
        let second = serialize(&doc, ToXmlConfig::default()).unwrap();
        assert_eq!(first, second);
    }
}
