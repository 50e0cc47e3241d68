//! Canonical tree shared by the XML and JSON converters.
//!
//! An element becomes a [`Node`]:
//!
//! - only text: `Scalar(text)`
//! - attributes and/or children: `Object` with `@name` keys for attributes,
//!   one key per child tag, and `#text` for any direct text
//! - nothing at all: an empty `Object`, written to JSON as `null`
//!
//! Children sharing a tag are grouped under that tag in first-occurrence
//! order. A group of one collapses to the bare node; larger groups become a
//! `List` in document order.

use std::fmt;

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::document::Element;
use crate::error::{NfoError, Result};
use crate::media_type::MediaType;

/// Key prefix marking an attribute inside an object
pub const ATTRIBUTE_PREFIX: char = '@';

/// Key holding direct text when an object also has attributes or children
pub const TEXT_KEY: &str = "#text";

/// One value of the canonical tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Scalar(String),
    List(Vec<Node>),
    Object(Fields),
}

/// Insertion-ordered field map with unique keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<(String, Node)>);

impl Fields {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert a field, replacing an existing value in place
    pub fn insert(&mut self, key: impl Into<String>, value: Node) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Node> {
        let index = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Node)> for Fields {
    fn from_iter<I: IntoIterator<Item = (String, Node)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (key, value) in iter {
            fields.insert(key, value);
        }
        fields
    }
}

impl IntoIterator for Fields {
    type Item = (String, Node);
    type IntoIter = std::vec::IntoIter<(String, Node)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Options for building a tree from an [`Element`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeOptions {
    /// Keep attributes as `@name` keys
    pub include_attributes: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            include_attributes: true,
        }
    }
}

impl Node {
    /// Present-but-empty element
    pub fn empty() -> Self {
        Node::Object(Fields::new())
    }

    pub fn scalar(text: impl Into<String>) -> Self {
        Node::Scalar(text.into())
    }

    /// Build a node from an element and everything below it
    pub fn from_element(element: &Element, options: TreeOptions) -> Self {
        let mut fields = Fields::new();

        if options.include_attributes {
            for attribute in &element.attributes {
                fields.insert(
                    format!("{}{}", ATTRIBUTE_PREFIX, attribute.name),
                    Node::scalar(&attribute.value),
                );
            }
        }

        let mut groups: Vec<(&str, Vec<Node>)> = Vec::new();
        for child in &element.children {
            let node = Node::from_element(child, options);
            match groups.iter_mut().find(|(tag, _)| *tag == child.tag) {
                Some((_, nodes)) => nodes.push(node),
                None => groups.push((child.tag.as_str(), vec![node])),
            }
        }
        for (tag, mut nodes) in groups {
            let node = if nodes.len() == 1 {
                nodes.remove(0)
            } else {
                Node::List(nodes)
            };
            fields.insert(tag, node);
        }

        match &element.text {
            Some(text) if fields.is_empty() => Node::scalar(text),
            Some(text) => {
                fields.insert(TEXT_KEY, Node::scalar(text));
                Node::Object(fields)
            }
            None => Node::Object(fields),
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Node::Scalar(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Fields> {
        match self {
            Node::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// Items of a list, or the node itself as a one-item sequence
    pub fn items(&self) -> Vec<&Node> {
        match self {
            Node::List(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    /// Recursively drop empty objects and lists; `None` when nothing remains
    pub fn simplify(self) -> Option<Node> {
        match self {
            Node::Scalar(text) => Some(Node::Scalar(text)),
            Node::List(items) => {
                let items: Vec<Node> = items.into_iter().filter_map(Node::simplify).collect();
                (!items.is_empty()).then_some(Node::List(items))
            }
            Node::Object(fields) => {
                let fields: Fields = fields
                    .into_iter()
                    .filter_map(|(key, value)| value.simplify().map(|value| (key, value)))
                    .collect();
                (!fields.is_empty()).then_some(Node::Object(fields))
            }
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Node::Scalar(text) => serializer.serialize_str(text),
            Node::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Node::Object(fields) if fields.is_empty() => serializer.serialize_none(),
            Node::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, value) in fields.iter() {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string, number, boolean, null, array or object")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Node, E> {
        Ok(Node::scalar(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Node, E> {
        Ok(Node::Scalar(v))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Node, E> {
        Ok(Node::Scalar(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Node, E> {
        Ok(Node::Scalar(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Node, E> {
        Ok(Node::Scalar(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Node, E> {
        Ok(Node::Scalar(v.to_string()))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Node, E> {
        Ok(Node::empty())
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Node, E> {
        Ok(Node::empty())
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> std::result::Result<Node, D::Error> {
        Node::deserialize(d)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Node, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element::<Node>()? {
            if matches!(item, Node::List(_)) {
                return Err(de::Error::custom("nested arrays cannot be written as XML"));
            }
            items.push(item);
        }
        Ok(Node::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Node, A::Error> {
        let mut fields = Fields::new();
        while let Some((key, value)) = map.next_entry::<String, Node>()? {
            fields.insert(key, value);
        }
        Ok(Node::Object(fields))
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Node, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

/// Full canonical form of a document: the root tag and its node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalDocument {
    pub root_tag: String,
    pub root: Node,
}

impl CanonicalDocument {
    pub fn from_element(element: &Element, options: TreeOptions) -> Self {
        Self {
            root_tag: element.tag.clone(),
            root: Node::from_element(element, options),
        }
    }

    /// Parse XML text or bytes into the canonical form
    pub fn parse(input: impl AsRef<[u8]>, options: TreeOptions) -> Result<Self> {
        let element = crate::document::parse_document(input)?;
        Ok(Self::from_element(&element, options))
    }

    /// `{ "<root tag>": <root node> }`
    pub fn to_json_value(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(self.root_tag.clone(), node_to_value(&self.root));
        serde_json::Value::Object(map)
    }

    /// First media type, in `MediaType::ALL` order, with a child under `root/media`
    pub fn media_type(&self) -> Option<MediaType> {
        if self.root_tag != "root" {
            return None;
        }
        let media = self.root.as_object()?.get("media")?.as_object()?;
        MediaType::ALL
            .into_iter()
            .find(|media_type| media.contains_key(media_type.as_str()))
    }

    /// Hoist the `root/media/<type>` subtree to the top level.
    ///
    /// Returns `None` when the document has no recognised media element.
    /// The canonical document itself is left untouched.
    pub fn compact(&self) -> Option<CompactDocument> {
        let media_type = self.media_type()?;
        let root = self.root.as_object()?;
        let media = root.get("media")?.as_object()?.get(media_type.as_str())?;

        Some(CompactDocument {
            media_type: media_type.as_str().to_string(),
            media: media.clone(),
            library: root.get("library").cloned(),
        })
    }
}

impl Serialize for CanonicalDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.root_tag, &self.root)?;
        map.end()
    }
}

/// Compact form: `{ "type": <media type>, <media type>: {...}, "library"?: {...} }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactDocument {
    /// Media type name as given; checked when writing XML
    pub media_type: String,
    pub media: Node,
    pub library: Option<Node>,
}

impl CompactDocument {
    pub fn new(media_type: MediaType, media: Node) -> Self {
        Self {
            media_type: media_type.as_str().to_string(),
            media,
            library: None,
        }
    }

    /// Read the compact form from a parsed JSON node.
    ///
    /// `type` defaults to `default_type` (or `movie`); when no key named
    /// after the media type exists, the whole object is the media subtree.
    pub fn from_node(node: Node, default_type: Option<&str>) -> Result<Self> {
        let Node::Object(mut fields) = node else {
            return Err(NfoError::MalformedStructure {
                details: "top-level JSON value must be an object".to_string(),
            });
        };

        let media_type = match fields.get("type") {
            Some(Node::Scalar(name)) => name.to_ascii_lowercase(),
            Some(_) => {
                return Err(NfoError::MalformedStructure {
                    details: "\"type\" must be a string".to_string(),
                });
            }
            None => default_type.unwrap_or("movie").to_ascii_lowercase(),
        };

        let library = fields.remove("library");
        let media = match fields.remove(&media_type) {
            Some(media) => media,
            None => {
                fields.remove("type");
                Node::Object(fields)
            }
        };

        Ok(Self {
            media_type,
            media,
            library,
        })
    }

    /// Parse the compact form from JSON text
    pub fn from_json(input: &str, default_type: Option<&str>) -> Result<Self> {
        let node: Node = serde_json::from_str(input)?;
        Self::from_node(node, default_type)
    }
}

impl Serialize for CompactDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let len = if self.library.is_some() { 3 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("type", &self.media_type)?;
        map.serialize_entry(&self.media_type, &self.media)?;
        if let Some(library) = &self.library {
            map.serialize_entry("library", library)?;
        }
        map.end()
    }
}

fn node_to_value(node: &Node) -> serde_json::Value {
    match node {
        Node::Scalar(text) => serde_json::Value::String(text.clone()),
        Node::List(items) => serde_json::Value::Array(items.iter().map(node_to_value).collect()),
        Node::Object(fields) if fields.is_empty() => serde_json::Value::Null,
        Node::Object(fields) => {
            let mut map = serde_json::Map::new();
            for (key, value) in fields.iter() {
                map.insert(key.to_string(), node_to_value(value));
            }
            serde_json::Value::Object(map)
        }
    }
}
