//! High-level XML ↔ JSON conversion, single documents and batches.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{NfoError, Result};
use crate::to_xml::{self, ToXmlConfig};
use crate::tree::{CanonicalDocument, CompactDocument, Fields, Node, TreeOptions};

/// Options shared by both conversion directions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Hoist `root/media/<type>` to the top level of the JSON
    pub compact: bool,
    pub include_attributes: bool,
    /// Drop empty objects and lists from the JSON
    pub simplify: bool,
    pub pretty: bool,
    pub indent: usize,
    /// Media type used by JSON → XML when the JSON has no `type` key
    pub default_type: Option<String>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            compact: false,
            include_attributes: true,
            simplify: false,
            pretty: true,
            indent: 2,
            default_type: None,
        }
    }
}

impl ConversionOptions {
    fn to_xml_config(&self) -> ToXmlConfig {
        ToXmlConfig {
            pretty: self.pretty,
            indent: self.indent,
        }
    }
}

/// Conversion direction of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    XmlToJson,
    JsonToXml,
}

impl Direction {
    /// Extension given to converted files
    pub fn target_extension(&self) -> &'static str {
        match self {
            Direction::XmlToJson => "json",
            Direction::JsonToXml => "nfo",
        }
    }

    /// Extensions picked up when converting a directory
    pub fn source_extensions(&self) -> &'static [&'static str] {
        match self {
            Direction::XmlToJson => &["nfo", "xml"],
            Direction::JsonToXml => &["json"],
        }
    }

    pub fn convert(&self, input: &[u8], options: &ConversionOptions) -> Result<String> {
        match self {
            Direction::XmlToJson => xml_to_json(input, options),
            Direction::JsonToXml => {
                let text = std::str::from_utf8(input).map_err(|e| NfoError::MalformedStructure {
                    details: format!("input is not UTF-8: {}", e),
                })?;
                json_to_xml(text, options)
            }
        }
    }
}

/// Convert an XML document to JSON text
pub fn xml_to_json(input: impl AsRef<[u8]>, options: &ConversionOptions) -> Result<String> {
    let document = CanonicalDocument::parse(
        input,
        TreeOptions {
            include_attributes: options.include_attributes,
        },
    )?;

    let compact = if options.compact {
        let compact = document.compact();
        if compact.is_none() {
            debug!("No root/media/<type> element, writing the full form");
        }
        compact
    } else {
        None
    };

    match compact {
        Some(mut compact) => {
            if options.simplify {
                compact.library = compact.library.and_then(Node::simplify);
                match std::mem::replace(&mut compact.media, Node::empty()).simplify() {
                    Some(media) => compact.media = media,
                    None => return to_json_string(&without_media(compact), options),
                }
            }
            to_json_string(&compact, options)
        }
        None if options.simplify => {
            let root = document.root.simplify();
            let mut map = serde_json::Map::new();
            map.insert(document.root_tag, serde_json::to_value(&root)?);
            to_json_string(&map, options)
        }
        None => to_json_string(&document, options),
    }
}

/// Compact form whose media subtree simplified away entirely
fn without_media(compact: CompactDocument) -> Node {
    let mut fields = Fields::new();
    fields.insert("type", Node::Scalar(compact.media_type));
    if let Some(library) = compact.library {
        fields.insert("library", library);
    }
    Node::Object(fields)
}

/// Convert JSON text to an NFO XML document.
///
/// Accepts the compact form as well as the full form produced without
/// compaction (`{"root": {"media": {...}}}`).
pub fn json_to_xml(input: &str, options: &ConversionOptions) -> Result<String> {
    let node: Node = serde_json::from_str(input)?;
    let document = match full_form_root(&node) {
        Some(root) => CanonicalDocument {
            root_tag: "root".to_string(),
            root: root.clone(),
        }
        .compact()
        .ok_or_else(|| NfoError::MalformedStructure {
            details: "root has no recognised media element".to_string(),
        })?,
        None => CompactDocument::from_node(node, options.default_type.as_deref())?,
    };

    to_xml::serialize(&document, options.to_xml_config())
}

/// `{"root": {"media": ...}}` with nothing else at the top level
fn full_form_root(node: &Node) -> Option<&Node> {
    let fields = node.as_object()?;
    if fields.len() != 1 {
        return None;
    }
    let root = fields.get("root")?;
    root.as_object()?.get("media")?;
    Some(root)
}

fn to_json_string<T: Serialize>(value: &T, options: &ConversionOptions) -> Result<String> {
    if !options.pretty {
        return Ok(serde_json::to_string(value)?);
    }

    let indent = vec![b' '; options.indent];
    let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;

    String::from_utf8(buffer).map_err(|e| NfoError::MalformedStructure {
        details: format!("generated JSON is not UTF-8: {}", e),
    })
}

/// Outcome of a batch conversion
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// (input, output) pairs that converted
    pub converted: Vec<(PathBuf, PathBuf)>,
    /// Inputs that failed, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Where a converted file is written
pub fn output_path_for(input: &Path, output_dir: Option<&Path>, direction: Direction) -> PathBuf {
    let renamed = input.with_extension(direction.target_extension());
    match (output_dir, renamed.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => renamed,
    }
}

/// Convert every file in parallel; a failing file never stops the batch
pub fn convert_files(
    files: &[PathBuf],
    direction: Direction,
    options: &ConversionOptions,
    output_dir: Option<&Path>,
) -> Result<BatchSummary> {
    if let Some(dir) = output_dir {
        fs::create_dir_all(dir)?;
    }

    let outcomes: Vec<_> = files
        .par_iter()
        .map(|input| {
            let output = output_path_for(input, output_dir, direction);
            let outcome = convert_file(input, &output, direction, options);
            (input.clone(), output, outcome)
        })
        .collect();

    let mut summary = BatchSummary::default();
    for (input, output, outcome) in outcomes {
        match outcome {
            Ok(()) => summary.converted.push((input, output)),
            Err(e) => {
                warn!("Failed to convert {}: {}", input.display(), e);
                summary.failed.push((input, e.to_string()));
            }
        }
    }
    Ok(summary)
}

/// Convert one file on disk into another
pub fn convert_file(
    input: &Path,
    output: &Path,
    direction: Direction,
    options: &ConversionOptions,
) -> Result<()> {
    let content = fs::read(input)?;
    let converted = direction.convert(&content, options)?;
    fs::write(output, converted)?;
    debug!("Converted {} -> {}", input.display(), output.display());
    Ok(())
}
