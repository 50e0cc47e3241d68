//! # nfo-standard
//!
//! Conversion between NFO Standard XML documents and JSON, and validation of
//! NFO documents against the XSD named in their `xsi:schemaLocation`, with
//! each schema fetched and compiled once per validator.

pub mod cache;
pub mod cli;
pub mod config;
pub mod converter;
pub mod document;
pub mod error;
pub mod file_discovery;
pub mod http_client;
pub mod libxml2;
pub mod media_type;
pub mod output;
pub mod schema_loader;
pub mod to_xml;
pub mod tree;
pub mod validator;

pub use cache::SchemaCache;
pub use cli::{Cli, Command, VerbosityLevel};
pub use config::{Config, ConfigManager};
pub use converter::{BatchSummary, ConversionOptions, Direction, json_to_xml, xml_to_json};
pub use document::{Attribute, Element, parse_document};
pub use error::{ConfigError, NfoError, Result};
pub use file_discovery::FileDiscovery;
pub use http_client::{AsyncHttpClient, HttpClientConfig};
pub use libxml2::{Diagnostic, LibXml2Wrapper, ValidationResult, XmlSchemaPtr};
pub use media_type::MediaType;
pub use output::{Output, OutputFormat};
pub use schema_loader::{LocalSchemaFetcher, SchemaFetcher, SchemaLoader, SchemaReference};
pub use to_xml::ToXmlConfig;
pub use tree::{CanonicalDocument, CompactDocument, Fields, Node, TreeOptions};
pub use validator::{
    FileValidationResult, NfoValidator, ValidationConfig, ValidationReport, ValidationResults,
};
