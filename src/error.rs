use std::path::PathBuf;

use thiserror::Error;

/// Main library error type covering conversion and validation failures
#[derive(Error, Debug)]
pub enum NfoError {
    #[error("XML syntax error: {details}")]
    MalformedXml { details: String },

    #[error("Invalid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("Invalid document structure: {details}")]
    MalformedStructure { details: String },

    #[error("Unsupported media type: {media_type}")]
    UnsupportedMediaType { media_type: String },

    #[error("No xsi:schemaLocation attribute found")]
    MissingSchemaReference,

    #[error("Invalid xsi:schemaLocation format")]
    MalformedSchemaReference { value: String },

    #[error("Failed to load schema {url}: {details}")]
    SchemaLoad { url: String, details: String },

    #[error("Schema validation error: {details}")]
    SchemaValidation { details: String },

    #[error("Unexpected error: {details}")]
    UnexpectedValidation { details: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status error: {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Request timeout: {url} after {timeout_seconds} seconds")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error("File system traversal error: {path} - {reason}")]
    FileSystemTraversal { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl NfoError {
    /// Stable taxonomy code for this error
    pub fn code(&self) -> &'static str {
        match self {
            NfoError::MalformedXml { .. }
            | NfoError::MalformedJson(_)
            | NfoError::MalformedStructure { .. } => "MalformedInputError",
            NfoError::UnsupportedMediaType { .. } => "UnsupportedMediaTypeError",
            NfoError::MissingSchemaReference => "MissingSchemaReferenceError",
            NfoError::MalformedSchemaReference { .. } => "MalformedSchemaReferenceError",
            NfoError::SchemaLoad { .. }
            | NfoError::Http(_)
            | NfoError::HttpStatus { .. }
            | NfoError::Timeout { .. } => "SchemaLoadError",
            NfoError::SchemaValidation { .. } => "SchemaValidationError",
            NfoError::UnexpectedValidation { .. } => "UnexpectedValidationError",
            NfoError::Io(_) => "IoError",
            NfoError::FileSystemTraversal { .. } => "FileSystemTraversalError",
            NfoError::Config(_) => "ConfigurationError",
        }
    }

    /// True for errors caused by unparseable input
    pub fn is_malformed_input(&self) -> bool {
        self.code() == "MalformedInputError"
    }
}

/// Configuration-specific error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

/// LibXML2-specific error types
#[derive(Error, Debug)]
pub enum LibXml2Error {
    #[error("Schema parsing failed: {details}")]
    SchemaParseFailed { details: String },

    #[error("Validation context creation failed")]
    ValidationContextCreationFailed,

    #[error("Memory allocation failed in libxml2")]
    MemoryAllocation,

    #[error("Invalid XML structure: {details}")]
    InvalidXml { details: String },

    #[error("Schema validation internal error: code {code}")]
    InternalError { code: i32 },
}

impl From<ConfigError> for NfoError {
    fn from(err: ConfigError) -> Self {
        NfoError::Config(err.to_string())
    }
}

impl From<quick_xml::Error> for NfoError {
    fn from(err: quick_xml::Error) -> Self {
        NfoError::MalformedXml {
            details: err.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, NfoError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// LibXML2 result type alias
pub type LibXml2Result<T> = std::result::Result<T, LibXml2Error>;
