use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::document::Element;
use crate::error::{NfoError, Result};
use crate::http_client::{AsyncHttpClient, HttpClientConfig, is_remote};
use crate::libxml2::{LibXml2Wrapper, XmlSchemaPtr};
use crate::to_xml::XSI_NAMESPACE;

/// Local name of the schema hint in the XMLSchema-instance namespace
pub const SCHEMA_LOCATION_ATTRIBUTE: &str = "schemaLocation";

/// Parsed `xsi:schemaLocation` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaReference {
    pub namespace: String,
    pub url: String,
}

impl SchemaReference {
    /// Parse `"<namespace> <url> ..."`; further pairs are ignored
    pub fn parse(value: &str) -> Result<Self> {
        let mut tokens = value.split_whitespace();
        match (tokens.next(), tokens.next()) {
            (Some(namespace), Some(url)) => Ok(Self {
                namespace: namespace.to_string(),
                url: url.to_string(),
            }),
            _ => Err(NfoError::MalformedSchemaReference {
                value: value.to_string(),
            }),
        }
    }

    /// Read `xsi:schemaLocation` from a document's root element
    pub fn from_root(root: &Element) -> Result<Self> {
        let value = root
            .namespaced_attribute(XSI_NAMESPACE, SCHEMA_LOCATION_ATTRIBUTE)
            .ok_or(NfoError::MissingSchemaReference)?;
        Self::parse(value)
    }
}

/// Source of raw schema bytes
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;

    /// Location handed to libxml2 so relative includes resolve
    fn base_uri(&self, url: &str) -> String {
        url.to_string()
    }
}

/// Offline fetcher: every URL maps to `<schema_dir>/<last path segment>`
#[derive(Debug, Clone)]
pub struct LocalSchemaFetcher {
    schema_dir: PathBuf,
}

impl LocalSchemaFetcher {
    pub fn new(schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            schema_dir: schema_dir.into(),
        }
    }

    pub fn resolve(&self, url: &str) -> PathBuf {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let file_name = path.rsplit('/').next().unwrap_or(path);
        self.schema_dir.join(file_name)
    }
}

#[async_trait]
impl SchemaFetcher for LocalSchemaFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let path = self.resolve(url);
        debug!("Reading schema {} from {}", url, path.display());
        tokio::fs::read(&path).await.map_err(|e| NfoError::SchemaLoad {
            url: url.to_string(),
            details: format!("{}: {}", path.display(), e),
        })
    }

    fn base_uri(&self, url: &str) -> String {
        self.resolve(url).display().to_string()
    }
}

/// Fetches schema bytes and compiles them with libxml2
#[derive(Clone)]
pub struct SchemaLoader {
    fetcher: Arc<dyn SchemaFetcher>,
    wrapper: LibXml2Wrapper,
}

impl SchemaLoader {
    pub fn new(fetcher: Arc<dyn SchemaFetcher>) -> Self {
        Self {
            fetcher,
            wrapper: LibXml2Wrapper::new(),
        }
    }

    /// Offline loader when `schema_dir` is set, HTTP loader otherwise
    pub fn from_settings(schema_dir: Option<&Path>, http: HttpClientConfig) -> Result<Self> {
        let fetcher: Arc<dyn SchemaFetcher> = match schema_dir {
            Some(dir) => Arc::new(LocalSchemaFetcher::new(dir)),
            None => Arc::new(AsyncHttpClient::new(http)?),
        };
        Ok(Self::new(fetcher))
    }

    /// Fetch and compile one schema; every failure becomes `SchemaLoad`
    pub async fn load(&self, url: &str) -> Result<XmlSchemaPtr> {
        if is_remote(url) {
            info!("Fetching schema {}", url);
        } else {
            debug!("Loading schema {}", url);
        }

        let data = self.fetcher.fetch(url).await.map_err(|e| schema_load(url, e))?;
        let base_uri = self.fetcher.base_uri(url);
        let wrapper = self.wrapper;

        tokio::task::spawn_blocking(move || wrapper.parse_schema(&data, &base_uri))
            .await
            .map_err(|e| NfoError::SchemaLoad {
                url: url.to_string(),
                details: e.to_string(),
            })?
            .map_err(|e| NfoError::SchemaLoad {
                url: url.to_string(),
                details: e.to_string(),
            })
    }
}

fn schema_load(url: &str, error: NfoError) -> NfoError {
    match error {
        NfoError::SchemaLoad { .. } => error,
        other => NfoError::SchemaLoad {
            url: url.to_string(),
            details: other.to_string(),
        },
    }
}
