use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use moka::future::Cache;
use tracing::debug;

use crate::error::{NfoError, Result};
use crate::libxml2::XmlSchemaPtr;
use crate::schema_loader::SchemaLoader;

/// In-memory cache of compiled schemas keyed by schema URL.
///
/// Entries are never evicted or expired: schemas are assumed immutable for
/// the lifetime of the cache. `moka` makes concurrent requests for a missing
/// URL wait on a single load, so each URL is fetched at most once per cache.
/// Failed loads are not cached.
#[derive(Clone)]
pub struct SchemaCache {
    cache: Cache<String, XmlSchemaPtr>,
    loader: SchemaLoader,
    loads: Arc<AtomicUsize>,
}

impl SchemaCache {
    pub fn new(loader: SchemaLoader) -> Self {
        Self {
            cache: Cache::builder().build(),
            loader,
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Return the compiled schema for `url`, loading it on first use
    pub async fn get_or_load(&self, url: &str) -> Result<XmlSchemaPtr> {
        let loader = &self.loader;
        let loads = &self.loads;

        self.cache
            .try_get_with(url.to_string(), async move {
                debug!("Schema cache miss for {}", url);
                loads.fetch_add(1, Ordering::SeqCst);
                loader.load(url).await
            })
            .await
            .map_err(|e| unwrap_shared_error(url, e))
    }

    /// Cached schema, if `url` has already been loaded
    pub async fn get(&self, url: &str) -> Option<XmlSchemaPtr> {
        self.cache.get(url).await
    }

    pub fn contains(&self, url: &str) -> bool {
        self.cache.contains_key(url)
    }

    /// Number of load attempts started, successful or not
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

/// moka hands every waiter the same `Arc<NfoError>`; rebuild an owned error
fn unwrap_shared_error(url: &str, error: Arc<NfoError>) -> NfoError {
    match Arc::try_unwrap(error) {
        Ok(error) => error,
        Err(shared) => match shared.as_ref() {
            NfoError::SchemaLoad { url, details } => NfoError::SchemaLoad {
                url: url.clone(),
                details: details.clone(),
            },
            other => NfoError::SchemaLoad {
                url: url.to_string(),
                details: other.to_string(),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_loader::SchemaFetcher;
    use async_trait::async_trait;
    use std::time::Duration;

    const SIMPLE_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="root" type="xs:string"/>
</xs:schema>"#;

    struct SlowFetcher {
        calls: AtomicUsize,
        body: &'static str,
    }

    #[async_trait]
    impl SchemaFetcher for SlowFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(self.body.as_bytes().to_vec())
        }
    }

    fn cache_with(body: &'static str) -> (SchemaCache, Arc<SlowFetcher>) {
        let fetcher = Arc::new(SlowFetcher {
            calls: AtomicUsize::new(0),
            body,
        });
        let cache = SchemaCache::new(SchemaLoader::new(fetcher.clone()));
        (cache, fetcher)
    }

    #[tokio::test]
    async fn test_concurrent_requests_load_once() {
        let (cache, fetcher) = cache_with(SIMPLE_XSD);

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_or_load("http://x/s.xsd").await })
            })
            .collect();

        let schemas: Vec<_> = futures::future::try_join_all(handles)
            .await
            .unwrap()
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.load_count(), 1);
        assert!(schemas.iter().all(|s| s.ptr_eq(&schemas[0])));
    }

    #[tokio::test]
    async fn test_distinct_urls_load_separately() {
        let (cache, fetcher) = cache_with(SIMPLE_XSD);

        cache.get_or_load("http://x/a.xsd").await.unwrap();
        cache.get_or_load("http://x/b.xsd").await.unwrap();
        cache.get_or_load("http://x/a.xsd").await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert!(cache.contains("http://x/a.xsd"));
        assert!(cache.get("http://x/b.xsd").await.is_some());
        assert!(cache.get("http://x/c.xsd").await.is_none());
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let (cache, fetcher) = cache_with("<not-a-schema/>");

        let err = cache.get_or_load("http://x/s.xsd").await.unwrap_err();
        assert_eq!(err.code(), "SchemaLoadError");
        assert!(!cache.contains("http://x/s.xsd"));

        cache.get_or_load("http://x/s.xsd").await.unwrap_err();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
