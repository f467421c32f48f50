use std::collections::HashMap;
use std::sync::Arc;

use apache_avro::Schema;
use tailcat_api::{SchemaDescriptor, SchemaFetcher, TailError};

/// A registry schema, resolved once and shared by every message that
/// references it.
#[derive(Debug)]
pub struct CachedSchema {
    pub descriptor: SchemaDescriptor,
    /// Parsed form of `descriptor.raw_definition`.
    pub schema: Schema,
}

/// Process-lifetime cache of registry schemas keyed by (topic, schema id).
///
/// The same numeric id is not assumed to be globally unique across topics,
/// hence the topic in the key. Entries are never evicted or refreshed:
/// the registry never changes the schema behind an id.
pub struct SchemaCache {
    fetcher: Arc<dyn SchemaFetcher>,
    entries: HashMap<(String, u32), Arc<CachedSchema>>,
}

impl SchemaCache {
    pub fn new(fetcher: Arc<dyn SchemaFetcher>) -> Self {
        Self {
            fetcher,
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the schema for `(topic, id)`, fetching it on first use.
    pub async fn resolve(&mut self, topic: &str, id: u32) -> Result<Arc<CachedSchema>, TailError> {
        let key = (topic.to_string(), id);
        if let Some(cached) = self.entries.get(&key) {
            return Ok(Arc::clone(cached));
        }

        tracing::debug!(topic, schema_id = id, "schema cache miss, fetching from registry");
        let raw = self
            .fetcher
            .fetch_schema(id)
            .await
            .map_err(|e| e.with_context(format_args!("schema {id}")))?;

        let descriptor = SchemaDescriptor::parse(id, raw)
            .map_err(|e| TailError::schema(format!("schema {id}: invalid schema document: {e}")))?;
        let schema = Schema::parse_str(&descriptor.raw_definition)
            .map_err(|e| TailError::schema(format!("schema {id}: {e}")))?;

        tracing::info!(
            topic,
            schema_id = id,
            name = %descriptor.name,
            namespace = %descriptor.namespace,
            "resolved schema"
        );

        let cached = Arc::new(CachedSchema { descriptor, schema });
        self.entries.insert(key, Arc::clone(&cached));
        Ok(cached)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use tailcat_api::ErrorKind;

    use super::*;

    /// Registry fake: serves schemas from a map and records every fetch.
    #[derive(Default)]
    pub(crate) struct FakeRegistry {
        schemas: HashMap<u32, String>,
        fetched: Mutex<Vec<u32>>,
    }

    impl FakeRegistry {
        pub(crate) fn with_schema(mut self, id: u32, definition: &str) -> Self {
            self.schemas.insert(id, definition.to_string());
            self
        }

        pub(crate) fn fetches(&self) -> Vec<u32> {
            self.fetched.lock().unwrap().clone()
        }
    }

    impl SchemaFetcher for FakeRegistry {
        fn fetch_schema(&self, id: u32) -> Pin<Box<dyn Future<Output = Result<String, TailError>> + Send + '_>> {
            self.fetched.lock().unwrap().push(id);
            let found = self.schemas.get(&id).cloned();
            Box::pin(async move {
                found.ok_or_else(|| TailError::registry(format!("schema registry returned status 404 for id {id}")))
            })
        }
    }

    const USER: &str = r#"{"type":"record","name":"User","namespace":"acme","fields":[{"name":"id","type":"long"}]}"#;

    #[tokio::test]
    async fn fetches_once_per_topic_and_id() {
        let registry = Arc::new(FakeRegistry::default().with_schema(5, USER));
        let mut cache = SchemaCache::new(registry.clone());

        let first = cache.resolve("users", 5).await.unwrap();
        let second = cache.resolve("users", 5).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.fetches(), vec![5]);
        assert_eq!(first.descriptor.name, "User");
        assert_eq!(first.descriptor.namespace, "acme");
    }

    #[tokio::test]
    async fn same_id_on_another_topic_is_a_separate_entry() {
        let registry = Arc::new(FakeRegistry::default().with_schema(5, USER));
        let mut cache = SchemaCache::new(registry.clone());

        cache.resolve("users", 5).await.unwrap();
        cache.resolve("users-v2", 5).await.unwrap();

        assert_eq!(registry.fetches(), vec![5, 5]);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn registry_failure_is_not_cached() {
        let registry = Arc::new(FakeRegistry::default());
        let mut cache = SchemaCache::new(registry.clone());

        let err = cache.resolve("users", 9).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Registry);
        assert!(err.to_string().starts_with("schema 9: "));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn malformed_schema_is_a_schema_error() {
        let registry = Arc::new(FakeRegistry::default().with_schema(2, r#"{"type":"record","name":"Broken"}"#));
        let mut cache = SchemaCache::new(registry);

        let err = cache.resolve("t", 2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }
}
