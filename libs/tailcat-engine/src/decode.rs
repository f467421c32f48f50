use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tailcat_api::{Message, SchemaFetcher, TailError};

use crate::avro;
use crate::escape;
use crate::output::{DecodedOutput, Metadata};
use crate::schema_cache::SchemaCache;

/// First byte of a registry-framed value.
pub const MAGIC_BYTE: u8 = 0x00;
/// Magic byte plus big-endian u32 schema id.
pub const WIRE_HEADER_LEN: usize = 5;

/// Split a registry-framed value into schema id and datum bytes.
///
/// Returns `None` for anything that must take the plain-value path:
/// absent values, values shorter than the header, or a first byte other
/// than [`MAGIC_BYTE`].
pub fn registry_frame(value: Option<&[u8]>) -> Option<(u32, &[u8])> {
    let value = value?;
    if value.len() < WIRE_HEADER_LEN || value[0] != MAGIC_BYTE {
        return None;
    }
    let id = u32::from_be_bytes([value[1], value[2], value[3], value[4]]);
    Some((id, &value[WIRE_HEADER_LEN..]))
}

/// Decode a value that carries no registry frame.
///
/// Escaped text is unescaped first, then parsed as JSON. An unescaped
/// result that is not JSON is kept as text, or as base64 when it is not
/// valid UTF-8.
pub fn decode_plain(value: Option<&[u8]>) -> serde_json::Value {
    let Some(raw) = value else {
        return serde_json::Value::Null;
    };
    let text = escape::unescape_or_raw(raw);
    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(&text) {
        return json;
    }
    match std::str::from_utf8(&text) {
        Ok(s) => serde_json::Value::String(s.to_string()),
        Err(_) => serde_json::Value::String(BASE64.encode(&text)),
    }
}

/// Turns raw messages into output elements, owning the schema cache.
pub struct PayloadDecoder {
    cache: SchemaCache,
}

impl PayloadDecoder {
    pub fn new(fetcher: Arc<dyn SchemaFetcher>) -> Self {
        Self {
            cache: SchemaCache::new(fetcher),
        }
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    pub async fn decode(&mut self, topic: &str, message: &Message) -> Result<DecodedOutput, TailError> {
        let metadata = Metadata::from_message(message);

        let Some((id, datum)) = registry_frame(message.value.as_deref()) else {
            return Ok(DecodedOutput {
                schema: None,
                metadata,
                payload: decode_plain(message.value.as_deref()),
            });
        };

        let resolved = self.cache.resolve(topic, id).await?;
        let payload = avro::decode_datum(&resolved.schema, datum)
            .map_err(|e| e.with_context(format_args!("offset {} (schema {id})", message.offset)))?;

        Ok(DecodedOutput {
            schema: Some(resolved.descriptor.clone()),
            metadata,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use apache_avro::Schema;
    use apache_avro::types::Value;
    use tailcat_api::ErrorKind;

    use super::*;
    use crate::schema_cache::tests::FakeRegistry;

    const POINT: &str = r#"{"type":"record","name":"Point","namespace":"geo","fields":[{"name":"x","type":"int"},{"name":"y","type":"int"}]}"#;

    fn framed(id: u32, x: i32, y: i32) -> Vec<u8> {
        let schema = Schema::parse_str(POINT).unwrap();
        let record = Value::Record(vec![("x".into(), Value::Int(x)), ("y".into(), Value::Int(y))]);
        let mut bytes = vec![MAGIC_BYTE];
        bytes.extend_from_slice(&id.to_be_bytes());
        bytes.extend(apache_avro::to_avro_datum(&schema, record).unwrap());
        bytes
    }

    fn frame(bytes: &[u8]) -> Option<(u32, &[u8])> {
        registry_frame(Some(bytes))
    }

    fn plain(bytes: &[u8]) -> serde_json::Value {
        decode_plain(Some(bytes))
    }

    #[test]
    fn frame_detection() {
        let empty: &[u8] = &[];
        assert_eq!(registry_frame(None), None);
        assert_eq!(frame(&[0, 0, 1]), None);
        assert_eq!(frame(&[0, 0, 0, 0]), None);
        assert_eq!(frame(&[1, 0, 0, 0, 7, 9]), None);
        assert_eq!(frame(&[0, 0, 0, 1, 2]), Some((258, empty)));
        assert_eq!(frame(&[0, 0, 0, 0, 7, 9]), Some((7, &[9u8][..])));
    }

    #[test]
    fn plain_values() {
        assert_eq!(decode_plain(None), serde_json::Value::Null);
        assert_eq!(plain(br#""a""#), serde_json::json!("a"));
        assert_eq!(plain(br#"{"x":1}"#), serde_json::json!({"x": 1}));
        assert_eq!(plain(b"dGVzdA=="), serde_json::json!("dGVzdA=="));
        assert_eq!(plain(br#"{\"id\":5}"#), serde_json::json!({"id": 5}));
        assert_eq!(plain(b"42"), serde_json::json!(42));
        assert_eq!(plain(b""), serde_json::json!(""));
        assert_eq!(plain(&[0xff, 0x00, 0x01]), serde_json::json!("/wAB"));
        assert_eq!(plain(br"a\tb"), serde_json::json!("a\tb"));
        assert_eq!(plain(br"caf\u00e9 \x41"), serde_json::json!("café A"));
        // Not a valid escaped body: kept as written.
        assert_eq!(plain(br"bad \q"), serde_json::json!(r"bad \q"));
    }

    #[tokio::test]
    async fn short_values_never_reach_the_registry() {
        let registry = Arc::new(FakeRegistry::default());
        let mut decoder = PayloadDecoder::new(registry.clone());

        let out = decoder.decode("t", &Message::new(0, vec![0u8, 0, 0])).await.unwrap();
        assert!(out.schema.is_none());
        assert_eq!(out.payload, serde_json::json!("\u{0}\u{0}\u{0}"));
        assert!(registry.fetches().is_empty());
    }

    #[tokio::test]
    async fn framed_values_always_reach_the_registry() {
        let registry = Arc::new(FakeRegistry::default());
        let mut decoder = PayloadDecoder::new(registry.clone());

        let err = decoder.decode("t", &Message::new(0, vec![0u8, 0, 0, 0, 4])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Registry);
        assert_eq!(registry.fetches(), vec![4]);
    }

    #[tokio::test]
    async fn registry_payload_is_decoded_with_one_fetch() {
        let registry = Arc::new(FakeRegistry::default().with_schema(11, POINT));
        let mut decoder = PayloadDecoder::new(registry.clone());

        let first = decoder.decode("geo", &Message::new(0, framed(11, 1, 2))).await.unwrap();
        let second = decoder.decode("geo", &Message::new(1, framed(11, 3, 4))).await.unwrap();

        assert_eq!(first.payload, serde_json::json!({"x": 1, "y": 2}));
        assert_eq!(second.payload, serde_json::json!({"x": 3, "y": 4}));
        let schema = second.schema.unwrap();
        assert_eq!((schema.id, schema.name.as_str(), schema.namespace.as_str()), (11, "Point", "geo"));
        assert_eq!(registry.fetches(), vec![11]);
        assert_eq!(decoder.cache().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_datum_is_fatal() {
        let registry = Arc::new(FakeRegistry::default().with_schema(11, POINT));
        let mut decoder = PayloadDecoder::new(registry);

        let err = decoder.decode("geo", &Message::new(3, vec![0, 0, 0, 0, 11])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.is_fatal());
        assert!(err.to_string().starts_with("offset 3 (schema 11): "));
    }

    #[tokio::test]
    async fn tombstone_is_null() {
        let mut decoder = PayloadDecoder::new(Arc::new(FakeRegistry::default()));
        let out = decoder.decode("t", &Message::tombstone(9)).await.unwrap();
        assert_eq!(out.payload, serde_json::Value::Null);
        assert_eq!(out.metadata.offset, 9);
    }
}
