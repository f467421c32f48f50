use apache_avro::types::Value;
use apache_avro::Schema;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tailcat_api::TailError;

// ═══════════════════════════════════════════════════════════════
//  Binary datum → JSON
// ═══════════════════════════════════════════════════════════════

/// Decode one Avro binary datum (no container header) with `schema`.
pub fn decode_datum(schema: &Schema, data: &[u8]) -> Result<serde_json::Value, TailError> {
    let mut reader = data;
    let avro_value = apache_avro::from_avro_datum(schema, &mut reader, None)
        .map_err(|e| TailError::decode(format!("avro decode: {e}")))?;
    Ok(avro_to_value(&avro_value))
}

// ═══════════════════════════════════════════════════════════════
//  Avro → JSON conversion
// ═══════════════════════════════════════════════════════════════

pub(crate) fn avro_to_value(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::from(*b),
        Value::Int(n) | Value::Date(n) | Value::TimeMillis(n) => Json::from(*n),
        Value::Long(n)
        | Value::TimeMicros(n)
        | Value::TimestampMillis(n)
        | Value::TimestampMicros(n)
        | Value::TimestampNanos(n)
        | Value::LocalTimestampMillis(n)
        | Value::LocalTimestampMicros(n)
        | Value::LocalTimestampNanos(n) => Json::from(*n),
        // Non-finite floats have no JSON form and become null.
        Value::Float(f) => Json::from(*f),
        Value::Double(f) => Json::from(*f),
        Value::Bytes(b) | Value::Fixed(_, b) => Json::String(BASE64.encode(b)),
        Value::String(s) | Value::Enum(_, s) => Json::String(s.clone()),
        Value::Uuid(u) => Json::String(u.to_string()),
        Value::BigDecimal(d) => Json::String(d.to_string()),
        // Unscaled two's-complement bytes; the scale lives in the schema.
        Value::Decimal(d) => {
            let bytes: Vec<u8> = d.try_into().unwrap_or_default();
            Json::String(BASE64.encode(bytes))
        }
        Value::Duration(d) => serde_json::json!({
            "months": u32::from(d.months()),
            "days": u32::from(d.days()),
            "millis": u32::from(d.millis()),
        }),
        Value::Union(_, inner) => avro_to_value(inner),
        Value::Array(items) => Json::Array(items.iter().map(avro_to_value).collect()),
        Value::Map(entries) => object(entries.iter()),
        Value::Record(fields) => object(fields.iter().map(|(k, v)| (k, v))),
    }
}

fn object<'a>(entries: impl Iterator<Item = (&'a String, &'a Value)>) -> serde_json::Value {
    serde_json::Value::Object(entries.map(|(k, v)| (k.clone(), avro_to_value(v))).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER: &str = r#"{
        "type": "record",
        "name": "Order",
        "namespace": "shop",
        "fields": [
            {"name": "id", "type": "long"},
            {"name": "note", "type": ["null", "string"]},
            {"name": "tags", "type": {"type": "array", "items": "string"}},
            {"name": "blob", "type": "bytes"},
            {"name": "state", "type": {"type": "enum", "name": "State", "symbols": ["NEW", "DONE"]}}
        ]
    }"#;

    fn encode(schema: &Schema, fields: Vec<(&str, Value)>) -> Vec<u8> {
        let record = Value::Record(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect());
        apache_avro::to_avro_datum(schema, record).unwrap()
    }

    #[test]
    fn record_becomes_object() {
        let schema = Schema::parse_str(ORDER).unwrap();
        let bytes = encode(
            &schema,
            vec![
                ("id", Value::Long(7)),
                ("note", Value::Union(1, Box::new(Value::String("rush".into())))),
                ("tags", Value::Array(vec![Value::String("a".into())])),
                ("blob", Value::Bytes(b"hi".to_vec())),
                ("state", Value::Enum(1, "DONE".into())),
            ],
        );

        let value = decode_datum(&schema, &bytes).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": 7,
                "note": "rush",
                "tags": ["a"],
                "blob": "aGk=",
                "state": "DONE",
            })
        );
    }

    #[test]
    fn null_union_branch() {
        let schema = Schema::parse_str(ORDER).unwrap();
        let bytes = encode(
            &schema,
            vec![
                ("id", Value::Long(1)),
                ("note", Value::Union(0, Box::new(Value::Null))),
                ("tags", Value::Array(vec![])),
                ("blob", Value::Bytes(vec![])),
                ("state", Value::Enum(0, "NEW".into())),
            ],
        );

        let value = decode_datum(&schema, &bytes).unwrap();
        assert_eq!(value["note"], serde_json::Value::Null);
        assert_eq!(value["tags"], serde_json::json!([]));
    }

    #[test]
    fn truncated_datum_is_a_decode_error() {
        let schema = Schema::parse_str(ORDER).unwrap();
        let err = decode_datum(&schema, &[]).unwrap_err();
        assert_eq!(err.kind(), tailcat_api::ErrorKind::Decode);
    }
}
