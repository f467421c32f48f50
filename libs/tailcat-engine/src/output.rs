use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use tailcat_api::{Header, Message, SchemaDescriptor, TailError};

/// One output element: the decoded payload plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedOutput {
    /// Present only for registry-encoded payloads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaDescriptor>,
    pub metadata: Metadata,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub offset: i64,
    #[serde(serialize_with = "rfc3339")]
    pub timestamp: DateTime<Utc>,
    pub key: String,
    #[serde(
        skip_serializing_if = "no_headers",
        serialize_with = "header_map"
    )]
    pub headers: Option<Vec<Header>>,
}

impl Metadata {
    pub fn from_message(message: &Message) -> Self {
        Self {
            offset: message.offset,
            timestamp: message.timestamp,
            key: String::from_utf8_lossy(&message.key).into_owned(),
            headers: message.headers.clone(),
        }
    }
}

impl DecodedOutput {
    /// Pretty-print (2-space indent) as one array element.
    ///
    /// Every field is a plain value or a `serde_json::Value`, so this does
    /// not fail in practice; the `Render` error exists for the
    /// skip-and-continue path in the controller.
    pub fn render(&self) -> Result<String, TailError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TailError::render(format!("offset {}: {e}", self.metadata.offset)))
    }
}

fn rfc3339<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn no_headers(headers: &Option<Vec<Header>>) -> bool {
    headers.as_ref().is_none_or(Vec::is_empty)
}

// Headers keep delivery order. A repeated key is written twice; JSON
// readers keep the last one.
fn header_map<S: Serializer>(headers: &Option<Vec<Header>>, serializer: S) -> Result<S::Ok, S::Error> {
    let headers = headers.as_deref().unwrap_or_default();
    let mut map = serializer.serialize_map(Some(headers.len()))?;
    for header in headers {
        map.serialize_entry(&header.key, &String::from_utf8_lossy(&header.value))?;
    }
    map.end()
}
