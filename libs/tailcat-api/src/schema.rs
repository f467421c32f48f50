/// A schema as resolved from the registry.
///
/// Registry ids are stable for the lifetime of the process, so a
/// descriptor is immutable once built. Only `id`, `name` and `namespace`
/// appear in the output; `raw_definition` is the registry's schema text.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SchemaDescriptor {
    pub id: u32,
    pub name: String,
    pub namespace: String,
    #[serde(skip)]
    pub raw_definition: String,
}

/// The parts of a schema document we read. Everything else is ignored.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SchemaHeader {
    name: String,
    namespace: String,
}

impl SchemaDescriptor {
    /// Build a descriptor from the registry's JSON-encoded schema text.
    ///
    /// Primitive schemas such as `"string"` are valid JSON but carry no
    /// name; they produce a descriptor with empty name and namespace.
    pub fn parse(id: u32, raw_definition: impl Into<String>) -> Result<Self, serde_json::Error> {
        let raw_definition = raw_definition.into();
        let header = match serde_json::from_str::<serde_json::Value>(&raw_definition)? {
            value @ serde_json::Value::Object(_) => serde_json::from_value::<SchemaHeader>(value)?,
            _ => SchemaHeader::default(),
        };
        Ok(Self {
            id,
            name: header.name,
            namespace: header.namespace,
            raw_definition,
        })
    }
}
