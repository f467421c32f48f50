use std::path::{Path, PathBuf};
use std::time::Duration;

use rdkafka::ClientConfig;
use serde::{Deserialize, Deserializer};

/// Fixed group id. Partitions are assigned directly and offsets are never
/// committed, so the group only names the client to the broker.
const GROUP_ID: &str = "tailcat";

fn default_metadata_timeout() -> Duration {
    Duration::from_secs(10)
}

// ═══════════════════════════════════════════════════════════════
//  CertsConfig
// ═══════════════════════════════════════════════════════════════

/// TLS material for the broker connection. TLS is enabled as soon as any
/// path is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CertsConfig {
    #[serde(deserialize_with = "non_empty_path")]
    pub ca: Option<PathBuf>,
    #[serde(deserialize_with = "non_empty_path")]
    pub client_cert: Option<PathBuf>,
    #[serde(deserialize_with = "non_empty_path")]
    pub client_key: Option<PathBuf>,
    /// Skip broker certificate verification.
    pub insecure: bool,
}

impl CertsConfig {
    pub fn is_enabled(&self) -> bool {
        self.ca.is_some() || self.client_cert.is_some() || self.client_key.is_some()
    }

    /// Resolve relative paths against `base` (the config file's directory).
    pub fn resolve_relative_to(&mut self, base: &Path) {
        for path in [&mut self.ca, &mut self.client_cert, &mut self.client_key]
            .into_iter()
            .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

fn non_empty_path<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<PathBuf>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(PathBuf::from))
}

// ═══════════════════════════════════════════════════════════════
//  KafkaConfig
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaConfig {
    /// `host:port` bootstrap list.
    pub broker: String,
    pub certs: CertsConfig,
    /// Bound on watermark and metadata requests.
    pub metadata_timeout: Duration,
}

impl KafkaConfig {
    pub fn new(broker: impl Into<String>, certs: CertsConfig) -> Self {
        Self {
            broker: broker.into(),
            certs,
            metadata_timeout: default_metadata_timeout(),
        }
    }

    /// librdkafka properties for a read-only, manually assigned consumer.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.broker)
            .set("group.id", GROUP_ID)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("enable.partition.eof", "true")
            .set("auto.offset.reset", "earliest");

        if self.certs.is_enabled() {
            config.set("security.protocol", "ssl");
            if let Some(ca) = &self.certs.ca {
                config.set("ssl.ca.location", ca.to_string_lossy());
            }
            if let Some(cert) = &self.certs.client_cert {
                config.set("ssl.certificate.location", cert.to_string_lossy());
            }
            if let Some(key) = &self.certs.client_key {
                config.set("ssl.key.location", key.to_string_lossy());
            }
            if self.certs.insecure {
                tracing::warn!(broker = %self.broker, "broker certificate verification disabled");
                config.set("enable.ssl.certificate.verification", "false");
            }
        }
        config
    }
}
