//! [`MessageSource`](tailcat_api::MessageSource) backed by librdkafka.
//!
//! Reads partition 0 through a directly assigned `StreamConsumer`; no
//! consumer-group subscription and no offset commits.

mod config;
mod source;

pub use config::{CertsConfig, KafkaConfig};
pub use source::{KafkaSource, KafkaStream, PARTITION};
