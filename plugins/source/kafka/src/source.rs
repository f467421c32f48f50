use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, KafkaResult};
use rdkafka::message::{BorrowedMessage, Headers, Message as _};
use rdkafka::{Offset, TopicPartitionList};

use tailcat_api::{Delivery, Header, Message, MessageSource, PartitionStream, StartOffset, TailError};

use crate::config::KafkaConfig;

/// The only partition this source reads.
pub const PARTITION: i32 = 0;

// ═══════════════════════════════════════════════════════════════
//  KafkaSource
// ═══════════════════════════════════════════════════════════════

pub struct KafkaSource {
    consumer: Arc<StreamConsumer>,
    timeout: Duration,
}

impl KafkaSource {
    /// Create the consumer. librdkafka connects lazily, so an unreachable
    /// broker surfaces on the first watermark or metadata request.
    pub fn connect(config: &KafkaConfig) -> Result<Self, TailError> {
        let consumer: StreamConsumer = config
            .client_config()
            .create()
            .map_err(|e| TailError::connect(format!("kafka client for {}: {e}", config.broker)))?;

        tracing::info!(broker = %config.broker, tls = config.certs.is_enabled(), "kafka consumer created");
        Ok(Self {
            consumer: Arc::new(consumer),
            timeout: config.metadata_timeout,
        })
    }

    /// Every topic name known to the cluster, sorted.
    pub async fn topics(&self) -> Result<Vec<String>, TailError> {
        let consumer = Arc::clone(&self.consumer);
        let timeout = self.timeout;
        let mut names = blocking(move || {
            let metadata = consumer.fetch_metadata(None, timeout)?;
            Ok(metadata.topics().iter().map(|t| t.name().to_string()).collect::<Vec<_>>())
        })
        .await
        .map_err(|e| e.with_context("list topics"))?;
        names.sort();
        Ok(names)
    }

    /// `(low, high)` watermarks of partition 0.
    async fn watermarks(&self, topic: &str) -> Result<(i64, i64), TailError> {
        let consumer = Arc::clone(&self.consumer);
        let timeout = self.timeout;
        let owned = topic.to_string();
        let (low, high) = blocking(move || consumer.fetch_watermarks(&owned, PARTITION, timeout))
            .await
            .map_err(|e| e.with_context(format_args!("topic {topic}: watermarks")))?;
        tracing::debug!(topic, low, high, "fetched watermarks");
        Ok((low, high))
    }
}

/// Run a blocking librdkafka call on the blocking pool.
async fn blocking<T, F>(call: F) -> Result<T, TailError>
where
    T: Send + 'static,
    F: FnOnce() -> KafkaResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| TailError::connect(format!("blocking task failed: {e}")))?
        .map_err(|e| TailError::connect(e.to_string()))
}

fn offset_for(start: StartOffset) -> Offset {
    match start {
        StartOffset::Oldest => Offset::Beginning,
        StartOffset::Newest => Offset::End,
        StartOffset::At(offset) => Offset::Offset(offset),
    }
}

impl MessageSource for KafkaSource {
    fn high_water_mark(&self, topic: &str) -> Pin<Box<dyn Future<Output = Result<i64, TailError>> + Send + '_>> {
        let topic = topic.to_string();
        Box::pin(async move { Ok(self.watermarks(&topic).await?.1) })
    }

    fn oldest_offset(&self, topic: &str) -> Pin<Box<dyn Future<Output = Result<i64, TailError>> + Send + '_>> {
        let topic = topic.to_string();
        Box::pin(async move { Ok(self.watermarks(&topic).await?.0) })
    }

    fn open(
        &self,
        topic: &str,
        start: StartOffset,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn PartitionStream>, TailError>> + Send + '_>> {
        let topic = topic.to_string();
        Box::pin(async move {
            let mut assignment = TopicPartitionList::new();
            assignment
                .add_partition_offset(&topic, PARTITION, offset_for(start))
                .map_err(|e| TailError::connect(format!("topic {topic}: {e}")))?;
            self.consumer
                .assign(&assignment)
                .map_err(|e| TailError::connect(format!("topic {topic}: assign partition {PARTITION}: {e}")))?;

            tracing::info!(topic = %topic, partition = PARTITION, ?start, "partition assigned");
            let stream: Box<dyn PartitionStream> = Box::new(KafkaStream {
                consumer: Arc::clone(&self.consumer),
                topic,
            });
            Ok(stream)
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  KafkaStream
// ═══════════════════════════════════════════════════════════════

pub struct KafkaStream {
    consumer: Arc<StreamConsumer>,
    topic: String,
}

impl PartitionStream for KafkaStream {
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Result<Delivery, TailError>> + Send + '_>> {
        Box::pin(async move {
            match self.consumer.recv().await {
                Ok(message) => Ok(Delivery::Message(to_message(&message))),
                Err(KafkaError::PartitionEOF(_)) => Ok(Delivery::EndOfPartition),
                Err(e) => Err(TailError::io(format!("topic {}: {e}", self.topic))),
            }
        })
    }
}

fn to_message(message: &BorrowedMessage<'_>) -> Message {
    let timestamp = message
        .timestamp()
        .to_millis()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    let headers = message.headers().map(|headers| {
        headers
            .iter()
            .map(|h| Header::new(h.key, h.value.unwrap_or_default()))
            .collect()
    });

    Message {
        offset: message.offset(),
        timestamp,
        key: message.key().unwrap_or_default().to_vec(),
        headers,
        value: message.payload().map(<[u8]>::to_vec),
    }
}
