use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{RwLock, watch};

use tailcat_api::{Delivery, Message, MessageSource, PartitionStream, StartOffset, TailError};

// ═══════════════════════════════════════════════════════════════
//  MemoryPartition
// ═══════════════════════════════════════════════════════════════

struct PartitionLog {
    records: VecDeque<Message>,
    next_offset: i64,
    max_records: usize,
    closed: bool,
}

/// In-memory append-only partition with optional size-based retention.
///
/// Offsets are assigned on append. Removing a record leaves a gap, the
/// way compaction does on a real broker.
pub struct MemoryPartition {
    log: RwLock<PartitionLog>,
    changed: watch::Sender<u64>,
}

impl MemoryPartition {
    pub fn new() -> Self {
        Self::with_retention(usize::MAX)
    }

    /// Keep at most `max_records`; older records expire on append.
    pub fn with_retention(max_records: usize) -> Self {
        Self {
            log: RwLock::new(PartitionLog {
                records: VecDeque::new(),
                next_offset: 0,
                max_records,
                closed: false,
            }),
            changed: watch::Sender::new(0),
        }
    }

    /// Append `message` at the next offset, which is returned. The
    /// message's own offset is ignored.
    pub async fn append(&self, message: Message) -> i64 {
        let mut log = self.log.write().await;
        let offset = log.next_offset;
        log.next_offset += 1;
        if log.records.len() >= log.max_records {
            log.records.pop_front();
        }
        log.records.push_back(Message { offset, ..message });
        drop(log);
        self.notify();
        offset
    }

    /// Append a message with `value` and default metadata.
    pub async fn append_value(&self, value: impl Into<Vec<u8>>) -> i64 {
        self.append(Message::new(0, value)).await
    }

    /// Drop the record at `offset`, leaving a gap.
    pub async fn remove(&self, offset: i64) -> bool {
        let mut log = self.log.write().await;
        let before = log.records.len();
        log.records.retain(|m| m.offset != offset);
        before != log.records.len()
    }

    /// Open streams return `Closed` once they have read everything.
    pub async fn close(&self) {
        self.log.write().await.closed = true;
        self.notify();
    }

    fn notify(&self) {
        self.changed.send_modify(|version| *version += 1);
    }

    async fn high_water_mark(&self) -> i64 {
        self.log.read().await.next_offset
    }

    async fn oldest_offset(&self) -> i64 {
        let log = self.log.read().await;
        log.records.front().map_or(log.next_offset, |m| m.offset)
    }

    async fn start_position(&self, start: StartOffset) -> i64 {
        match start {
            StartOffset::Oldest => self.oldest_offset().await,
            StartOffset::Newest => self.high_water_mark().await,
            StartOffset::At(offset) => offset,
        }
    }
}

impl Default for MemoryPartition {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryStream
// ═══════════════════════════════════════════════════════════════

/// Reads one [`MemoryPartition`] from a position, waiting for appends
/// once it reaches the end.
pub struct MemoryStream {
    partition: Arc<MemoryPartition>,
    changes: watch::Receiver<u64>,
    position: i64,
    at_end: bool,
}

impl MemoryStream {
    async fn next_delivery(&mut self) -> Delivery {
        loop {
            let _ = self.changes.borrow_and_update();
            {
                let log = self.partition.log.read().await;
                if let Some(message) = log.records.iter().find(|m| m.offset >= self.position) {
                    self.position = message.offset + 1;
                    self.at_end = false;
                    return Delivery::Message(message.clone());
                }
                if log.closed {
                    return Delivery::Closed;
                }
                if !self.at_end {
                    self.at_end = true;
                    return Delivery::EndOfPartition;
                }
            }
            if self.changes.changed().await.is_err() {
                return Delivery::Closed;
            }
        }
    }
}

impl PartitionStream for MemoryStream {
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Result<Delivery, TailError>> + Send + '_>> {
        Box::pin(async move { Ok(self.next_delivery().await) })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemorySource
// ═══════════════════════════════════════════════════════════════

/// Call counters, for asserting which broker reads a session made.
#[derive(Debug, Default)]
pub struct SourceCalls {
    pub high_water_mark: AtomicUsize,
    pub oldest_offset: AtomicUsize,
    pub open: AtomicUsize,
}

/// [`MessageSource`] over a fixed set of in-memory topics.
#[derive(Default)]
pub struct MemorySource {
    topics: HashMap<String, Arc<MemoryPartition>>,
    calls: SourceCalls,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `topic`, returning its partition for appends.
    pub fn add_topic(&mut self, topic: &str, partition: MemoryPartition) -> Arc<MemoryPartition> {
        let partition = Arc::new(partition);
        self.topics.insert(topic.to_string(), Arc::clone(&partition));
        partition
    }

    pub fn calls(&self) -> &SourceCalls {
        &self.calls
    }

    fn partition(&self, topic: &str) -> Result<Arc<MemoryPartition>, TailError> {
        self.topics
            .get(topic)
            .cloned()
            .ok_or_else(|| TailError::connect(format!("unknown topic {topic:?}")))
    }
}

impl MessageSource for MemorySource {
    fn high_water_mark(&self, topic: &str) -> Pin<Box<dyn Future<Output = Result<i64, TailError>> + Send + '_>> {
        self.calls.high_water_mark.fetch_add(1, Ordering::SeqCst);
        let partition = self.partition(topic);
        Box::pin(async move { Ok(partition?.high_water_mark().await) })
    }

    fn oldest_offset(&self, topic: &str) -> Pin<Box<dyn Future<Output = Result<i64, TailError>> + Send + '_>> {
        self.calls.oldest_offset.fetch_add(1, Ordering::SeqCst);
        let partition = self.partition(topic);
        Box::pin(async move { Ok(partition?.oldest_offset().await) })
    }

    fn open(
        &self,
        topic: &str,
        start: StartOffset,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn PartitionStream>, TailError>> + Send + '_>> {
        self.calls.open.fetch_add(1, Ordering::SeqCst);
        let partition = self.partition(topic);
        Box::pin(async move {
            let partition = partition?;
            let changes = partition.changed.subscribe();
            let position = partition.start_position(start).await;
            let stream: Box<dyn PartitionStream> = Box::new(MemoryStream {
                partition,
                changes,
                position,
                at_end: false,
            });
            Ok(stream)
        })
    }
}
