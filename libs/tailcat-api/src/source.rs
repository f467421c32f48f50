use std::future::Future;
use std::pin::Pin;

use crate::error::TailError;
use crate::record::Message;

/// Where a partition stream begins reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOffset {
    /// Oldest offset still retained by the broker.
    Oldest,
    /// Skip everything already written; wait for new messages.
    Newest,
    /// An explicit offset (inclusive).
    At(i64),
}

/// Result of one pull from a partition stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Message(Message),
    /// The consumer reached the current end of the partition. More
    /// messages may still arrive later.
    EndOfPartition,
    /// The stream is closed; no further deliveries.
    Closed,
}

/// Pull-based handle over one partition, opened at a start position.
pub trait PartitionStream: Send {
    /// Wait for the next delivery. Cancel-safe: dropping the future
    /// before it resolves loses no message.
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Result<Delivery, TailError>> + Send + '_>>;
}

/// The broker as seen by the pipeline: offsets of partition 0 plus a way
/// to open a stream on it.
pub trait MessageSource: Send + Sync {
    /// Offset one past the most recently written message (0 when empty).
    fn high_water_mark(
        &self,
        topic: &str,
    ) -> Pin<Box<dyn Future<Output = Result<i64, TailError>> + Send + '_>>;

    /// Oldest offset still available.
    fn oldest_offset(
        &self,
        topic: &str,
    ) -> Pin<Box<dyn Future<Output = Result<i64, TailError>> + Send + '_>>;

    /// Open partition 0 of `topic` at `start`.
    fn open(
        &self,
        topic: &str,
        start: StartOffset,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn PartitionStream>, TailError>> + Send + '_>>;
}
