use std::num::NonZeroUsize;

use tailcat_api::{MessageSource, StartOffset, TailError};

use crate::mode::Mode;

/// Where a session starts and, for bounded modes, where it stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumptionBounds {
    pub start: StartOffset,
    /// Offset of the last message present when the session began.
    /// `None` when the partition held nothing.
    pub latest_offset: Option<i64>,
}

impl ConsumptionBounds {
    pub fn is_empty(&self) -> bool {
        self.latest_offset.is_none()
    }

    /// Whether a message at `offset` is at or past the snapshot end.
    pub fn reached(&self, offset: i64) -> bool {
        self.latest_offset.is_none_or(|latest| offset >= latest)
    }
}

/// First offset worth reading to end up with the last `n` of
/// `oldest..=latest`.
///
/// Small ranges are read whole. Larger ones start `5n` back from the end
/// so that gaps from compaction or transaction markers still leave at
/// least `n` messages before the end. The tail window makes the result
/// exact either way.
pub fn tail_start(oldest: i64, latest: i64, n: NonZeroUsize) -> i64 {
    let n = i64::try_from(n.get()).unwrap_or(i64::MAX);
    let range = latest - oldest + 1;
    if range <= n.saturating_mul(2) {
        oldest
    } else {
        oldest.max(latest.saturating_sub(n.saturating_mul(5)))
    }
}

/// Computes [`ConsumptionBounds`] for one topic.
pub struct OffsetResolver<'a> {
    source: &'a dyn MessageSource,
    topic: &'a str,
}

impl<'a> OffsetResolver<'a> {
    pub fn new(source: &'a dyn MessageSource, topic: &'a str) -> Self {
        Self { source, topic }
    }

    pub async fn resolve_bounds(&self, mode: Mode) -> Result<ConsumptionBounds, TailError> {
        let newest = self
            .source
            .high_water_mark(self.topic)
            .await
            .map_err(|e| e.with_context(format_args!("topic {}: high-water mark", self.topic)))?;

        if mode == Mode::Follow {
            return Ok(ConsumptionBounds {
                start: StartOffset::Newest,
                latest_offset: (newest > 0).then(|| newest - 1),
            });
        }

        let latest = self.latest_offset(newest).await?;
        let bounds = match (mode, latest) {
            (Mode::Tail { follow: true, .. }, None) => ConsumptionBounds {
                start: StartOffset::Newest,
                latest_offset: None,
            },
            (_, None) => ConsumptionBounds {
                start: StartOffset::Oldest,
                latest_offset: None,
            },
            (Mode::Tail { count, .. }, Some((oldest, latest))) => ConsumptionBounds {
                start: StartOffset::At(tail_start(oldest, latest, count)),
                latest_offset: Some(latest),
            },
            (_, Some((_, latest))) => ConsumptionBounds {
                start: StartOffset::Oldest,
                latest_offset: Some(latest),
            },
        };

        tracing::debug!(topic = %self.topic, newest, ?bounds, %mode, "resolved bounds");
        Ok(bounds)
    }

    /// `(oldest, latest)` of the retained messages, or `None` when the
    /// partition holds nothing. The oldest offset is only read when the
    /// high-water mark is non-zero.
    async fn latest_offset(&self, newest: i64) -> Result<Option<(i64, i64)>, TailError> {
        if newest <= 0 {
            return Ok(None);
        }
        let oldest = self
            .source
            .oldest_offset(self.topic)
            .await
            .map_err(|e| e.with_context(format_args!("topic {}: oldest offset", self.topic)))?;
        if oldest >= newest {
            return Ok(None);
        }
        Ok(Some((oldest, newest - 1)))
    }
}
