use std::io::Write;
use std::time::Duration;

use tailcat_api::{Delivery, Message, MessageSource, PartitionStream, TailError};
use tokio_util::sync::CancellationToken;

use crate::decode::PayloadDecoder;
use crate::emitter::JsonArrayEmitter;
use crate::mode::Mode;
use crate::offsets::{ConsumptionBounds, OffsetResolver};
use crate::window::TailWindow;

// ═══════════════════════════════════════════════════════════════
//  Session types
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Tail+Follow ends after this long without a delivery.
    pub idle_timeout: Duration,
    /// Log progress at debug level every this many messages (0 = never).
    pub progress_every: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(10),
            progress_every: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Streaming,
    Draining,
    Cancelled,
}

/// Why a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Nothing to read and nothing to wait for.
    EmptyTopic,
    /// Consumed the message at the snapshot end.
    CaughtUp,
    /// The source reported the end of the partition.
    EndOfPartition,
    /// Tail+Follow saw no delivery within the idle timeout.
    IdleTimeout,
    /// The source closed the stream.
    Closed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub mode: Mode,
    pub stop: StopReason,
    /// Messages pulled from the source.
    pub consumed: u64,
    /// Elements written to the output array.
    pub emitted: u64,
    /// Messages dropped because they could not be rendered.
    pub skipped: u64,
}

// ═══════════════════════════════════════════════════════════════
//  Session entry point
// ═══════════════════════════════════════════════════════════════

/// Resolve bounds for `mode`, consume `topic` and write one JSON array to
/// `out`.
///
/// An empty partition outside follow modes prints `[]` without opening a
/// stream. Errors raised before the stream is opened leave `out`
/// untouched; later fatal errors close the array first.
pub async fn run_session<W: Write>(
    source: &dyn MessageSource,
    decoder: &mut PayloadDecoder,
    topic: &str,
    mode: Mode,
    out: W,
    options: SessionOptions,
    cancel: &CancellationToken,
) -> Result<SessionSummary, TailError> {
    let bounds = OffsetResolver::new(source, topic).resolve_bounds(mode).await?;

    if bounds.is_empty() && !mode.follows() {
        tracing::info!(topic = %topic, %mode, "partition is empty");
        let mut emitter = JsonArrayEmitter::new(out);
        emitter.finish()?;
        return Ok(SessionSummary {
            mode,
            stop: StopReason::EmptyTopic,
            consumed: 0,
            emitted: 0,
            skipped: 0,
        });
    }

    let mut stream = source
        .open(topic, bounds.start)
        .await
        .map_err(|e| e.with_context(format_args!("topic {topic}")))?;

    let mut controller = StreamController::new(topic, mode, bounds, decoder, out, options);
    controller.run(stream.as_mut(), cancel).await
}

// ═══════════════════════════════════════════════════════════════
//  StreamController
// ═══════════════════════════════════════════════════════════════

/// Drives one session: pull, decode, window or emit, decide when to stop.
pub struct StreamController<'a, W: Write> {
    topic: String,
    mode: Mode,
    bounds: ConsumptionBounds,
    options: SessionOptions,
    decoder: &'a mut PayloadDecoder,
    emitter: JsonArrayEmitter<W>,
    /// Backlog for tail modes. `None` once elements go straight out.
    window: Option<TailWindow>,
    state: State,
    consumed: u64,
    skipped: u64,
}

impl<'a, W: Write> StreamController<'a, W> {
    pub fn new(
        topic: &str,
        mode: Mode,
        bounds: ConsumptionBounds,
        decoder: &'a mut PayloadDecoder,
        out: W,
        options: SessionOptions,
    ) -> Self {
        Self {
            topic: topic.to_string(),
            mode,
            bounds,
            options,
            decoder,
            emitter: JsonArrayEmitter::new(out),
            window: mode.tail_count().map(TailWindow::new),
            state: State::Idle,
            consumed: 0,
            skipped: 0,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Consume `stream` until a stop condition, then close the array.
    ///
    /// On a fatal error the array is closed with what was already
    /// emitted, any buffered tail elements are dropped, and the error is
    /// returned.
    pub async fn run(
        &mut self,
        stream: &mut dyn PartitionStream,
        cancel: &CancellationToken,
    ) -> Result<SessionSummary, TailError> {
        self.state = State::Streaming;
        tracing::info!(topic = %self.topic, mode = %self.mode, start = ?self.bounds.start, "streaming");

        // Tail+Follow on an empty partition has no backlog to wait for.
        if self.mode.follows() && self.bounds.is_empty() {
            self.go_live()?;
        }

        match self.stream(stream, cancel).await {
            Ok(stop) => self.drain(stop),
            Err(e) => {
                self.abort(&e);
                Err(e)
            }
        }
    }

    async fn stream(
        &mut self,
        stream: &mut dyn PartitionStream,
        cancel: &CancellationToken,
    ) -> Result<StopReason, TailError> {
        loop {
            let idle = self.idle_timeout();
            let delivery = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(StopReason::Cancelled),
                pulled = pull(&mut *stream, idle) => pulled?,
            };

            let stop = match delivery {
                None => Some(StopReason::IdleTimeout),
                Some(Delivery::Message(message)) => self.on_message(message).await?,
                Some(Delivery::EndOfPartition) => self.on_end_of_partition()?,
                Some(Delivery::Closed) => Some(StopReason::Closed),
            };
            if let Some(stop) = stop {
                return Ok(stop);
            }
        }
    }

    fn idle_timeout(&self) -> Option<Duration> {
        match self.mode {
            Mode::Tail { follow: true, .. } => Some(self.options.idle_timeout),
            _ => None,
        }
    }

    async fn on_message(&mut self, message: Message) -> Result<Option<StopReason>, TailError> {
        self.consumed += 1;
        let every = self.options.progress_every;
        if every > 0 && self.consumed % every == 0 {
            tracing::debug!(
                topic = %self.topic,
                consumed = self.consumed,
                offset = message.offset,
                "progress"
            );
        }

        let offset = message.offset;
        let decoded = self.decoder.decode(&self.topic, &message).await;
        match decoded.and_then(|output| output.render()) {
            Ok(element) => match self.window.as_mut() {
                Some(window) => window.push(element),
                None => self.emitter.emit(&element)?,
            },
            Err(e) if !e.is_fatal() => {
                self.skipped += 1;
                tracing::warn!(topic = %self.topic, offset, error = ?e, "skipping message");
            }
            Err(e) => return Err(e),
        }

        if self.mode.follows() {
            if self.window.is_some() && self.bounds.reached(offset) {
                self.go_live()?;
            }
            return Ok(None);
        }
        Ok(self.bounds.reached(offset).then_some(StopReason::CaughtUp))
    }

    fn on_end_of_partition(&mut self) -> Result<Option<StopReason>, TailError> {
        if !self.mode.follows() {
            tracing::debug!(topic = %self.topic, consumed = self.consumed, "end of partition");
            return Ok(Some(StopReason::EndOfPartition));
        }
        if self.window.is_some() {
            self.go_live()?;
        }
        Ok(None)
    }

    /// Flush the backlog once; later messages are emitted as they arrive.
    fn go_live(&mut self) -> Result<(), TailError> {
        if let Some(mut window) = self.window.take() {
            let backlog = window.drain();
            tracing::info!(topic = %self.topic, backlog = backlog.len(), "caught up, following");
            self.emitter.emit_batch(backlog)?;
        }
        Ok(())
    }

    fn drain(&mut self, stop: StopReason) -> Result<SessionSummary, TailError> {
        self.state = match stop {
            StopReason::Cancelled => State::Cancelled,
            _ => State::Draining,
        };
        if let Some(mut window) = self.window.take() {
            self.emitter.emit_batch(window.drain())?;
        }
        self.emitter.finish()?;

        let summary = self.summary(stop);
        tracing::info!(
            topic = %self.topic,
            stop = ?summary.stop,
            consumed = summary.consumed,
            emitted = summary.emitted,
            skipped = summary.skipped,
            "session finished"
        );
        Ok(summary)
    }

    fn abort(&mut self, cause: &TailError) {
        self.state = State::Draining;
        if let Some(mut window) = self.window.take() {
            window.discard();
        }
        if let Err(e) = self.emitter.finish() {
            tracing::warn!(topic = %self.topic, error = ?e, "failed to close output after error");
        }
        tracing::error!(topic = %self.topic, error = ?cause, consumed = self.consumed, "session aborted");
    }

    fn summary(&self, stop: StopReason) -> SessionSummary {
        SessionSummary {
            mode: self.mode,
            stop,
            consumed: self.consumed,
            emitted: self.emitter.emitted(),
            skipped: self.skipped,
        }
    }
}

/// Next delivery, or `None` if `idle` elapsed first.
async fn pull(stream: &mut dyn PartitionStream, idle: Option<Duration>) -> Result<Option<Delivery>, TailError> {
    match idle {
        None => stream.recv().await.map(Some),
        Some(limit) => match tokio::time::timeout(limit, stream.recv()).await {
            Ok(delivery) => delivery.map(Some),
            Err(_) => Ok(None),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::future::Future;
    use std::num::NonZeroUsize;
    use std::pin::Pin;
    use std::sync::Arc;

    use tailcat_api::{ErrorKind, StartOffset};

    use super::*;
    use crate::schema_cache::tests::FakeRegistry;

    /// Replays scripted deliveries, then waits forever.
    struct Script(VecDeque<Result<Delivery, TailError>>);

    impl Script {
        fn messages(offsets: std::ops::Range<i64>) -> Self {
            Self(offsets.map(|o| Ok(Delivery::Message(Message::new(o, o.to_string())))).collect())
        }

        fn then(mut self, delivery: Result<Delivery, TailError>) -> Self {
            self.0.push_back(delivery);
            self
        }
    }

    impl PartitionStream for Script {
        fn recv(&mut self) -> Pin<Box<dyn Future<Output = Result<Delivery, TailError>> + Send + '_>> {
            let next = self.0.pop_front();
            Box::pin(async move {
                match next {
                    Some(delivery) => delivery,
                    None => std::future::pending().await,
                }
            })
        }
    }

    fn bounds(latest: Option<i64>) -> ConsumptionBounds {
        ConsumptionBounds {
            start: StartOffset::Oldest,
            latest_offset: latest,
        }
    }

    fn tail(count: usize, follow: bool) -> Mode {
        Mode::Tail {
            count: NonZeroUsize::new(count).unwrap(),
            follow,
        }
    }

    async fn run(mode: Mode, latest: Option<i64>, mut script: Script) -> (Result<SessionSummary, TailError>, serde_json::Value) {
        let mut decoder = PayloadDecoder::new(Arc::new(FakeRegistry::default()));
        let mut out = Vec::new();
        let result = {
            let mut controller = StreamController::new("t", mode, bounds(latest), &mut decoder, &mut out, SessionOptions::default());
            controller.run(&mut script, &CancellationToken::new()).await
        };
        let parsed = serde_json::from_slice(&out).unwrap();
        (result, parsed)
    }

    fn offsets(array: &serde_json::Value) -> Vec<i64> {
        array
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["metadata"]["offset"].as_i64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn cat_stops_at_the_snapshot_end() {
        let (result, out) = run(Mode::Cat, Some(4), Script::messages(0..10)).await;
        let summary = result.unwrap();
        assert_eq!(summary.stop, StopReason::CaughtUp);
        assert_eq!(summary.consumed, 5);
        assert_eq!(offsets(&out), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn tail_keeps_the_last_n() {
        let (result, out) = run(tail(3, false), Some(9), Script::messages(0..10)).await;
        assert_eq!(result.unwrap().emitted, 3);
        assert_eq!(offsets(&out), vec![7, 8, 9]);
    }

    #[tokio::test]
    async fn end_of_partition_stops_bounded_modes() {
        // Offset 5 is the snapshot end, but compaction removed 4 and 5.
        let script = Script::messages(0..4).then(Ok(Delivery::EndOfPartition));
        let (result, out) = run(tail(2, false), Some(5), script).await;
        assert_eq!(result.unwrap().stop, StopReason::EndOfPartition);
        assert_eq!(offsets(&out), vec![2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn tail_follow_goes_live_then_idles_out() {
        let (result, out) = run(tail(2, true), Some(4), Script::messages(0..8)).await;
        let summary = result.unwrap();
        assert_eq!(summary.stop, StopReason::IdleTimeout);
        assert_eq!(offsets(&out), vec![3, 4, 5, 6, 7]);
    }

    #[tokio::test(start_paused = true)]
    async fn tail_follow_goes_live_on_end_of_partition() {
        let script = Script::messages(0..3)
            .then(Ok(Delivery::EndOfPartition))
            .then(Ok(Delivery::Message(Message::new(9, "9"))));
        let (result, out) = run(tail(5, true), Some(6), script).await;
        assert_eq!(result.unwrap().stop, StopReason::IdleTimeout);
        assert_eq!(offsets(&out), vec![0, 1, 2, 9]);
    }

    /// Run until the script is exhausted, then cancel after 20ms.
    async fn run_cancelled(mode: Mode, latest: Option<i64>, mut script: Script) -> (SessionSummary, State, serde_json::Value) {
        let mut decoder = PayloadDecoder::new(Arc::new(FakeRegistry::default()));
        let mut out = Vec::new();
        let cancel = CancellationToken::new();

        let (summary, state) = {
            let mut controller = StreamController::new("t", mode, bounds(latest), &mut decoder, &mut out, SessionOptions::default());
            let stopper = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                stopper.cancel();
            });
            let summary = controller.run(&mut script, &cancel).await.unwrap();
            (summary, controller.state())
        };
        (summary, state, serde_json::from_slice(&out).unwrap())
    }

    #[tokio::test]
    async fn follow_ends_on_cancel() {
        let (summary, state, out) = run_cancelled(Mode::Follow, None, Script::messages(0..2)).await;
        assert_eq!(summary.stop, StopReason::Cancelled);
        assert_eq!(state, State::Cancelled);
        assert_eq!(offsets(&out), vec![0, 1]);
    }

    #[tokio::test]
    async fn cancelled_tail_flushes_the_window() {
        // Snapshot end at 10 is never reached, so the window is still buffering.
        let (summary, state, out) = run_cancelled(tail(2, false), Some(10), Script::messages(0..3)).await;
        assert_eq!(summary.stop, StopReason::Cancelled);
        assert_eq!(summary.emitted, 2);
        assert_eq!(state, State::Cancelled);
        assert_eq!(offsets(&out), vec![1, 2]);
    }

    #[tokio::test]
    async fn cancelled_tail_follow_flushes_the_backlog() {
        let (summary, state, out) = run_cancelled(tail(3, true), Some(10), Script::messages(0..5)).await;
        assert_eq!(summary.stop, StopReason::Cancelled);
        assert_eq!(state, State::Cancelled);
        assert_eq!(offsets(&out), vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn fatal_error_closes_array_and_drops_the_window() {
        let script = Script::messages(0..2).then(Err(TailError::io("broker went away")));
        let (result, out) = run(tail(5, false), Some(9), script).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Io);
        assert_eq!(out, serde_json::json!([]));
    }

    #[tokio::test]
    async fn fatal_decode_error_keeps_emitted_elements() {
        let script = Script::messages(0..2).then(Ok(Delivery::Message(Message::new(2, vec![0u8, 0, 0, 0, 1]))));
        let (result, out) = run(Mode::Cat, Some(5), script).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Registry);
        assert_eq!(offsets(&out), vec![0, 1]);
    }

    #[tokio::test]
    async fn closed_stream_drains() {
        let script = Script::messages(0..2).then(Ok(Delivery::Closed));
        let (result, out) = run(tail(1, false), Some(9), script).await;
        assert_eq!(result.unwrap().stop, StopReason::Closed);
        assert_eq!(offsets(&out), vec![1]);
    }
}
