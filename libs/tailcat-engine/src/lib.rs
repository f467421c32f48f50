//! Consumption and decode pipeline: offset resolution, payload decoding
//! with a registry schema cache, and streaming JSON array output.

pub mod avro;
pub mod controller;
pub mod decode;
pub mod emitter;
pub mod escape;
pub mod mode;
pub mod offsets;
pub mod output;
pub mod schema_cache;
pub mod window;

pub use controller::{SessionOptions, SessionSummary, State, StopReason, StreamController, run_session};
pub use decode::PayloadDecoder;
pub use emitter::JsonArrayEmitter;
pub use mode::Mode;
pub use offsets::{ConsumptionBounds, OffsetResolver};
pub use output::{DecodedOutput, Metadata};
pub use schema_cache::{CachedSchema, SchemaCache};
