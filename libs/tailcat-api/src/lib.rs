pub mod error;
pub mod record;
pub mod registry;
pub mod schema;
pub mod source;

pub use error::{ErrorKind, Severity, TailError};
pub use record::{Header, Message};
pub use registry::SchemaFetcher;
pub use schema::SchemaDescriptor;
pub use source::{Delivery, MessageSource, PartitionStream, StartOffset};
