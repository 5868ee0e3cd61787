//! Bottom-up construction of a feed graph from source records.

pub mod builder;
pub mod records;

pub use builder::{ingest_feed, IngestOptions, IngestReport, Ingested, SkipReason, SkippedRecord};
pub use records::{FeedRecord, OperatorRecord, RouteRecord, StopRecord};
