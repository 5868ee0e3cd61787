//! # onestop
//!
//! Onestop identifiers and the feed/operator/route/stop graph behind them.
//!
//! ## Features
//!
//! - **Stable identifiers**: `{f|o|r|s}-{geohash}-{name}` ids derived from
//!   where an entity's stops are and what it is called
//! - **Entity graph**: arena-backed, with parent and child edges in both directions
//! - **Ingestion**: bottom-up construction from raw records, with stop
//!   deduplication and route collision handling
//! - **Serialization**: GeoJSON interchange documents and flat storage objects
//!
//! ## Example
//!
//! ```
//! use onestop::prelude::*;
//! use geo::Point;
//!
//! let mut graph = EntityGraph::new();
//! let route = graph.insert(Entity::new(EntityKind::Route, "AB"));
//! let stop = graph.insert(
//!     Entity::new(EntityKind::Stop, "Bullfrog (Demo)")
//!         .with_geometry(Some(Point::new(-116.81797, 36.88108).into())),
//! );
//! graph.link(route, stop);
//!
//! assert_eq!(graph.onestop(stop).unwrap().as_str(), "s-9qscv9zzb5-bullfrogdemo");
//! assert_eq!(graph.onestop(route).unwrap().as_str(), "r-9qscv9zzb5-ab");
//! ```

pub mod graph;
pub mod identifiers;
pub mod ingest;
pub mod mangle;
pub mod models;
pub mod serialize;
pub mod spatial;

// Re-exports for convenience
pub mod prelude {
    pub use crate::graph::EntityGraph;
    pub use crate::identifiers::*;
    pub use crate::ingest::{ingest_feed, FeedRecord, IngestOptions, IngestReport, Ingested};
    pub use crate::models::{
        Entity, EntityKind, EntityRef, FeedMeta, OnestopError, Provenance, Result, Shape, Tags,
    };
    pub use crate::serialize::{to_json, FeedDocument, Profile};
    pub use crate::spatial::{CentroidReducer, MeanCentroid};
}

pub use prelude::*;
