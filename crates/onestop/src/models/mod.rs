//! Onestop entity models, types, and errors.

pub mod entity;
pub mod types;

// Re-exports for convenience
pub use entity::{Entity, EntityDetails, EntityRef};
pub use types::{
    EntityKind, FeedMeta, OnestopError, Provenance, Result, Shape, Tags, DEFAULT_FEED_FORMAT,
};
