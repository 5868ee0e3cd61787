//! Core data types, enums and errors for Onestop entities.

use std::collections::BTreeMap;
use std::fmt;

use geo::{Point, Polygon};
use serde::{Deserialize, Serialize};

use crate::identifiers::*;

// ============================================================================
// Enums
// ============================================================================

/// The four kinds of entity in a transit network graph.
///
/// Declaration order is the hierarchy order: a Feed contains Operators,
/// an Operator runs Routes, a Route serves Stops.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum EntityKind {
    Feed = 0,
    Operator = 1,
    Route = 2,
    Stop = 3,
}

impl EntityKind {
    /// Single-character type prefix used in Onestop identifiers.
    pub fn prefix(self) -> char {
        match self {
            Self::Feed => 'f',
            Self::Operator => 'o',
            Self::Route => 'r',
            Self::Stop => 's',
        }
    }

    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix {
            'f' => Some(Self::Feed),
            'o' => Some(Self::Operator),
            'r' => Some(Self::Route),
            's' => Some(Self::Stop),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::Operator => "operator",
            Self::Route => "route",
            Self::Stop => "stop",
        }
    }

    /// Depth in the Feed -> Operator -> Route -> Stop hierarchy.
    pub fn rank(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Raw tag mapping carried over from a source record.
pub type Tags = BTreeMap<String, String>;

/// Geometry attached to an entity.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Point(Point),
    Polygon(Polygon),
}

impl From<Point> for Shape {
    fn from(point: Point) -> Self {
        Self::Point(point)
    }
}

impl From<Polygon> for Shape {
    fn from(polygon: Polygon) -> Self {
        Self::Polygon(polygon)
    }
}

/// One source record that contributed to an entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub identifier: SourceIdentifier,
    #[serde(default)]
    pub tags: Tags,
}

impl Provenance {
    pub fn new(identifier: SourceIdentifier, tags: Tags) -> Self {
        Self { identifier, tags }
    }
}

/// Feed-level metadata that the other kinds do not carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedMeta {
    pub url: Option<String>,
    pub content_hash: Option<String>,
    pub feed_format: String,
}

impl Default for FeedMeta {
    fn default() -> Self {
        Self {
            url: None,
            content_hash: None,
            feed_format: DEFAULT_FEED_FORMAT.to_string(),
        }
    }
}

pub const DEFAULT_FEED_FORMAT: &str = "gtfs";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OnestopError {
    #[error("No locatable points for {0}")]
    NoPoints(EntityKind),

    #[error("Identifier already present: {0}")]
    ExistingIdentifier(SourceIdentifier),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: OnestopId },

    #[error("{operation} is not applicable to a {kind}")]
    Unsupported {
        operation: &'static str,
        kind: EntityKind,
    },

    #[error("Centroid reduction failed: {0}")]
    Centroid(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OnestopError>;
