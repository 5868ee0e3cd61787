//! Raw source records handed over by a feed reader.
//!
//! Readers for archive or tabular formats live outside this crate; they only
//! need to produce these records.

use serde::{Deserialize, Serialize};

use crate::models::{Shape, Tags};

/// One stop as read from a source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StopRecord {
    /// Native identifier within the source feed.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub geometry: Option<Shape>,
    #[serde(default)]
    pub tags: Tags,
}

/// One route, referencing stops by their native identifiers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub geometry: Option<Shape>,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub stops: Vec<String>,
}

/// One operator (agency) and the routes it runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperatorRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub routes: Vec<RouteRecord>,
}

/// A whole feed: its stops, its operators, and where it came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRecord {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub stops: Vec<StopRecord>,
    #[serde(default)]
    pub operators: Vec<OperatorRecord>,
}
