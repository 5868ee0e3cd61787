//! Interchange documents: GeoJSON for operators, routes and stops, and the
//! feed summary.

use geojson::{feature, Feature, FeatureCollection, Geometry};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{attributes, Profile};
use crate::graph::EntityGraph;
use crate::identifiers::*;
use crate::models::{EntityKind, EntityRef, OnestopError, Result, Tags, DEFAULT_FEED_FORMAT};

/// Summary projection of a feed. Used by both profiles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedDocument {
    pub id: OnestopId,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default = "default_feed_format")]
    pub feed_format: String,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub operators_in_feed: Vec<OperatorInFeed>,
}

/// An operator as listed in a feed summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorInFeed {
    pub id: OnestopId,
    /// Mangled operator name.
    pub short_code: String,
}

fn default_feed_format() -> String {
    DEFAULT_FEED_FORMAT.to_string()
}

impl FeedDocument {
    pub fn from_graph(graph: &EntityGraph, feed: EntityRef) -> Result<Self> {
        let entity = graph.get(feed);
        let meta = entity.feed_meta().ok_or(OnestopError::Unsupported {
            operation: "feed summary",
            kind: entity.kind(),
        })?;

        let operators_in_feed = graph
            .operators(feed)
            .into_iter()
            .map(|o| {
                Ok(OperatorInFeed {
                    id: graph.onestop(o)?,
                    short_code: graph.mangled_name(o),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: graph.onestop(feed)?,
            name: entity.name().to_string(),
            url: meta.url.clone(),
            content_hash: meta.content_hash.clone(),
            feed_format: meta.feed_format.clone(),
            tags: entity.tags().clone(),
            operators_in_feed,
        })
    }
}

/// A route or stop as a GeoJSON feature.
pub fn feature(graph: &EntityGraph, r: EntityRef) -> Result<Feature> {
    let kind = graph.kind(r);
    if !matches!(kind, EntityKind::Route | EntityKind::Stop) {
        return Err(OnestopError::Unsupported {
            operation: "feature",
            kind,
        });
    }

    Ok(Feature {
        bbox: None,
        geometry: graph.geometry(r).map(Geometry::from),
        id: Some(feature::Id::String(graph.onestop(r)?.to_string())),
        properties: Some(Default::default()),
        foreign_members: Some(attributes(graph, r, Profile::Interchange)?),
    })
}

/// An operator as a feature collection embedding all of its routes and
/// stops.
pub fn operator_collection(graph: &EntityGraph, operator: EntityRef) -> Result<FeatureCollection> {
    let kind = graph.kind(operator);
    if kind != EntityKind::Operator {
        return Err(OnestopError::Unsupported {
            operation: "feature collection",
            kind,
        });
    }

    let features = graph
        .routes(operator)
        .into_iter()
        .chain(graph.stops(operator))
        .map(|r| feature(graph, r))
        .collect::<Result<Vec<_>>>()?;

    let mut members = attributes(graph, operator, Profile::Interchange)?;
    members.insert("id".into(), json!(graph.onestop(operator)?));
    if let Some(shape) = graph.geometry(operator) {
        members.insert("geometry".into(), serde_json::to_value(Geometry::from(shape))?);
    }

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(members),
    })
}
