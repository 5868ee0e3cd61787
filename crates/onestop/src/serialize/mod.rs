//! JSON projections of graph entities.
//!
//! Two profiles are produced from the same attribute and relation builders:
//!
//! - **Interchange**: GeoJSON features and feature collections with full
//!   relation arrays, geometry, provenance and (for operators) every route
//!   and stop embedded as a feature. [`restore`] reads it back.
//! - **Storage**: flat objects without provenance or embedded features;
//!   relation arrays can be left out entirely.
//!
//! Feeds are always projected as a summary ([`FeedDocument`]).

pub mod geometry;
pub mod interchange;
pub mod restore;

use geojson::{Geometry, JsonObject};
use serde_json::{json, Value};

use crate::graph::EntityGraph;
use crate::identifiers::*;
use crate::models::{EntityKind, EntityRef, Result};

pub use interchange::{FeedDocument, OperatorInFeed};
pub use restore::{attach_operator, restore_feed, restore_operator};

/// Which projection to produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Profile {
    Interchange,
    Storage { relations: bool },
}

impl Profile {
    fn includes_provenance(self) -> bool {
        matches!(self, Self::Interchange)
    }

    fn includes_relations(self) -> bool {
        match self {
            Self::Interchange => true,
            Self::Storage { relations } => relations,
        }
    }
}

/// Project one entity under `profile`.
pub fn to_json(graph: &EntityGraph, r: EntityRef, profile: Profile) -> Result<Value> {
    match (graph.kind(r), profile) {
        (EntityKind::Feed, _) => Ok(serde_json::to_value(FeedDocument::from_graph(graph, r)?)?),
        (EntityKind::Operator, Profile::Interchange) => {
            let collection = interchange::operator_collection(graph, r)?;
            Ok(serde_json::to_value(collection)?)
        }
        (_, Profile::Interchange) => Ok(serde_json::to_value(interchange::feature(graph, r)?)?),
        (_, Profile::Storage { .. }) => storage_object(graph, r, profile).map(Value::Object),
    }
}

/// Relation id arrays of one entity. Ids are sorted for stable output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Relations {
    pub serves: Option<Vec<OnestopId>>,
    pub served_by: Option<Vec<OnestopId>>,
    pub operated_by: Option<OnestopId>,
}

impl Relations {
    pub fn of(graph: &EntityGraph, r: EntityRef) -> Result<Self> {
        let ids = |refs: Vec<EntityRef>| -> Result<Vec<OnestopId>> {
            let mut ids = refs
                .into_iter()
                .map(|x| graph.onestop(x))
                .collect::<Result<Vec<_>>>()?;
            ids.sort();
            ids.dedup();
            Ok(ids)
        };

        let relations = match graph.kind(r) {
            EntityKind::Feed => Self::default(),
            EntityKind::Operator => Self {
                serves: Some(ids(graph.stops(r))?),
                ..Self::default()
            },
            EntityKind::Route => Self {
                serves: Some(ids(graph.stops(r))?),
                operated_by: ids(graph.agencies(r))?.into_iter().next(),
                ..Self::default()
            },
            EntityKind::Stop => Self {
                served_by: Some(ids(graph.agencies(r))?),
                ..Self::default()
            },
        };
        Ok(relations)
    }

    fn write(&self, object: &mut JsonObject) {
        if let Some(serves) = &self.serves {
            object.insert("serves".into(), json!(serves));
        }
        if let Some(served_by) = &self.served_by {
            object.insert("servedBy".into(), json!(served_by));
        }
        if let Some(operated_by) = &self.operated_by {
            object.insert("operatedBy".into(), json!(operated_by));
        }
    }
}

/// Attributes shared by both profiles: name, tags and, as the profile
/// allows, provenance and relation arrays.
pub(crate) fn attributes(graph: &EntityGraph, r: EntityRef, profile: Profile) -> Result<JsonObject> {
    let entity = graph.get(r);
    let mut object = JsonObject::new();
    object.insert("name".into(), json!(entity.name()));
    object.insert("tags".into(), serde_json::to_value(entity.tags())?);
    if profile.includes_provenance() {
        object.insert(
            "identifiers".into(),
            serde_json::to_value(entity.identifiers())?,
        );
    }
    if profile.includes_relations() {
        Relations::of(graph, r)?.write(&mut object);
    }
    Ok(object)
}

fn storage_object(graph: &EntityGraph, r: EntityRef, profile: Profile) -> Result<JsonObject> {
    let mut object = JsonObject::new();
    object.insert("id".into(), json!(graph.onestop(r)?));
    object.insert("type".into(), json!(graph.kind(r).as_str()));
    if let Some(shape) = graph.geometry(r) {
        object.insert("geometry".into(), serde_json::to_value(Geometry::from(shape))?);
    }
    object.extend(attributes(graph, r, profile)?);
    Ok(object)
}
