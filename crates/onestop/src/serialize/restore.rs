//! Rebuilding graph entities from interchange documents.
//!
//! Stops are restored before routes, and routes before the operator, so each
//! relation array can be resolved against entities that already exist.

use geojson::{feature, Feature, FeatureCollection, JsonObject, JsonValue};
use hashbrown::HashMap;

use super::interchange::FeedDocument;
use crate::graph::EntityGraph;
use crate::identifiers::*;
use crate::models::{
    Entity, EntityKind, EntityRef, FeedMeta, OnestopError, Provenance, Result, Shape, Tags,
};

/// Restore an operator and its routes and stops from its feature collection.
pub fn restore_operator(graph: &mut EntityGraph, document: JsonValue) -> Result<EntityRef> {
    let collection: FeatureCollection = serde_json::from_value(document)?;
    let members = collection.foreign_members.unwrap_or_default();
    let operator_id = member_id(&members)?;
    expect_kind(&operator_id, EntityKind::Operator)?;

    let mut stops: HashMap<OnestopId, EntityRef> = HashMap::new();
    for feature in &collection.features {
        let id = feature_id(feature)?;
        if id.kind() == Some(EntityKind::Stop) {
            let stop = graph.insert(entity_from_members(
                EntityKind::Stop,
                id.clone(),
                feature.foreign_members.as_ref(),
                feature.geometry.as_ref(),
            )?);
            stops.insert(id, stop);
        }
    }

    let mut routes = Vec::new();
    for feature in &collection.features {
        let id = feature_id(feature)?;
        match id.kind() {
            Some(EntityKind::Stop) => continue,
            Some(EntityKind::Route) => {}
            _ => {
                return Err(OnestopError::InvalidData(format!(
                    "unexpected feature in operator {operator_id}: {id}"
                )))
            }
        }

        let route = graph.insert(entity_from_members(
            EntityKind::Route,
            id.clone(),
            feature.foreign_members.as_ref(),
            feature.geometry.as_ref(),
        )?);
        let served = feature
            .foreign_members
            .as_ref()
            .map(|m| id_list(m, "serves"))
            .transpose()?
            .unwrap_or_default();
        for stop_id in served {
            let stop = stops.get(&stop_id).copied().ok_or_else(|| {
                OnestopError::InvalidData(format!("route {id} serves unknown stop {stop_id}"))
            })?;
            graph.link(route, stop);
        }
        routes.push(route);
    }

    let geometry = members
        .get("geometry")
        .map(|g| serde_json::from_value::<Shape>(g.clone()))
        .transpose()?;
    let operator = graph.insert(
        base_entity(EntityKind::Operator, operator_id, Some(&members))?.with_geometry(geometry),
    );
    for route in routes {
        graph.link(operator, route);
    }

    tracing::debug!(
        operator = %graph.get(operator).name(),
        routes = graph.routes(operator).len(),
        stops = stops.len(),
        "restored operator"
    );
    Ok(operator)
}

/// Restore a feed from its summary document.
///
/// The summary only names its operators, so the feed starts without
/// children; use [`attach_operator`] to link restored operators.
pub fn restore_feed(graph: &mut EntityGraph, document: JsonValue) -> Result<EntityRef> {
    let doc: FeedDocument = serde_json::from_value(document)?;
    expect_kind(&doc.id, EntityKind::Feed)?;

    let meta = FeedMeta {
        url: doc.url,
        content_hash: doc.content_hash,
        feed_format: doc.feed_format,
    };
    let entity = Entity::feed(doc.name, meta)
        .with_tags(doc.tags)
        .with_onestop(doc.id);
    Ok(graph.insert(entity))
}

/// Link a restored operator under a restored feed.
pub fn attach_operator(graph: &mut EntityGraph, feed: EntityRef, operator: EntityRef) -> Result<()> {
    for (r, kind) in [(feed, EntityKind::Feed), (operator, EntityKind::Operator)] {
        if graph.kind(r) != kind {
            return Err(OnestopError::InvalidData(format!(
                "expected a {kind}, got a {}",
                graph.kind(r)
            )));
        }
    }
    graph.link(feed, operator);
    Ok(())
}

fn entity_from_members(
    kind: EntityKind,
    id: OnestopId,
    members: Option<&JsonObject>,
    geometry: Option<&geojson::Geometry>,
) -> Result<Entity> {
    let shape = geometry.map(Shape::try_from).transpose()?;
    Ok(base_entity(kind, id, members)?.with_geometry(shape))
}

fn base_entity(kind: EntityKind, id: OnestopId, members: Option<&JsonObject>) -> Result<Entity> {
    let field = |key: &str| members.and_then(|m| m.get(key)).cloned();

    let name = match field("name") {
        Some(JsonValue::String(name)) => name,
        _ => return Err(OnestopError::InvalidData(format!("{id} has no name"))),
    };
    let tags: Tags = field("tags")
        .map(serde_json::from_value)
        .transpose()?
        .unwrap_or_default();
    let identifiers: Vec<Provenance> = field("identifiers")
        .map(serde_json::from_value)
        .transpose()?
        .unwrap_or_default();

    Entity::new(kind, name)
        .with_tags(tags)
        .with_onestop(id)
        .with_identifiers(identifiers)
}

fn feature_id(item: &Feature) -> Result<OnestopId> {
    match &item.id {
        Some(feature::Id::String(id)) => Ok(OnestopId::new(id)),
        _ => Err(OnestopError::InvalidData("feature without string id".into())),
    }
}

fn member_id(members: &JsonObject) -> Result<OnestopId> {
    match members.get("id") {
        Some(JsonValue::String(id)) => Ok(OnestopId::new(id)),
        _ => Err(OnestopError::InvalidData("document without id".into())),
    }
}

fn id_list(members: &JsonObject, key: &str) -> Result<Vec<OnestopId>> {
    members
        .get(key)
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()
        .map(Option::unwrap_or_default)
        .map_err(OnestopError::from)
}

fn expect_kind(id: &OnestopId, kind: EntityKind) -> Result<()> {
    if id.kind() == Some(kind) {
        Ok(())
    } else {
        Err(OnestopError::InvalidData(format!("{id} is not a {kind} id")))
    }
}
