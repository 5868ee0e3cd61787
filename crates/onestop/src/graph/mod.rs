//! Arena-backed entity graph.
//!
//! Every entity of a processing run lives in one [`EntityGraph`]. Edges are
//! [`EntityRef`] handles, so an entity may have any number of parents and
//! children without owning any of them.

mod traversal;

use geo::{BoundingRect, MultiPoint, Point, Rect};
use id_arena::Arena;

use crate::identifiers::*;
use crate::mangle::mangle;
use crate::models::{Entity, EntityKind, EntityRef, OnestopError, Provenance, Result, Shape, Tags};
use crate::spatial::{geohash, CentroidReducer, MeanCentroid};

/// Stop geohashes are truncated to this many characters.
pub const STOP_GEOHASH_LENGTH: usize = 10;

pub struct EntityGraph {
    arena: Arena<Entity>,
    reducer: Box<dyn CentroidReducer>,
}

impl EntityGraph {
    /// Create an empty graph using the planar mean centroid.
    pub fn new() -> Self {
        Self::with_reducer(Box::new(MeanCentroid))
    }

    pub fn with_reducer(reducer: Box<dyn CentroidReducer>) -> Self {
        Self {
            arena: Arena::new(),
            reducer,
        }
    }

    pub fn insert(&mut self, entity: Entity) -> EntityRef {
        self.arena.alloc(entity)
    }

    pub fn get(&self, r: EntityRef) -> &Entity {
        &self.arena[r]
    }

    pub fn get_mut(&mut self, r: EntityRef) -> &mut Entity {
        &mut self.arena[r]
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityRef, &Entity)> {
        self.arena.iter()
    }

    pub fn kind(&self, r: EntityRef) -> EntityKind {
        self.arena[r].kind()
    }

    // ---- Edges ----

    /// Add a parent/child edge in both directions.
    ///
    /// No cycle check is made; the Feed -> Operator -> Route -> Stop
    /// direction is kept by callers. The parent's identifier, and those of
    /// its ancestors, are invalidated since their served point set changed.
    pub fn link(&mut self, parent: EntityRef, child: EntityRef) {
        let added = self.arena[parent].add_child(child);
        self.arena[child].add_parent(parent);
        if added {
            self.invalidate_upward(parent);
        }
    }

    // ---- Identifier cache ----

    /// Drop the cached identifier of one entity.
    pub fn invalidate(&mut self, r: EntityRef) {
        self.arena[r].invalidate();
    }

    /// Drop the cached identifier of an entity and every ancestor.
    pub fn invalidate_upward(&mut self, r: EntityRef) {
        let mut pending = vec![r];
        let mut seen = hashbrown::HashSet::new();
        while let Some(next) = pending.pop() {
            if !seen.insert(next) {
                continue;
            }
            let entity = &mut self.arena[next];
            entity.invalidate();
            pending.extend(entity.parents.iter().copied());
        }
    }

    /// Rename an entity; its cached identifier is dropped.
    pub fn set_name(&mut self, r: EntityRef, name: impl Into<String>) {
        self.arena[r].set_name(name);
    }

    /// Replace an entity's geometry; it and its ancestors are invalidated.
    pub fn set_geometry(&mut self, r: EntityRef, geometry: Option<Shape>) {
        self.arena[r].set_geometry(geometry);
        self.invalidate_upward(r);
    }

    // ---- Provenance ----

    pub fn add_identifier(
        &mut self,
        r: EntityRef,
        identifier: SourceIdentifier,
        tags: Tags,
    ) -> Result<()> {
        self.arena[r].add_identifier(identifier, tags)
    }

    /// Merge the provenance of `from` into `into`, all or nothing.
    pub fn merge(&mut self, into: EntityRef, from: EntityRef) -> Result<()> {
        let incoming: Vec<Provenance> = self.arena[from].identifiers().to_vec();
        self.arena[into].merge_identifiers(incoming)
    }

    // ---- Identifier generation ----

    /// The Onestop identifier of an entity, computed on first read.
    pub fn onestop(&self, r: EntityRef) -> Result<OnestopId> {
        self.arena[r]
            .onestop_cell()
            .get_or_try_init(|| self.compute_onestop(r))
            .cloned()
    }

    fn compute_onestop(&self, r: EntityRef) -> Result<OnestopId> {
        let entity = &self.arena[r];
        let geohash = self.geohash(r)?;
        Ok(OnestopId::assemble(
            entity.kind(),
            &geohash,
            &mangle(entity.name(), entity.kind()),
        ))
    }

    /// Mangled name component of an entity's identifier.
    pub fn mangled_name(&self, r: EntityRef) -> String {
        let entity = &self.arena[r];
        mangle(entity.name(), entity.kind())
    }

    /// Geohash component of an entity's identifier.
    ///
    /// A stop uses its own point. Other kinds fit a cell around the centroid
    /// of every stop reachable below them.
    pub fn geohash(&self, r: EntityRef) -> Result<String> {
        let entity = &self.arena[r];
        if entity.kind() == EntityKind::Stop {
            let point = entity.located_point()?;
            return Ok(geohash::encode(point, STOP_GEOHASH_LENGTH));
        }

        let points = self.served_points(r);
        if points.is_empty() {
            return Err(OnestopError::NoPoints(entity.kind()));
        }
        let centroid = self.reducer.centroid(&points)?;
        geohash::neighbors_fit(centroid, &points)
    }

    /// Points of every locatable stop at or below `r`.
    fn served_points(&self, r: EntityRef) -> Vec<Point> {
        let stops = match self.kind(r) {
            EntityKind::Stop => vec![r],
            _ => self.stops(r),
        };
        stops
            .into_iter()
            .filter_map(|s| self.arena[s].located_point().ok())
            .collect()
    }

    // ---- Geometry ----

    pub fn point(&self, r: EntityRef) -> Result<Point> {
        self.arena[r].located_point()
    }

    pub fn geometry(&self, r: EntityRef) -> Option<&Shape> {
        self.arena[r].geometry()
    }

    /// Bounding rectangle of the stops at or below `r`. Not defined for feeds.
    pub fn bbox(&self, r: EntityRef) -> Result<Rect> {
        let kind = self.kind(r);
        if kind == EntityKind::Feed {
            return Err(OnestopError::Unsupported {
                operation: "bbox",
                kind,
            });
        }
        MultiPoint::new(self.served_points(r))
            .bounding_rect()
            .ok_or(OnestopError::NoPoints(kind))
    }
}

impl Default for EntityGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(graph: &mut EntityGraph, name: &str, lon: f64, lat: f64) -> EntityRef {
        graph.insert(
            Entity::new(EntityKind::Stop, name).with_geometry(Some(Point::new(lon, lat).into())),
        )
    }

    #[test]
    fn test_link_is_bidirectional() {
        let mut graph = EntityGraph::new();
        let route = graph.insert(Entity::new(EntityKind::Route, "AB"));
        let s = stop(&mut graph, "Bullfrog (Demo)", -116.81797, 36.88108);

        graph.link(route, s);
        graph.link(route, s);

        assert_eq!(graph.get(route).children(), &[s]);
        assert_eq!(graph.get(s).parents(), &[route]);
    }

    #[test]
    fn test_stop_onestop() {
        let mut graph = EntityGraph::new();
        let s = stop(&mut graph, "Nye County Airport (Demo)", -116.784582, 36.868446);

        let id = graph.onestop(s).unwrap();
        assert_eq!(id.as_str(), "s-9qscwx8n60-nyecountyairportdemo");
        assert_eq!(graph.onestop(s).unwrap(), id);
    }

    #[test]
    fn test_stops_at_same_point_differ_by_name() {
        let mut graph = EntityGraph::new();
        let a = stop(&mut graph, "Bullfrog (Demo)", -116.81797, 36.88108);
        let b = stop(&mut graph, "Rhyolite (Demo)", -116.81797, 36.88108);

        assert_eq!(graph.geohash(a).unwrap(), graph.geohash(b).unwrap());
        assert_eq!(graph.onestop(a).unwrap().as_str(), "s-9qscv9zzb5-bullfrogdemo");
        assert_eq!(graph.onestop(b).unwrap().as_str(), "s-9qscv9zzb5-rhyolitedemo");
        assert_ne!(graph.onestop(a).unwrap(), graph.onestop(b).unwrap());
    }

    #[test]
    fn test_onestop_is_memoized_until_invalidated() {
        let mut graph = EntityGraph::new();
        let s = stop(&mut graph, "Bullfrog (Demo)", -116.81797, 36.88108);

        let before = graph.onestop(s).unwrap();
        graph.get_mut(s).tags_mut().insert("zone".into(), "1".into());
        assert_eq!(graph.onestop(s).unwrap(), before);

        graph.set_name(s, "Rhyolite (Demo)");
        assert_eq!(
            graph.onestop(s).unwrap().as_str(),
            "s-9qscv9zzb5-rhyolitedemo"
        );
    }

    #[test]
    fn test_geometry_change_invalidates_ancestors() {
        let mut graph = EntityGraph::new();
        let route = graph.insert(Entity::new(EntityKind::Route, "AB"));
        let s = stop(&mut graph, "Bullfrog (Demo)", -116.81797, 36.88108);
        graph.link(route, s);

        let before = graph.onestop(route).unwrap();
        graph.set_geometry(s, Some(Point::new(-117.133162, 36.425288).into()));
        let after = graph.onestop(route).unwrap();

        assert_ne!(before, after);
        assert_eq!(after.geohash(), Some("9qkxnx40xt"));
    }

    #[test]
    fn test_no_points() {
        let mut graph = EntityGraph::new();
        let route = graph.insert(Entity::new(EntityKind::Route, "Empty"));
        assert!(matches!(
            graph.onestop(route),
            Err(OnestopError::NoPoints(EntityKind::Route))
        ));

        let nowhere = graph.insert(Entity::new(EntityKind::Stop, "Nowhere"));
        graph.link(route, nowhere);
        assert!(matches!(
            graph.onestop(route),
            Err(OnestopError::NoPoints(EntityKind::Route))
        ));
    }

    #[test]
    fn test_bbox() {
        let mut graph = EntityGraph::new();
        let feed = graph.insert(Entity::new(EntityKind::Feed, "test"));
        let route = graph.insert(Entity::new(EntityKind::Route, "AAMV"));
        let a = stop(&mut graph, "Airport", -116.784582, 36.868446);
        let b = stop(&mut graph, "Amargosa Valley (Demo)", -116.40094, 36.641496);
        graph.link(route, a);
        graph.link(route, b);

        let rect = graph.bbox(route).unwrap();
        assert_eq!(rect.min().x, -116.784582);
        assert_eq!(rect.max().y, 36.868446);

        assert!(matches!(
            graph.bbox(feed),
            Err(OnestopError::Unsupported { operation: "bbox", .. })
        ));
    }

    #[test]
    fn test_custom_reducer() {
        let first_point = |points: &[Point]| -> Result<Point> {
            points
                .first()
                .copied()
                .ok_or_else(|| OnestopError::Centroid("empty".into()))
        };
        let mut graph = EntityGraph::with_reducer(Box::new(first_point));
        let route = graph.insert(Entity::new(EntityKind::Route, "AB"));
        let a = stop(&mut graph, "Airport", -116.784582, 36.868446);
        graph.link(route, a);

        assert!(graph.geohash(route).unwrap().starts_with("9qscwx8n"));
    }

    #[test]
    fn test_reducer_failure_propagates() {
        let failing = |_: &[Point]| -> Result<Point> {
            Err(OnestopError::Centroid("service unavailable".into()))
        };
        let mut graph = EntityGraph::with_reducer(Box::new(failing));
        let route = graph.insert(Entity::new(EntityKind::Route, "AB"));
        let a = stop(&mut graph, "Airport", -116.784582, 36.868446);
        graph.link(route, a);

        assert!(matches!(graph.onestop(route), Err(OnestopError::Centroid(_))));
    }
}
