//! A single node of the entity graph.
//!
//! Entities never own each other. Parent and child edges are handles into
//! the [`EntityGraph`](crate::graph::EntityGraph) arena that holds every
//! entity of a processing run.

use geo::{Centroid, Point};
use id_arena::Id;
use once_cell::unsync::OnceCell;

use crate::identifiers::*;
use crate::models::types::*;

/// Handle to an entity stored in an [`EntityGraph`](crate::graph::EntityGraph).
pub type EntityRef = Id<Entity>;

/// Kind-specific payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityDetails {
    Feed(FeedMeta),
    Operator,
    Route,
    Stop,
}

impl EntityDetails {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Feed(_) => EntityKind::Feed,
            Self::Operator => EntityKind::Operator,
            Self::Route => EntityKind::Route,
            Self::Stop => EntityKind::Stop,
        }
    }
}

impl From<EntityKind> for EntityDetails {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Feed => Self::Feed(FeedMeta::default()),
            EntityKind::Operator => Self::Operator,
            EntityKind::Route => Self::Route,
            EntityKind::Stop => Self::Stop,
        }
    }
}

#[derive(Debug)]
pub struct Entity {
    name: String,
    geometry: Option<Shape>,
    tags: Tags,
    identifiers: Vec<Provenance>,
    details: EntityDetails,
    pub(crate) parents: Vec<EntityRef>,
    pub(crate) children: Vec<EntityRef>,
    onestop: OnceCell<OnestopId>,
}

impl Entity {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self::with_details(kind.into(), name)
    }

    pub fn feed(name: impl Into<String>, meta: FeedMeta) -> Self {
        Self::with_details(EntityDetails::Feed(meta), name)
    }

    fn with_details(details: EntityDetails, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            geometry: None,
            tags: Tags::new(),
            identifiers: Vec::new(),
            details,
            parents: Vec::new(),
            children: Vec::new(),
            onestop: OnceCell::new(),
        }
    }

    pub fn with_geometry(mut self, geometry: Option<Shape>) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Seed the identifier cache, e.g. with an id read from a document.
    pub fn with_onestop(self, id: OnestopId) -> Self {
        // A fresh cell cannot already be set.
        let _ = self.onestop.set(id);
        self
    }

    /// Attach provenance records, rejecting duplicates.
    pub fn with_identifiers(mut self, identifiers: Vec<Provenance>) -> Result<Self> {
        self.merge_identifiers(identifiers)?;
        Ok(self)
    }

    // ---- Accessors ----

    pub fn kind(&self) -> EntityKind {
        self.details.kind()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stored geometry. Feeds never carry one.
    pub fn geometry(&self) -> Option<&Shape> {
        self.geometry.as_ref()
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut Tags {
        &mut self.tags
    }

    pub fn identifiers(&self) -> &[Provenance] {
        &self.identifiers
    }

    pub fn details(&self) -> &EntityDetails {
        &self.details
    }

    pub fn feed_meta(&self) -> Option<&FeedMeta> {
        match &self.details {
            EntityDetails::Feed(meta) => Some(meta),
            _ => None,
        }
    }

    pub fn parents(&self) -> &[EntityRef] {
        &self.parents
    }

    pub fn children(&self) -> &[EntityRef] {
        &self.children
    }

    /// The memoized identifier, if one has been computed or seeded.
    pub fn cached_onestop(&self) -> Option<&OnestopId> {
        self.onestop.get()
    }

    pub(crate) fn onestop_cell(&self) -> &OnceCell<OnestopId> {
        &self.onestop
    }

    /// The single point locating a stop.
    ///
    /// Polygon stops are located at their centroid.
    pub fn located_point(&self) -> Result<Point> {
        if self.kind() != EntityKind::Stop {
            return Err(OnestopError::Unsupported {
                operation: "point",
                kind: self.kind(),
            });
        }
        match &self.geometry {
            Some(Shape::Point(point)) => Ok(*point),
            Some(Shape::Polygon(polygon)) => polygon
                .centroid()
                .ok_or(OnestopError::NoPoints(EntityKind::Stop)),
            None => Err(OnestopError::NoPoints(EntityKind::Stop)),
        }
    }

    // ---- Mutation ----

    /// Drop the memoized identifier so the next read recomputes it.
    pub fn invalidate(&mut self) {
        self.onestop.take();
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.invalidate();
    }

    pub(crate) fn set_geometry(&mut self, geometry: Option<Shape>) {
        self.geometry = geometry;
        self.invalidate();
    }

    pub(crate) fn add_child(&mut self, child: EntityRef) -> bool {
        push_unique(&mut self.children, child)
    }

    pub(crate) fn add_parent(&mut self, parent: EntityRef) -> bool {
        push_unique(&mut self.parents, parent)
    }

    /// Record one source record against this entity.
    pub fn add_identifier(&mut self, identifier: SourceIdentifier, tags: Tags) -> Result<()> {
        if self.has_identifier(&identifier) {
            return Err(OnestopError::ExistingIdentifier(identifier));
        }
        self.identifiers.push(Provenance::new(identifier, tags));
        Ok(())
    }

    /// Append every incoming record, or none of them.
    ///
    /// Fails if any incoming identifier is already present, or appears twice
    /// in `incoming`; the provenance list is then left untouched.
    pub fn merge_identifiers(&mut self, incoming: Vec<Provenance>) -> Result<()> {
        for (i, record) in incoming.iter().enumerate() {
            let repeated = incoming[..i]
                .iter()
                .any(|earlier| earlier.identifier == record.identifier);
            if repeated || self.has_identifier(&record.identifier) {
                return Err(OnestopError::ExistingIdentifier(record.identifier.clone()));
            }
        }
        self.identifiers.extend(incoming);
        Ok(())
    }

    pub fn has_identifier(&self, identifier: &SourceIdentifier) -> bool {
        self.identifiers.iter().any(|p| &p.identifier == identifier)
    }
}

fn push_unique(set: &mut Vec<EntityRef>, item: EntityRef) -> bool {
    if set.contains(&item) {
        return false;
    }
    set.push(item);
    true
}
