//! Derived traversals and id lookups over the entity graph.

use hashbrown::HashSet;

use super::EntityGraph;
use crate::identifiers::*;
use crate::models::{EntityKind, EntityRef, OnestopError, Result};

impl EntityGraph {
    /// Entities of `kind` related to `r`.
    ///
    /// Kinds below `r` in the hierarchy are collected through children,
    /// kinds above through parents. Order follows first discovery, which in
    /// turn follows link order, so results are deterministic.
    pub fn related(&self, r: EntityRef, kind: EntityKind) -> Vec<EntityRef> {
        let own = self.kind(r).rank();
        let target = kind.rank();
        if own == target {
            return Vec::new();
        }
        let downward = target > own;

        let mut found = Vec::new();
        let mut seen = HashSet::new();
        let mut frontier = vec![r];
        seen.insert(r);

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for node in frontier {
                let entity = self.get(node);
                let edges = if downward {
                    entity.children()
                } else {
                    entity.parents()
                };
                for &edge in edges {
                    if !seen.insert(edge) {
                        continue;
                    }
                    let rank = self.kind(edge).rank();
                    if rank == target {
                        found.push(edge);
                    } else if (downward && rank < target) || (!downward && rank > target) {
                        next.push(edge);
                    }
                }
            }
            frontier = next;
        }
        found
    }

    pub fn feeds(&self, r: EntityRef) -> Vec<EntityRef> {
        self.related(r, EntityKind::Feed)
    }

    /// Operators of a feed, or the operators running a route or stop.
    pub fn operators(&self, r: EntityRef) -> Vec<EntityRef> {
        self.related(r, EntityKind::Operator)
    }

    /// Alias of [`operators`](Self::operators) for routes and stops.
    pub fn agencies(&self, r: EntityRef) -> Vec<EntityRef> {
        self.operators(r)
    }

    pub fn routes(&self, r: EntityRef) -> Vec<EntityRef> {
        self.related(r, EntityKind::Route)
    }

    pub fn stops(&self, r: EntityRef) -> Vec<EntityRef> {
        self.related(r, EntityKind::Stop)
    }

    /// Identifiers of a feed's operators.
    pub fn operators_in_feed(&self, feed: EntityRef) -> Result<Vec<OnestopId>> {
        self.operators(feed)
            .into_iter()
            .map(|o| self.onestop(o))
            .collect()
    }

    /// Find a descendant of `root` by identifier.
    ///
    /// Descendants whose identifier cannot be computed never match.
    pub fn lookup(&self, root: EntityRef, id: &OnestopId) -> Result<EntityRef> {
        self.find_descendant(root, id, None)
            .ok_or_else(|| OnestopError::NotFound {
                kind: "entity",
                id: id.clone(),
            })
    }

    pub fn operator(&self, root: EntityRef, id: &OnestopId) -> Result<EntityRef> {
        self.lookup_kind(root, id, EntityKind::Operator)
    }

    pub fn route(&self, root: EntityRef, id: &OnestopId) -> Result<EntityRef> {
        self.lookup_kind(root, id, EntityKind::Route)
    }

    pub fn stop(&self, root: EntityRef, id: &OnestopId) -> Result<EntityRef> {
        self.lookup_kind(root, id, EntityKind::Stop)
    }

    fn lookup_kind(&self, root: EntityRef, id: &OnestopId, kind: EntityKind) -> Result<EntityRef> {
        self.find_descendant(root, id, Some(kind))
            .ok_or_else(|| OnestopError::NotFound {
                kind: kind.as_str(),
                id: id.clone(),
            })
    }

    fn find_descendant(
        &self,
        root: EntityRef,
        id: &OnestopId,
        kind: Option<EntityKind>,
    ) -> Option<EntityRef> {
        // The id prefix names the kind; only that level can match.
        let kind = kind.or_else(|| id.kind())?;
        if id.kind() != Some(kind) || kind.rank() <= self.kind(root).rank() {
            return None;
        }
        self.related(root, kind)
            .into_iter()
            .find(|&r| self.onestop(r).is_ok_and(|own| &own == id))
    }
}
